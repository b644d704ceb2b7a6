//! Memory allocator implementations for execution providers.
//!
//! Allocators hand out zero-initialized [`TensorBuffer`]s attributed to a
//! single device. The format converter receives one host-capable allocator
//! for staging and one destination allocator per call; both must tolerate
//! concurrent allocation, which these implementations do by keeping their
//! statistics behind a mutex.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use kern_core::{Device, MemoryInfo, MemoryType, TensorAllocator, TensorBuffer};
use thiserror::Error;
use tracing::debug;

/// Distinct, retryable signal for device memory exhaustion.
///
/// Surfaced when an emulated device allocator cannot satisfy a request
/// within its configured capacity. Callers may downcast an `anyhow::Error`
/// to this type to distinguish a retryable condition from fatal device-API
/// programming errors.
#[derive(Debug, Error)]
#[error("device memory exhausted: requested {requested} bytes with {available} of {capacity} available")]
pub struct ResourceExhausted {
    /// Bytes requested by the failed allocation.
    pub requested: usize,
    /// Bytes still available within the capacity budget.
    pub available: usize,
    /// Total configured capacity in bytes.
    pub capacity: usize,
}

/// Allocation statistics shared by the allocator implementations.
#[derive(Debug, Default, Clone)]
pub struct AllocatorStats {
    /// Total bytes handed out over the allocator's lifetime.
    pub total_allocated: usize,
    /// Largest single allocation served.
    pub largest_allocation: usize,
    /// Number of allocations served.
    pub allocation_count: usize,
}

/// Host-RAM allocator backed by ordinary heap allocation.
#[derive(Debug, Default)]
pub struct SystemMemoryAllocator {
    stats: Arc<Mutex<AllocatorStats>>,
}

impl SystemMemoryAllocator {
    /// Create a new host allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of allocation statistics.
    pub fn stats(&self) -> AllocatorStats {
        self.stats.lock().unwrap().clone()
    }
}

impl TensorAllocator for SystemMemoryAllocator {
    fn allocate(&self, nbytes: usize) -> Result<TensorBuffer> {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.total_allocated += nbytes;
            stats.largest_allocation = stats.largest_allocation.max(nbytes);
            stats.allocation_count += 1;
        }

        debug!("Allocated {} bytes of host memory", nbytes);

        Ok(TensorBuffer {
            data: vec![0u8; nbytes],
            device: Device::CPU,
            memory_type: MemoryType::SystemRAM,
        })
    }

    fn device(&self) -> Device {
        Device::CPU
    }

    fn memory_info(&self) -> MemoryInfo {
        let stats = self.stats.lock().unwrap();
        MemoryInfo {
            total_bytes: usize::MAX,
            allocated_bytes: stats.total_allocated,
            peak_bytes: stats.largest_allocation,
        }
    }
}

/// Capacity-limited allocator for the emulated GPU backend.
///
/// Buffers are device-local in attribution; the backing storage is a host
/// shadow the emulated device operates on. Requests beyond the remaining
/// capacity fail with [`ResourceExhausted`] rather than a generic error so
/// the caller can retry after freeing device memory.
#[derive(Debug)]
pub struct GpuMemoryAllocator {
    device: Device,
    capacity: usize,
    state: Mutex<GpuAllocatorState>,
}

#[derive(Debug, Default)]
struct GpuAllocatorState {
    in_use: usize,
    peak: usize,
    stats: AllocatorStats,
}

impl GpuMemoryAllocator {
    /// Create an allocator for the given device ordinal with a byte budget.
    pub fn new(device_id: usize, capacity: usize) -> Self {
        Self {
            device: Device::gpu(device_id),
            capacity,
            state: Mutex::new(GpuAllocatorState::default()),
        }
    }

    /// Return `nbytes` to the capacity budget once a buffer is discarded.
    ///
    /// The emulated backend has no device-side garbage collection; staging
    /// code calls this when a temporary device buffer is dropped.
    pub fn release(&self, nbytes: usize) {
        let mut state = self.state.lock().unwrap();
        state.in_use = state.in_use.saturating_sub(nbytes);
        debug!("Released {} bytes on {}", nbytes, self.device);
    }
}

impl TensorAllocator for GpuMemoryAllocator {
    fn allocate(&self, nbytes: usize) -> Result<TensorBuffer> {
        let mut state = self.state.lock().unwrap();
        let available = self.capacity - state.in_use;
        if nbytes > available {
            return Err(anyhow!(ResourceExhausted {
                requested: nbytes,
                available,
                capacity: self.capacity,
            }));
        }
        state.in_use += nbytes;
        state.peak = state.peak.max(state.in_use);
        state.stats.total_allocated += nbytes;
        state.stats.largest_allocation = state.stats.largest_allocation.max(nbytes);
        state.stats.allocation_count += 1;

        debug!("Allocated {} bytes on {}", nbytes, self.device);

        Ok(TensorBuffer {
            data: vec![0u8; nbytes],
            device: self.device,
            memory_type: MemoryType::DeviceLocal,
        })
    }

    fn device(&self) -> Device {
        self.device
    }

    fn memory_info(&self) -> MemoryInfo {
        let state = self.state.lock().unwrap();
        MemoryInfo {
            total_bytes: self.capacity,
            allocated_bytes: state.in_use,
            peak_bytes: state.peak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocator() -> Result<()> {
        let allocator = SystemMemoryAllocator::new();

        let buffer = allocator.allocate(40)?;
        assert_eq!(buffer.data.len(), 40);
        assert!(buffer.data.iter().all(|&b| b == 0));
        assert_eq!(buffer.memory_type, MemoryType::SystemRAM);
        assert!(buffer.device.is_cpu());

        let info = allocator.memory_info();
        assert_eq!(info.allocated_bytes, 40);
        assert_eq!(allocator.stats().allocation_count, 1);

        Ok(())
    }

    #[test]
    fn test_gpu_allocator_capacity() -> Result<()> {
        let allocator = GpuMemoryAllocator::new(0, 128);

        let buffer = allocator.allocate(96)?;
        assert_eq!(buffer.device, Device::gpu(0));
        assert_eq!(buffer.memory_type, MemoryType::DeviceLocal);

        // Budget has 32 bytes left; the next request must fail retryably.
        let err = allocator.allocate(64).unwrap_err();
        let exhausted = err
            .downcast_ref::<ResourceExhausted>()
            .expect("error should downcast to ResourceExhausted");
        assert_eq!(exhausted.requested, 64);
        assert_eq!(exhausted.available, 32);

        allocator.release(96);
        assert!(allocator.allocate(64).is_ok());

        Ok(())
    }

    #[test]
    fn test_gpu_allocator_peak_tracking() -> Result<()> {
        let allocator = GpuMemoryAllocator::new(1, 1024);
        let _a = allocator.allocate(100)?;
        let _b = allocator.allocate(200)?;
        allocator.release(100);

        let info = allocator.memory_info();
        assert_eq!(info.allocated_bytes, 200);
        assert_eq!(info.peak_bytes, 300);
        Ok(())
    }
}
