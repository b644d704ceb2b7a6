//! KERN Execution Provider Framework
//!
//! This crate provides the provider-side plumbing of the KERN runtime:
//! - Memory allocators for host and device-local tensor storage
//! - A data-transfer registry for copying tensors between device domains
//! - The cross-stream notification primitive and its command registry, which
//!   order asynchronous device work relative to other streams and the host
//!
//! ## Architecture
//!
//! Each backend registers one [`StreamCommandHandler`] per (producer,
//! consumer) domain pair with the process-wide [`StreamCommandRegistry`]
//! during provider initialization; the execution engine then synchronizes
//! streams by domain pair without naming a concrete backend. Data movement is
//! resolved the same way through the [`DataTransferRegistry`].
//!
//! ## Example
//!
//! ```rust
//! use kern_providers::{create_stream_registry, create_transfer_registry};
//! use kern_core::DeviceKind;
//!
//! let streams = create_stream_registry()?;
//! let handler = streams
//!     .handler(DeviceKind::Gpu, DeviceKind::Cpu)
//!     .expect("gpu handles registered at init");
//!
//! let stream = handler.create_stream()?;
//! let notification = handler.create_notification(&stream)?;
//! notification.notify();
//! notification.wait_on_host();
//! handler.release_stream(stream)?;
//! streams.shutdown()?;
//!
//! let transfers = create_transfer_registry()?;
//! assert!(transfers.find(DeviceKind::Cpu, DeviceKind::Gpu).is_some());
//! # Ok::<(), anyhow::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod stream;
pub mod transfer;

pub use allocator::{
    AllocatorStats, GpuMemoryAllocator, ResourceExhausted, SystemMemoryAllocator,
};
pub use stream::backoff::Backoff;
pub use stream::cpu::CpuStreamHandler;
pub use stream::gpu::{register_gpu_stream_handles, GpuStream, GpuStreamHandler};
pub use stream::registry::{RegistryState, StreamCommandRegistry};
pub use stream::{ExecutionStream, HostEvent, StreamCommandHandler, StreamNotification};
pub use transfer::{DataTransferRegistry, GpuDataTransfer, HostDataTransfer};

/// Result type alias for provider operations.
pub type Result<T> = anyhow::Result<T>;

use kern_core::DeviceKind;
use std::sync::Arc;

/// Create an active stream-command registry with the CPU handler and the
/// GPU backend's handles registered, mirroring provider initialization.
pub fn create_stream_registry() -> Result<StreamCommandRegistry> {
    let registry = StreamCommandRegistry::new();
    registry.initialize()?;
    registry.register_handler(
        DeviceKind::Cpu,
        DeviceKind::Cpu,
        Arc::new(CpuStreamHandler::new()),
    )?;
    register_gpu_stream_handles(&registry)?;
    tracing::info!("Stream-command registry initialized with CPU and GPU handles");
    Ok(registry)
}

/// Create a data-transfer registry covering host and emulated-device paths.
pub fn create_transfer_registry() -> Result<DataTransferRegistry> {
    let registry = DataTransferRegistry::new();
    registry.register(DeviceKind::Cpu, DeviceKind::Cpu, Arc::new(HostDataTransfer))?;
    let gpu = Arc::new(GpuDataTransfer);
    registry.register(DeviceKind::Cpu, DeviceKind::Gpu, gpu.clone())?;
    registry.register(DeviceKind::Gpu, DeviceKind::Cpu, gpu.clone())?;
    registry.register(DeviceKind::Gpu, DeviceKind::Gpu, gpu)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registries() -> Result<()> {
        let streams = create_stream_registry()?;
        assert!(streams.handler(DeviceKind::Cpu, DeviceKind::Cpu).is_some());
        assert!(streams.handler(DeviceKind::Gpu, DeviceKind::Gpu).is_some());
        assert!(streams.handler(DeviceKind::Gpu, DeviceKind::Cpu).is_some());
        assert!(streams.handler(DeviceKind::Cpu, DeviceKind::Gpu).is_none());
        streams.shutdown()?;

        let transfers = create_transfer_registry()?;
        assert!(transfers.find(DeviceKind::Gpu, DeviceKind::Cpu).is_some());
        Ok(())
    }
}
