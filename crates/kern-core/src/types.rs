//! Fundamental data types, device descriptors, and the provider-facing
//! allocator and data-transfer abstractions.

use std::fmt;

use crate::sparse::SparseTensor;
use crate::tensor::Tensor;

/// Element types representable in KERN tensors.
///
/// All fixed-width types are grouped by byte width for format-conversion
/// purposes; the converter never interprets numeric semantics beyond a
/// zero-bit-pattern test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 8-bit unsigned integer.
    U8,
    /// 8-bit signed integer.
    I8,
    /// Boolean stored as one byte.
    Bool,
    /// 16-bit unsigned integer.
    U16,
    /// 16-bit signed integer.
    I16,
    /// IEEE 754 half-precision float (raw 16-bit storage).
    F16,
    /// bfloat16 (raw 16-bit storage).
    BF16,
    /// 32-bit unsigned integer.
    U32,
    /// 32-bit signed integer.
    I32,
    /// 32-bit float.
    F32,
    /// 64-bit unsigned integer.
    U64,
    /// 64-bit signed integer.
    I64,
    /// 64-bit float.
    F64,
    /// Variable-width UTF-8 string elements; host-resident only.
    String,
}

impl DataType {
    /// Byte width of one element, or `None` for variable-width strings.
    pub fn byte_width(&self) -> Option<usize> {
        match self {
            DataType::U8 | DataType::I8 | DataType::Bool => Some(1),
            DataType::U16 | DataType::I16 | DataType::F16 | DataType::BF16 => Some(2),
            DataType::U32 | DataType::I32 | DataType::F32 => Some(4),
            DataType::U64 | DataType::I64 | DataType::F64 => Some(8),
            DataType::String => None,
        }
    }

    /// Whether this is the string element type.
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::String)
    }
}

/// Logical backend/device category.
///
/// A `DeviceKind` is the execution domain used to key both the stream-command
/// registry and the data-transfer registry. `Gpu` names the accelerator
/// domain regardless of whether a physical accelerator backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Host CPU.
    Cpu,
    /// Accelerator domain.
    Gpu,
}

/// A concrete device: an execution domain plus an ordinal within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    /// Execution domain this device belongs to.
    pub kind: DeviceKind,
    /// Ordinal of the device within its domain.
    pub id: usize,
}

impl Device {
    /// The default host device.
    pub const CPU: Device = Device {
        kind: DeviceKind::Cpu,
        id: 0,
    };

    /// An accelerator device with the given ordinal.
    pub fn gpu(id: usize) -> Self {
        Device {
            kind: DeviceKind::Gpu,
            id,
        }
    }

    /// Whether this device is host-resident.
    pub fn is_cpu(&self) -> bool {
        self.kind == DeviceKind::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Cpu => write!(f, "cpu:{}", self.id),
            DeviceKind::Gpu => write!(f, "gpu:{}", self.id),
        }
    }
}

/// Kind of memory a buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    /// Ordinary host RAM.
    SystemRAM,
    /// Memory local to an accelerator device.
    DeviceLocal,
}

/// A raw allocation produced by a [`TensorAllocator`].
#[derive(Debug, Clone)]
pub struct TensorBuffer {
    /// Backing bytes. For device-local buffers this is the host-side shadow
    /// the emulated backends operate on.
    pub data: Vec<u8>,
    /// Device the buffer is attributed to.
    pub device: Device,
    /// Kind of memory backing the buffer.
    pub memory_type: MemoryType,
}

/// Memory usage snapshot reported by an allocator.
#[derive(Debug, Clone, Copy)]
pub struct MemoryInfo {
    /// Total bytes available to this allocator, `usize::MAX` if unbounded.
    pub total_bytes: usize,
    /// Bytes currently allocated.
    pub allocated_bytes: usize,
    /// Peak bytes allocated over the allocator's lifetime.
    pub peak_bytes: usize,
}

/// Memory allocator bound to a single device.
///
/// Implementations must be safe for concurrent allocation from multiple
/// threads; the format converter calls into allocators without serializing.
pub trait TensorAllocator: Send + Sync + fmt::Debug {
    /// Obtain `nbytes` of zero-initialized memory on this allocator's device.
    fn allocate(&self, nbytes: usize) -> anyhow::Result<TensorBuffer>;

    /// Device this allocator serves.
    fn device(&self) -> Device;

    /// Current memory usage statistics.
    fn memory_info(&self) -> MemoryInfo;
}

/// Copies tensors between a fixed pair of device domains.
///
/// Implementations are looked up by (source kind, destination kind) through
/// the provider layer's transfer registry; a missing path is surfaced to
/// callers as a configuration error.
pub trait DataTransfer: Send + Sync {
    /// Whether this transfer can copy from `src` to `dst`.
    fn can_copy(&self, src: DeviceKind, dst: DeviceKind) -> bool;

    /// Copy a dense tensor onto `dst_device`, producing a new tensor.
    fn copy_tensor(&self, src: &Tensor, dst_device: Device) -> anyhow::Result<Tensor>;

    /// Copy a sparse tensor onto `dst_device`, preserving format and layout.
    fn copy_sparse_tensor(
        &self,
        src: &SparseTensor,
        dst_device: Device,
    ) -> anyhow::Result<SparseTensor>;
}
