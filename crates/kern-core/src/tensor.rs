//! Dense tensors with fixed-width or string elements.
//!
//! A [`Tensor`] is a rectangular, row-major array resident on exactly one
//! device. Fixed-width element types share a single byte-level storage
//! representation; string tensors carry their elements directly and are
//! restricted to the host.

use crate::error::{CoreError, Result};
use crate::types::{DataType, Device, TensorAllocator, TensorBuffer};

/// Value storage shared by dense and sparse tensors.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// Raw little-endian bytes for fixed-width element types.
    Bytes(Vec<u8>),
    /// String elements; always host-resident.
    Strings(Vec<String>),
}

impl TensorData {
    /// Number of elements held, given the element type.
    pub fn len(&self, dtype: DataType) -> usize {
        match self {
            TensorData::Bytes(b) => match dtype.byte_width() {
                Some(w) => b.len() / w,
                None => 0,
            },
            TensorData::Strings(s) => s.len(),
        }
    }

    /// Whether the storage holds no elements.
    pub fn is_empty(&self) -> bool {
        match self {
            TensorData::Bytes(b) => b.is_empty(),
            TensorData::Strings(s) => s.is_empty(),
        }
    }
}

/// Fixed-width primitive element types usable with typed accessors.
pub trait Element: Copy + 'static {
    /// The [`DataType`] this primitive maps to.
    const DATA_TYPE: DataType;

    /// Append this value's little-endian bytes to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Read one value from a little-endian byte slice.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dt:expr) => {
        impl Element for $ty {
            const DATA_TYPE: DataType = $dt;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                <$ty>::from_le_bytes(buf)
            }
        }
    };
}

impl_element!(u8, DataType::U8);
impl_element!(i8, DataType::I8);
impl_element!(u16, DataType::U16);
impl_element!(i16, DataType::I16);
impl_element!(u32, DataType::U32);
impl_element!(i32, DataType::I32);
impl_element!(f32, DataType::F32);
impl_element!(u64, DataType::U64);
impl_element!(i64, DataType::I64);
impl_element!(f64, DataType::F64);

/// A dense, row-major tensor resident on exactly one device.
#[derive(Debug, Clone)]
pub struct Tensor {
    dtype: DataType,
    shape: Vec<usize>,
    device: Device,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor from raw little-endian bytes on the given device.
    ///
    /// The byte length must match `shape` and the element width exactly.
    pub fn from_bytes(
        dtype: DataType,
        shape: Vec<usize>,
        device: Device,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let width = dtype.byte_width().ok_or_else(|| {
            CoreError::InvalidArgument("string tensors must use from_strings".into())
        })?;
        let numel: usize = shape.iter().product();
        let expected = numel * width;
        if bytes.len() != expected {
            return Err(CoreError::StorageSize {
                shape,
                dtype,
                expected,
                got: bytes.len(),
            });
        }
        Ok(Self {
            dtype,
            shape,
            device,
            data: TensorData::Bytes(bytes),
        })
    }

    /// Build a host-resident string tensor.
    pub fn from_strings(shape: Vec<usize>, strings: Vec<String>) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if strings.len() != numel {
            return Err(CoreError::InvalidArgument(format!(
                "shape {:?} needs {} strings, got {}",
                shape,
                numel,
                strings.len()
            )));
        }
        Ok(Self {
            dtype: DataType::String,
            shape,
            device: Device::CPU,
            data: TensorData::Strings(strings),
        })
    }

    /// Build a host-resident tensor from a typed slice.
    pub fn from_slice<T: Element>(values: &[T], shape: Vec<usize>) -> Result<Self> {
        let mut bytes = Vec::with_capacity(std::mem::size_of::<T>() * values.len());
        for v in values {
            v.write_le(&mut bytes);
        }
        Self::from_bytes(T::DATA_TYPE, shape, Device::CPU, bytes)
    }

    /// Allocate a zero-filled tensor through the given allocator.
    ///
    /// String tensors bypass the allocator (variable-width payloads are not
    /// byte-addressable) and require a host allocator.
    pub fn zeroed(
        dtype: DataType,
        shape: Vec<usize>,
        allocator: &dyn TensorAllocator,
    ) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if dtype.is_string() {
            if !allocator.device().is_cpu() {
                return Err(CoreError::DeviceMismatch {
                    expected: Device::CPU,
                    got: allocator.device(),
                });
            }
            return Ok(Self {
                dtype,
                shape,
                device: Device::CPU,
                data: TensorData::Strings(vec![String::new(); numel]),
            });
        }
        let width = dtype.byte_width().unwrap_or(0);
        let buffer: TensorBuffer = allocator
            .allocate(numel * width)
            .map_err(|e| CoreError::Allocation(e.to_string()))?;
        Ok(Self {
            dtype,
            shape,
            device: buffer.device,
            data: TensorData::Bytes(buffer.data),
        })
    }

    /// Element type of this tensor.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Shape of this tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Device this tensor resides on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Whether the element type is string.
    pub fn is_string(&self) -> bool {
        self.dtype.is_string()
    }

    /// Total storage size in bytes; zero for string tensors.
    pub fn size_in_bytes(&self) -> usize {
        match &self.data {
            TensorData::Bytes(b) => b.len(),
            TensorData::Strings(_) => 0,
        }
    }

    /// Underlying storage.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Raw bytes of a fixed-width tensor.
    pub fn data_bytes(&self) -> Result<&[u8]> {
        match &self.data {
            TensorData::Bytes(b) => Ok(b),
            TensorData::Strings(_) => Err(CoreError::TypeMismatch {
                expected: DataType::U8,
                got: DataType::String,
            }),
        }
    }

    /// Mutable raw bytes of a fixed-width tensor.
    pub fn data_bytes_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.data {
            TensorData::Bytes(b) => Ok(b),
            TensorData::Strings(_) => Err(CoreError::TypeMismatch {
                expected: DataType::U8,
                got: DataType::String,
            }),
        }
    }

    /// String elements of a string tensor.
    pub fn strings(&self) -> Result<&[String]> {
        match &self.data {
            TensorData::Strings(s) => Ok(s),
            TensorData::Bytes(_) => Err(CoreError::TypeMismatch {
                expected: DataType::String,
                got: self.dtype,
            }),
        }
    }

    /// Mutable string elements of a string tensor.
    pub fn strings_mut(&mut self) -> Result<&mut [String]> {
        match &mut self.data {
            TensorData::Strings(s) => Ok(s),
            TensorData::Bytes(_) => Err(CoreError::TypeMismatch {
                expected: DataType::String,
                got: self.dtype,
            }),
        }
    }

    /// Decode the tensor into a typed vector. The requested primitive must
    /// match the tensor's element type exactly.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.dtype != T::DATA_TYPE {
            return Err(CoreError::TypeMismatch {
                expected: T::DATA_TYPE,
                got: self.dtype,
            });
        }
        let bytes = self.data_bytes()?;
        let width = std::mem::size_of::<T>();
        Ok(bytes.chunks_exact(width).map(T::read_le).collect())
    }
}
