//! Error types for core operations.

use crate::types::{DataType, Device};
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced by core tensor and type operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A caller-supplied argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Element type of a tensor did not match what the operation requires.
    #[error("Data type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch {
        /// Type the operation requires.
        expected: DataType,
        /// Type the tensor actually carries.
        got: DataType,
    },

    /// An operation required the tensor to live on a different device.
    #[error("Device mismatch: expected {expected}, got {got}")]
    DeviceMismatch {
        /// Device the operation requires.
        expected: Device,
        /// Device the tensor actually resides on.
        got: Device,
    },

    /// Buffer length inconsistent with the declared shape and element type.
    #[error("Storage size mismatch: shape {shape:?} with {dtype:?} needs {expected} bytes, got {got}")]
    StorageSize {
        /// Declared tensor shape.
        shape: Vec<usize>,
        /// Declared element type.
        dtype: DataType,
        /// Bytes the shape requires.
        expected: usize,
        /// Bytes actually supplied.
        got: usize,
    },

    /// Backing memory could not be obtained.
    #[error("Allocation failed: {0}")]
    Allocation(String),
}
