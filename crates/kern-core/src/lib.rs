//! KERN Core Types
//!
//! This crate provides the foundational types of the KERN execution-provider
//! layer: dense and sparse tensors, device descriptors, and the allocator and
//! data-transfer abstractions that the provider and converter crates build on.
//!
//! ## Architecture
//!
//! - **Types**: data types, devices, memory descriptors, and the
//!   `TensorAllocator` / `DataTransfer` traits consumed by providers
//! - **Tensor**: host-representable dense tensors with fixed-width or string
//!   elements, resident on exactly one device
//! - **Sparse**: COO and CSR sparse tensors sharing the dense tensor's value
//!   storage model
//!
//! ## Example
//!
//! ```rust
//! use kern_core::{DataType, Tensor};
//!
//! let t = Tensor::from_slice(&[0.0f32, 5.0, 0.0, 3.0, 0.0, 7.0], vec![2, 3])?;
//! assert_eq!(t.dtype(), DataType::F32);
//! assert_eq!(t.numel(), 6);
//! # Ok::<(), kern_core::CoreError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod logging;
pub mod sparse;
pub mod tensor;
pub mod types;

pub use error::{CoreError, Result};
pub use sparse::{CooView, CsrView, SparseFormat, SparseTensor};
pub use tensor::{Element, Tensor, TensorData};
pub use types::{
    DataTransfer, DataType, Device, DeviceKind, MemoryInfo, MemoryType, TensorAllocator,
    TensorBuffer,
};
