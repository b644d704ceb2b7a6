//! KERN Sparse Format Converter
//!
//! Conversions among dense, COO, and CSR tensor representations, with
//! optional transpose and device staging:
//! - Dense to sparse: a single width-generic scan gathers nonzero values and
//!   indices in either COO (linear or 2-D) or CSR layout
//! - Sparse to dense: zero-fill then place each stored value at its derived
//!   flat position, with full bounds validation
//! - Index rewrites: COO ⇄ CSR with missing-row boundary fill, and a
//!   transpose path that emits a value-permutation vector instead of
//!   re-copying value storage
//! - Sorted-index intersection for sparsity-pattern matching
//!
//! ## Architecture
//!
//! Every conversion entry point takes the data-transfer registry, a
//! host-capable allocator, and a destination allocator. Off-host sources are
//! staged to the host, the rewrite runs on host memory, and off-host
//! destinations receive a final copy-out, so results are identical wherever
//! the operands live. String tensors convert on the host only.
//!
//! ## Example
//!
//! ```rust
//! use kern_core::Tensor;
//! use kern_providers::{create_transfer_registry, SystemMemoryAllocator};
//! use kern_sparse::{dense_to_sparse_csr, sparse_csr_to_dense};
//!
//! let transfers = create_transfer_registry()?;
//! let cpu = SystemMemoryAllocator::new();
//!
//! let dense = Tensor::from_slice(&[0.0f32, 5.0, 0.0, 3.0, 0.0, 7.0], vec![2, 3])?;
//! let sparse = dense_to_sparse_csr(&transfers, &dense, &cpu, &cpu)?;
//! assert_eq!(sparse.nnz(), 3);
//!
//! let back = sparse_csr_to_dense(&transfers, &sparse, &cpu, &cpu)?;
//! assert_eq!(back.to_vec::<f32>()?, dense.to_vec::<f32>()?);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod error;
pub mod indices;
mod scan;

pub use convert::{
    dense_to_sparse_coo, dense_to_sparse_csr, sparse_coo_to_dense, sparse_csr_to_dense,
};
pub use error::{Result, SparseError};
pub use indices::{
    convert_2d_coo_indices_to_1d, convert_csr_to_coo_indices, coo_1d_indices, csr_indices,
    csr_indices_transposed, scan_for_sparse_matches, CsrIndices,
};
