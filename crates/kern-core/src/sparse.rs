//! Sparse tensors in COO and CSR layouts.
//!
//! A [`SparseTensor`] pairs a logical dense shape with one of two physical
//! layouts:
//!
//! - **COO**: explicit coordinates, either one flattened index per value
//!   (linear) or a (row, col) pair per value (2-D);
//! - **CSR**: per-nonzero column indices (`inner`) plus a `rows + 1` offset
//!   table (`outer`), where `outer[i + 1] - outer[i]` is the nonzero count of
//!   row `i`.
//!
//! Sparse tensors are immutable value objects produced by conversion calls;
//! index arrays always live on the host alongside the values of host-resident
//! tensors, with device residency tracked for staging purposes.

use crate::error::{CoreError, Result};
use crate::tensor::TensorData;
use crate::types::{DataType, Device};

/// Physical layout of a sparse tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseFormat {
    /// Coordinate format.
    Coo,
    /// Compressed sparse row format.
    Csr,
}

#[derive(Debug, Clone)]
enum SparseLayout {
    Coo { indices: Vec<i64>, linear: bool },
    Csr { inner: Vec<i64>, outer: Vec<i64> },
}

/// COO index view: one flattened index per value when `linear`, otherwise
/// interleaved (row, col) pairs.
#[derive(Debug, Clone, Copy)]
pub struct CooView<'a> {
    /// Index storage, length `nnz` (linear) or `2 * nnz` (2-D).
    pub indices: &'a [i64],
    /// Whether indices are flattened.
    pub linear: bool,
}

/// CSR index view.
#[derive(Debug, Clone, Copy)]
pub struct CsrView<'a> {
    /// Column index per nonzero, length `nnz`.
    pub inner: &'a [i64],
    /// Row offset table, length `rows + 1` (empty for an all-zero tensor).
    pub outer: &'a [i64],
}

/// A sparse tensor: logical dense shape, nonzero values, and index layout.
#[derive(Debug, Clone)]
pub struct SparseTensor {
    dtype: DataType,
    dense_shape: Vec<usize>,
    device: Device,
    values: TensorData,
    layout: SparseLayout,
}

impl SparseTensor {
    /// Build a COO sparse tensor.
    ///
    /// `indices` must hold exactly one entry per value (linear) or two
    /// (2-D); anything else is rejected as inconsistent storage.
    pub fn new_coo(
        dtype: DataType,
        dense_shape: Vec<usize>,
        device: Device,
        values: TensorData,
        indices: Vec<i64>,
        linear: bool,
    ) -> Result<Self> {
        let nnz = values.len(dtype);
        let expected = if linear { nnz } else { nnz * 2 };
        if indices.len() != expected {
            return Err(CoreError::InvalidArgument(format!(
                "COO indices length {} inconsistent with {} values ({} expected)",
                indices.len(),
                nnz,
                expected
            )));
        }
        Ok(Self {
            dtype,
            dense_shape,
            device,
            values,
            layout: SparseLayout::Coo { indices, linear },
        })
    }

    /// Build a CSR sparse tensor.
    ///
    /// `inner` must hold one column per value; `outer` must either be empty
    /// (an all-zero tensor) or hold `rows + 1` nondecreasing offsets.
    pub fn new_csr(
        dtype: DataType,
        dense_shape: Vec<usize>,
        device: Device,
        values: TensorData,
        inner: Vec<i64>,
        outer: Vec<i64>,
    ) -> Result<Self> {
        let nnz = values.len(dtype);
        if inner.len() != nnz {
            return Err(CoreError::InvalidArgument(format!(
                "CSR inner indices length {} must equal value count {}",
                inner.len(),
                nnz
            )));
        }
        Ok(Self {
            dtype,
            dense_shape,
            device,
            values,
            layout: SparseLayout::Csr { inner, outer },
        })
    }

    /// Element type of the stored values.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Logical dense shape.
    pub fn dense_shape(&self) -> &[usize] {
        &self.dense_shape
    }

    /// Total element count of the logical dense tensor.
    pub fn dense_size(&self) -> usize {
        self.dense_shape.iter().product()
    }

    /// Device the tensor is attributed to.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of stored (nonzero) values.
    pub fn nnz(&self) -> usize {
        self.values.len(self.dtype)
    }

    /// Physical layout of this tensor.
    pub fn format(&self) -> SparseFormat {
        match self.layout {
            SparseLayout::Coo { .. } => SparseFormat::Coo,
            SparseLayout::Csr { .. } => SparseFormat::Csr,
        }
    }

    /// Whether the element type is string.
    pub fn is_string(&self) -> bool {
        self.dtype.is_string()
    }

    /// Stored values.
    pub fn values(&self) -> &TensorData {
        &self.values
    }

    /// COO index view; fails if the tensor is CSR.
    pub fn as_coo(&self) -> Result<CooView<'_>> {
        match &self.layout {
            SparseLayout::Coo { indices, linear } => Ok(CooView {
                indices,
                linear: *linear,
            }),
            SparseLayout::Csr { .. } => Err(CoreError::InvalidArgument(
                "tensor is CSR, expected COO".into(),
            )),
        }
    }

    /// CSR index view; fails if the tensor is COO.
    pub fn as_csr(&self) -> Result<CsrView<'_>> {
        match &self.layout {
            SparseLayout::Csr { inner, outer } => Ok(CsrView { inner, outer }),
            SparseLayout::Coo { .. } => Err(CoreError::InvalidArgument(
                "tensor is COO, expected CSR".into(),
            )),
        }
    }
}
