//! Conversion entry points between dense, COO, and CSR tensors.
//!
//! Every entry point follows the same device-staging protocol: an off-host
//! source is first copied to a host staging tensor through the transfer
//! registry, the format scan or rewrite runs on host memory, and an off-host
//! destination receives the finished result through a final host-to-device
//! copy. Correctness is therefore independent of where the source and
//! destination live. Conversions are pure functions over their inputs; the
//! injected allocators are the only shared state and must themselves be
//! thread-safe.

use std::borrow::Cow;
use std::sync::Arc;

use kern_core::{
    DataTransfer, Device, DeviceKind, SparseFormat, SparseTensor, Tensor, TensorAllocator,
    TensorData,
};
use kern_providers::DataTransferRegistry;
use tracing::debug;

use crate::error::{Result, SparseError};
use crate::scan::{scan_dense_coo, scan_dense_csr};

fn find_transfer(
    transfers: &DataTransferRegistry,
    src: DeviceKind,
    dst: DeviceKind,
) -> Result<Arc<dyn DataTransfer>> {
    transfers
        .find(src, dst)
        .ok_or(SparseError::NoTransferPath { src, dst })
}

fn stage_dense_to_host<'a>(
    transfers: &DataTransferRegistry,
    src: &'a Tensor,
) -> Result<Cow<'a, Tensor>> {
    if src.device().is_cpu() {
        return Ok(Cow::Borrowed(src));
    }
    let transfer = find_transfer(transfers, src.device().kind, DeviceKind::Cpu)?;
    let staged = transfer
        .copy_tensor(src, Device::CPU)
        .map_err(SparseError::Transfer)?;
    Ok(Cow::Owned(staged))
}

fn stage_sparse_to_host<'a>(
    transfers: &DataTransferRegistry,
    src: &'a SparseTensor,
) -> Result<Cow<'a, SparseTensor>> {
    if src.device().is_cpu() {
        return Ok(Cow::Borrowed(src));
    }
    let transfer = find_transfer(transfers, src.device().kind, DeviceKind::Cpu)?;
    let staged = transfer
        .copy_sparse_tensor(src, Device::CPU)
        .map_err(SparseError::Transfer)?;
    Ok(Cow::Owned(staged))
}

fn finalize_sparse(
    transfers: &DataTransferRegistry,
    host: SparseTensor,
    dst_device: Device,
) -> Result<SparseTensor> {
    if dst_device.is_cpu() {
        return Ok(host);
    }
    let transfer = find_transfer(transfers, DeviceKind::Cpu, dst_device.kind)?;
    transfer
        .copy_sparse_tensor(&host, dst_device)
        .map_err(SparseError::Transfer)
}

fn finalize_dense(
    transfers: &DataTransferRegistry,
    host: Tensor,
    dst_device: Device,
) -> Result<Tensor> {
    if dst_device.is_cpu() {
        return Ok(host);
    }
    let transfer = find_transfer(transfers, DeviceKind::Cpu, dst_device.kind)?;
    transfer
        .copy_tensor(&host, dst_device)
        .map_err(SparseError::Transfer)
}

fn check_rank(shape: &[usize]) -> Result<(i64, i64)> {
    match shape {
        [n] => Ok((1, *n as i64)),
        [rows, cols] => Ok((*rows as i64, *cols as i64)),
        _ => Err(SparseError::UnsupportedRank(shape.len())),
    }
}

fn check_string_destination(src_is_string: bool, dst_device: Device) -> Result<()> {
    if src_is_string && !dst_device.is_cpu() {
        return Err(SparseError::StringsRequireHost(dst_device));
    }
    Ok(())
}

fn check_host_allocator(cpu_allocator: &dyn TensorAllocator) -> Result<()> {
    let device = cpu_allocator.device();
    if !device.is_cpu() {
        return Err(SparseError::InvalidArgument(format!(
            "staging allocator must be host-resident, got {}",
            device
        )));
    }
    Ok(())
}

/// Convert a dense tensor to sparse COO.
///
/// `linear` selects one flattened index per nonzero; otherwise indices are
/// (row, col) pairs. Rank-1 tensors admit only the linear mode. The result
/// lands on `dst_allocator`'s device.
pub fn dense_to_sparse_coo(
    transfers: &DataTransferRegistry,
    src: &Tensor,
    cpu_allocator: &dyn TensorAllocator,
    dst_allocator: &dyn TensorAllocator,
    linear: bool,
) -> Result<SparseTensor> {
    let (_, cols) = check_rank(src.shape())?;
    if src.rank() == 1 && !linear {
        return Err(SparseError::InvalidArgument(
            "1-D tensors may only have linear COO indices".into(),
        ));
    }
    let dst_device = dst_allocator.device();
    check_string_destination(src.is_string(), dst_device)?;
    check_host_allocator(cpu_allocator)?;

    let staged = stage_dense_to_host(transfers, src)?;
    let (values, indices) = scan_dense_coo(&staged, cols, linear)?;
    debug!(
        "Dense {:?} -> COO ({} nonzeros, linear={})",
        staged.shape(),
        values.nnz(),
        linear
    );
    let host = SparseTensor::new_coo(
        staged.dtype(),
        staged.shape().to_vec(),
        Device::CPU,
        values.into_tensor_data(),
        indices,
        linear,
    )?;
    finalize_sparse(transfers, host, dst_device)
}

/// Convert a dense rank-2 tensor to sparse CSR. The result lands on
/// `dst_allocator`'s device.
pub fn dense_to_sparse_csr(
    transfers: &DataTransferRegistry,
    src: &Tensor,
    cpu_allocator: &dyn TensorAllocator,
    dst_allocator: &dyn TensorAllocator,
) -> Result<SparseTensor> {
    if src.rank() != 2 {
        return Err(SparseError::UnsupportedRank(src.rank()));
    }
    let (rows, cols) = check_rank(src.shape())?;
    let dst_device = dst_allocator.device();
    check_string_destination(src.is_string(), dst_device)?;
    check_host_allocator(cpu_allocator)?;

    let staged = stage_dense_to_host(transfers, src)?;
    let (values, inner, outer) = scan_dense_csr(&staged, rows, cols)?;
    debug!(
        "Dense {:?} -> CSR ({} nonzeros)",
        staged.shape(),
        values.nnz()
    );
    let host = SparseTensor::new_csr(
        staged.dtype(),
        staged.shape().to_vec(),
        Device::CPU,
        values.into_tensor_data(),
        inner,
        outer,
    )?;
    finalize_sparse(transfers, host, dst_device)
}

/// Validate a CSR outer table against the declared rows and nonzero count.
fn check_outer(outer: &[i64], rows: i64, nnz: usize) -> Result<()> {
    if outer.len() as i64 != rows + 1 {
        return Err(SparseError::CorruptTensor(format!(
            "outer table has {} entries, expected rows + 1 = {}",
            outer.len(),
            rows + 1
        )));
    }
    if outer[0] != 0 || *outer.last().unwrap_or(&0) != nnz as i64 {
        return Err(SparseError::CorruptTensor(format!(
            "outer table must start at 0 and end at nnz ({}), got [{}, {}]",
            nnz,
            outer[0],
            outer.last().unwrap_or(&0)
        )));
    }
    if outer.windows(2).any(|w| w[1] < w[0]) {
        return Err(SparseError::CorruptTensor(
            "outer table is not nondecreasing".into(),
        ));
    }
    Ok(())
}

fn place_value(
    out: &mut Tensor,
    values: &TensorData,
    width: usize,
    src_offset: usize,
    dst_idx: usize,
) -> Result<()> {
    let dense_size = out.numel();
    if dst_idx >= dense_size {
        return Err(SparseError::CorruptTensor(format!(
            "destination index {} out of dense bounds {}",
            dst_idx, dense_size
        )));
    }
    match values {
        TensorData::Bytes(bytes) => {
            let src = src_offset * width;
            if src + width > bytes.len() {
                return Err(SparseError::CorruptTensor(format!(
                    "value storage offset {} out of bounds ({} bytes)",
                    src,
                    bytes.len()
                )));
            }
            let dst = dst_idx * width;
            out.data_bytes_mut()?[dst..dst + width].copy_from_slice(&bytes[src..src + width]);
        }
        TensorData::Strings(strings) => {
            let s = strings.get(src_offset).ok_or_else(|| {
                SparseError::CorruptTensor(format!(
                    "value storage offset {} out of bounds ({} strings)",
                    src_offset,
                    strings.len()
                ))
            })?;
            out.strings_mut()?[dst_idx] = s.clone();
        }
    }
    Ok(())
}

/// Convert a sparse CSR tensor to dense. The destination is zero-filled
/// through the appropriate allocator before values are placed.
pub fn sparse_csr_to_dense(
    transfers: &DataTransferRegistry,
    src: &SparseTensor,
    cpu_allocator: &dyn TensorAllocator,
    dst_allocator: &dyn TensorAllocator,
) -> Result<Tensor> {
    if src.format() != SparseFormat::Csr {
        return Err(SparseError::FormatMismatch {
            expected: SparseFormat::Csr,
            got: src.format(),
        });
    }
    if src.dense_shape().len() != 2 {
        return Err(SparseError::UnsupportedRank(src.dense_shape().len()));
    }
    let dst_device = dst_allocator.device();
    check_string_destination(src.is_string(), dst_device)?;
    check_host_allocator(cpu_allocator)?;

    let staged = stage_sparse_to_host(transfers, src)?;
    let (rows, cols) = check_rank(staged.dense_shape())?;
    let width = staged.dtype().byte_width().unwrap_or(0);

    let build_allocator = if dst_device.is_cpu() {
        dst_allocator
    } else {
        cpu_allocator
    };
    let mut out = Tensor::zeroed(staged.dtype(), staged.dense_shape().to_vec(), build_allocator)?;

    let nnz = staged.nnz();
    if nnz > 0 {
        let view = staged.as_csr()?;
        check_outer(view.outer, rows, nnz)?;
        let mut offset = 0usize;
        for i in 1..view.outer.len() {
            let row = (i - 1) as i64;
            for _ in view.outer[i - 1]..view.outer[i] {
                let col = view.inner[offset];
                if col < 0 || col >= cols {
                    return Err(SparseError::CorruptTensor(format!(
                        "inner index {} out of column bounds {}",
                        col, cols
                    )));
                }
                let dst_idx = (row * cols + col) as usize;
                place_value(&mut out, staged.values(), width, offset, dst_idx)?;
                offset += 1;
            }
        }
    }
    debug!("CSR {:?} -> dense ({} nonzeros)", staged.dense_shape(), nnz);
    finalize_dense(transfers, out, dst_device)
}

/// Convert a sparse COO tensor to dense. Handles linear and 2-D index modes;
/// the destination is zero-filled before values are placed.
pub fn sparse_coo_to_dense(
    transfers: &DataTransferRegistry,
    src: &SparseTensor,
    cpu_allocator: &dyn TensorAllocator,
    dst_allocator: &dyn TensorAllocator,
) -> Result<Tensor> {
    if src.format() != SparseFormat::Coo {
        return Err(SparseError::FormatMismatch {
            expected: SparseFormat::Coo,
            got: src.format(),
        });
    }
    let dst_device = dst_allocator.device();
    check_string_destination(src.is_string(), dst_device)?;
    check_host_allocator(cpu_allocator)?;

    let staged = stage_sparse_to_host(transfers, src)?;
    let (_, cols) = check_rank(staged.dense_shape())?;
    let width = staged.dtype().byte_width().unwrap_or(0);
    let dense_size = staged.dense_size() as i64;

    let build_allocator = if dst_device.is_cpu() {
        dst_allocator
    } else {
        cpu_allocator
    };
    let mut out = Tensor::zeroed(staged.dtype(), staged.dense_shape().to_vec(), build_allocator)?;

    let view = staged.as_coo()?;
    if view.linear {
        for (offset, &idx) in view.indices.iter().enumerate() {
            if idx < 0 || idx >= dense_size {
                return Err(SparseError::CorruptTensor(format!(
                    "linear index {} out of dense bounds {}",
                    idx, dense_size
                )));
            }
            place_value(&mut out, staged.values(), width, offset, idx as usize)?;
        }
    } else {
        for (offset, pair) in view.indices.chunks_exact(2).enumerate() {
            let dst_idx = pair[0] * cols + pair[1];
            if pair[1] < 0 || pair[1] >= cols || dst_idx < 0 || dst_idx >= dense_size {
                return Err(SparseError::CorruptTensor(format!(
                    "coordinate ({}, {}) out of dense bounds {:?}",
                    pair[0],
                    pair[1],
                    staged.dense_shape()
                )));
            }
            place_value(&mut out, staged.values(), width, offset, dst_idx as usize)?;
        }
    }
    debug!(
        "COO {:?} -> dense ({} nonzeros)",
        staged.dense_shape(),
        staged.nnz()
    );
    finalize_dense(transfers, out, dst_device)
}
