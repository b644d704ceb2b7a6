//! Cross-device data transfer and its process-wide registry.
//!
//! Transfers are looked up by (source domain, destination domain); a missing
//! entry means no copy path is configured between the two domains, which the
//! format converter surfaces to its caller as a configuration error.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use kern_core::{
    DataTransfer, Device, DeviceKind, SparseFormat, SparseTensor, Tensor, TensorData,
};
use tracing::debug;

/// Registry of data-transfer implementations keyed by domain pair.
#[derive(Default)]
pub struct DataTransferRegistry {
    transfers: DashMap<(DeviceKind, DeviceKind), Arc<dyn DataTransfer>>,
}

impl DataTransferRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transfer for the (src, dst) domain pair.
    pub fn register(
        &self,
        src: DeviceKind,
        dst: DeviceKind,
        transfer: Arc<dyn DataTransfer>,
    ) -> Result<()> {
        if self.transfers.contains_key(&(src, dst)) {
            return Err(anyhow!(
                "data transfer for {:?} -> {:?} is already registered",
                src,
                dst
            ));
        }
        self.transfers.insert((src, dst), transfer);
        debug!("Registered data transfer {:?} -> {:?}", src, dst);
        Ok(())
    }

    /// Look up the transfer for a domain pair, if one is registered.
    pub fn find(&self, src: DeviceKind, dst: DeviceKind) -> Option<Arc<dyn DataTransfer>> {
        self.transfers.get(&(src, dst)).map(|t| t.clone())
    }
}

fn retag_dense(src: &Tensor, dst_device: Device) -> Result<Tensor> {
    match src.data() {
        TensorData::Bytes(bytes) => Ok(Tensor::from_bytes(
            src.dtype(),
            src.shape().to_vec(),
            dst_device,
            bytes.clone(),
        )?),
        TensorData::Strings(strings) => {
            if !dst_device.is_cpu() {
                return Err(anyhow!(
                    "string tensors cannot be copied to non-host device {}",
                    dst_device
                ));
            }
            Ok(Tensor::from_strings(
                src.shape().to_vec(),
                strings.clone(),
            )?)
        }
    }
}

fn retag_sparse(src: &SparseTensor, dst_device: Device) -> Result<SparseTensor> {
    if src.is_string() && !dst_device.is_cpu() {
        return Err(anyhow!(
            "string sparse tensors cannot be copied to non-host device {}",
            dst_device
        ));
    }
    let out = match src.format() {
        SparseFormat::Coo => {
            let view = src.as_coo()?;
            SparseTensor::new_coo(
                src.dtype(),
                src.dense_shape().to_vec(),
                dst_device,
                src.values().clone(),
                view.indices.to_vec(),
                view.linear,
            )?
        }
        SparseFormat::Csr => {
            let view = src.as_csr()?;
            SparseTensor::new_csr(
                src.dtype(),
                src.dense_shape().to_vec(),
                dst_device,
                src.values().clone(),
                view.inner.to_vec(),
                view.outer.to_vec(),
            )?
        }
    };
    Ok(out)
}

/// Host-to-host copy: a straight clone of values and indices.
pub struct HostDataTransfer;

impl DataTransfer for HostDataTransfer {
    fn can_copy(&self, src: DeviceKind, dst: DeviceKind) -> bool {
        src == DeviceKind::Cpu && dst == DeviceKind::Cpu
    }

    fn copy_tensor(&self, src: &Tensor, dst_device: Device) -> Result<Tensor> {
        retag_dense(src, dst_device)
    }

    fn copy_sparse_tensor(&self, src: &SparseTensor, dst_device: Device) -> Result<SparseTensor> {
        retag_sparse(src, dst_device)
    }
}

/// Transfers between the host and the emulated GPU domain.
///
/// The emulated device stores its memory in host shadows, so a copy is a
/// clone plus a residency retag; a real accelerator backend would replace
/// this with DMA staging.
pub struct GpuDataTransfer;

impl DataTransfer for GpuDataTransfer {
    fn can_copy(&self, src: DeviceKind, dst: DeviceKind) -> bool {
        src == DeviceKind::Gpu || dst == DeviceKind::Gpu
    }

    fn copy_tensor(&self, src: &Tensor, dst_device: Device) -> Result<Tensor> {
        debug!(
            "Copying {} bytes {} -> {}",
            src.size_in_bytes(),
            src.device(),
            dst_device
        );
        retag_dense(src, dst_device)
    }

    fn copy_sparse_tensor(&self, src: &SparseTensor, dst_device: Device) -> Result<SparseTensor> {
        debug!(
            "Copying sparse tensor ({} values) {} -> {}",
            src.nnz(),
            src.device(),
            dst_device
        );
        retag_sparse(src, dst_device)
    }
}
