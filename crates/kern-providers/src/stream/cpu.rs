//! CPU stream backend.
//!
//! Host work executes inline on the submitting thread, so a CPU "stream" has
//! no queue to drain: submission order and completion order are the same
//! thread's program order. The notification still carries the full marker
//! protocol so CPU producers compose with waiters on any domain.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use kern_core::Device;
use tracing::debug;

use super::backoff::spin_until;
use super::{ExecutionStream, HostEvent, StreamCommandHandler, StreamNotification};

/// An execution stream for the host domain. Work is synchronous, so
/// `synchronize` is a no-op.
#[derive(Debug)]
pub struct CpuStream;

impl ExecutionStream for CpuStream {
    fn device(&self) -> Device {
        Device::CPU
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Notification produced on a CPU stream.
///
/// The producing thread records the marker synchronously inside `notify`,
/// so both wait variants reduce to a host-side block. `wait_on_device` is
/// still host-blocking here: the CPU domain has no device queue to park the
/// wait on.
pub struct CpuNotification {
    ready: AtomicBool,
    event: HostEvent,
}

impl CpuNotification {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            event: HostEvent::new(),
        }
    }
}

impl StreamNotification for CpuNotification {
    fn notify(&self) {
        self.event.record();
        self.ready.store(true, Ordering::Release);
    }

    fn wait_on_device(&self, _consumer: &Arc<dyn ExecutionStream>) {
        spin_until(&self.ready);
        self.event.wait();
    }

    fn wait_on_host(&self) {
        spin_until(&self.ready);
        self.event.wait();
    }
}

/// Stream-command handler for the host domain.
#[derive(Debug, Default)]
pub struct CpuStreamHandler;

impl CpuStreamHandler {
    /// Create the host handler.
    pub fn new() -> Self {
        Self
    }
}

impl StreamCommandHandler for CpuStreamHandler {
    fn create_stream(&self) -> Result<Arc<dyn ExecutionStream>> {
        debug!("Created CPU stream");
        Ok(Arc::new(CpuStream))
    }

    fn release_stream(&self, _stream: Arc<dyn ExecutionStream>) -> Result<()> {
        Ok(())
    }

    fn create_notification(
        &self,
        _producer: &Arc<dyn ExecutionStream>,
    ) -> Result<Arc<dyn StreamNotification>> {
        Ok(Arc::new(CpuNotification::new()))
    }
}
