//! Host-emulated GPU stream backend.
//!
//! Each stream is a dedicated worker thread draining an in-order command
//! channel, and the completion marker is a [`HostEvent`]. This backend
//! carries the full synchronization contract of a real accelerator backend
//! (asynchronous notify, device-queue-level waits, blocking host waits), so
//! the scheduler and tests exercise identical code paths whether or not a
//! physical accelerator is present; a CUDA-class backend replaces the worker
//! thread with a driver stream and the event with a driver event.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use kern_core::{Device, DeviceKind};
use tracing::debug;

use super::backoff::spin_until;
use super::registry::StreamCommandRegistry;
use super::{ExecutionStream, HostEvent, StreamCommandHandler, StreamNotification};

type Command = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
struct StreamInner {
    device: Device,
    sender: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamInner {
    /// Enqueue a command. Panics if the stream has been released: issuing
    /// work to a dead stream is a programming error with no recovery.
    fn enqueue(&self, cmd: Command) {
        let sender = self.sender.lock().unwrap();
        match sender.as_ref() {
            Some(tx) => tx
                .send(cmd)
                .unwrap_or_else(|_| panic!("stream {} worker terminated", self.device)),
            None => panic!("work issued to released stream {}", self.device),
        }
    }

    fn shutdown(&self) {
        // Closing the channel lets the worker drain outstanding commands
        // and exit.
        self.sender.lock().unwrap().take();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// An emulated device stream: an in-order asynchronous command queue.
#[derive(Debug, Clone)]
pub struct GpuStream {
    inner: Arc<StreamInner>,
}

impl GpuStream {
    fn new(device_id: usize) -> Self {
        let device = Device::gpu(device_id);
        let (tx, rx) = mpsc::channel::<Command>();
        let worker = thread::Builder::new()
            .name(format!("kern-stream-gpu{}", device_id))
            .spawn(move || {
                while let Ok(cmd) = rx.recv() {
                    cmd();
                }
            })
            .expect("failed to spawn stream worker thread");

        debug!("Created stream on {}", device);
        Self {
            inner: Arc::new(StreamInner {
                device,
                sender: Mutex::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Submit a command to the stream's queue. Commands run in submission
    /// order on the stream's worker thread.
    ///
    /// # Panics
    /// Panics if the stream has been released.
    pub fn enqueue(&self, cmd: Box<dyn FnOnce() + Send + 'static>) {
        self.inner.enqueue(cmd);
    }
}

impl ExecutionStream for GpuStream {
    fn device(&self) -> Device {
        self.inner.device
    }

    fn synchronize(&self) -> Result<()> {
        let event = Arc::new(HostEvent::new());
        let marker = event.clone();
        self.enqueue(Box::new(move || marker.record()));
        event.wait();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Notification bound to an emulated GPU stream.
///
/// The marker exists from construction; `notify` records it on the producing
/// stream asynchronously and then publishes the ready flag. Waiters spin on
/// the flag only long enough for the record command to be enqueued, then
/// delegate blocking to the consuming stream's queue or to the host event.
pub struct GpuNotification {
    ready: AtomicBool,
    event: Arc<HostEvent>,
    producer: GpuStream,
}

impl GpuNotification {
    fn new(producer: GpuStream) -> Self {
        Self {
            ready: AtomicBool::new(false),
            event: Arc::new(HostEvent::new()),
            producer,
        }
    }
}

impl StreamNotification for GpuNotification {
    fn notify(&self) {
        let marker = self.event.clone();
        self.producer.enqueue(Box::new(move || marker.record()));
        self.ready.store(true, Ordering::Release);
    }

    fn wait_on_device(&self, consumer: &Arc<dyn ExecutionStream>) {
        spin_until(&self.ready);
        let consumer = consumer
            .as_any()
            .downcast_ref::<GpuStream>()
            .unwrap_or_else(|| {
                panic!(
                    "device-level wait requires a GPU stream, got {}",
                    consumer.device()
                )
            });
        let marker = self.event.clone();
        consumer.enqueue(Box::new(move || marker.wait()));
    }

    fn wait_on_host(&self) {
        spin_until(&self.ready);
        self.event.wait();
    }
}

/// Stream-command handler for the emulated GPU domain.
pub struct GpuStreamHandler {
    device_id: usize,
}

impl GpuStreamHandler {
    /// Handler for the given device ordinal.
    pub fn new(device_id: usize) -> Self {
        Self { device_id }
    }
}

impl StreamCommandHandler for GpuStreamHandler {
    fn create_stream(&self) -> Result<Arc<dyn ExecutionStream>> {
        Ok(Arc::new(GpuStream::new(self.device_id)))
    }

    fn release_stream(&self, stream: Arc<dyn ExecutionStream>) -> Result<()> {
        let stream = stream
            .as_any()
            .downcast_ref::<GpuStream>()
            .ok_or_else(|| anyhow!("cannot release a non-GPU stream through the GPU handler"))?;
        stream.inner.shutdown();
        debug!("Released stream on {}", stream.device());
        Ok(())
    }

    fn create_notification(
        &self,
        producer: &Arc<dyn ExecutionStream>,
    ) -> Result<Arc<dyn StreamNotification>> {
        let producer = producer
            .as_any()
            .downcast_ref::<GpuStream>()
            .ok_or_else(|| anyhow!("notification producer must be a GPU stream"))?;
        Ok(Arc::new(GpuNotification::new(producer.clone())))
    }
}

/// Register the GPU backend's stream handles: device-level waits for
/// GPU-to-GPU ordering, host-level waits for GPU-to-CPU ordering.
pub fn register_gpu_stream_handles(registry: &StreamCommandRegistry) -> Result<()> {
    let handler = Arc::new(GpuStreamHandler::new(0));
    registry.register_handler(DeviceKind::Gpu, DeviceKind::Gpu, handler.clone())?;
    registry.register_handler(DeviceKind::Gpu, DeviceKind::Cpu, handler)?;
    Ok(())
}
