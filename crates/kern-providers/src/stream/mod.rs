//! Cross-stream synchronization primitives.
//!
//! Device work is issued to execution streams: independent, in-order
//! asynchronous command queues with no ordering relative to each other. A
//! [`StreamNotification`] bridges two streams (or a stream and the host): the
//! producer calls [`StreamNotification::notify`] after enqueuing the work to
//! be observed, and a consumer waits either at the device-queue level
//! (`wait_on_device`) or on the host (`wait_on_host`).
//!
//! Both wait variants start with a bounded host-side spin: the device-side
//! wait command cannot be enqueued until `notify()` has recorded the marker,
//! so a cheap [`backoff::Backoff`] spin bridges that gap, after which
//! blocking is delegated to the device queue or a host blocking wait. A
//! consumer that completes a wait is guaranteed to observe every device-side
//! write that preceded the paired `notify()` in the producer's stream order.
//!
//! Backends expose these primitives through a [`StreamCommandHandler`]
//! registered per (producer, consumer) domain pair in the
//! [`registry::StreamCommandRegistry`].

pub mod backoff;
pub mod cpu;
pub mod gpu;
pub mod registry;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use kern_core::Device;

/// A backend-owned asynchronous command queue.
///
/// Work submitted to one stream executes in submission order; streams have no
/// ordering relative to each other except through notifications.
pub trait ExecutionStream: Send + Sync + fmt::Debug {
    /// Device this stream issues work to.
    fn device(&self) -> Device;

    /// Block the host until all work submitted so far has completed.
    fn synchronize(&self) -> anyhow::Result<()>;

    /// Backend downcast hook.
    fn as_any(&self) -> &dyn Any;
}

/// A one-shot completion marker bridging a producer stream and consumers.
///
/// `notify` must be called exactly once per instance before any wait
/// completes. A failure of the underlying device API inside `notify` or a
/// wait is fatal and panics with a descriptive message; these indicate
/// programming errors that cannot be repaired mid-stream. The device-side
/// marker is created when the notification is constructed, bound to the
/// producing stream, and destroyed when the notification is dropped.
pub trait StreamNotification: Send + Sync {
    /// Record the completion marker on the producing stream, then publish
    /// the ready flag. Non-blocking: the marker records asynchronously.
    fn notify(&self);

    /// Spin until `notify` has run, then enqueue a device-queue-level wait
    /// on `consumer` so the consuming stream blocks without involving the
    /// host.
    fn wait_on_device(&self, consumer: &Arc<dyn ExecutionStream>);

    /// Spin until `notify` has run, then block (not spin) the calling host
    /// thread until the marker fires.
    fn wait_on_host(&self);
}

/// The four stream-command roles grouped as one cohesive backend interface,
/// registered per (producer, consumer) domain pair.
pub trait StreamCommandHandler: Send + Sync {
    /// Create a new execution stream on the producer domain.
    fn create_stream(&self) -> anyhow::Result<Arc<dyn ExecutionStream>>;

    /// Release a stream, draining any outstanding work.
    fn release_stream(&self, stream: Arc<dyn ExecutionStream>) -> anyhow::Result<()>;

    /// Create a notification whose marker is bound to `producer`.
    fn create_notification(
        &self,
        producer: &Arc<dyn ExecutionStream>,
    ) -> anyhow::Result<Arc<dyn StreamNotification>>;
}

/// A host-memory completion marker: the emulated analogue of a device event.
///
/// `record` fires the marker; `wait` blocks the calling thread until it has
/// fired. Recording is sticky, so waits that start after the fire return
/// immediately.
#[derive(Debug, Default)]
pub struct HostEvent {
    fired: Mutex<bool>,
    cv: Condvar,
}

impl HostEvent {
    /// Create an unfired marker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the marker and wake all waiters.
    pub fn record(&self) {
        let mut fired = self.fired.lock().unwrap();
        *fired = true;
        self.cv.notify_all();
    }

    /// Block until the marker has fired.
    pub fn wait(&self) {
        let mut fired = self.fired.lock().unwrap();
        while !*fired {
            fired = self.cv.wait(fired).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_host_event_wakes_waiter() {
        let event = Arc::new(HostEvent::new());
        let waiter = {
            let event = event.clone();
            thread::spawn(move || event.wait())
        };
        event.record();
        waiter.join().unwrap();
    }

    #[test]
    fn test_host_event_sticky() {
        let event = HostEvent::new();
        event.record();
        // A wait that starts after the fire must not block.
        event.wait();
    }
}
