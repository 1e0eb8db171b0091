//! Control state shared between a presentation loop and its owner.
//!
//! The loop task owns the simulation; the owner only holds this handle,
//! which carries atomic flags and a [`Notify`] so a teardown request wakes
//! the loop from inside its `select!`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Teardown signal and frame counter for one presentation view.
#[derive(Debug, Default)]
pub struct ViewControl {
    /// Whether teardown was requested.
    stop_requested: AtomicBool,

    /// Wakes the loop on teardown.
    stop_notify: Notify,

    /// Frames rendered so far.
    frames: AtomicU64,
}

impl ViewControl {
    /// Fresh control state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to tear down. Idempotent.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// Whether teardown was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Resolve once teardown has been requested.
    pub async fn stopped(&self) {
        loop {
            // Register before checking the flag so a concurrent request is
            // never missed.
            let notified = self.stop_notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub(crate) fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::AcqRel);
    }
}
