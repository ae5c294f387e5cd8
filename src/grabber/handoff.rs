//! Frame handoff between the acquisition thread and the caller
//!
//! Each output stream is a single-slot channel. The acquisition thread
//! publishes a whole batch (X, Y, color, then depth last) only when the
//! caller has acknowledged the previous one with `notify_consumed`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use image::RgbImage;

use crate::filter::FilteredPlanes;
use crate::frame::Grid;

/// Single-value mailbox backed by a bounded(1) channel
#[derive(Debug, Clone)]
pub struct Slot<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Store `value`, replacing anything the caller never took
    pub(crate) fn replace(&self, value: T) {
        while self.rx.try_recv().is_ok() {}
        if self.tx.try_send(value).is_err() {
            log::warn!("Handoff slot was refilled concurrently, dropping value");
        }
    }

    /// Take the value without blocking
    pub fn take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for a value
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn is_filled(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Output slots plus the count of batches awaiting acknowledgement
#[derive(Debug, Default)]
pub struct FrameHandoff {
    pub depth: Slot<Grid<f32>>,
    pub x: Slot<Grid<f32>>,
    pub y: Slot<Grid<f32>>,
    pub color: Slot<RgbImage>,
    pending: AtomicUsize,
}

impl FrameHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a published batch has not been acknowledged yet
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }

    /// Publish a batch unless the previous one is still pending.
    ///
    /// Returns whether the batch was published.
    pub(crate) fn publish(&self, planes: FilteredPlanes, color: Option<RgbImage>) -> bool {
        if self
            .pending
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.x.replace(planes.x);
        self.y.replace(planes.y);
        if let Some(color) = color {
            self.color.replace(color);
        }
        // Depth goes last so a caller waiting on it sees the whole batch
        self.depth.replace(planes.depth);
        true
    }

    /// Acknowledge the last batch; extra calls are ignored
    pub fn notify_consumed(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}
