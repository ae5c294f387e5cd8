//! Deferred reconfiguration commands
//!
//! Setters on [`super::DepthGrabber`] never touch filter state directly.
//! They enqueue a [`Command`] that the acquisition thread applies at the
//! top of its next iteration, in submission order.

use parking_lot::Mutex;

use crate::config::RoiRect;
use crate::filter::FrameFilter;
use crate::sensor::DepthSensor;

/// A pending change to the filter
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replace the requested ROI (color-space pixels)
    SetRoi(Option<RoiRect>),
    /// Filter the whole frame instead of the ROI
    SetFullFrame(bool),
    SetWindowSize(usize),
    SetFastAdaptation(bool),
    SetSpatialFilter(bool),
    SetInpainting(bool),
    SetCeilingOffset(f32),
    /// Discard all statistics without changing settings
    ResetBuffers,
}

impl Command {
    /// Apply to `filter`, using `sensor` for coordinate mapping
    pub fn apply<S: DepthSensor + ?Sized>(self, filter: &mut FrameFilter, sensor: &S) {
        log::debug!("Applying {:?}", self);
        let map = |x: u32, y: u32| sensor.map_color_to_depth(x, y);
        match self {
            Command::SetRoi(rect) => filter.set_roi(rect, map),
            Command::SetFullFrame(full_frame) => filter.set_full_frame(full_frame, map),
            Command::SetWindowSize(window_size) => filter.set_window_size(window_size),
            Command::SetFastAdaptation(enabled) => filter.set_fast_adaptation(enabled),
            Command::SetSpatialFilter(enabled) => filter.set_spatial_filter(enabled),
            Command::SetInpainting(enabled) => filter.set_inpainting(enabled),
            Command::SetCeilingOffset(offset) => filter.set_ceiling_offset(offset),
            Command::ResetBuffers => filter.reset(),
        }
    }
}

/// FIFO of commands shared between the caller and the acquisition thread
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Mutex<Vec<Command>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        self.pending.lock().push(command);
    }

    /// Take every pending command, oldest first
    pub fn drain(&self) -> Vec<Command> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
