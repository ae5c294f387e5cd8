//! Depth sensor collaborator
//!
//! The acquisition loop talks to the physical device only through the
//! [`DepthSensor`] trait. Drivers live outside this crate; a deterministic
//! [`synthetic::SyntheticSensor`] is provided for demos and tests.

pub mod synthetic;

use std::time::Instant;

use image::RgbImage;

use crate::frame::Grid;

/// Sensor errors
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
    #[error("Sensor disconnected")]
    Disconnected,
    #[error("Sensor error: {0}")]
    Other(String),
}

/// One capture from the sensor, in native units
#[derive(Clone)]
pub struct RawFrame {
    /// Per-pixel depth in native sensor units
    pub depth: Grid<f32>,
    /// Color image, if the sensor produced one with this capture
    pub color: Option<RgbImage>,
    /// Frame number assigned by the sensor
    pub frame_number: u64,
    /// Capture timestamp
    pub timestamp: Instant,
}

/// World-space position planes for one frame, in native units
#[derive(Debug, Clone)]
pub struct WorldPlanes {
    pub x: Grid<f32>,
    pub y: Grid<f32>,
}

/// Interface to a depth sensor and its coordinate-mapping service
///
/// All methods are called from the acquisition thread only.
pub trait DepthSensor: Send {
    /// Open the device; failure is fatal to grabber startup
    fn open(&mut self) -> Result<(), SensorError>;

    /// Next frame if one arrived since the last poll
    fn poll_frame(&mut self) -> Option<RawFrame>;

    /// Whether the last polled frame carried a fresh color image
    fn is_new_color_frame(&self) -> bool;

    /// Map a color-space pixel to the depth grid, `None` outside the depth field of view
    fn map_color_to_depth(&self, x: u32, y: u32) -> Option<(u32, u32)>;

    /// World X/Y for every depth pixel of `frame`, `None` if mapping is unavailable
    fn map_to_world(&mut self, frame: &RawFrame) -> Option<WorldPlanes>;

    /// Depth grid resolution as `(width, height)`
    fn depth_size(&self) -> (usize, usize);

    /// Color image resolution as `(width, height)`
    fn color_size(&self) -> (usize, usize);

    /// Release the device
    fn close(&mut self);
}
