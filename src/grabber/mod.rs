//! Depth grabber
//!
//! Owns the acquisition thread. The thread polls the sensor, applies
//! pending reconfiguration commands, runs the [`FrameFilter`] and hands
//! mirrored output planes to the caller through single-slot channels.
//! Callers only ever see the filter through enqueued commands, the
//! handoff slots and a few atomic status flags.

pub mod commands;
pub mod handoff;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbImage;
use parking_lot::Mutex;

use crate::config::{ConfigError, FilterConfig, RoiRect};
use crate::filter::{FrameFilter, FrameReport};
use crate::frame::{Grid, Roi};
use crate::sensor::{DepthSensor, RawFrame, SensorError};

pub use commands::{Command, CommandQueue};
pub use handoff::{FrameHandoff, Slot};

/// Grabber errors
#[derive(Debug, thiserror::Error)]
pub enum GrabberError {
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(#[from] SensorError),
    #[error("Failed to spawn acquisition thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
    #[error("Invalid filter config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Lifecycle state of a grabber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabberState {
    Running,
    Stopped,
}

/// One batch taken from the handoff
#[derive(Debug, Clone)]
pub struct FrameBatch {
    pub depth: Grid<f32>,
    pub x: Option<Grid<f32>>,
    pub y: Option<Grid<f32>>,
    pub color: Option<RgbImage>,
}

/// State shared with the acquisition thread
#[derive(Default)]
struct Shared {
    commands: CommandQueue,
    running: AtomicBool,
    stabilized: AtomicBool,
    interaction: AtomicBool,
    frame_count: AtomicU64,
    last_report: Mutex<Option<FrameReport>>,
    active_roi: Mutex<Roi>,
}

/// Depth sensor front end with a background acquisition thread
pub struct DepthGrabber {
    shared: Arc<Shared>,
    handoff: Arc<FrameHandoff>,
    thread_handle: Option<JoinHandle<()>>,
    depth_size: (usize, usize),
    color_size: (usize, usize),
}

impl DepthGrabber {
    /// Open `sensor` and start the acquisition thread.
    ///
    /// Fails without spawning anything if the config is invalid or the
    /// sensor cannot be opened.
    pub fn start<S: DepthSensor + 'static>(mut sensor: S, config: FilterConfig) -> Result<Self, GrabberError> {
        config.validate()?;
        sensor.open()?;

        let depth_size = sensor.depth_size();
        let color_size = sensor.color_size();
        log::info!(
            "Starting depth grabber (depth {}x{}, color {}x{}, window {})",
            depth_size.0,
            depth_size.1,
            color_size.0,
            color_size.1,
            config.window_size
        );

        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::Release);
        let handoff = Arc::new(FrameHandoff::new());

        let shared_clone = shared.clone();
        let handoff_clone = handoff.clone();
        let thread_handle = std::thread::Builder::new()
            .name("depth-acquisition".to_string())
            .spawn(move || {
                Self::acquisition_thread(sensor, config, shared_clone, handoff_clone);
            })?;

        Ok(Self {
            shared,
            handoff,
            thread_handle: Some(thread_handle),
            depth_size,
            color_size,
        })
    }

    fn acquisition_thread<S: DepthSensor>(
        mut sensor: S,
        config: FilterConfig,
        shared: Arc<Shared>,
        handoff: Arc<FrameHandoff>,
    ) {
        log::info!("Depth acquisition thread started");

        let (width, height) = sensor.depth_size();
        let idle = Duration::from_millis(config.idle_poll_ms);
        let mut filter = FrameFilter::new(config, width, height, |x, y| sensor.map_color_to_depth(x, y));
        *shared.active_roi.lock() = filter.roi();
        let mut color: Option<RgbImage> = None;
        // Filtered output not yet handed to the caller
        let mut unpublished = false;

        while shared.running.load(Ordering::Acquire) {
            let commands = shared.commands.drain();
            if !commands.is_empty() {
                for command in commands {
                    command.apply(&mut filter, &sensor);
                }
                *shared.active_roi.lock() = filter.roi();
                shared.stabilized.store(filter.is_stabilized(), Ordering::Release);
                shared.interaction.store(filter.is_interaction_detected(), Ordering::Release);
            }

            let filtered = match sensor.poll_frame() {
                Some(frame) => Self::filter_frame(&mut sensor, &mut filter, frame, &shared, &mut color),
                None => false,
            };
            unpublished |= filtered;

            // Frames filtered while the caller held the last batch go out once it is acknowledged
            if unpublished && !handoff.is_pending() {
                unpublished = !handoff.publish(filter.output().mirrored(), color.clone());
            }

            if !filtered {
                std::thread::sleep(idle);
            }
        }

        sensor.close();
        log::info!(
            "Depth acquisition thread stopped after {} frames",
            shared.frame_count.load(Ordering::Relaxed)
        );
    }

    /// Run one frame through the filter; returns whether it was filtered
    fn filter_frame<S: DepthSensor>(
        sensor: &mut S,
        filter: &mut FrameFilter,
        frame: RawFrame,
        shared: &Shared,
        color: &mut Option<RgbImage>,
    ) -> bool {
        let world = sensor.map_to_world(&frame);
        if world.is_none() {
            log::debug!("World mapping unavailable for frame {}", frame.frame_number);
        }
        let Some(report) = filter.process(&frame, world.as_ref()) else {
            return false;
        };

        if sensor.is_new_color_frame() {
            if let Some(mut image) = frame.color {
                image::imageops::flip_horizontal_in_place(&mut image);
                *color = Some(image);
            }
        }

        shared.frame_count.fetch_add(1, Ordering::Relaxed);
        shared.stabilized.store(report.stabilized, Ordering::Release);
        shared.interaction.store(report.interaction, Ordering::Release);
        *shared.last_report.lock() = Some(report);
        true
    }

    fn enqueue(&self, command: Command) {
        self.shared.commands.push(command);
    }

    /// Set the ROI in mirrored color-space pixels; resets the filter
    pub fn set_roi(&self, rect: RoiRect) {
        self.enqueue(Command::SetRoi(Some(rect)));
    }

    /// Remove the ROI and filter the full grid; resets the filter
    pub fn clear_roi(&self) {
        self.enqueue(Command::SetRoi(None));
    }

    /// Ignore the ROI and filter the whole frame; resets the filter
    pub fn set_full_frame(&self, full_frame: bool) {
        self.enqueue(Command::SetFullFrame(full_frame));
    }

    /// Number of averaging slots (below 2 disables averaging); resets the filter
    pub fn set_window_size(&self, window_size: usize) {
        self.enqueue(Command::SetWindowSize(window_size));
    }

    /// Collapse the averaging window on abrupt changes; resets the filter
    pub fn set_fast_adaptation(&self, enabled: bool) {
        self.enqueue(Command::SetFastAdaptation(enabled));
    }

    pub fn set_spatial_filter(&self, enabled: bool) {
        self.enqueue(Command::SetSpatialFilter(enabled));
    }

    pub fn set_inpainting(&self, enabled: bool) {
        self.enqueue(Command::SetInpainting(enabled));
    }

    /// Ignore depth samples at or below `offset` millimeters
    pub fn set_ceiling_offset(&self, offset: f32) {
        self.enqueue(Command::SetCeilingOffset(offset));
    }

    /// Discard all filter statistics
    pub fn reset_buffers(&self) {
        self.enqueue(Command::ResetBuffers);
    }

    /// Latest filtered depth plane, if one was published and not yet taken
    pub fn take_filtered_depth(&self) -> Option<Grid<f32>> {
        self.handoff.depth.take()
    }

    pub fn take_filtered_x(&self) -> Option<Grid<f32>> {
        self.handoff.x.take()
    }

    pub fn take_filtered_y(&self) -> Option<Grid<f32>> {
        self.handoff.y.take()
    }

    /// Latest mirrored color image, if one was published and not yet taken
    pub fn take_color_image(&self) -> Option<RgbImage> {
        self.handoff.color.take()
    }

    /// Wait up to `timeout` for the next batch.
    ///
    /// The caller must still call [`Self::notify_consumed`] before another
    /// batch is published.
    pub fn wait_for_batch(&self, timeout: Duration) -> Option<FrameBatch> {
        let depth = self.handoff.depth.take_timeout(timeout)?;
        Some(FrameBatch {
            depth,
            x: self.handoff.x.take(),
            y: self.handoff.y.take(),
            color: self.handoff.color.take(),
        })
    }

    /// Acknowledge the last batch so the next one can be published
    pub fn notify_consumed(&self) {
        self.handoff.notify_consumed();
    }

    /// Whether a batch is waiting for acknowledgement
    pub fn is_batch_pending(&self) -> bool {
        self.handoff.is_pending()
    }

    /// Whether the warm-up period since the last reset has passed
    pub fn is_stabilized(&self) -> bool {
        self.shared.stabilized.load(Ordering::Acquire)
    }

    pub fn is_interaction_detected(&self) -> bool {
        self.shared.interaction.load(Ordering::Acquire)
    }

    pub fn last_report(&self) -> Option<FrameReport> {
        *self.shared.last_report.lock()
    }

    /// Frames filtered since start
    pub fn frame_count(&self) -> u64 {
        self.shared.frame_count.load(Ordering::Relaxed)
    }

    /// Active ROI in sensor depth coordinates
    pub fn active_roi(&self) -> Roi {
        *self.shared.active_roi.lock()
    }

    /// Active ROI in the mirrored coordinates of the published planes
    pub fn mirrored_roi(&self) -> Roi {
        self.active_roi().mirrored(self.depth_size.0)
    }

    pub fn depth_size(&self) -> (usize, usize) {
        self.depth_size
    }

    pub fn color_size(&self) -> (usize, usize) {
        self.color_size
    }

    pub fn state(&self) -> GrabberState {
        let alive = self
            .thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if alive && self.shared.running.load(Ordering::Acquire) {
            GrabberState::Running
        } else {
            GrabberState::Stopped
        }
    }

    /// Stop the acquisition thread and wait for it to release the sensor
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Depth acquisition thread panicked");
            }
        }
    }
}

impl Drop for DepthGrabber {
    fn drop(&mut self) {
        self.stop();
    }
}
