//! Synthetic depth sensor
//!
//! Renders a tilted sand surface seen from above with uniform sensor noise and
//! an optional "hand" blob sweeping across the table. Deterministic for a
//! given seed.

use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DepthSensor, RawFrame, SensorError, WorldPlanes};
use crate::frame::Grid;

/// Distance from the sensor to the table center (meters)
const TABLE_DISTANCE_M: f32 = 1.0;
/// Height of the hand blob above the sand (meters)
const HAND_HEIGHT_M: f32 = 0.15;
/// Fraction of the color width on each side outside the depth field of view
const COLOR_BORDER_FRACTION: f32 = 1.0 / 16.0;

/// Deterministic stand-in for a depth camera
pub struct SyntheticSensor {
    width: usize,
    height: usize,
    rng: StdRng,
    /// Peak-to-peak noise amplitude (meters)
    noise: f32,
    /// Focal length in depth pixels
    focal: f32,
    /// Frames between hand sweeps (0 disables the hand)
    hand_period: u64,
    /// Every n-th frame has no world mapping (0 never drops)
    mapping_dropout: u64,
    frame_interval: Duration,
    last_frame_at: Option<Instant>,
    frame_number: u64,
    new_color: bool,
    fail_open: bool,
    opened: bool,
}

impl SyntheticSensor {
    /// Create a sensor with a `width × height` depth grid
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            width,
            height,
            rng: StdRng::seed_from_u64(seed),
            noise: 0.004,
            focal: width as f32 * 0.72,
            hand_period: 0,
            mapping_dropout: 0,
            frame_interval: Duration::ZERO,
            last_frame_at: None,
            frame_number: 0,
            new_color: false,
            fail_open: false,
            opened: false,
        }
    }

    /// Set the peak-to-peak noise amplitude in meters
    pub fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    /// Sweep a hand across the table every `period` frames
    pub fn with_hand(mut self, period: u64) -> Self {
        self.hand_period = period;
        self
    }

    /// Drop the world mapping every `every` frames
    pub fn with_mapping_dropout(mut self, every: u64) -> Self {
        self.mapping_dropout = every;
        self
    }

    /// Minimum time between frames
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Make `open` fail, simulating a missing device
    pub fn unplugged(mut self) -> Self {
        self.fail_open = true;
        self
    }

    fn surface_depth(&self, x: usize, y: usize) -> f32 {
        // Gentle tilt plus a mound in the middle of the table
        let nx = x as f32 / self.width.max(1) as f32 - 0.5;
        let ny = y as f32 / self.height.max(1) as f32 - 0.5;
        let mound = 0.05 * (-(nx * nx + ny * ny) * 8.0).exp();
        TABLE_DISTANCE_M + 0.02 * nx - mound
    }

    fn hand_covers(&self, x: usize, y: usize) -> bool {
        if self.hand_period == 0 {
            return false;
        }
        let phase = (self.frame_number % self.hand_period) as f32 / self.hand_period as f32;
        let cx = phase * self.width as f32;
        let cy = self.height as f32 * 0.5;
        let radius = self.height as f32 * 0.2;
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        dx * dx + dy * dy <= radius * radius
    }

    fn render_depth(&mut self) -> Grid<f32> {
        let mut depth = Grid::new(self.width, self.height, 0.0);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut value = self.surface_depth(x, y);
                if self.hand_covers(x, y) {
                    value -= HAND_HEIGHT_M;
                }
                if self.noise > 0.0 {
                    value += self.rng.random_range(-self.noise / 2.0..self.noise / 2.0);
                }
                depth[(x, y)] = value;
            }
        }
        depth
    }

    fn render_color(&self, depth: &Grid<f32>) -> RgbImage {
        let (cw, ch) = self.color_size();
        RgbImage::from_fn(cw as u32, ch as u32, |x, y| {
            let dx = (x as usize * self.width / cw.max(1)).min(self.width.saturating_sub(1));
            let dy = (y as usize * self.height / ch.max(1)).min(self.height.saturating_sub(1));
            let shade = depth
                .get(dx, dy)
                .map(|d| ((TABLE_DISTANCE_M + 0.1 - d) * 1000.0).clamp(0.0, 255.0) as u8)
                .unwrap_or(0);
            Rgb([shade, 180, 255 - shade])
        })
    }
}

impl DepthSensor for SyntheticSensor {
    fn open(&mut self) -> Result<(), SensorError> {
        if self.fail_open {
            return Err(SensorError::Unavailable("synthetic sensor unplugged".into()));
        }
        self.opened = true;
        log::info!(
            "Synthetic sensor opened ({}x{} depth)",
            self.width,
            self.height
        );
        Ok(())
    }

    fn poll_frame(&mut self) -> Option<RawFrame> {
        if !self.opened {
            return None;
        }
        let now = Instant::now();
        if let Some(last) = self.last_frame_at {
            if now.duration_since(last) < self.frame_interval {
                return None;
            }
        }
        self.last_frame_at = Some(now);

        let depth = self.render_depth();
        // Color arrives at half the depth rate
        self.new_color = self.frame_number % 2 == 0;
        let color = self.new_color.then(|| self.render_color(&depth));

        let frame = RawFrame {
            depth,
            color,
            frame_number: self.frame_number,
            timestamp: now,
        };
        self.frame_number += 1;
        Some(frame)
    }

    fn is_new_color_frame(&self) -> bool {
        self.new_color
    }

    fn map_color_to_depth(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let (cw, ch) = self.color_size();
        let border = cw as f32 * COLOR_BORDER_FRACTION;
        let inner = cw as f32 - 2.0 * border;
        let (x, y) = (x as f32, y as f32);
        if x < border || x > cw as f32 - border || y > ch as f32 || inner <= 0.0 {
            return None;
        }
        // Color feed is shown mirrored
        let u = 1.0 - (x - border) / inner;
        let dx = (u * self.width as f32).round() as u32;
        let dy = (y / ch as f32 * self.height as f32).round() as u32;
        Some((dx, dy))
    }

    fn map_to_world(&mut self, frame: &RawFrame) -> Option<WorldPlanes> {
        if self.mapping_dropout > 0 && frame.frame_number % self.mapping_dropout == 0 {
            return None;
        }
        let cx = self.width as f32 / 2.0;
        let cy = self.height as f32 / 2.0;
        let focal = self.focal;
        let x = Grid::from_fn(self.width, self.height, |px, py| {
            (px as f32 - cx) * frame.depth[(px, py)] / focal
        });
        let y = Grid::from_fn(self.width, self.height, |px, py| {
            (cy - py as f32) * frame.depth[(px, py)] / focal
        });
        Some(WorldPlanes { x, y })
    }

    fn depth_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn color_size(&self) -> (usize, usize) {
        (self.width * 2, self.height * 2)
    }

    fn close(&mut self) {
        if self.opened {
            self.opened = false;
            log::info!("Synthetic sensor closed after {} frames", self.frame_number);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unplugged_sensor_fails_open() {
        let mut sensor = SyntheticSensor::new(8, 6, 1).unplugged();
        assert!(matches!(sensor.open(), Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_no_frames_before_open() {
        let mut sensor = SyntheticSensor::new(8, 6, 1);
        assert!(sensor.poll_frame().is_none());
    }

    #[test]
    fn test_frames_are_deterministic_per_seed() {
        let mut a = SyntheticSensor::new(8, 6, 7);
        let mut b = SyntheticSensor::new(8, 6, 7);
        a.open().unwrap();
        b.open().unwrap();
        let fa = a.poll_frame().unwrap();
        let fb = b.poll_frame().unwrap();
        assert_eq!(fa.depth, fb.depth);
        assert!(fa.color.is_some());
        assert!(a.is_new_color_frame());
    }

    #[test]
    fn test_depth_is_near_table_distance() {
        let mut sensor = SyntheticSensor::new(16, 12, 3);
        sensor.open().unwrap();
        let frame = sensor.poll_frame().unwrap();
        assert!(frame
            .depth
            .as_slice()
            .iter()
            .all(|d| (*d - TABLE_DISTANCE_M).abs() < 0.1));
    }

    #[test]
    fn test_color_border_is_outside_depth_fov() {
        let sensor = SyntheticSensor::new(64, 48, 0);
        assert!(sensor.map_color_to_depth(0, 10).is_none());
        let (dx, dy) = sensor.map_color_to_depth(64, 48).unwrap();
        assert!(dx <= 64 && dy <= 48);
    }

    #[test]
    fn test_mapping_dropout() {
        let mut sensor = SyntheticSensor::new(8, 6, 0).with_mapping_dropout(2);
        sensor.open().unwrap();
        let first = sensor.poll_frame().unwrap();
        let second = sensor.poll_frame().unwrap();
        assert!(sensor.map_to_world(&first).is_none());
        assert!(sensor.map_to_world(&second).is_some());
    }
}
