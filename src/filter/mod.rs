//! Frame filtering pipeline
//!
//! [`FrameFilter`] owns every plane buffer and runs, per captured frame:
//! temporal statistics (X, Y, then depth), the optional box smoother on all
//! planes and the optional outlier inpainter on the depth plane. It is
//! single-threaded; the acquisition loop in [`crate::grabber`] drives it.

pub mod buffers;
pub mod inpaint;
pub mod roi;
pub mod spatial;
pub mod temporal;

use crate::config::{FilterConfig, RoiRect};
use crate::frame::{Grid, Plane, Roi};
use crate::sensor::{RawFrame, WorldPlanes};

use buffers::{PixelStats, PlaneSet};
use inpaint::{InpaintParams, InpaintStats};
use roi::RoiManager;
use temporal::TemporalSettings;

/// Diagnostics for one filtered frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Sensor frame number
    pub frame_number: u64,
    /// Depth pixels whose sample deviated from the mean by at least `big_change`
    pub big_changes: usize,
    /// Whether `big_changes` exceeded the interaction threshold
    pub interaction: bool,
    /// Whether world mapping was available for the position planes
    pub mapping_available: bool,
    /// Inpainting counts, if inpainting ran
    pub inpaint: Option<InpaintStats>,
    /// Whether the warm-up period since the last reset has passed
    pub stabilized: bool,
    /// Whether the requested ROI could not be mapped and the full grid is filtered
    pub roi_fallback: bool,
}

/// Filtered output planes for one capture cycle
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPlanes {
    pub depth: Grid<f32>,
    pub x: Grid<f32>,
    pub y: Grid<f32>,
}

impl FilteredPlanes {
    fn zeroed(width: usize, height: usize) -> Self {
        Self {
            depth: Grid::new(width, height, 0.0),
            x: Grid::new(width, height, 0.0),
            y: Grid::new(width, height, 0.0),
        }
    }

    pub fn get(&self, plane: Plane) -> &Grid<f32> {
        match plane {
            Plane::Depth => &self.depth,
            Plane::X => &self.x,
            Plane::Y => &self.y,
        }
    }

    /// Copies flipped left-to-right, matching the physical setup
    pub fn mirrored(&self) -> Self {
        Self {
            depth: self.depth.mirrored(),
            x: self.x.mirrored(),
            y: self.y.mirrored(),
        }
    }
}

/// Stateful depth/position stabilizer for a fixed grid size
pub struct FrameFilter {
    config: FilterConfig,
    width: usize,
    height: usize,
    roi_manager: RoiManager,
    roi: Roi,
    roi_fallback: bool,
    planes: PlaneSet,
    output: FilteredPlanes,
    /// Frames filtered since the last reset
    frames_since_reset: u32,
    interaction: bool,
}

impl FrameFilter {
    /// Create a filter for a `width × height` depth grid.
    ///
    /// `map` is the sensor's color-to-depth mapping, used to resolve the
    /// configured ROI.
    pub fn new(
        config: FilterConfig,
        width: usize,
        height: usize,
        map: impl Fn(u32, u32) -> Option<(u32, u32)>,
    ) -> Self {
        let roi_manager = RoiManager::new(width, height, config.roi_margin);
        let resolved = roi_manager.resolve(config.roi.as_ref(), config.full_frame, map);
        let planes = PlaneSet::new(
            width,
            height,
            config.window_size,
            config.depth.sentinel,
            config.position.sentinel,
        );
        Self {
            config,
            width,
            height,
            roi_manager,
            roi: resolved.roi,
            roi_fallback: resolved.fallback,
            planes,
            output: FilteredPlanes::zeroed(width, height),
            frames_since_reset: 0,
            interaction: false,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Active processing rectangle in (unmirrored) depth coordinates
    pub fn roi(&self) -> Roi {
        self.roi
    }

    /// Whether the requested ROI fell back to the full grid
    pub fn is_roi_fallback(&self) -> bool {
        self.roi_fallback
    }

    /// Whether enough frames were filtered since the last reset
    pub fn is_stabilized(&self) -> bool {
        self.frames_since_reset > self.config.warmup_frames
    }

    pub fn is_interaction_detected(&self) -> bool {
        self.interaction
    }

    /// Latest filtered planes, unmirrored
    pub fn output(&self) -> &FilteredPlanes {
        &self.output
    }

    pub fn stats_at(&self, plane: Plane, x: usize, y: usize) -> Option<PixelStats> {
        self.planes.get(plane).stats_at(x, y)
    }

    pub fn slot_value_at(&self, plane: Plane, x: usize, y: usize, slot: usize) -> Option<f32> {
        self.planes.get(plane).slot_value_at(x, y, slot)
    }

    pub fn valid_at(&self, plane: Plane, x: usize, y: usize) -> Option<f32> {
        self.planes.get(plane).valid_at(x, y)
    }

    /// Discard all statistics, slots, valid values and output.
    pub fn reset(&mut self) {
        self.planes = PlaneSet::new(
            self.width,
            self.height,
            self.config.window_size,
            self.config.depth.sentinel,
            self.config.position.sentinel,
        );
        self.output = FilteredPlanes::zeroed(self.width, self.height);
        self.frames_since_reset = 0;
        self.interaction = false;
        log::info!(
            "Filter buffers reset (window {}, ROI {}..{} x {}..{}{})",
            self.config.window_size,
            self.roi.min_x,
            self.roi.max_x,
            self.roi.min_y,
            self.roi.max_y,
            if self.roi_fallback { ", unmapped ROI fallback" } else { "" }
        );
    }

    /// Change the requested ROI; resets all buffers.
    pub fn set_roi(&mut self, rect: Option<RoiRect>, map: impl Fn(u32, u32) -> Option<(u32, u32)>) {
        self.config.roi = rect;
        self.resolve_roi(map);
    }

    /// Toggle full-frame filtering; resets all buffers.
    pub fn set_full_frame(&mut self, full_frame: bool, map: impl Fn(u32, u32) -> Option<(u32, u32)>) {
        self.config.full_frame = full_frame;
        self.resolve_roi(map);
    }

    fn resolve_roi(&mut self, map: impl Fn(u32, u32) -> Option<(u32, u32)>) {
        let resolved = self
            .roi_manager
            .resolve(self.config.roi.as_ref(), self.config.full_frame, map);
        self.roi = resolved.roi;
        self.roi_fallback = resolved.fallback;
        self.reset();
    }

    /// Change the number of averaging slots; resets all buffers.
    pub fn set_window_size(&mut self, window_size: usize) {
        self.config.window_size = window_size;
        self.reset();
    }

    /// Toggle fast adaptation; resets all buffers.
    pub fn set_fast_adaptation(&mut self, enabled: bool) {
        self.config.fast_adaptation = enabled;
        self.reset();
    }

    pub fn set_spatial_filter(&mut self, enabled: bool) {
        self.config.spatial_filter = enabled;
    }

    pub fn set_inpainting(&mut self, enabled: bool) {
        self.config.inpainting = enabled;
    }

    pub fn set_ceiling_offset(&mut self, offset: f32) {
        self.config.ceiling_offset = offset;
    }

    /// Filter one frame.
    ///
    /// `world` carries the X/Y planes; without it the position planes keep
    /// their last stable values. Returns `None` if the frame does not match
    /// the grid size.
    pub fn process(&mut self, frame: &RawFrame, world: Option<&WorldPlanes>) -> Option<FrameReport> {
        if frame.depth.size() != (self.width, self.height) {
            log::warn!(
                "Dropping frame {}: depth grid {:?} does not match {}x{}",
                frame.frame_number,
                frame.depth.size(),
                self.width,
                self.height
            );
            return None;
        }
        let world = world.filter(|w| {
            w.x.size() == (self.width, self.height) && w.y.size() == (self.width, self.height)
        });

        let settings = TemporalSettings::from_config(&self.config);
        let roi = self.roi;
        let mut big_changes = 0;

        if settings.is_averaging() {
            let cursor = self.planes.cursor();
            match world {
                Some(world) => {
                    temporal::filter_plane(
                        &mut self.planes.x,
                        &self.config.position,
                        &settings,
                        &world.x,
                        &frame.depth,
                        roi,
                        cursor,
                        &mut self.output.x,
                    );
                    temporal::filter_plane(
                        &mut self.planes.y,
                        &self.config.position,
                        &settings,
                        &world.y,
                        &frame.depth,
                        roi,
                        cursor,
                        &mut self.output.y,
                    );
                }
                None => {
                    temporal::hold(&self.planes.x, roi, &mut self.output.x);
                    temporal::hold(&self.planes.y, roi, &mut self.output.y);
                }
            }
            big_changes = temporal::filter_plane(
                &mut self.planes.depth,
                &self.config.depth,
                &settings,
                &frame.depth,
                &frame.depth,
                roi,
                cursor,
                &mut self.output.depth,
            );
            self.planes.advance_cursor();
        } else {
            if let Some(world) = world {
                temporal::pass_through(&world.x, roi, settings.unit_scale, &mut self.output.x);
                temporal::pass_through(&world.y, roi, settings.unit_scale, &mut self.output.y);
            }
            temporal::pass_through(&frame.depth, roi, settings.unit_scale, &mut self.output.depth);
        }

        let interaction = big_changes > self.config.interaction_threshold;
        if interaction != self.interaction {
            log::debug!(
                "Interaction {} ({} changed pixels)",
                if interaction { "started" } else { "ended" },
                big_changes
            );
        }
        self.interaction = interaction;

        self.frames_since_reset = self.frames_since_reset.saturating_add(1);
        if self.frames_since_reset == self.config.warmup_frames.saturating_add(1) {
            log::info!("Depth image stabilized after {} frames", self.frames_since_reset);
        }

        if self.config.spatial_filter {
            let passes = self.config.smoothing_passes;
            spatial::smooth(&mut self.output.depth, roi, passes);
            spatial::smooth(&mut self.output.x, roi, passes);
            spatial::smooth(&mut self.output.y, roi, passes);
        }

        let inpaint = self.config.inpainting.then(|| {
            let stats = inpaint::inpaint(
                &mut self.output.depth,
                roi,
                self.config.depth.sentinel,
                InpaintParams {
                    radius: self.config.inpaint_radius,
                    margin: self.config.inpaint_margin,
                },
            );
            log::trace!(
                "Inpainting: {} local, {} global (ROI mean {:.1})",
                stats.local,
                stats.global,
                stats.roi_mean
            );
            stats
        });

        Some(FrameReport {
            frame_number: frame.frame_number,
            big_changes,
            interaction,
            mapping_available: world.is_some(),
            inpaint,
            stabilized: self.is_stabilized(),
            roi_fallback: self.roi_fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const W: usize = 8;
    const H: usize = 6;

    fn no_map(_: u32, _: u32) -> Option<(u32, u32)> {
        None
    }

    fn identity(x: u32, y: u32) -> Option<(u32, u32)> {
        Some((x, y))
    }

    fn config(window: usize) -> FilterConfig {
        FilterConfig {
            window_size: window,
            spatial_filter: false,
            unit_scale: 1.0,
            roi_margin: 0,
            warmup_frames: 2,
            interaction_threshold: 3,
            ..FilterConfig::default()
        }
    }

    fn frame(value: f32, number: u64) -> RawFrame {
        RawFrame {
            depth: Grid::new(W, H, value),
            color: None,
            frame_number: number,
            timestamp: Instant::now(),
        }
    }

    fn world(x: f32, y: f32) -> WorldPlanes {
        WorldPlanes {
            x: Grid::new(W, H, x),
            y: Grid::new(W, H, y),
        }
    }

    #[test]
    fn test_pass_through_mode() {
        let mut cfg = config(1);
        cfg.unit_scale = 1000.0;
        let mut filter = FrameFilter::new(cfg, W, H, no_map);
        let planes = world(0.25, -0.5);
        for n in 0..3 {
            let value = 0.9 + n as f32 * 0.01;
            filter.process(&frame(value, n), Some(&planes)).unwrap();
            assert!(filter.output().depth.as_slice().iter().all(|v| *v == value * 1000.0));
            assert!(filter.output().x.as_slice().iter().all(|v| *v == 250.0));
            assert!(filter.output().y.as_slice().iter().all(|v| *v == -500.0));
        }
    }

    #[test]
    fn test_warmup_and_stabilized() {
        let mut filter = FrameFilter::new(config(4), W, H, no_map);
        let planes = world(1.0, 1.0);
        let mut reports = Vec::new();
        for n in 0..3 {
            reports.push(filter.process(&frame(900.0, n), Some(&planes)).unwrap());
        }
        assert!(!reports[1].stabilized);
        assert!(reports[2].stabilized);
        assert!(filter.is_stabilized());
    }

    #[test]
    fn test_position_planes_hold_without_mapping() {
        let mut filter = FrameFilter::new(config(2), W, H, no_map);
        let planes = world(10.0, 20.0);
        for n in 0..3 {
            filter.process(&frame(900.0, n), Some(&planes)).unwrap();
        }
        assert_eq!(filter.output().x[(3, 3)], 10.0);

        let report = filter.process(&frame(900.0, 3), None).unwrap();
        assert!(!report.mapping_available);
        assert_eq!(filter.output().x[(3, 3)], 10.0);
        assert_eq!(filter.output().y[(3, 3)], 20.0);
        assert_eq!(filter.stats_at(Plane::X, 3, 3).unwrap().count, 2.0);
        // Depth kept filtering
        assert_eq!(filter.stats_at(Plane::Depth, 3, 3).unwrap().count, 2.0);
    }

    #[test]
    fn test_interaction_detected_on_mass_change() {
        let mut filter = FrameFilter::new(config(4), W, H, no_map);
        for n in 0..4 {
            let report = filter.process(&frame(900.0, n), None).unwrap();
            assert!(!report.interaction);
        }
        let report = filter.process(&frame(700.0, 4), None).unwrap();
        assert_eq!(report.big_changes, W * H);
        assert!(report.interaction);
        assert!(filter.is_interaction_detected());

        let report = filter.process(&frame(700.0, 5), None).unwrap();
        assert!(!report.interaction);
    }

    #[test]
    fn test_reset_on_reconfiguration() {
        let mut filter = FrameFilter::new(config(4), W, H, identity);
        for n in 0..5 {
            filter.process(&frame(900.0, n), Some(&world(1.0, 2.0))).unwrap();
        }
        assert!(filter.stats_at(Plane::Depth, 0, 0).unwrap().count > 0.0);

        let check_reset = |filter: &FrameFilter| {
            for plane in Plane::ALL {
                let sentinel = filter.config().plane_params(plane).sentinel;
                assert_eq!(filter.stats_at(plane, 1, 1).unwrap().count, 0.0);
                assert_eq!(filter.valid_at(plane, 1, 1), Some(sentinel));
            }
            assert!(!filter.is_stabilized());
        };

        filter.set_window_size(6);
        check_reset(&filter);
        assert_eq!(filter.slot_value_at(Plane::Depth, 0, 0, 5), None);

        filter.process(&frame(900.0, 6), None).unwrap();
        filter.set_fast_adaptation(false);
        check_reset(&filter);

        filter.process(&frame(900.0, 7), None).unwrap();
        filter.set_roi(Some(RoiRect::new(1.0, 1.0, 4.0, 3.0)), identity);
        check_reset(&filter);
        assert_eq!(
            filter.roi(),
            Roi {
                min_x: 1,
                max_x: 5,
                min_y: 1,
                max_y: 4
            }
        );
    }

    #[test]
    fn test_unmapped_roi_is_reported_as_fallback() {
        let mut filter = FrameFilter::new(config(2), W, H, identity);
        filter.set_roi(Some(RoiRect::new(2.0, 2.0, 50.0, 2.0)), identity);
        assert!(filter.is_roi_fallback());
        assert_eq!(filter.roi(), Roi::full(W, H));
        let report = filter.process(&frame(900.0, 0), None).unwrap();
        assert!(report.roi_fallback);

        filter.set_roi(Some(RoiRect::new(2.0, 2.0, 3.0, 2.0)), identity);
        assert!(!filter.is_roi_fallback());
        let report = filter.process(&frame(900.0, 1), None).unwrap();
        assert!(!report.roi_fallback);
    }

    #[test]
    fn test_non_resetting_setters_keep_statistics() {
        let mut filter = FrameFilter::new(config(4), W, H, no_map);
        filter.process(&frame(900.0, 0), None).unwrap();
        filter.set_spatial_filter(true);
        filter.set_inpainting(true);
        filter.set_ceiling_offset(10.0);
        assert_eq!(filter.stats_at(Plane::Depth, 0, 0).unwrap().count, 1.0);
    }

    #[test]
    fn test_roi_confinement_of_full_pipeline() {
        let mut cfg = config(2);
        cfg.spatial_filter = true;
        cfg.inpainting = true;
        cfg.inpaint_margin = 0;
        cfg.roi = Some(RoiRect::new(2.0, 2.0, 3.0, 2.0));
        let mut filter = FrameFilter::new(cfg, W, H, identity);
        let roi = filter.roi();

        for n in 0..4 {
            let mut raw = frame(900.0, n);
            raw.depth[(3, 3)] = 0.0;
            filter.process(&raw, Some(&world(5.0, 6.0))).unwrap();
        }
        for y in 0..H {
            for x in 0..W {
                if roi.contains(x, y) {
                    continue;
                }
                for plane in Plane::ALL {
                    assert_eq!(filter.output().get(plane)[(x, y)], 0.0);
                    assert_eq!(filter.stats_at(plane, x, y).unwrap().count, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_ceiling_gate_blocks_samples() {
        let mut cfg = config(2);
        cfg.ceiling_offset = 1000.0;
        let mut filter = FrameFilter::new(cfg, W, H, no_map);
        filter.process(&frame(900.0, 0), Some(&world(1.0, 1.0))).unwrap();
        for plane in Plane::ALL {
            assert_eq!(filter.stats_at(plane, 0, 0).unwrap().count, 0.0);
        }
    }

    #[test]
    fn test_inpainting_fills_unstable_pixels() {
        let mut cfg = config(4);
        cfg.inpainting = true;
        let mut filter = FrameFilter::new(cfg, W, H, no_map);
        // Alternating samples keep one pixel's variance above the limit
        // without ever counting as a big change
        for n in 0..6 {
            let mut raw = frame(900.0, n);
            raw.depth[(4, 2)] = if n % 2 == 0 { 890.0 } else { 900.0 };
            let report = filter.process(&raw, None).unwrap();
            if n >= 3 {
                assert_eq!(report.inpaint.unwrap().local, 1);
            }
        }
        assert_eq!(filter.output().depth[(4, 2)], 900.0);
    }

    #[test]
    fn test_mismatched_frame_is_dropped() {
        let mut filter = FrameFilter::new(config(4), W, H, no_map);
        let raw = RawFrame {
            depth: Grid::new(W + 1, H, 900.0),
            color: None,
            frame_number: 0,
            timestamp: Instant::now(),
        };
        assert!(filter.process(&raw, None).is_none());
    }

    #[test]
    fn test_mirrored_output() {
        let mut filter = FrameFilter::new(config(1), W, H, no_map);
        let mut raw = frame(900.0, 0);
        raw.depth[(0, 0)] = 100.0;
        filter.process(&raw, None).unwrap();
        let mirrored = filter.output().mirrored();
        assert_eq!(mirrored.depth[(W - 1, 0)], 100.0);
        assert_eq!(filter.output().depth[(0, 0)], 100.0);
    }
}
