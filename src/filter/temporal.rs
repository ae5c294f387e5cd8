//! Temporal statistics filter
//!
//! Each pixel keeps its last `N` samples in rotating slots together with a
//! running count, sum and sum of squares. A pixel whose sample variance is low
//! enough is "stable"; its mean becomes the emitted value once it moves by at
//! least the plane's hysteresis. Abrupt changes can collapse the window so
//! the output follows a hand or falling sand within one frame.

use super::buffers::{PixelStats, PlaneBuffers};
use crate::config::{FilterConfig, PlaneParams};
use crate::frame::{Grid, Roi};

/// Settings shared by all planes for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalSettings {
    pub window: usize,
    pub min_samples: usize,
    pub big_change: f32,
    pub fast_adaptation: bool,
    pub ceiling_offset: f32,
    pub unit_scale: f32,
}

impl TemporalSettings {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            window: config.window_size,
            min_samples: config.min_samples(),
            big_change: config.big_change,
            fast_adaptation: config.fast_adaptation,
            ceiling_offset: config.ceiling_offset,
            unit_scale: config.unit_scale,
        }
    }

    pub fn is_averaging(&self) -> bool {
        self.window >= 2
    }
}

/// Copy rescaled raw samples into the output, inside the ROI only.
pub fn pass_through(samples: &Grid<f32>, roi: Roi, unit_scale: f32, output: &mut Grid<f32>) {
    for y in roi.min_y..roi.max_y {
        for x in roi.min_x..roi.max_x {
            output[(x, y)] = samples[(x, y)] * unit_scale;
        }
    }
}

/// Emit the last stable values without taking new samples.
///
/// Used for the position planes when world mapping failed for a frame.
pub fn hold(buffers: &PlaneBuffers, roi: Roi, output: &mut Grid<f32>) {
    let valid = buffers.valid();
    for y in roi.min_y..roi.max_y {
        for x in roi.min_x..roi.max_x {
            output[(x, y)] = valid[(x, y)];
        }
    }
}

/// Run one frame of the averaging filter over a plane.
///
/// `samples` holds this plane's raw values and `gate` the raw depth at the
/// same pixels; a sample is taken only where the scaled depth exceeds the
/// ceiling offset. Returns the number of pixels whose new sample deviated
/// from the running mean by at least `big_change`.
pub fn filter_plane(
    buffers: &mut PlaneBuffers,
    params: &PlaneParams,
    settings: &TemporalSettings,
    samples: &Grid<f32>,
    gate: &Grid<f32>,
    roi: Roi,
    cursor: usize,
    output: &mut Grid<f32>,
) -> usize {
    let window = buffers.window();
    let min_samples = settings.min_samples as f32;
    let mut big_changes = 0;

    for y in roi.min_y..roi.max_y {
        for x in roi.min_x..roi.max_x {
            let new_val = samples[(x, y)] * settings.unit_scale;
            let gate_val = gate[(x, y)] * settings.unit_scale;
            let mut stats = buffers.stats_mut()[(x, y)];

            // Samples above the ceiling plane are noise
            if gate_val > settings.ceiling_offset {
                let old_val = buffers.slot(cursor)[(x, y)];
                buffers.slot_mut(cursor)[(x, y)] = Some(new_val);

                let big_change = stats
                    .mean()
                    .is_some_and(|mean| (mean - new_val).abs() >= settings.big_change);
                if big_change {
                    big_changes += 1;
                }

                if big_change && settings.fast_adaptation {
                    buffers.fill_pixel_slots(x, y, new_val);
                    stats = PixelStats::filled(window, new_val);
                } else {
                    stats.add(new_val);
                    if let Some(old_val) = old_val {
                        stats.remove(old_val);
                    }
                }
                buffers.stats_mut()[(x, y)] = stats;
            }

            let valid = &mut buffers.valid_mut()[(x, y)];
            if is_stable(&stats, min_samples, params.max_variance) {
                let mean = stats.sum / stats.count;
                if (mean - *valid).abs() >= params.hysteresis {
                    *valid = mean;
                }
            }
            output[(x, y)] = *valid;
        }
    }

    big_changes
}

/// Variance test rearranged to avoid dividing by the count.
fn is_stable(stats: &PixelStats, min_samples: f32, max_variance: f32) -> bool {
    stats.count >= min_samples
        && stats.sum_sq * stats.count <= max_variance * stats.count * stats.count + stats.sum * stats.sum
}
