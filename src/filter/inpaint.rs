//! Outlier inpainting for the depth plane
//!
//! Zero and sentinel pixels render as spikes in the downstream surface
//! shader, so they are replaced before handoff: first with the mean of valid
//! pixels in a small neighborhood, otherwise with the mean of the whole ROI.

use crate::frame::{Grid, Roi};

/// Repair counts for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InpaintStats {
    /// Pixels replaced by a neighborhood average
    pub local: usize,
    /// Pixels replaced by the ROI-wide mean
    pub global: usize,
    /// ROI-wide mean of valid pixels (sentinel when there were none)
    pub roi_mean: f32,
}

/// Neighborhood and scan geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InpaintParams {
    /// Half-width of the square neighborhood
    pub radius: usize,
    /// How far beyond the ROI to scan for outliers
    pub margin: usize,
}

fn is_outlier(value: f32, sentinel: f32) -> bool {
    value == 0.0 || value == sentinel
}

/// Replace every zero or sentinel pixel in the ROI (plus margin).
///
/// Neighbors are read from the frame as it was before any repair, so the
/// result does not depend on scan order.
pub fn inpaint(grid: &mut Grid<f32>, roi: Roi, sentinel: f32, params: InpaintParams) -> InpaintStats {
    if roi.is_empty() {
        return InpaintStats {
            roi_mean: sentinel,
            ..Default::default()
        };
    }

    let roi_mean = roi_mean(grid, roi, sentinel);
    let snapshot = grid.clone();
    let (width, height) = grid.size();
    let scan = roi.expand(params.margin, width, height);
    let mut stats = InpaintStats {
        roi_mean,
        ..Default::default()
    };

    for y in scan.min_y..scan.max_y {
        for x in scan.min_x..scan.max_x {
            if !is_outlier(snapshot[(x, y)], sentinel) {
                continue;
            }
            grid[(x, y)] = match neighborhood_mean(&snapshot, roi, x, y, sentinel, params.radius) {
                Some(mean) => {
                    stats.local += 1;
                    mean
                }
                None => {
                    stats.global += 1;
                    roi_mean
                }
            };
        }
    }

    stats
}

/// Mean of valid pixels in the ROI, or the sentinel if there are none.
fn roi_mean(grid: &Grid<f32>, roi: Roi, sentinel: f32) -> f32 {
    let mut samples = 0usize;
    let mut sum = 0.0f64;
    for y in roi.min_y..roi.max_y {
        for &value in &grid.row(y)[roi.min_x..roi.max_x] {
            if !is_outlier(value, sentinel) {
                samples += 1;
                sum += value as f64;
            }
        }
    }
    if samples == 0 {
        sentinel
    } else {
        (sum / samples as f64) as f32
    }
}

/// Mean of valid pixels within `radius` of `(x, y)`, clipped to the ROI.
fn neighborhood_mean(
    grid: &Grid<f32>,
    roi: Roi,
    x: usize,
    y: usize,
    sentinel: f32,
    radius: usize,
) -> Option<f32> {
    let min_x = x.saturating_sub(radius).max(roi.min_x);
    let max_x = (x + radius + 1).min(roi.max_x);
    let min_y = y.saturating_sub(radius).max(roi.min_y);
    let max_y = (y + radius + 1).min(roi.max_y);

    let mut samples = 0usize;
    let mut sum = 0.0f64;
    for ny in min_y..max_y {
        for nx in min_x..max_x {
            let value = grid[(nx, ny)];
            if !is_outlier(value, sentinel) {
                samples += 1;
                sum += value as f64;
            }
        }
    }
    (samples > 0).then(|| (sum / samples as f64) as f32)
}
