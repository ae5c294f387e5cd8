//! Region of interest computation
//!
//! The caller draws the ROI on the (mirrored) color image. Its corners are
//! mapped into the depth grid through the sensor's coordinate mapper, then
//! grown by a margin because the table edges are hard to map precisely.

use crate::config::RoiRect;
use crate::frame::Roi;

/// Outcome of an ROI computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiResolution {
    pub roi: Roi,
    /// Whether the full grid was used because mapping failed
    pub fallback: bool,
}

/// Computes the active processing rectangle for a depth grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiManager {
    width: usize,
    height: usize,
    margin: usize,
}

impl RoiManager {
    pub fn new(width: usize, height: usize, margin: usize) -> Self {
        Self {
            width,
            height,
            margin,
        }
    }

    pub fn full(&self) -> Roi {
        Roi::full(self.width, self.height)
    }

    /// Resolve the active ROI.
    ///
    /// `map` converts a color-space pixel into the depth grid and returns
    /// `None` outside the depth field of view.
    pub fn resolve(
        &self,
        requested: Option<&RoiRect>,
        full_frame: bool,
        map: impl Fn(u32, u32) -> Option<(u32, u32)>,
    ) -> RoiResolution {
        if full_frame {
            return RoiResolution {
                roi: self.full(),
                fallback: false,
            };
        }
        let Some(rect) = requested else {
            return RoiResolution {
                roi: self.full(),
                fallback: false,
            };
        };

        let first = self.map_corner(rect.min_x(), rect.min_y(), &map);
        let second = self.map_corner(rect.max_x(), rect.max_y(), &map);
        let (Some(a), Some(b)) = (first, second) else {
            log::warn!(
                "ROI corners ({}, {}) / ({}, {}) are outside the depth field of view, filtering the full frame",
                rect.min_x(),
                rect.min_y(),
                rect.max_x(),
                rect.max_y()
            );
            return RoiResolution {
                roi: self.full(),
                fallback: true,
            };
        };

        // The color feed is mirrored, so the corners may swap sides
        let mapped = Roi {
            min_x: a.0.min(b.0),
            max_x: a.0.max(b.0),
            min_y: a.1.min(b.1),
            max_y: a.1.max(b.1),
        };
        let roi = self.non_empty(mapped.expand(self.margin, self.width, self.height));
        log::debug!("ROI depth coordinates: {:?}", roi);

        RoiResolution {
            roi,
            fallback: false,
        }
    }

    fn map_corner(
        &self,
        x: f32,
        y: f32,
        map: &impl Fn(u32, u32) -> Option<(u32, u32)>,
    ) -> Option<(usize, usize)> {
        let (x, y) = (x.round(), y.round());
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (dx, dy) = map(x as u32, y as u32)?;
        let (dx, dy) = (dx as usize, dy as usize);
        (dx <= self.width && dy <= self.height).then_some((dx, dy))
    }

    /// Keep at least one pixel so a degenerate request still filters something
    fn non_empty(&self, mut roi: Roi) -> Roi {
        if self.width == 0 || self.height == 0 {
            return self.full();
        }
        if roi.max_x <= roi.min_x {
            roi.min_x = roi.min_x.min(self.width - 1);
            roi.max_x = roi.min_x + 1;
        }
        if roi.max_y <= roi.min_y {
            roi.min_y = roi.min_y.min(self.height - 1);
            roi.max_y = roi.min_y + 1;
        }
        roi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Identity mapping restricted to a 100x80 field of view
    fn identity(x: u32, y: u32) -> Option<(u32, u32)> {
        (x <= 100 && y <= 80).then_some((x, y))
    }

    #[test]
    fn test_full_frame_ignores_rect() {
        let manager = RoiManager::new(100, 80, 10);
        let rect = RoiRect::new(20.0, 20.0, 10.0, 10.0);
        let resolved = manager.resolve(Some(&rect), true, identity);
        assert_eq!(resolved.roi, Roi::full(100, 80));
        assert!(!resolved.fallback);
    }

    #[test]
    fn test_no_rect_is_full_grid() {
        let manager = RoiManager::new(100, 80, 10);
        assert_eq!(manager.resolve(None, false, identity).roi, Roi::full(100, 80));
    }

    #[test]
    fn test_mapped_rect_is_expanded_by_margin() {
        let manager = RoiManager::new(100, 80, 10);
        let rect = RoiRect::new(30.0, 20.0, 40.0, 30.0);
        let resolved = manager.resolve(Some(&rect), false, identity);
        assert_eq!(
            resolved.roi,
            Roi {
                min_x: 20,
                max_x: 80,
                min_y: 10,
                max_y: 60
            }
        );
    }

    #[test]
    fn test_margin_clamps_to_grid() {
        let manager = RoiManager::new(100, 80, 50);
        let rect = RoiRect::new(10.0, 10.0, 80.0, 60.0);
        assert_eq!(manager.resolve(Some(&rect), false, identity).roi, Roi::full(100, 80));
    }

    #[test]
    fn test_mirrored_mapping_swaps_corners() {
        let manager = RoiManager::new(100, 80, 0);
        let mirror = |x: u32, y: u32| Some((100 - x.min(100), y));
        let rect = RoiRect::new(10.0, 5.0, 20.0, 10.0);
        let roi = manager.resolve(Some(&rect), false, mirror).roi;
        assert_eq!((roi.min_x, roi.max_x), (70, 90));
        assert_eq!((roi.min_y, roi.max_y), (5, 15));
    }

    #[test]
    fn test_unmapped_corner_falls_back() {
        let manager = RoiManager::new(100, 80, 10);
        let rect = RoiRect::new(50.0, 50.0, 500.0, 10.0);
        let resolved = manager.resolve(Some(&rect), false, identity);
        assert!(resolved.fallback);
        assert_eq!(resolved.roi, Roi::full(100, 80));
    }

    #[test]
    fn test_negative_corner_falls_back() {
        let manager = RoiManager::new(100, 80, 10);
        let rect = RoiRect::new(-5.0, 0.0, 10.0, 10.0);
        assert!(manager.resolve(Some(&rect), false, identity).fallback);
    }

    #[test]
    fn test_degenerate_rect_keeps_margin() {
        let manager = RoiManager::new(100, 80, 5);
        let rect = RoiRect::new(40.0, 40.0, 0.0, 0.0);
        let roi = manager.resolve(Some(&rect), false, identity).roi;
        assert_eq!(
            roi,
            Roi {
                min_x: 35,
                max_x: 45,
                min_y: 35,
                max_y: 45
            }
        );
    }

    #[test]
    fn test_degenerate_rect_without_margin_is_one_pixel() {
        let manager = RoiManager::new(100, 80, 0);
        let rect = RoiRect::new(100.0, 80.0, 0.0, 0.0);
        let roi = manager.resolve(Some(&rect), false, identity).roi;
        assert_eq!(roi.width(), 1);
        assert_eq!(roi.height(), 1);
        assert_eq!(roi.max_x, 100);
    }
}
