//! Filter configuration and serialization.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read or write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Requested region of interest in color-space pixels.
///
/// Coordinates are in the mirrored color image the caller sees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RoiRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn min_x(&self) -> f32 {
        self.x.min(self.x + self.width)
    }

    pub fn max_x(&self) -> f32 {
        self.x.max(self.x + self.width)
    }

    pub fn min_y(&self) -> f32 {
        self.y.min(self.y + self.height)
    }

    pub fn max_y(&self) -> f32 {
        self.y.max(self.y + self.height)
    }
}

/// Per-plane stabilization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneParams {
    /// Marker for uninitialized slots and valid values.
    pub sentinel: f32,
    /// Maximum sample variance for a pixel to count as stable.
    pub max_variance: f32,
    /// Minimum change of the stable mean before the output follows it.
    pub hysteresis: f32,
}

impl PlaneParams {
    pub fn depth() -> Self {
        Self {
            sentinel: 4000.0,
            max_variance: 20.0,
            hysteresis: 0.5,
        }
    }

    pub fn position() -> Self {
        Self {
            sentinel: 4000.0,
            max_variance: 16.0,
            hysteresis: 0.5,
        }
    }
}

/// Full filter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of averaging slots per pixel (below 2 disables averaging).
    pub window_size: usize,
    /// Depth samples at or below this value (mm) are ignored.
    pub ceiling_offset: f32,
    /// Collapse the averaging window on abrupt change.
    pub fast_adaptation: bool,
    /// Run the box smoother on filtered planes.
    pub spatial_filter: bool,
    /// Repair zero and sentinel pixels of the depth plane.
    pub inpainting: bool,
    /// Filter the whole frame and ignore `roi`.
    pub full_frame: bool,
    /// Requested region in color-space pixels; `None` filters the full grid.
    pub roi: Option<RoiRect>,
    /// Deviation from the running mean that counts as a big change (mm).
    pub big_change: f32,
    /// Depth plane parameters.
    pub depth: PlaneParams,
    /// Parameters shared by the X and Y planes.
    pub position: PlaneParams,
    /// Native sensor unit to millimeters.
    pub unit_scale: f32,
    /// Frames to filter after a reset before reporting a stable image.
    pub warmup_frames: u32,
    /// Big-change pixels per frame above which interaction is reported.
    pub interaction_threshold: usize,
    /// Margin added around the mapped ROI (pixels).
    pub roi_margin: usize,
    /// Half-width of the inpainting neighborhood (pixels).
    pub inpaint_radius: usize,
    /// How far beyond the ROI the inpainter scans (pixels).
    pub inpaint_margin: usize,
    /// Number of smoothing iterations.
    pub smoothing_passes: usize,
    /// Sleep between polls when the sensor has no new frame (milliseconds).
    pub idle_poll_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            window_size: 15,
            ceiling_offset: 0.0,
            fast_adaptation: true,
            spatial_filter: true,
            inpainting: false,
            full_frame: false,
            roi: None,
            big_change: 20.0,
            depth: PlaneParams::depth(),
            position: PlaneParams::position(),
            unit_scale: 1000.0,
            warmup_frames: 60,
            interaction_threshold: 410,
            roi_margin: 50,
            inpaint_radius: 4,
            inpaint_margin: 2,
            smoothing_passes: 2,
            idle_poll_ms: 1,
        }
    }
}

impl FilterConfig {
    /// Minimum number of samples before a pixel can be stable.
    pub fn min_samples(&self) -> usize {
        (self.window_size + 2) / 2
    }

    /// Parameters for one plane.
    pub fn plane_params(&self, plane: crate::frame::Plane) -> &PlaneParams {
        match plane {
            crate::frame::Plane::Depth => &self.depth,
            crate::frame::Plane::X | crate::frame::Plane::Y => &self.position,
        }
    }

    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("ceiling_offset", self.ceiling_offset),
            ("big_change", self.big_change),
            ("unit_scale", self.unit_scale),
            ("depth.sentinel", self.depth.sentinel),
            ("depth.max_variance", self.depth.max_variance),
            ("depth.hysteresis", self.depth.hysteresis),
            ("position.sentinel", self.position.sentinel),
            ("position.max_variance", self.position.max_variance),
            ("position.hysteresis", self.position.hysteresis),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{} must be finite", name)));
            }
        }

        for (name, params) in [("depth", &self.depth), ("position", &self.position)] {
            if params.max_variance < 0.0 || params.hysteresis < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} variance and hysteresis must not be negative",
                    name
                )));
            }
        }

        if self.unit_scale <= 0.0 {
            return Err(ConfigError::Invalid("unit_scale must be positive".into()));
        }
        if self.big_change < 0.0 {
            return Err(ConfigError::Invalid("big_change must not be negative".into()));
        }
        if self.smoothing_passes > 16 {
            return Err(ConfigError::Invalid(format!(
                "smoothing_passes {} exceeds 16",
                self.smoothing_passes
            )));
        }
        if let Some(roi) = &self.roi {
            if ![roi.x, roi.y, roi.width, roi.height].iter().all(|v| v.is_finite()) {
                return Err(ConfigError::Invalid("roi must be finite".into()));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded filter config from {:?}", path);
        Ok(config)
    }

    /// Save as a JSON config file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        log::info!("Saved filter config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.window_size, 15);
        assert_eq!(config.min_samples(), 8);
        assert_eq!(config.depth.sentinel, 4000.0);
        assert_eq!(config.position.max_variance, 16.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_samples_rounds_up() {
        let mut config = FilterConfig::default();
        config.window_size = 4;
        assert_eq!(config.min_samples(), 3);
        config.window_size = 2;
        assert_eq!(config.min_samples(), 2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = FilterConfig::from_json(r#"{ "window_size": 5, "inpainting": true }"#).unwrap();
        assert_eq!(config.window_size, 5);
        assert!(config.inpainting);
        assert_eq!(config.big_change, 20.0);
    }

    #[test]
    fn test_json_roundtrip_with_roi() {
        let mut config = FilterConfig::default();
        config.roi = Some(RoiRect::new(100.0, 50.0, 800.0, 600.0));
        let json = config.to_json().unwrap();
        assert_eq!(FilterConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = FilterConfig::default();
        config.unit_scale = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = FilterConfig::default();
        config.depth.max_variance = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = FilterConfig::default();
        config.position.hysteresis = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            FilterConfig::from_json("{ window_size: "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_roi_rect_normalizes_negative_size() {
        let rect = RoiRect::new(10.0, 10.0, -4.0, 6.0);
        assert_eq!(rect.min_x(), 6.0);
        assert_eq!(rect.max_x(), 10.0);
        assert_eq!(rect.max_y(), 16.0);
    }
}
