//! Depth Conditioner - stabilized depth planes for projection sandboxes
//!
//! Ingests noisy per-pixel depth and world-position samples from a depth
//! sensor and produces temporally and spatially stabilized depth, X and Y
//! planes on a dedicated acquisition thread.

pub mod config;
pub mod filter;
pub mod frame;
pub mod grabber;
pub mod sensor;

pub use config::{ConfigError, FilterConfig, PlaneParams, RoiRect};
pub use filter::{FilteredPlanes, FrameFilter, FrameReport};
pub use frame::{Grid, Plane, Roi};
pub use grabber::{Command, DepthGrabber, FrameBatch, GrabberError, GrabberState};
pub use sensor::{DepthSensor, RawFrame, SensorError, WorldPlanes};
