//! Camera input and scene capture.
//!
//! This module provides abstractions for capturing PNG frames from the
//! workspace camera and for sharing the single camera handle across
//! requests. Capture is independent of robot motion: it never waits on
//! the concurrency gate.

mod camera;
mod config;
mod image;
mod shared;

pub use camera::{Camera, CameraError, CommandCamera, MockCamera, PLACEHOLDER_PNG};
pub use config::{CameraBackend, CaptureConfig, CaptureConfigError};
pub use image::{is_png, EncodedImage, ImageDecodeError};
pub use shared::SharedCamera;

/// Builds the camera implementation selected by the configuration.
pub fn camera_from_config(config: &CaptureConfig) -> Box<dyn Camera> {
    match config.backend {
        CameraBackend::Mock => Box::new(MockCamera::new()),
        CameraBackend::Command => Box::new(CommandCamera::new()),
    }
}
