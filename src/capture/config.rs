//! Camera capture configuration.
//!
//! The bridge never talks to a camera SDK directly. Frames come either
//! from the built-in mock or from an external grabber command that writes
//! one PNG to stdout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which camera implementation backs the shared handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Fixed placeholder frames.
    Mock,
    /// External grabber command.
    Command,
}

/// Configuration for camera capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera implementation.
    pub backend: CameraBackend,
    /// Video device passed to the grabber as `{device}`.
    pub device: String,
    /// Grabber program followed by its arguments.
    ///
    /// The literal `{device}` in any argument is replaced by [`Self::device`].
    pub command: Vec<String>,
    /// Seconds a grabber may run before it is killed.
    pub capture_timeout_s: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Command,
            device: "/dev/video0".to_string(),
            command: [
                "ffmpeg",
                "-loglevel",
                "error",
                "-f",
                "v4l2",
                "-i",
                "{device}",
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "-",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            capture_timeout_s: 10.0,
        }
    }
}

impl CaptureConfig {
    /// Configuration for the mock camera.
    pub fn mock() -> Self {
        Self {
            backend: CameraBackend::Mock,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), CaptureConfigError> {
        if self.backend == CameraBackend::Command {
            match self.command.first() {
                None => return Err(CaptureConfigError::EmptyCommand),
                Some(program) if program.trim().is_empty() => {
                    return Err(CaptureConfigError::EmptyCommand)
                }
                Some(_) => {}
            }
            if self.device.trim().is_empty() {
                return Err(CaptureConfigError::EmptyDevice);
            }
            self.capture_timeout()?;
        }
        Ok(())
    }

    /// Returns the grabber deadline. It must be positive and finite.
    pub fn capture_timeout(&self) -> Result<Duration, CaptureConfigError> {
        match Duration::try_from_secs_f64(self.capture_timeout_s) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(CaptureConfigError::InvalidTimeout(self.capture_timeout_s)),
        }
    }

    /// Returns the grabber arguments with `{device}` substituted.
    pub fn resolved_args(&self) -> Vec<String> {
        self.command
            .iter()
            .skip(1)
            .map(|arg| arg.replace("{device}", &self.device))
            .collect()
    }
}

/// Capture configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureConfigError {
    #[error("camera command must name a program")]
    EmptyCommand,
    #[error("camera device must not be empty")]
    EmptyDevice,
    #[error("capture timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
}
