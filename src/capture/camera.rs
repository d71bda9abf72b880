//! Camera abstraction for scene capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both a real grabber and mock implementations for testing.

use super::{image::is_png, CaptureConfig, EncodedImage};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running grabber is checked for exit.
const GRABBER_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A valid 1x1 transparent PNG.
pub const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64, 0x60, 0xf8, 0x5f,
    0x0f, 0x00, 0x02, 0x87, 0x01, 0x80, 0xeb, 0x47, 0xba, 0x92, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45,
    0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("failed to release camera: {0}")]
    ReleaseFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
    #[error("camera already released")]
    Released,
}

/// Trait for camera implementations.
///
/// All methods may block on hardware; callers run them on the blocking
/// thread pool.
pub trait Camera: Send {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Captures a single PNG frame.
    fn capture(&mut self) -> Result<EncodedImage, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self) -> Result<(), CameraError>;
}

/// Mock camera that returns a fixed placeholder frame.
#[derive(Debug, Default)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        tracing::info!("MockCamera opened");
        Ok(())
    }

    fn capture(&mut self) -> Result<EncodedImage, CameraError> {
        if self.config.is_none() {
            return Err(CameraError::NotInitialized);
        }
        self.sequence += 1;
        Ok(EncodedImage::new(PLACEHOLDER_PNG.to_vec(), self.sequence))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.config = None;
        tracing::info!("MockCamera closed");
        Ok(())
    }
}

/// Camera backed by an external grabber process.
///
/// Each capture runs the configured command once and expects a single PNG
/// on stdout. Opening only validates and stores the command line; the
/// device is held by the grabber for the duration of one capture. A grabber
/// that outlives `capture_timeout_s` is killed.
#[derive(Debug, Default)]
pub struct CommandCamera {
    program: Option<String>,
    args: Vec<String>,
    timeout: Duration,
    sequence: u64,
}

impl CommandCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Camera for CommandCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        let program = config
            .command
            .first()
            .cloned()
            .ok_or_else(|| CameraError::OpenFailed("no grabber command".to_string()))?;
        self.args = config.resolved_args();
        self.timeout = config
            .capture_timeout()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        tracing::info!(
            program = %program,
            device = %config.device,
            timeout_ms = self.timeout.as_millis() as u64,
            "CommandCamera opened"
        );
        self.program = Some(program);
        Ok(())
    }

    fn capture(&mut self) -> Result<EncodedImage, CameraError> {
        let program = self.program.as_ref().ok_or(CameraError::NotInitialized)?;

        let mut child = Command::new(program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to spawn {program}: {e}")))?;

        // Pipes are drained on their own threads so a large frame cannot
        // stall the grabber while we wait on it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                if let Err(e) = child.kill() {
                    tracing::warn!(error = %e, program = %program, "Failed to kill grabber");
                }
                if let Err(e) = child.wait() {
                    tracing::warn!(error = %e, program = %program, "Failed to reap grabber");
                }
                tracing::warn!(program = %program, "Grabber timed out");
                return Err(CameraError::CaptureFailed(format!(
                    "{program} timed out after {:?}",
                    self.timeout
                )));
            }
            Err(e) => {
                return Err(CameraError::CaptureFailed(format!(
                    "failed to wait for {program}: {e}"
                )))
            }
        };
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(CameraError::CaptureFailed(format!(
                "{program} exited with {status}: {}",
                stderr.trim()
            )));
        }
        if !is_png(&stdout) {
            return Err(CameraError::CaptureFailed(format!(
                "{program} did not produce a PNG ({} bytes)",
                stdout.len()
            )));
        }

        self.sequence += 1;
        tracing::debug!(
            sequence = self.sequence,
            bytes = stdout.len(),
            "Captured frame"
        );
        Ok(EncodedImage::new(stdout, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.program.is_some()
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.program = None;
        self.args.clear();
        tracing::info!("CommandCamera closed");
        Ok(())
    }
}

/// Reads a child pipe to the end on a background thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                tracing::debug!(error = %e, "Grabber pipe closed early");
            }
        }
        buf
    })
}

/// Waits for the child to exit. `Ok(None)` means the deadline passed first.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(GRABBER_POLL_INTERVAL);
    }
}
