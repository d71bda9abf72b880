//! Process-wide camera handle.

use super::{Camera, CameraError, CaptureConfig, EncodedImage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Inner {
    camera: Mutex<Box<dyn Camera>>,
    config: CaptureConfig,
    released: AtomicBool,
    captures: AtomicU64,
}

/// The single shared camera.
///
/// Acquisition is implicit: the first capture opens the device. Release is
/// explicit and happens once at shutdown. Concurrent captures are serialized
/// on the handle itself; they are not ordered against policy runs.
#[derive(Clone)]
pub struct SharedCamera {
    inner: Arc<Inner>,
}

impl SharedCamera {
    /// Wraps a camera implementation. The device is not opened yet.
    pub fn new(camera: Box<dyn Camera>, config: CaptureConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                camera: Mutex::new(camera),
                config,
                released: AtomicBool::new(false),
                captures: AtomicU64::new(0),
            }),
        }
    }

    /// Captures one frame, opening the device first if needed.
    ///
    /// Blocks; call from the blocking thread pool.
    pub fn capture_blocking(&self) -> Result<EncodedImage, CameraError> {
        if self.inner.released.load(Ordering::Acquire) {
            return Err(CameraError::Released);
        }
        let mut camera = self.lock_camera();
        if !camera.is_open() {
            camera.open(&self.inner.config)?;
        }
        let image = camera.capture()?;
        self.inner.captures.fetch_add(1, Ordering::Relaxed);
        Ok(image)
    }

    /// Releases the camera.
    ///
    /// Only the first call closes the device; later calls return `Ok(false)`.
    /// A failed close still counts as the release.
    pub fn release(&self) -> Result<bool, CameraError> {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            tracing::debug!("Camera already released");
            return Ok(false);
        }
        let mut camera = self.lock_camera();
        if camera.is_open() {
            camera.close()?;
        }
        tracing::info!("Camera released");
        Ok(true)
    }

    /// Locks the camera. A panic in an earlier capture does not disable it;
    /// the next call talks to the device again and reports its own result.
    fn lock_camera(&self) -> MutexGuard<'_, Box<dyn Camera>> {
        self.inner.camera.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Camera lock poisoned by an earlier panic, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Returns true once [`Self::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Returns the number of successful captures.
    pub fn captures(&self) -> u64 {
        self.inner.captures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for SharedCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCamera")
            .field("released", &self.is_released())
            .field("captures", &self.captures())
            .finish()
    }
}
