//! Encoded image type representing a captured PNG with metadata.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Errors decoding an image payload received from a client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageDecodeError {
    #[error("image is not valid base64: {0}")]
    Base64(String),
    #[error("image payload is not a PNG")]
    NotPng,
}

/// A single PNG-encoded image.
///
/// Images come either from the camera or from a client payload; the
/// sequence number is zero for the latter.
#[derive(Clone)]
pub struct EncodedImage {
    /// PNG bytes, signature included.
    png: Vec<u8>,
    /// Wall-clock capture time.
    captured_at: DateTime<Utc>,
    /// Monotonic sequence number assigned by the camera.
    sequence: u64,
}

impl EncodedImage {
    /// Creates an image from PNG bytes.
    pub fn new(png: Vec<u8>, sequence: u64) -> Self {
        Self {
            png,
            captured_at: Utc::now(),
            sequence,
        }
    }

    /// Decodes a base64 PNG payload.
    ///
    /// A `data:image/png;base64,` prefix is tolerated.
    pub fn from_base64(encoded: &str) -> Result<Self, ImageDecodeError> {
        let payload = encoded
            .trim()
            .strip_prefix("data:image/png;base64,")
            .unwrap_or(encoded.trim());
        let png = STANDARD
            .decode(payload)
            .map_err(|e| ImageDecodeError::Base64(e.to_string()))?;
        if !is_png(&png) {
            return Err(ImageDecodeError::NotPng);
        }
        Ok(Self::new(png, 0))
    }

    /// Returns the raw PNG bytes.
    #[inline]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Returns the capture time.
    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the payload size in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.png.len()
    }

    /// Encodes the PNG bytes as standard padded base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }
}

/// Returns true if the buffer starts with the PNG signature.
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}
