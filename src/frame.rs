//! Camera frame container.
//!
//! - `Frame`: one sampled RGBA image from the camera. Bytes are private.
//!
//! Frames are produced once per tick by a `FrameSource`, handed to the
//! preprocessor, and dropped before the next tick. They are never persisted;
//! the only encoding path is `encode_png`, used when the user takes a picture.

use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;
use zeroize::Zeroize;

/// Bytes per RGBA pixel.
pub const RGBA_CHANNELS: usize = 4;

// ----------------------------------------------------------------------------
// Frame: ephemeral RGBA pixel buffer
// ----------------------------------------------------------------------------

/// Ephemeral RGBA frame. There is no `Clone`; a frame lives for one tick.
pub struct Frame {
    /// Interleaved RGBA bytes, `width * height * 4` long.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Source-assigned capture sequence number.
    pub sequence: u64,
}

impl Frame {
    /// Wrap interleaved RGBA bytes.
    ///
    /// A zero-sized frame is accepted (cameras report 0x0 until the stream is
    /// ready) but a buffer whose length disagrees with the dimensions is not.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgba_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGBA frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence: 0,
        })
    }

    /// A 0x0 frame, as delivered by a stream that has not produced pixels yet.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// True when there is nothing to classify.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Read-only pixel access for preprocessing.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Borrow the pixels as an image view without copying.
    pub fn as_image(&self) -> Result<ImageBuffer<Rgba<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }

    /// Encode as PNG for a user-initiated capture.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Err(anyhow!("cannot encode an empty frame"));
        }
        let mut out = Vec::new();
        self.as_image()?
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .context("encode frame as PNG")?;
        Ok(out)
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

pub(crate) fn rgba_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGBA_CHANNELS))
        .ok_or_else(|| anyhow!("RGBA frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_length_mismatch() {
        assert!(Frame::from_rgba(vec![0u8; 15], 2, 2).is_err());
        assert!(Frame::from_rgba(vec![0u8; 16], 2, 2).is_ok());
    }

    #[test]
    fn zero_sized_frames_are_empty() -> Result<()> {
        assert!(Frame::empty().is_empty());
        assert!(Frame::from_rgba(Vec::new(), 0, 480)?.is_empty());
        assert!(!Frame::from_rgba(vec![7u8; 4], 1, 1)?.is_empty());
        Ok(())
    }

    #[test]
    fn png_encoding_round_trips_dimensions() -> Result<()> {
        let frame = Frame::from_rgba(vec![200u8; 8 * 6 * 4], 8, 6)?;
        let png = frame.encode_png()?;
        let decoded = image::load_from_memory(&png)?;
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        Ok(())
    }

    #[test]
    fn empty_frames_cannot_be_encoded() {
        assert!(Frame::empty().encode_png().is_err());
    }
}
