//! Frame preprocessing.
//!
//! Turns one RGBA `Frame` into the classifier's input tensor:
//!
//! 1. Bilinear resample to 224x224 (alpha is discarded)
//! 2. Scale channel values from [0, 255] to [0, 1]
//! 3. Subtract the per-channel mean
//! 4. Divide by the per-channel standard deviation
//! 5. Reorder interleaved HWC pixels into planar CHW
//!
//! The resampled image is dropped before `preprocess` returns, so the only
//! allocation that outlives a call is the tensor itself.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::Rgba;

use crate::frame::Frame;

/// Model input edge length in pixels.
pub const INPUT_SIZE: u32 = 224;

pub const CHANNELS: usize = 3;

/// `[batch, channels, height, width]`
pub const TENSOR_SHAPE: [usize; 4] = [1, CHANNELS, INPUT_SIZE as usize, INPUT_SIZE as usize];

pub const MEAN: [f32; CHANNELS] = [0.485, 0.456, 0.406];
pub const STD: [f32; CHANNELS] = [0.229, 0.224, 0.225];

const PLANE_LEN: usize = (INPUT_SIZE * INPUT_SIZE) as usize;

// ----------------------------------------------------------------------------
// InputTensor: immutable planar tensor
// ----------------------------------------------------------------------------

/// Normalized `[1, 3, 224, 224]` tensor in planar channel-first order.
///
/// There are no mutable accessors: once built, the tensor is only read.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    /// Wrap planar CHW data that was normalized elsewhere.
    pub fn from_planar(data: Vec<f32>) -> Result<Self> {
        let expected = TENSOR_SHAPE.iter().product::<usize>();
        if data.len() != expected {
            return Err(anyhow!(
                "tensor length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self { data })
    }

    pub fn shape(&self) -> [usize; 4] {
        TENSOR_SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One channel plane, row-major.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * PLANE_LEN;
        &self.data[start..start + PLANE_LEN]
    }
}

// ----------------------------------------------------------------------------
// Preprocessing
// ----------------------------------------------------------------------------

/// Convert one frame to the classifier input.
///
/// Fails only for empty or malformed frames; callers skip the frame.
pub fn preprocess(frame: &Frame) -> Result<InputTensor> {
    if frame.is_empty() {
        return Err(anyhow!(
            "cannot preprocess empty frame ({}x{})",
            frame.width,
            frame.height
        ));
    }
    let view = frame.as_image()?;

    if view.dimensions() == (INPUT_SIZE, INPUT_SIZE) {
        return Ok(normalize_planar(view.pixels().copied()));
    }

    let resized = imageops::resize(&view, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    Ok(normalize_planar(resized.pixels().copied()))
}

/// Normalize `PLANE_LEN` row-major pixels into planar CHW order.
fn normalize_planar(pixels: impl Iterator<Item = Rgba<u8>>) -> InputTensor {
    let mut data = vec![0.0f32; CHANNELS * PLANE_LEN];
    for (idx, pixel) in pixels.take(PLANE_LEN).enumerate() {
        for c in 0..CHANNELS {
            let value = pixel.0[c] as f32 / 255.0;
            data[c * PLANE_LEN + idx] = (value - MEAN[c]) / STD[c];
        }
    }
    InputTensor { data }
}

/// Undo normalization for one tensor element. Used by model-free backends.
pub(crate) fn denormalize(value: f32, channel: usize) -> f32 {
    value * STD[channel] + MEAN[channel]
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
