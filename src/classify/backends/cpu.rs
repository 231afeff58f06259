use anyhow::Result;

use crate::classify::backend::ClassifierBackend;
use crate::classify::backends::stub::one_hot_scores;
use crate::preprocess::{denormalize, InputTensor, INPUT_SIZE};
use crate::QualityLabel;

/// Decision thresholds for the heuristic backend, in [0, 1] luminance units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuThresholds {
    /// Mean luminance below this is `too_dark`.
    pub min_mean_luma: f32,
    /// Laplacian variance below this is `blurry`.
    pub min_laplacian_variance: f32,
    /// Centre detail divided by whole-frame detail below this is `poor_framing`.
    pub min_center_detail_ratio: f32,
}

impl Default for CpuThresholds {
    fn default() -> Self {
        Self {
            min_mean_luma: 0.25,
            min_laplacian_variance: 0.0015,
            min_center_detail_ratio: 0.35,
        }
    }
}

/// Summary statistics the heuristic decides on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMetrics {
    pub mean_luma: f32,
    pub laplacian_variance: f32,
    pub center_detail_ratio: f32,
}

/// Model-free CPU backend.
///
/// Used when no ONNX model is configured. Checks brightness, then sharpness,
/// then whether the detail sits in the centre of the frame.
#[derive(Default)]
pub struct CpuBackend {
    thresholds: CpuThresholds,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: CpuThresholds) -> Self {
        Self { thresholds }
    }

    pub fn label_for(&self, metrics: &FrameMetrics) -> QualityLabel {
        let t = &self.thresholds;
        if metrics.mean_luma < t.min_mean_luma {
            QualityLabel::TooDark
        } else if metrics.laplacian_variance < t.min_laplacian_variance {
            QualityLabel::Blurry
        } else if metrics.center_detail_ratio < t.min_center_detail_ratio {
            QualityLabel::PoorFraming
        } else {
            QualityLabel::GoodQuality
        }
    }
}

/// Compute luminance statistics over the un-normalized tensor.
pub fn frame_metrics(input: &InputTensor) -> FrameMetrics {
    let size = INPUT_SIZE as usize;
    let luma: Vec<f32> = input
        .channel(0)
        .iter()
        .zip(input.channel(1))
        .zip(input.channel(2))
        .map(|((r, g), b)| {
            0.299 * denormalize(*r, 0) + 0.587 * denormalize(*g, 1) + 0.114 * denormalize(*b, 2)
        })
        .collect();
    let mean_luma = luma.iter().sum::<f32>() / luma.len() as f32;

    let center = size / 4..size - size / 4;
    let mut laplacians = Vec::with_capacity((size - 2) * (size - 2));
    let mut center_abs = 0.0f32;
    let mut center_count = 0usize;
    for y in 1..size - 1 {
        for x in 1..size - 1 {
            let at = |xx: usize, yy: usize| luma[yy * size + xx];
            let lap = 4.0 * at(x, y) - at(x - 1, y) - at(x + 1, y) - at(x, y - 1) - at(x, y + 1);
            laplacians.push(lap);
            if center.contains(&x) && center.contains(&y) {
                center_abs += lap.abs();
                center_count += 1;
            }
        }
    }

    let n = laplacians.len() as f32;
    let lap_mean = laplacians.iter().sum::<f32>() / n;
    let laplacian_variance = laplacians
        .iter()
        .map(|v| (v - lap_mean) * (v - lap_mean))
        .sum::<f32>()
        / n;

    let overall_abs = laplacians.iter().map(|v| v.abs()).sum::<f32>() / n;
    let center_detail_ratio = if overall_abs > f32::EPSILON {
        (center_abs / center_count.max(1) as f32) / overall_abs
    } else {
        1.0
    };

    FrameMetrics {
        mean_luma,
        laplacian_variance,
        center_detail_ratio,
    }
}

impl ClassifierBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn scores(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        let metrics = frame_metrics(input);
        let label = self.label_for(&metrics);
        log::trace!("cpu backend metrics {:?} -> {}", metrics, label);
        Ok(one_hot_scores(label))
    }
}
