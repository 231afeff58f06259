#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::backend::ClassifierBackend;
use crate::preprocess::{InputTensor, TENSOR_SHAPE};

/// Tract-based backend for ONNX inference.
///
/// Loads a local frame-quality model once and runs it on preprocessed
/// `[1, 3, 224, 224]` tensors. The model must emit one score per quality class.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let [batch, channels, height, width] = TENSOR_SHAPE;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(batch, channels, height, width)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model })
    }

    fn build_input(&self, input: &InputTensor) -> Result<Tensor> {
        let [batch, channels, height, width] = TENSOR_SHAPE;
        let array = tract_ndarray::Array4::from_shape_vec(
            (batch, channels, height, width),
            input.as_slice().to_vec(),
        )
        .context("input tensor does not match model shape")?;
        Ok(array.into_tensor())
    }

    fn extract_scores(&self, outputs: TVec<TValue>) -> Result<Vec<f32>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        Ok(scores.iter().copied().collect())
    }
}

impl ClassifierBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn scores(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        let tensor = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        self.extract_scores(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = InputTensor::from_planar(vec![0.0; TENSOR_SHAPE.iter().product()])?;
        self.scores(&blank).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_file_fails_to_load() {
        let err = TractBackend::load("does/not/exist.onnx")
            .err()
            .expect("load must fail");
        assert!(format!("{:#}", err).contains("failed to load ONNX model"));
    }
}
