use anyhow::Result;

use crate::preprocess::InputTensor;

/// Classifier backend trait.
///
/// A backend is a loaded model. It scores one preprocessed tensor and returns
/// one raw score per quality class, in `QualityLabel::ALL` order. Scores may be
/// logits or probabilities; only their ordering is used.
///
/// Implementations must treat the tensor as read-only and must not retain it
/// past the call.
pub trait ClassifierBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run a forward pass.
    fn scores(&mut self, input: &InputTensor) -> Result<Vec<f32>>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
