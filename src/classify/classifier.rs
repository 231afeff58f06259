use anyhow::{Context, Result};

use crate::classify::backend::ClassifierBackend;
use crate::classify::result::Classification;
use crate::preprocess::InputTensor;

/// Inference adapter over a loaded backend.
///
/// A `QualityClassifier` only exists once a backend has loaded and warmed up,
/// so `classify` can never run against an unloaded model.
pub struct QualityClassifier {
    backend: Box<dyn ClassifierBackend>,
    calls: u64,
    failures: u64,
}

impl QualityClassifier {
    /// Wrap a loaded backend and run its warm-up hook.
    pub fn new(mut backend: Box<dyn ClassifierBackend>) -> Result<Self> {
        backend
            .warm_up()
            .with_context(|| format!("{} backend warm-up failed", backend.name()))?;
        Ok(Self {
            backend,
            calls: 0,
            failures: 0,
        })
    }

    pub fn from_backend<B: ClassifierBackend + 'static>(backend: B) -> Result<Self> {
        Self::new(Box::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run one forward pass and pick the winning class.
    pub fn classify(&mut self, input: &InputTensor) -> Result<Classification> {
        self.calls += 1;
        let result = self
            .backend
            .scores(input)
            .with_context(|| format!("{} backend inference failed", self.backend.name()))
            .and_then(Classification::from_scores);
        if result.is_err() {
            self.failures += 1;
        }
        result
    }

    /// Index of the winning class.
    pub fn classify_index(&mut self, input: &InputTensor) -> Result<usize> {
        self.classify(input).map(|c| c.index)
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}
