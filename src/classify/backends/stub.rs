use anyhow::{anyhow, Result};

use crate::classify::backend::ClassifierBackend;
use crate::preprocess::InputTensor;
use crate::QualityLabel;

/// One scripted response of the stub backend.
#[derive(Clone, Debug, PartialEq)]
pub enum StubOutcome {
    Label(QualityLabel),
    Scores(Vec<f32>),
    Fail(String),
}

/// Stub backend for testing. Replays a script of outcomes and ignores pixels.
///
/// Once the script is exhausted the last outcome repeats, unless the backend
/// was built with `cycling`, in which case the script starts over.
pub struct StubBackend {
    script: Vec<StubOutcome>,
    cursor: usize,
    cycle: bool,
    calls: u64,
}

impl StubBackend {
    pub fn new(script: Vec<StubOutcome>) -> Self {
        Self {
            script,
            cursor: 0,
            cycle: false,
            calls: 0,
        }
    }

    /// Always answers with `label`.
    pub fn constant(label: QualityLabel) -> Self {
        Self::new(vec![StubOutcome::Label(label)])
    }

    /// Replays `labels` in order.
    pub fn labels(labels: impl IntoIterator<Item = QualityLabel>) -> Self {
        Self::new(labels.into_iter().map(StubOutcome::Label).collect())
    }

    pub fn cycling(mut self) -> Self {
        self.cycle = true;
        self
    }

    /// Number of forward passes served.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn next_outcome(&mut self) -> Option<&StubOutcome> {
        if self.script.is_empty() {
            return None;
        }
        let index = if self.cursor < self.script.len() {
            self.cursor
        } else if self.cycle {
            self.cursor % self.script.len()
        } else {
            self.script.len() - 1
        };
        self.cursor += 1;
        self.script.get(index)
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::constant(QualityLabel::GoodQuality)
    }
}

/// Scores with a clear winner at `label`.
pub(crate) fn one_hot_scores(label: QualityLabel) -> Vec<f32> {
    let mut scores = vec![0.05f32; QualityLabel::COUNT];
    scores[label.index()] = 0.85;
    scores
}

impl ClassifierBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn scores(&mut self, _input: &InputTensor) -> Result<Vec<f32>> {
        self.calls += 1;
        match self.next_outcome() {
            Some(StubOutcome::Label(label)) => Ok(one_hot_scores(*label)),
            Some(StubOutcome::Scores(scores)) => Ok(scores.clone()),
            Some(StubOutcome::Fail(message)) => Err(anyhow!("{}", message)),
            None => Err(anyhow!("stub backend has no scripted outcomes")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::result::argmax;

    fn blank_tensor() -> InputTensor {
        InputTensor::from_planar(vec![0.0; 3 * 224 * 224]).expect("tensor")
    }

    #[test]
    fn stub_replays_script_then_repeats_last() -> Result<()> {
        let mut backend = StubBackend::new(vec![
            StubOutcome::Label(QualityLabel::Blurry),
            StubOutcome::Fail("backend lost".to_string()),
            StubOutcome::Label(QualityLabel::GoodQuality),
        ]);
        let input = blank_tensor();

        assert_eq!(argmax(&backend.scores(&input)?), Some(1));
        assert!(backend.scores(&input).is_err());
        assert_eq!(argmax(&backend.scores(&input)?), Some(0));
        assert_eq!(argmax(&backend.scores(&input)?), Some(0));
        assert_eq!(backend.calls(), 4);
        Ok(())
    }

    #[test]
    fn cycling_stub_starts_over() -> Result<()> {
        let mut backend =
            StubBackend::labels([QualityLabel::TooDark, QualityLabel::GoodQuality]).cycling();
        let input = blank_tensor();
        let picks: Vec<Option<usize>> = (0..4)
            .map(|_| backend.scores(&input).map(|s| argmax(&s)))
            .collect::<Result<_>>()?;
        assert_eq!(picks, vec![Some(2), Some(0), Some(2), Some(0)]);
        Ok(())
    }

    #[test]
    fn empty_script_fails() {
        let mut backend = StubBackend::new(Vec::new());
        assert!(backend.scores(&blank_tensor()).is_err());
    }
}
