use anyhow::{anyhow, Result};

use crate::QualityLabel;

/// Index of the highest score. Ties go to the lowest index; NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Result of classifying one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub index: usize,
    pub label: QualityLabel,
    pub scores: Vec<f32>,
}

impl Classification {
    /// Validate raw model output and pick the winning class.
    pub fn from_scores(scores: Vec<f32>) -> Result<Self> {
        if scores.len() != QualityLabel::COUNT {
            return Err(anyhow!(
                "model produced {} scores, expected {}",
                scores.len(),
                QualityLabel::COUNT
            ));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(anyhow!("model produced non-finite score {}", bad));
        }
        let index = argmax(&scores).ok_or_else(|| anyhow!("model produced no scores"))?;
        let label = QualityLabel::from_index(index)
            .ok_or_else(|| anyhow!("class index {} out of range", index))?;
        Ok(Self {
            index,
            label,
            scores,
        })
    }

    /// Raw score of the winning class.
    pub fn score(&self) -> f32 {
        self.scores[self.index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_of_equal_maxima() {
        assert_eq!(argmax(&[0.5, 0.5, 0.1, 0.1]), Some(0));
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
    }

    #[test]
    fn argmax_handles_negative_logits_and_nan() {
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn classification_maps_index_to_label() -> Result<()> {
        let result = Classification::from_scores(vec![0.1, 0.2, 0.6, 0.1])?;
        assert_eq!(result.index, 2);
        assert_eq!(result.label, QualityLabel::TooDark);
        assert!((result.score() - 0.6).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn classification_rejects_wrong_arity_and_non_finite() {
        assert!(Classification::from_scores(vec![0.5, 0.5]).is_err());
        assert!(Classification::from_scores(vec![0.5, f32::INFINITY, 0.0, 0.0]).is_err());
        assert!(Classification::from_scores(vec![f32::NAN, 0.1, 0.0, 0.0]).is_err());
    }
}
