//! Capture Gate
//!
//! This crate gates a "take picture" control on live camera frame quality.
//!
//! # Architecture
//!
//! Each tick of the capture loop runs the same pipeline:
//!
//! 1. **Ingest**: a `FrameSource` yields one RGBA `Frame`.
//! 2. **Preprocess**: the frame becomes a `[1, 3, 224, 224]` normalized tensor.
//! 3. **Classify**: a loaded backend scores the tensor; argmax picks a `QualityLabel`.
//! 4. **Gate**: the `QualityGate` decides whether capture is allowed, with a
//!    grace period after which a poor verdict no longer blocks the user.
//! 5. **Render**: the verdict is applied to a `CaptureSurface`.
//!
//! # Module Structure
//!
//! - `frame`: Camera frame container (RGBA, zeroized on drop)
//! - `ingest`: Frame sources (synthetic, still images, V4L2)
//! - `preprocess`: Resize, normalize and reorder to planar tensors
//! - `classify`: Backends and the inference adapter
//! - `gate`: Quality gate state machine
//! - `lifecycle`: Model load → camera start → prediction loop
//! - `clock`, `schedule`: Injectable time and tick sources
//! - `ui`: Capture surfaces and stage reporting
//! - `config`: Runtime configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod classify;
pub mod clock;
pub mod config;
pub mod frame;
pub mod gate;
pub mod ingest;
pub mod lifecycle;
pub mod preprocess;
pub mod schedule;
pub mod ui;

pub use classify::{argmax, load_backend, Classification, ClassifierBackend, QualityClassifier};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BackendKind, CameraSettings, GateConfig, ModelSettings};
pub use frame::Frame;
pub use gate::{GateState, GateVerdict, QualityGate, DEFAULT_GRACE_PERIOD};
pub use ingest::{open_source, FrameSource, SourceStats};
pub use lifecycle::{Lifecycle, PredictionGuard, RunSummary, SkipReason, StepOutcome};
pub use preprocess::{preprocess, InputTensor, INPUT_SIZE, TENSOR_SHAPE};
pub use schedule::{FixedTicks, IntervalScheduler, SimulatedTicks, TickScheduler};
pub use ui::{CaptureSurface, RecordingSurface, TerminalSurface, Ui};

// -------------------- Quality Labels --------------------

/// Closed set of classifier outputs, in model output order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    GoodQuality,
    Blurry,
    TooDark,
    PoorFraming,
}

impl QualityLabel {
    /// All labels, indexed by class index.
    pub const ALL: [QualityLabel; 4] = [
        QualityLabel::GoodQuality,
        QualityLabel::Blurry,
        QualityLabel::TooDark,
        QualityLabel::PoorFraming,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            QualityLabel::GoodQuality => 0,
            QualityLabel::Blurry => 1,
            QualityLabel::TooDark => 2,
            QualityLabel::PoorFraming => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLabel::GoodQuality => "good_quality",
            QualityLabel::Blurry => "blurry",
            QualityLabel::TooDark => "too_dark",
            QualityLabel::PoorFraming => "poor_framing",
        }
    }

    pub fn is_good(self) -> bool {
        self == QualityLabel::GoodQuality
    }
}

impl std::fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLabel {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == value.trim())
            .ok_or_else(|| anyhow::anyhow!("unknown quality label '{}'", value))
    }
}

// -------------------- Lifecycle Errors --------------------

/// Failures surfaced by the lifecycle controller.
///
/// `ModelLoadFailure` and `CameraAccessFailure` are fatal to the feature: the
/// overlay shows a message and the prediction loop never starts.
/// `InferenceFailure` is recovered per frame and only reported through logs and
/// counters; it is part of the taxonomy so callers driving `classify` directly
/// can match on it.
#[derive(Debug)]
pub enum LifecycleError {
    ModelLoadFailure(anyhow::Error),
    CameraAccessFailure(anyhow::Error),
    InferenceFailure(anyhow::Error),
    /// A stage was invoked before the stage it depends on succeeded.
    NotReady(&'static str),
    LoopAlreadyRunning,
    CaptureBlocked,
    CaptureFailed(anyhow::Error),
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::ModelLoadFailure(_) => "MODEL_LOAD_FAILURE",
            LifecycleError::CameraAccessFailure(_) => "CAMERA_ACCESS_FAILURE",
            LifecycleError::InferenceFailure(_) => "INFERENCE_FAILURE",
            LifecycleError::NotReady(_) => "NOT_READY",
            LifecycleError::LoopAlreadyRunning => "LOOP_ALREADY_RUNNING",
            LifecycleError::CaptureBlocked => "CAPTURE_BLOCKED",
            LifecycleError::CaptureFailed(_) => "CAPTURE_FAILED",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LifecycleError::ModelLoadFailure(_) | LifecycleError::CameraAccessFailure(_)
        )
    }
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::ModelLoadFailure(err)
            | LifecycleError::CameraAccessFailure(err)
            | LifecycleError::InferenceFailure(err)
            | LifecycleError::CaptureFailed(err) => write!(f, "{}: {:#}", self.code(), err),
            LifecycleError::NotReady(why) => write!(f, "{}: {}", self.code(), why),
            LifecycleError::LoopAlreadyRunning => {
                write!(f, "{}: prediction loop is already running", self.code())
            }
            LifecycleError::CaptureBlocked => {
                write!(f, "{}: frame quality gate is blocking capture", self.code())
            }
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifecycleError::ModelLoadFailure(err)
            | LifecycleError::CameraAccessFailure(err)
            | LifecycleError::InferenceFailure(err)
            | LifecycleError::CaptureFailed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_indices_follow_model_output_order() {
        for (index, label) in QualityLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), index);
            assert_eq!(QualityLabel::from_index(index), Some(*label));
        }
        assert_eq!(QualityLabel::from_index(QualityLabel::COUNT), None);
    }

    #[test]
    fn labels_parse_from_wire_names() -> anyhow::Result<()> {
        assert_eq!("too_dark".parse::<QualityLabel>()?, QualityLabel::TooDark);
        assert_eq!(
            " poor_framing ".parse::<QualityLabel>()?,
            QualityLabel::PoorFraming
        );
        assert!("sharp".parse::<QualityLabel>().is_err());
        Ok(())
    }

    #[test]
    fn only_load_and_camera_failures_are_fatal() {
        assert!(LifecycleError::ModelLoadFailure(anyhow::anyhow!("x")).is_fatal());
        assert!(LifecycleError::CameraAccessFailure(anyhow::anyhow!("x")).is_fatal());
        assert!(!LifecycleError::InferenceFailure(anyhow::anyhow!("x")).is_fatal());
        assert!(!LifecycleError::CaptureBlocked.is_fatal());
    }

    #[test]
    fn error_display_carries_code_and_cause() {
        let err = LifecycleError::CameraAccessFailure(anyhow::anyhow!("permission denied"));
        assert_eq!(
            err.to_string(),
            "CAMERA_ACCESS_FAILURE: permission denied"
        );
    }
}
