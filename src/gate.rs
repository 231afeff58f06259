//! Frame-quality gate.
//!
//! The gate decides, one classification at a time, whether the capture button
//! is enabled and what the overlay says:
//!
//! - `Good`: capture enabled, no overlay, default button text.
//! - `PoorWithinGrace`: a non-good streak started less than the grace period
//!   ago. Capture disabled, label-specific overlay, "Take Anyway" button text.
//! - `PoorTimedOut`: the streak has lasted at least the grace period. Capture
//!   enabled again with a neutral overlay until the next good frame.
//!
//! `poor_quality_since` is set exactly while a non-good streak is ongoing and
//! is cleared by the first good frame.

use std::time::Duration;

use crate::QualityLabel;

/// How long a poor-quality streak blocks capture.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(20);

pub const DEFAULT_BUTTON_LABEL: &str = "Take Picture";
pub const OVERRIDE_BUTTON_LABEL: &str = "Take Anyway";
pub const PROCEED_MESSAGE: &str =
    "Image quality could not be confirmed, but you may proceed with taking the picture.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Good,
    PoorWithinGrace,
    PoorTimedOut,
}

/// UI-visible outcome of one gate update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateVerdict {
    pub state: GateState,
    pub capture_enabled: bool,
    pub overlay: Option<&'static str>,
    pub button_label: &'static str,
}

/// Overlay text shown while a poor label blocks capture.
pub fn overlay_message(label: QualityLabel) -> Option<&'static str> {
    match label {
        QualityLabel::GoodQuality => None,
        QualityLabel::Blurry => Some("Image is blurry. Hold the camera steady."),
        QualityLabel::TooDark => Some("Image is too dark. Move to a brighter spot."),
        QualityLabel::PoorFraming => {
            Some("Subject is poorly framed. Center it in the view.")
        }
    }
}

#[derive(Clone, Debug)]
pub struct QualityGate {
    grace: Duration,
    state: GateState,
    last_label: Option<QualityLabel>,
    poor_quality_since: Option<Duration>,
}

impl QualityGate {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            state: GateState::Good,
            last_label: None,
            poor_quality_since: None,
        }
    }

    /// Feed one classification observed at `now`.
    pub fn observe(&mut self, label: QualityLabel, now: Duration) -> GateVerdict {
        self.last_label = Some(label);

        if label.is_good() {
            self.poor_quality_since = None;
            self.state = GateState::Good;
            return self.verdict();
        }

        let since = *self.poor_quality_since.get_or_insert(now);
        // A clock reading earlier than the streak start counts as no time elapsed.
        let elapsed = now.saturating_sub(since);
        self.state = if elapsed >= self.grace {
            GateState::PoorTimedOut
        } else {
            GateState::PoorWithinGrace
        };
        self.verdict()
    }

    /// Outcome for the current state without feeding a new label.
    pub fn verdict(&self) -> GateVerdict {
        match self.state {
            GateState::Good => GateVerdict {
                state: GateState::Good,
                capture_enabled: true,
                overlay: None,
                button_label: DEFAULT_BUTTON_LABEL,
            },
            GateState::PoorWithinGrace => GateVerdict {
                state: GateState::PoorWithinGrace,
                capture_enabled: false,
                overlay: self.last_label.and_then(overlay_message),
                button_label: OVERRIDE_BUTTON_LABEL,
            },
            GateState::PoorTimedOut => GateVerdict {
                state: GateState::PoorTimedOut,
                capture_enabled: true,
                overlay: Some(PROCEED_MESSAGE),
                button_label: OVERRIDE_BUTTON_LABEL,
            },
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn capture_enabled(&self) -> bool {
        self.state != GateState::PoorWithinGrace
    }

    pub fn last_label(&self) -> Option<QualityLabel> {
        self.last_label
    }

    pub fn poor_quality_since(&self) -> Option<Duration> {
        self.poor_quality_since
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Time left before a poor streak stops blocking capture.
    pub fn grace_remaining(&self, now: Duration) -> Option<Duration> {
        self.poor_quality_since
            .map(|since| self.grace.saturating_sub(now.saturating_sub(since)))
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
