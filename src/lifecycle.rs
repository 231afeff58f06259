//! Lifecycle controller.
//!
//! Stages run in order and each one depends on the previous:
//!
//! 1. `load_model`: load and warm up the classifier backend.
//! 2. `start_camera`: open and connect the frame source.
//! 3. `run`: one capture → preprocess → classify → gate → render step per
//!    scheduler tick until the scheduler stops.
//!
//! A failure in stage 1 or 2 puts a fatal message on the surface and disables
//! capture; later stages refuse to run. Per-frame failures in stage 3 are
//! logged and the frame is skipped without touching the gate.

use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::classify::{ClassifierBackend, QualityClassifier};
use crate::clock::Clock;
use crate::gate::{GateState, GateVerdict, QualityGate};
use crate::ingest::FrameSource;
use crate::preprocess::preprocess;
use crate::schedule::TickScheduler;
use crate::ui::{render_fatal, render_verdict, CaptureSurface};
use crate::LifecycleError;

pub const MODEL_LOAD_MESSAGE: &str =
    "Quality checks are unavailable because the model could not be loaded.";
pub const CAMERA_ACCESS_MESSAGE: &str =
    "Camera unavailable. Check that it is connected and that access is allowed.";

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Prediction guard
// ----------------------------------------------------------------------------

/// "Prediction already running" flag. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct PredictionGuard {
    running: Arc<AtomicBool>,
}

impl PredictionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the loop. Returns `None` while another lease is alive.
    pub fn try_acquire(&self) -> Option<PredictionLease> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PredictionLease {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the prediction flag on drop.
#[derive(Debug)]
pub struct PredictionLease {
    running: Arc<AtomicBool>,
}

impl Drop for PredictionLease {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// ----------------------------------------------------------------------------
// Step outcomes
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    CaptureFailed,
    EmptyFrame,
    Preprocess,
    Inference,
}

/// Result of one loop iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Applied(GateVerdict),
    Skipped(SkipReason),
}

/// Counters for a finished (or running) prediction loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames_classified: u64,
    /// Every skipped frame, inference failures included.
    pub skipped_frames: u64,
    pub inference_failures: u64,
    pub final_state: GateState,
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

pub struct Lifecycle<S: CaptureSurface> {
    surface: S,
    clock: Box<dyn Clock>,
    gate: QualityGate,
    classifier: Option<QualityClassifier>,
    source: Option<Box<dyn FrameSource>>,
    guard: PredictionGuard,
    ticks: u64,
    frames_classified: u64,
    skipped_frames: u64,
    inference_failures: u64,
    last_health_log: Duration,
}

impl<S: CaptureSurface> Lifecycle<S> {
    pub fn new(mut surface: S, clock: Box<dyn Clock>, grace: Duration) -> Self {
        let gate = QualityGate::new(grace);
        render_verdict(&mut surface, &gate.verdict());
        let last_health_log = clock.now();
        Self {
            surface,
            clock,
            gate,
            classifier: None,
            source: None,
            guard: PredictionGuard::new(),
            ticks: 0,
            frames_classified: 0,
            skipped_frames: 0,
            inference_failures: 0,
            last_health_log,
        }
    }

    /// Stage 1. A model that is already loaded is kept and `loader` is not called.
    pub fn load_model<F>(&mut self, loader: F) -> Result<(), LifecycleError>
    where
        F: FnOnce() -> anyhow::Result<Box<dyn ClassifierBackend>>,
    {
        if let Some(classifier) = &self.classifier {
            log::debug!(
                "model already loaded ({} backend); skipping reload",
                classifier.backend_name()
            );
            return Ok(());
        }
        match loader().and_then(QualityClassifier::new) {
            Ok(classifier) => {
                log::info!("model loaded ({} backend)", classifier.backend_name());
                self.classifier = Some(classifier);
                Ok(())
            }
            Err(err) => {
                let err = LifecycleError::ModelLoadFailure(err);
                log::error!("{}", err);
                render_fatal(&mut self.surface, MODEL_LOAD_MESSAGE);
                Err(err)
            }
        }
    }

    /// Stage 2. Requires a loaded model; the source is connected here.
    pub fn start_camera<F>(&mut self, opener: F) -> Result<(), LifecycleError>
    where
        F: FnOnce() -> anyhow::Result<Box<dyn FrameSource>>,
    {
        if self.classifier.is_none() {
            return Err(LifecycleError::NotReady("model is not loaded"));
        }
        let opened = opener().and_then(|mut source| {
            source.connect()?;
            Ok(source)
        });
        match opened {
            Ok(source) => {
                log::info!("camera started ({})", source.stats().origin);
                self.source = Some(source);
                Ok(())
            }
            Err(err) => {
                let err = LifecycleError::CameraAccessFailure(err);
                log::error!("{}", err);
                render_fatal(&mut self.surface, CAMERA_ACCESS_MESSAGE);
                Err(err)
            }
        }
    }

    /// Stage 3. Runs until `scheduler` stops.
    pub fn run(&mut self, scheduler: &mut dyn TickScheduler) -> Result<RunSummary, LifecycleError> {
        self.run_with(scheduler, |_| {})
    }

    /// Like `run`, calling `hook` after every step (e.g. to serve capture requests).
    pub fn run_with<F>(
        &mut self,
        scheduler: &mut dyn TickScheduler,
        mut hook: F,
    ) -> Result<RunSummary, LifecycleError>
    where
        F: FnMut(&mut Self),
    {
        self.ensure_started()?;
        let guard = self.guard.clone();
        let _lease = guard
            .try_acquire()
            .ok_or(LifecycleError::LoopAlreadyRunning)?;

        log::info!("prediction loop started");
        while scheduler.next_tick() {
            self.step()?;
            hook(self);
            self.log_health();
        }
        let summary = self.summary();
        log::info!(
            "prediction loop stopped: ticks={} classified={} skipped={} inference_failures={} state={:?}",
            summary.ticks,
            summary.frames_classified,
            summary.skipped_frames,
            summary.inference_failures,
            summary.final_state
        );
        Ok(summary)
    }

    /// One capture → preprocess → classify → gate → render iteration.
    pub fn step(&mut self) -> Result<StepOutcome, LifecycleError> {
        self.ensure_started()?;
        self.ticks += 1;
        let (Some(classifier), Some(source)) = (self.classifier.as_mut(), self.source.as_mut())
        else {
            return Err(LifecycleError::NotReady("camera is not started"));
        };

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame capture failed, skipping: {:#}", err);
                return Ok(self.skip(SkipReason::CaptureFailed));
            }
        };
        if frame.is_empty() {
            log::warn!("frame {} has no pixels, skipping", frame.sequence);
            return Ok(self.skip(SkipReason::EmptyFrame));
        }
        let input = match preprocess(&frame) {
            Ok(input) => input,
            Err(err) => {
                log::warn!("frame {} could not be preprocessed: {:#}", frame.sequence, err);
                return Ok(self.skip(SkipReason::Preprocess));
            }
        };
        let classification = match classifier.classify(&input) {
            Ok(classification) => classification,
            Err(err) => {
                log::warn!("frame {} skipped: {}", frame.sequence, LifecycleError::InferenceFailure(err));
                self.inference_failures += 1;
                return Ok(self.skip(SkipReason::Inference));
            }
        };

        let now = self.clock.now();
        let verdict = self.gate.observe(classification.label, now);
        render_verdict(&mut self.surface, &verdict);
        self.frames_classified += 1;
        log::debug!(
            "frame {} label={} score={:.3} state={:?} capture_enabled={}",
            frame.sequence,
            classification.label,
            classification.score(),
            verdict.state,
            verdict.capture_enabled
        );
        Ok(StepOutcome::Applied(verdict))
    }

    /// Encode a fresh frame as PNG. Fails with `CaptureBlocked` while the gate
    /// disables capture.
    pub fn take_picture(&mut self) -> Result<Vec<u8>, LifecycleError> {
        self.ensure_started()?;
        if !self.gate.capture_enabled() {
            return Err(LifecycleError::CaptureBlocked);
        }
        let source = self
            .source
            .as_mut()
            .ok_or(LifecycleError::NotReady("camera is not started"))?;
        let frame = source.next_frame().map_err(LifecycleError::CaptureFailed)?;
        if frame.is_empty() {
            return Err(LifecycleError::CaptureFailed(anyhow!(
                "camera returned an empty frame"
            )));
        }
        let png = frame.encode_png().map_err(LifecycleError::CaptureFailed)?;
        log::info!(
            "picture taken: {}x{} frame {} ({} bytes)",
            frame.width,
            frame.height,
            frame.sequence,
            png.len()
        );
        Ok(png)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            frames_classified: self.frames_classified,
            skipped_frames: self.skipped_frames,
            inference_failures: self.inference_failures,
            final_state: self.gate.state(),
        }
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn prediction_guard(&self) -> PredictionGuard {
        self.guard.clone()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn is_camera_started(&self) -> bool {
        self.source.is_some()
    }

    fn ensure_started(&self) -> Result<(), LifecycleError> {
        if self.classifier.is_none() {
            return Err(LifecycleError::NotReady("model is not loaded"));
        }
        if self.source.is_none() {
            return Err(LifecycleError::NotReady("camera is not started"));
        }
        Ok(())
    }

    fn skip(&mut self, reason: SkipReason) -> StepOutcome {
        self.skipped_frames += 1;
        StepOutcome::Skipped(reason)
    }

    fn log_health(&mut self) {
        let now = self.clock.now();
        if now.saturating_sub(self.last_health_log) < HEALTH_LOG_INTERVAL {
            return;
        }
        if let Some(source) = &self.source {
            let stats = source.stats();
            log::info!(
                "camera health={} frames={} classified={} skipped={} state={:?} origin={}",
                source.is_healthy(),
                stats.frames_captured,
                self.frames_classified,
                self.skipped_frames,
                self.gate.state(),
                stats.origin
            );
        }
        self.last_health_log = now;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
