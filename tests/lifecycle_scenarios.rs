use anyhow::{anyhow, Result};
use std::time::Duration;

use capture_gate::classify::{CpuBackend, StubBackend, StubOutcome};
use capture_gate::config::CameraSettings;
use capture_gate::gate::{OVERRIDE_BUTTON_LABEL, PROCEED_MESSAGE};
use capture_gate::ingest::{Scene, SyntheticSource};
use capture_gate::lifecycle::{CAMERA_ACCESS_MESSAGE, MODEL_LOAD_MESSAGE};
use capture_gate::{
    open_source, Clock, FixedTicks, GateState, Lifecycle, LifecycleError, ManualClock, QualityLabel,
    RecordingSurface, SimulatedTicks, DEFAULT_GRACE_PERIOD,
};

/// Surface state after one tick: (seconds, capture enabled, overlay).
type Timeline = Vec<(u64, bool, Option<String>)>;

fn lifecycle_with(
    backend: StubBackend,
    clock: &ManualClock,
) -> Result<Lifecycle<RecordingSurface>> {
    let mut lifecycle = Lifecycle::new(
        RecordingSurface::new(),
        Box::new(clock.clone()),
        DEFAULT_GRACE_PERIOD,
    );
    lifecycle.load_model(|| Ok(Box::new(backend)))?;
    lifecycle.start_camera(|| Ok(Box::new(SyntheticSource::new(Scene::Good, 32, 24))))?;
    Ok(lifecycle)
}

fn run_timeline(
    lifecycle: &mut Lifecycle<RecordingSurface>,
    clock: &ManualClock,
    step: Duration,
    ticks: u64,
) -> Result<Timeline> {
    let mut timeline = Vec::new();
    let mut scheduler = SimulatedTicks::new(clock.clone(), step, ticks);
    lifecycle.run_with(&mut scheduler, |lifecycle| {
        let surface = lifecycle.surface();
        timeline.push((
            clock.now().as_secs(),
            surface.capture_enabled,
            surface.overlay.clone(),
        ));
    })?;
    Ok(timeline)
}

#[test]
fn good_frame_after_blurry_streak_re_enables_capture() -> Result<()> {
    let clock = ManualClock::new();
    let backend = StubBackend::labels([
        QualityLabel::Blurry,
        QualityLabel::Blurry,
        QualityLabel::GoodQuality,
    ]);
    let mut lifecycle = lifecycle_with(backend, &clock)?;

    let timeline = run_timeline(&mut lifecycle, &clock, Duration::from_secs(5), 3)?;
    let enabled: Vec<(u64, bool)> = timeline.iter().map(|(t, on, _)| (*t, *on)).collect();
    assert_eq!(enabled, vec![(0, false), (5, false), (10, true)]);
    assert_eq!(timeline[2].2, None);
    assert_eq!(lifecycle.gate().poor_quality_since(), None);
    Ok(())
}

#[test]
fn continuous_dark_frames_unblock_after_grace_period() -> Result<()> {
    let clock = ManualClock::new();
    let mut lifecycle = lifecycle_with(StubBackend::constant(QualityLabel::TooDark), &clock)?;

    let timeline = run_timeline(&mut lifecycle, &clock, Duration::from_secs(1), 26)?;
    assert_eq!(timeline.len(), 26);
    for (t, enabled, overlay) in &timeline {
        if *t < 20 {
            assert!(!enabled, "capture should be blocked at t={t}");
            assert_ne!(overlay.as_deref(), Some(PROCEED_MESSAGE));
        } else {
            assert!(enabled, "capture should be allowed at t={t}");
            assert_eq!(overlay.as_deref(), Some(PROCEED_MESSAGE));
        }
    }
    assert_eq!(lifecycle.surface().button_label, OVERRIDE_BUTTON_LABEL);
    assert_eq!(lifecycle.gate().state(), GateState::PoorTimedOut);
    Ok(())
}

#[test]
fn inference_failure_does_not_stop_the_loop() -> Result<()> {
    let clock = ManualClock::new();
    let backend = StubBackend::new(vec![
        StubOutcome::Label(QualityLabel::Blurry),
        StubOutcome::Fail("backend crashed".to_string()),
        StubOutcome::Scores(vec![0.1, 0.2]),
        StubOutcome::Label(QualityLabel::Blurry),
        StubOutcome::Label(QualityLabel::GoodQuality),
    ]);
    let mut lifecycle = lifecycle_with(backend, &clock)?;

    let timeline = run_timeline(&mut lifecycle, &clock, Duration::from_secs(2), 5)?;
    let enabled: Vec<bool> = timeline.iter().map(|(_, on, _)| *on).collect();
    assert_eq!(enabled, vec![false, false, false, false, true]);

    let summary = lifecycle.summary();
    assert_eq!(summary.ticks, 5);
    assert_eq!(summary.frames_classified, 3);
    assert_eq!(summary.inference_failures, 2);
    assert_eq!(summary.skipped_frames, 2);
    assert_eq!(summary.final_state, GateState::Good);
    Ok(())
}

#[test]
fn skipped_frame_keeps_streak_start() -> Result<()> {
    let clock = ManualClock::new();
    let backend = StubBackend::new(vec![
        StubOutcome::Label(QualityLabel::PoorFraming),
        StubOutcome::Fail("timeout".to_string()),
        StubOutcome::Label(QualityLabel::PoorFraming),
    ]);
    let mut lifecycle = lifecycle_with(backend, &clock)?;

    run_timeline(&mut lifecycle, &clock, Duration::from_secs(10), 3)?;
    // Streak began at t=0, so t=20 reaches the grace period.
    assert_eq!(lifecycle.gate().poor_quality_since(), Some(Duration::ZERO));
    assert_eq!(lifecycle.gate().state(), GateState::PoorTimedOut);
    Ok(())
}

#[test]
fn model_load_failure_never_starts_camera() {
    let mut lifecycle = Lifecycle::new(
        RecordingSurface::new(),
        Box::new(ManualClock::new()),
        DEFAULT_GRACE_PERIOD,
    );

    let err = lifecycle
        .load_model(|| Err(anyhow!("models/frame_quality.onnx: no such file")))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ModelLoadFailure(_)));
    assert!(err.is_fatal());
    assert!(err.to_string().starts_with("MODEL_LOAD_FAILURE"));

    let mut opened = false;
    let err = lifecycle
        .start_camera(|| {
            opened = true;
            Ok(Box::new(SyntheticSource::new(Scene::Good, 8, 8)))
        })
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotReady(_)));
    assert!(!opened);

    let surface = lifecycle.surface();
    assert_eq!(surface.overlay.as_deref(), Some(MODEL_LOAD_MESSAGE));
    assert!(!surface.capture_enabled);
    assert!(matches!(
        lifecycle.run(&mut FixedTicks::new(3)),
        Err(LifecycleError::NotReady(_))
    ));
}

#[test]
fn denied_camera_is_fatal() -> Result<()> {
    let mut lifecycle = Lifecycle::new(
        RecordingSurface::new(),
        Box::new(ManualClock::new()),
        DEFAULT_GRACE_PERIOD,
    );
    lifecycle.load_model(|| Ok(Box::new(StubBackend::default())))?;

    let settings = CameraSettings {
        device: "stub://denied".to_string(),
        target_fps: 15,
        width: 64,
        height: 48,
    };
    let err = lifecycle
        .start_camera(|| open_source(&settings))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CameraAccessFailure(_)));
    assert!(err.to_string().contains("permission denied"));

    assert_eq!(
        lifecycle.surface().overlay.as_deref(),
        Some(CAMERA_ACCESS_MESSAGE)
    );
    assert!(!lifecycle.surface().capture_enabled);
    assert!(!lifecycle.is_camera_started());
    assert!(matches!(
        lifecycle.take_picture(),
        Err(LifecycleError::NotReady(_))
    ));
    Ok(())
}

#[test]
fn only_one_prediction_loop_runs() -> Result<()> {
    let clock = ManualClock::new();
    let mut lifecycle = lifecycle_with(StubBackend::default(), &clock)?;
    let guard = lifecycle.prediction_guard();

    let mut running_during_loop = Vec::new();
    lifecycle.run_with(&mut FixedTicks::new(2), |_| {
        running_during_loop.push(guard.is_running());
    })?;
    assert_eq!(running_during_loop, vec![true, true]);
    assert!(!guard.is_running());

    let _lease = guard.try_acquire().expect("guard is free after the loop");
    assert!(matches!(
        lifecycle.run(&mut FixedTicks::new(1)),
        Err(LifecycleError::LoopAlreadyRunning)
    ));
    Ok(())
}

#[test]
fn take_picture_follows_gate() -> Result<()> {
    let clock = ManualClock::new();
    let backend = StubBackend::labels([QualityLabel::TooDark]);
    let mut lifecycle = lifecycle_with(backend, &clock)?;

    let mut attempts = Vec::new();
    let mut scheduler = SimulatedTicks::new(clock.clone(), Duration::from_secs(10), 3);
    lifecycle.run_with(&mut scheduler, |lifecycle| {
        attempts.push(match lifecycle.take_picture() {
            Ok(png) => Ok(png.len()),
            Err(err) => Err(err.code()),
        });
    })?;

    assert_eq!(attempts[0], Err("CAPTURE_BLOCKED"));
    assert_eq!(attempts[1], Err("CAPTURE_BLOCKED"));
    assert!(matches!(attempts[2], Ok(len) if len > 0));
    Ok(())
}

#[test]
fn cpu_backend_labels_synthetic_scenes() -> Result<()> {
    let cases = [
        (Scene::Good, QualityLabel::GoodQuality),
        (Scene::Blurry, QualityLabel::Blurry),
        (Scene::Dark, QualityLabel::TooDark),
        (Scene::OffCenter, QualityLabel::PoorFraming),
    ];
    for (scene, expected) in cases {
        let mut lifecycle = Lifecycle::new(
            RecordingSurface::new(),
            Box::new(ManualClock::new()),
            DEFAULT_GRACE_PERIOD,
        );
        lifecycle.load_model(|| Ok(Box::new(CpuBackend::new())))?;
        lifecycle.start_camera(|| Ok(Box::new(SyntheticSource::new(scene, 224, 224))))?;
        lifecycle.run(&mut FixedTicks::new(1))?;
        assert_eq!(
            lifecycle.gate().last_label(),
            Some(expected),
            "scene {:?}",
            scene
        );
    }
    Ok(())
}

#[test]
fn blank_frames_are_skipped() -> Result<()> {
    let mut lifecycle = Lifecycle::new(
        RecordingSurface::new(),
        Box::new(ManualClock::new()),
        DEFAULT_GRACE_PERIOD,
    );
    lifecycle.load_model(|| Ok(Box::new(StubBackend::constant(QualityLabel::Blurry))))?;
    lifecycle.start_camera(|| Ok(Box::new(SyntheticSource::new(Scene::Blank, 8, 8))))?;

    let summary = lifecycle.run(&mut FixedTicks::new(4))?;
    assert_eq!(summary.skipped_frames, 4);
    assert_eq!(summary.frames_classified, 0);
    assert_eq!(summary.final_state, GateState::Good);
    assert!(lifecycle.surface().capture_enabled);
    Ok(())
}
