use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::gate::{GateVerdict, DEFAULT_BUTTON_LABEL};

// ----------------------------------------------------------------------------
// CaptureSurface: the user-visible outputs
// ----------------------------------------------------------------------------

/// The three observable outputs: overlay text, capture button enabled state,
/// and capture button label.
pub trait CaptureSurface {
    fn set_overlay(&mut self, text: Option<&str>);
    fn set_capture_enabled(&mut self, enabled: bool);
    fn set_button_label(&mut self, label: &str);

    /// Called once after a full update has been applied.
    fn flush(&mut self) {}
}

/// Apply a gate verdict to a surface.
pub fn render_verdict<S: CaptureSurface + ?Sized>(surface: &mut S, verdict: &GateVerdict) {
    surface.set_overlay(verdict.overlay);
    surface.set_capture_enabled(verdict.capture_enabled);
    surface.set_button_label(verdict.button_label);
    surface.flush();
}

/// Show a fatal message. Capture stays disabled; nothing clears it.
pub fn render_fatal<S: CaptureSurface + ?Sized>(surface: &mut S, message: &str) {
    surface.set_overlay(Some(message));
    surface.set_capture_enabled(false);
    surface.flush();
}

/// In-memory surface. Tests and the demo inspect it after a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingSurface {
    pub overlay: Option<String>,
    pub capture_enabled: bool,
    pub button_label: String,
    /// Number of calls that changed something.
    pub changes: u64,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            overlay: None,
            capture_enabled: true,
            button_label: DEFAULT_BUTTON_LABEL.to_string(),
            changes: 0,
        }
    }
}

impl CaptureSurface for RecordingSurface {
    fn set_overlay(&mut self, text: Option<&str>) {
        if self.overlay.as_deref() != text {
            self.overlay = text.map(str::to_string);
            self.changes += 1;
        }
    }

    fn set_capture_enabled(&mut self, enabled: bool) {
        if self.capture_enabled != enabled {
            self.capture_enabled = enabled;
            self.changes += 1;
        }
    }

    fn set_button_label(&mut self, label: &str) {
        if self.button_label != label {
            self.button_label = label.to_string();
            self.changes += 1;
        }
    }
}

/// Logs the surface state whenever it changes.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    state: RecordingSurface,
    reported_changes: u64,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RecordingSurface {
        &self.state
    }

    fn report(&mut self) {
        if self.state.changes == self.reported_changes {
            return;
        }
        self.reported_changes = self.state.changes;
        let button = if self.state.capture_enabled {
            "enabled"
        } else {
            "disabled"
        };
        match &self.state.overlay {
            Some(text) => log::info!("[{}: {}] {}", self.state.button_label, button, text),
            None => log::info!("[{}: {}]", self.state.button_label, button),
        }
    }
}

impl CaptureSurface for TerminalSurface {
    fn set_overlay(&mut self, text: Option<&str>) {
        self.state.set_overlay(text);
    }

    fn set_capture_enabled(&mut self, enabled: bool) {
        self.state.set_capture_enabled(enabled);
    }

    fn set_button_label(&mut self, label: &str) {
        self.state.set_button_label(label);
    }

    fn flush(&mut self) {
        self.report();
    }
}

// ----------------------------------------------------------------------------
// Ui: lifecycle stage reporting
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

/// Reports a stage as finished (✔) or failed (✘) when dropped.
pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!("{} {} ({})", mark, self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
