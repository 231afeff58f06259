use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::gate::DEFAULT_GRACE_PERIOD;

const DEFAULT_DEVICE: &str = "stub://camera";
const DEFAULT_FPS: u32 = 15;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_MODEL_PATH: &str = "models/frame_quality.onnx";

#[derive(Debug, Deserialize, Default)]
struct GateConfigFile {
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    gate: Option<GateSectionFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct GateSectionFile {
    grace_secs: Option<f64>,
}

/// Which classifier backend stage one loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// ONNX model via tract (feature `backend-tract`).
    Tract,
    /// Model-free luminance/sharpness heuristic.
    Cpu,
    /// Always reports good quality.
    Stub,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tract" | "onnx" => Ok(BackendKind::Tract),
            "cpu" => Ok(BackendKind::Cpu),
            "stub" => Ok(BackendKind::Stub),
            other => Err(anyhow!(
                "unknown backend '{}' (expected tract, cpu or stub)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub grace: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// `stub://<scene>`, a directory of still images, or a V4L2 device node.
    pub device: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: BackendKind,
    pub path: PathBuf,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings {
                device: DEFAULT_DEVICE.to_string(),
                target_fps: DEFAULT_FPS,
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            },
            model: ModelSettings {
                backend: BackendKind::Cpu,
                path: PathBuf::from(DEFAULT_MODEL_PATH),
            },
            grace: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl GateConfig {
    /// Defaults, then the file named by `CAPTURE_GATE_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAPTURE_GATE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file instead of the env lookup.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => GateConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GateConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let camera = file.camera.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let backend = match model.backend {
            Some(name) => name.parse()?,
            None => defaults.model.backend,
        };
        let grace = match file.gate.and_then(|gate| gate.grace_secs) {
            Some(secs) => parse_grace(secs)?,
            None => defaults.grace,
        };
        Ok(Self {
            camera: CameraSettings {
                device: camera.device.unwrap_or(defaults.camera.device),
                target_fps: camera.target_fps.unwrap_or(defaults.camera.target_fps),
                width: camera.width.unwrap_or(defaults.camera.width),
                height: camera.height.unwrap_or(defaults.camera.height),
            },
            model: ModelSettings {
                backend,
                path: model.path.unwrap_or(defaults.model.path),
            },
            grace,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("CAPTURE_GATE_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(backend) = std::env::var("CAPTURE_GATE_BACKEND") {
            if !backend.trim().is_empty() {
                self.model.backend = backend.parse()?;
            }
        }
        if let Ok(path) = std::env::var("CAPTURE_GATE_MODEL") {
            if !path.trim().is_empty() {
                self.model.path = PathBuf::from(path);
            }
        }
        if let Ok(fps) = std::env::var("CAPTURE_GATE_FPS") {
            self.camera.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAPTURE_GATE_FPS must be a whole number of frames"))?;
        }
        if let Ok(grace) = std::env::var("CAPTURE_GATE_GRACE_SECS") {
            let secs: f64 = grace
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAPTURE_GATE_GRACE_SECS must be a number of seconds"))?;
            self.grace = parse_grace(secs)?;
        }
        Ok(())
    }

    /// Check invariants. Also run after CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero (got {}x{})",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero"));
        }
        if self.grace.is_zero() {
            return Err(anyhow!("grace period must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_grace(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("grace period must be a non-negative number of seconds"))
}

fn read_config_file(path: &Path) -> Result<GateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() -> Result<()> {
        let cfg = GateConfig::default();
        cfg.validate()?;
        assert_eq!(cfg.grace, Duration::from_secs(20));
        assert_eq!(cfg.model.backend, BackendKind::Cpu);
        Ok(())
    }

    #[test]
    fn backend_names_parse() -> Result<()> {
        assert_eq!("ONNX".parse::<BackendKind>()?, BackendKind::Tract);
        assert_eq!(" cpu ".parse::<BackendKind>()?, BackendKind::Cpu);
        assert!("gpu".parse::<BackendKind>().is_err());
        Ok(())
    }

    #[test]
    fn file_sections_fill_missing_fields_with_defaults() -> Result<()> {
        let file: GateConfigFile = serde_json::from_str(
            r#"{ "camera": { "target_fps": 30 }, "gate": { "grace_secs": 7.5 } }"#,
        )?;
        let cfg = GateConfig::from_file(file)?;
        assert_eq!(cfg.camera.target_fps, 30);
        assert_eq!(cfg.camera.device, DEFAULT_DEVICE);
        assert_eq!(cfg.grace, Duration::from_millis(7500));
        Ok(())
    }

    #[test]
    fn validation_rejects_zero_grace_and_fps() {
        let mut cfg = GateConfig::default();
        cfg.grace = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = GateConfig::default();
        cfg.camera.target_fps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_grace_is_rejected() {
        assert!(parse_grace(-1.0).is_err());
    }
}
