//! Synthetic frame source.
//!
//! `SyntheticSource` stands in for a camera in tests and demos. The URL picks
//! the scene:
//!
//! - `stub://good`: high-detail checkerboard
//! - `stub://blurry`: smooth gradient with no edges
//! - `stub://dark`: underexposed noise
//! - `stub://off-center`: detail only along the left edge
//! - `stub://blank`: a stream that never delivers pixels (0x0 frames)
//! - `stub://denied`: camera permission refused at connect
//! - anything else (e.g. `stub://camera`): cycles good → blurry → dark → off-center
//!
//! Frames are generated as RGB24, like a typical UVC device, and normalized
//! to RGBA.

use anyhow::{anyhow, Result};
use rand::Rng;

use super::normalize::{normalize_to_rgba, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    Good,
    Blurry,
    Dark,
    OffCenter,
    Blank,
    Denied,
    Cycle,
}

const CYCLE: [Scene; 4] = [Scene::Good, Scene::Blurry, Scene::Dark, Scene::OffCenter];

impl Scene {
    pub fn from_url(url: &str) -> Self {
        match url.trim_start_matches("stub://").trim_end_matches('/') {
            "good" => Scene::Good,
            "blurry" => Scene::Blurry,
            "dark" => Scene::Dark,
            "off-center" | "off_center" => Scene::OffCenter,
            "blank" => Scene::Blank,
            "denied" => Scene::Denied,
            _ => Scene::Cycle,
        }
    }
}

pub struct SyntheticSource {
    url: String,
    scene: Scene,
    width: u32,
    height: u32,
    frames_per_scene: u64,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(scene: Scene, width: u32, height: u32) -> Self {
        Self {
            url: format!("stub://{:?}", scene).to_lowercase(),
            scene,
            width,
            height,
            frames_per_scene: 30,
            frame_count: 0,
            connected: false,
        }
    }

    pub fn from_url(url: &str, settings: &CameraSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(anyhow!("synthetic source needs a non-zero resolution"));
        }
        let mut source = Self::new(Scene::from_url(url), settings.width, settings.height);
        source.url = url.to_string();
        source.frames_per_scene = u64::from(settings.target_fps.max(1)) * 3;
        Ok(source)
    }

    /// How many frames each scene lasts when cycling.
    pub fn with_frames_per_scene(mut self, frames: u64) -> Self {
        self.frames_per_scene = frames.max(1);
        self
    }

    /// Scene the next frame will show.
    pub fn current_scene(&self) -> Scene {
        match self.scene {
            Scene::Cycle => {
                let slot = (self.frame_count / self.frames_per_scene) as usize % CYCLE.len();
                CYCLE[slot]
            }
            scene => scene,
        }
    }

    fn render_rgb(&self, scene: Scene) -> Vec<u8> {
        let (w, h) = (self.width, self.height);
        let mut rng = rand::thread_rng();
        let mut rgb = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let value = match scene {
                    Scene::Good => checker(x, y),
                    Scene::Blurry => 60 + (130 * x / w.max(1)) as u8,
                    Scene::Dark => 12,
                    Scene::OffCenter => {
                        if x < w / 5 {
                            checker(x, y)
                        } else {
                            128
                        }
                    }
                    Scene::Blank | Scene::Denied | Scene::Cycle => 0,
                };
                let noisy = match scene {
                    Scene::Good | Scene::Dark => {
                        (value as i16 + rng.gen_range(-6i16..=6)).clamp(0, 255) as u8
                    }
                    _ => value,
                };
                rgb.extend_from_slice(&[noisy, noisy, noisy]);
            }
        }
        rgb
    }
}

fn checker(x: u32, y: u32) -> u8 {
    if (x / 16 + y / 16) % 2 == 0 {
        40
    } else {
        220
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        if self.scene == Scene::Denied {
            return Err(anyhow!(
                "camera permission denied for {} (synthetic)",
                self.url
            ));
        }
        self.connected = true;
        log::info!("SyntheticSource: connected to {} ({}x{})", self.url, self.width, self.height);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("synthetic source {} not connected", self.url));
        }
        let scene = self.current_scene();
        self.frame_count += 1;

        if scene == Scene::Blank {
            return Ok(Frame::empty().with_sequence(self.frame_count));
        }
        let rgb = self.render_rgb(scene);
        let rgba = normalize_to_rgba(&rgb, self.width, self.height, PixelFormat::Rgb24)?;
        Ok(Frame::from_rgba(rgba, self.width, self.height)?.with_sequence(self.frame_count))
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.url.clone(),
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
    fn synthetic_source_produces_frames() -> Result<()> {
        let mut source = SyntheticSource::new(Scene::Good, 320, 240);
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.pixels().len(), 320 * 240 * 4);
        Ok(())
    }

    #[test]
    fn frames_require_connect() {
        let mut source = SyntheticSource::new(Scene::Good, 8, 8);
        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
    }

    #[test]
    fn denied_scene_fails_to_connect() {
        let mut source = SyntheticSource::new(Scene::Denied, 8, 8);
        let err = source.connect().err().expect("permission denied");
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn blank_scene_yields_empty_frames() -> Result<()> {
        let mut source = SyntheticSource::new(Scene::Blank, 8, 8);
        source.connect()?;
        assert!(source.next_frame()?.is_empty());
        Ok(())
    }

    #[test]
    fn cycle_moves_through_scenes() -> Result<()> {
        let mut source = SyntheticSource::new(Scene::Cycle, 8, 8).with_frames_per_scene(2);
        source.connect()?;
        let mut scenes = Vec::new();
        for _ in 0..8 {
            scenes.push(source.current_scene());
            source.next_frame()?;
        }
        assert_eq!(
            scenes,
            vec![
                Scene::Good,
                Scene::Good,
                Scene::Blurry,
                Scene::Blurry,
                Scene::Dark,
                Scene::Dark,
                Scene::OffCenter,
                Scene::OffCenter
            ]
        );
        assert_eq!(source.stats().frames_captured, 8);
        Ok(())
    }

    #[test]
    fn scene_urls_parse() {
        assert_eq!(Scene::from_url("stub://off-center"), Scene::OffCenter);
        assert_eq!(Scene::from_url("stub://camera"), Scene::Cycle);
    }
}
