//! Frame ingestion sources.
//!
//! This module provides the camera stream providers behind `FrameSource`:
//! - Synthetic scenes (`stub://<scene>`, testing and demos)
//! - Directories of still images (replayed in a loop)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! All sources produce RGBA `Frame` instances, one per call. The ingestion
//! layer is responsible for:
//! - Normalizing device pixel formats to RGBA
//! - Reporting permission and availability problems from `connect`
//!
//! The ingestion layer MUST NOT:
//! - Store frames to disk
//! - Retain frames after handing them to the caller

mod normalize;
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::config::CameraSettings;
use crate::frame::Frame;

pub use still::StillImageSource;
pub use synthetic::{Scene, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// A camera stream provider.
pub trait FrameSource {
    /// Acquire the stream. Permission or availability failures surface here.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub origin: String,
}

/// Build the source named by `settings.device`. The source is not connected yet.
///
/// - `stub://...` → synthetic scenes
/// - `/dev/...` → V4L2 device (requires ingest-v4l2)
/// - anything else → directory of still images
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    let device = settings.device.trim();
    if device.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::from_url(device, settings)?));
    }
    if device.contains("://") {
        return Err(anyhow!(
            "camera device '{}' is not supported (use stub://, a /dev node, or a local directory)",
            device
        ));
    }
    if device.starts_with("/dev/") {
        return open_device(device, settings);
    }
    Ok(Box::new(StillImageSource::new(Path::new(device))))
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(device: &str, settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(V4l2Config {
        device: device.to_string(),
        target_fps: settings.target_fps,
        width: settings.width,
        height: settings.height,
    })))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(device: &str, _settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        device
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(device: &str) -> CameraSettings {
        CameraSettings {
            device: device.to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn stub_urls_open_synthetic_sources() -> Result<()> {
        let mut source = open_source(&settings("stub://dark"))?;
        source.connect()?;
        let frame = source.next_frame()?;
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(source.stats().origin, "stub://dark");
        Ok(())
    }

    #[test]
    fn remote_urls_are_rejected() {
        assert!(open_source(&settings("rtsp://camera-1")).is_err());
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn device_nodes_need_v4l2_feature() {
        assert!(open_source(&settings("/dev/video0")).is_err());
    }
}
