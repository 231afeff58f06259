//! Still-image frame source.
//!
//! This module provides `StillImageSource`, which replays a local directory of
//! JPEG/PNG images as a camera stream (sorted by file name, looping). It is
//! useful for checking a model against a known set of captures.
//!
//! The still-image source MUST NOT:
//! - Fetch remote URLs
//! - Write decoded frames back to disk

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct StillImageSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl StillImageSource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: Vec::new(),
            cursor: 0,
            frame_count: 0,
            last_error: None,
        }
    }

    /// Number of images found at connect.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

impl FrameSource for StillImageSource {
    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("open image directory {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("list image directory {}", self.dir.display()))?
                .path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no JPEG or PNG images in {}", self.dir.display()));
        }
        files.sort();
        self.files = files;
        self.cursor = 0;
        self.last_error = None;
        log::info!(
            "StillImageSource: connected to {} ({} images)",
            self.dir.display(),
            self.files.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.files.is_empty() {
            return Err(anyhow!("image directory {} not connected", self.dir.display()));
        }
        let path = &self.files[self.cursor % self.files.len()];
        self.cursor = (self.cursor + 1) % self.files.len();

        let decoded = image::open(path)
            .with_context(|| format!("decode {}", path.display()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?
            .to_rgba8();
        self.frame_count += 1;
        self.last_error = None;

        let (width, height) = decoded.dimensions();
        Ok(Frame::from_rgba(decoded.into_raw(), width, height)?.with_sequence(self.frame_count))
    }

    fn is_healthy(&self) -> bool {
        !self.files.is_empty() && self.last_error.is_none()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.dir.display().to_string(),
        }
    }
}
