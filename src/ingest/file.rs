//! Local file video opener.
//!
//! `FileOpener` picks a decoder by path:
//! - `stub://` paths produce a synthetic video (tests, demos)
//! - Local paths are decoded with FFmpeg (feature: ingest-file-ffmpeg)
//!
//! URL schemes are rejected; uploaded videos are always local temp files.

use anyhow::{anyhow, Result};
use std::f64::consts::PI;
use std::path::Path;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegDecoder;
use super::source::{VideoDecoder, VideoOpener};
use crate::frame::Frame;

/// Default opener for uploaded and local videos.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileOpener;

impl VideoOpener for FileOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoDecoder>> {
        let raw = path.to_string_lossy();
        if let Some(spec) = raw.strip_prefix("stub://") {
            let config = SyntheticConfig::parse(spec)?;
            return Ok(Box::new(SyntheticVideo::new(config)));
        }
        if !is_local_file_path(&raw) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if !path.is_file() {
            return Err(anyhow!("video file {} does not exist", path.display()));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Box::new(FfmpegDecoder::open(path)?))
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding video files requires the ingest-file-ffmpeg feature"
            ))
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

/// Parameters of a synthetic video, parsed from
/// `stub://name?frames=300&fps=30&width=64&height=48&freq=2&dropout=0`.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub frames: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Brightness oscillation frequency in Hz; 0 keeps every frame identical.
    pub freq: f64,
    /// Every `dropout`-th frame is black (no pose). 0 disables.
    pub dropout: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frames: 300,
            fps: 30.0,
            width: 64,
            height: 48,
            freq: 0.0,
            dropout: 0,
        }
    }
}

impl SyntheticConfig {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut cfg = Self::default();
        let Some((_, query)) = spec.split_once('?') else {
            return Ok(cfg);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("synthetic video parameter '{}' has no value", pair))?;
            let bad = || anyhow!("synthetic video parameter {} has invalid value '{}'", key, value);
            match key {
                "frames" => cfg.frames = value.parse().map_err(|_| bad())?,
                "fps" => cfg.fps = value.parse().map_err(|_| bad())?,
                "width" => cfg.width = value.parse().map_err(|_| bad())?,
                "height" => cfg.height = value.parse().map_err(|_| bad())?,
                "freq" => cfg.freq = value.parse().map_err(|_| bad())?,
                "dropout" => cfg.dropout = value.parse().map_err(|_| bad())?,
                other => return Err(anyhow!("unknown synthetic video parameter '{}'", other)),
            }
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(anyhow!("synthetic video dimensions must be non-zero"));
        }
        Ok(cfg)
    }
}

/// Synthetic video whose frame brightness oscillates at `freq` Hz.
pub struct SyntheticVideo {
    config: SyntheticConfig,
    next_index: u64,
}

impl SyntheticVideo {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            next_index: 0,
        }
    }

    fn intensity(&self, index: u64) -> u8 {
        let cfg = &self.config;
        if cfg.dropout > 0 && (index + 1) % cfg.dropout == 0 {
            return 0;
        }
        if cfg.freq <= 0.0 || cfg.fps <= 0.0 {
            return 128;
        }
        let t = index as f64 / cfg.fps;
        (128.0 + 80.0 * (2.0 * PI * cfg.freq * t).sin()).round() as u8
    }
}

impl VideoDecoder for SyntheticVideo {
    fn fps(&self) -> f64 {
        self.config.fps
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.config.frames)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.next_index >= self.config.frames {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        let value = self.intensity(index);
        let len = (self.config.width as usize) * (self.config.height as usize) * 3;
        let frame = Frame::new(index, self.config.width, self.config.height, vec![value; len])?;
        Ok(Some(frame))
    }
}
