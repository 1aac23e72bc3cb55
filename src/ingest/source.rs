//! Degradation-tolerant frame stream over a video decoder.
//!
//! `FrameSource` never fails a request:
//! - An unopenable video becomes an empty stream at the default frame rate
//! - A non-positive frame rate is replaced with the default
//! - Decode failures are tolerated until `max_consecutive_read_failures`
//!   happen back to back, then the stream ends with what was already read
//!
//! The decoder is owned by the source and released as soon as the stream
//! ends, or on drop for every other exit path.

use anyhow::Result;
use std::path::Path;

use crate::config::DetectorConfig;
use crate::frame::Frame;

/// Sequential frame decoder for one video.
pub trait VideoDecoder: Send {
    /// Frame rate reported by the container. May be zero or garbage.
    fn fps(&self) -> f64;

    /// Frame count reported by the container, if known.
    fn frame_count(&self) -> Option<u64>;

    /// Decode the next frame.
    ///
    /// `Ok(None)` marks the end of the video; `Err` is a transient read
    /// failure and the caller may try again.
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

/// Opens decoders for video paths.
pub trait VideoOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoDecoder>>;
}

/// Statistics for one traversal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSourceStats {
    pub frames_read: u64,
    pub read_failures: u64,
    pub open_failed: bool,
    pub ended_early: bool,
}

pub struct FrameSource {
    decoder: Option<Box<dyn VideoDecoder>>,
    label: String,
    fps: f64,
    frame_count: Option<u64>,
    max_consecutive_failures: u32,
    max_frames: Option<u64>,
    consecutive_failures: u32,
    stats: FrameSourceStats,
}

impl FrameSource {
    /// Open `path` through `opener`. Open failures yield an empty source.
    pub fn open(opener: &dyn VideoOpener, path: &Path, cfg: &DetectorConfig) -> Self {
        let label = path.display().to_string();
        match opener.open(path) {
            Ok(decoder) => Self::from_decoder(decoder, label, cfg),
            Err(err) => {
                log::error!("cannot open video {}: {:#}", label, err);
                Self {
                    decoder: None,
                    label,
                    fps: cfg.default_fps,
                    frame_count: Some(0),
                    max_consecutive_failures: cfg.max_consecutive_read_failures,
                    max_frames: cfg.max_frames,
                    consecutive_failures: 0,
                    stats: FrameSourceStats {
                        open_failed: true,
                        ..FrameSourceStats::default()
                    },
                }
            }
        }
    }

    pub fn from_decoder(
        decoder: Box<dyn VideoDecoder>,
        label: impl Into<String>,
        cfg: &DetectorConfig,
    ) -> Self {
        let label = label.into();
        let reported = decoder.fps();
        let fps = if reported.is_finite() && reported > 0.0 {
            reported
        } else {
            log::warn!(
                "video {} reports invalid fps ({}), using default {}",
                label,
                reported,
                cfg.default_fps
            );
            cfg.default_fps
        };
        let frame_count = decoder.frame_count();
        log::debug!(
            "opened video {} (fps {:.2}, frames {:?})",
            label,
            fps,
            frame_count
        );
        Self {
            decoder: Some(decoder),
            label,
            fps,
            frame_count,
            max_consecutive_failures: cfg.max_consecutive_read_failures,
            max_frames: cfg.max_frames,
            consecutive_failures: 0,
            stats: FrameSourceStats::default(),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Container frame count, falling back to frames read so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.unwrap_or(self.stats.frames_read)
    }

    pub fn stats(&self) -> &FrameSourceStats {
        &self.stats
    }

    /// Next decoded frame, or `None` once the stream has ended.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some(max) = self.max_frames {
                if self.stats.frames_read >= max {
                    self.release();
                    return None;
                }
            }
            let decoder = self.decoder.as_mut()?;
            match decoder.read_frame() {
                Ok(Some(frame)) => {
                    self.consecutive_failures = 0;
                    self.stats.frames_read += 1;
                    return Some(frame);
                }
                Ok(None) => {
                    self.release();
                    return None;
                }
                Err(err) => {
                    self.consecutive_failures += 1;
                    self.stats.read_failures += 1;
                    log::warn!(
                        "frame read failed for {} ({}/{}): {:#}",
                        self.label,
                        self.consecutive_failures,
                        self.max_consecutive_failures,
                        err
                    );
                    if self.consecutive_failures >= self.max_consecutive_failures {
                        log::warn!(
                            "giving up on {} after {} consecutive read failures ({} frames read)",
                            self.label,
                            self.consecutive_failures,
                            self.stats.frames_read
                        );
                        self.stats.ended_early = true;
                        self.release();
                        return None;
                    }
                }
            }
        }
    }

    fn release(&mut self) {
        if self.decoder.take().is_some() {
            log::debug!("released video decoder for {}", self.label);
        }
    }
}

impl Iterator for FrameSource {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.next_frame()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Scripted decoder: `Some(true)` yields a frame, `Some(false)` fails.
    struct ScriptedDecoder {
        fps: f64,
        script: Vec<bool>,
        pos: usize,
        released: Arc<AtomicBool>,
    }

    impl ScriptedDecoder {
        fn new(fps: f64, script: Vec<bool>) -> (Self, Arc<AtomicBool>) {
            let released = Arc::new(AtomicBool::new(false));
            (
                Self {
                    fps,
                    script,
                    pos: 0,
                    released: released.clone(),
                },
                released,
            )
        }
    }

    impl VideoDecoder for ScriptedDecoder {
        fn fps(&self) -> f64 {
            self.fps
        }

        fn frame_count(&self) -> Option<u64> {
            None
        }

        fn read_frame(&mut self) -> Result<Option<Frame>> {
            let Some(ok) = self.script.get(self.pos).copied() else {
                return Ok(None);
            };
            self.pos += 1;
            if ok {
                Ok(Some(Frame::new(self.pos as u64, 1, 1, vec![1, 2, 3])?))
            } else {
                Err(anyhow!("corrupt packet"))
            }
        }
    }

    impl Drop for ScriptedDecoder {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct FailingOpener;

    impl VideoOpener for FailingOpener {
        fn open(&self, _path: &Path) -> Result<Box<dyn VideoDecoder>> {
            Err(anyhow!("unreadable"))
        }
    }

    #[test]
    fn open_failure_yields_empty_stream_with_default_fps() {
        let cfg = DetectorConfig::default();
        let mut source = FrameSource::open(&FailingOpener, Path::new("broken.mp4"), &cfg);
        assert!(source.next_frame().is_none());
        assert_eq!(source.fps(), 30.0);
        assert_eq!(source.frame_count(), 0);
        assert!(source.stats().open_failed);
    }

    #[test]
    fn non_positive_fps_uses_default() {
        let cfg = DetectorConfig::default();
        let (decoder, _) = ScriptedDecoder::new(0.0, vec![true]);
        let source = FrameSource::from_decoder(Box::new(decoder), "zero-fps", &cfg);
        assert_eq!(source.fps(), 30.0);

        let (decoder, _) = ScriptedDecoder::new(f64::NAN, vec![true]);
        let source = FrameSource::from_decoder(Box::new(decoder), "nan-fps", &cfg);
        assert_eq!(source.fps(), 30.0);
    }

    #[test]
    fn transient_failures_are_skipped() {
        let cfg = DetectorConfig::default();
        let script = vec![true, false, false, true, false, true];
        let (decoder, _) = ScriptedDecoder::new(25.0, script);
        let source = FrameSource::from_decoder(Box::new(decoder), "flaky", &cfg);
        let frames: Vec<Frame> = source.collect();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn stream_ends_after_consecutive_failure_limit() {
        let cfg = DetectorConfig::default();
        let mut script = vec![true, true];
        script.extend(std::iter::repeat(false).take(10));
        script.push(true);
        let (decoder, released) = ScriptedDecoder::new(25.0, script);
        let mut source = FrameSource::from_decoder(Box::new(decoder), "dying", &cfg);
        let mut count = 0;
        while source.next_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(source.stats().ended_early);
        assert_eq!(source.stats().read_failures, 10);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn decoder_released_on_early_drop() {
        let cfg = DetectorConfig::default();
        let (decoder, released) = ScriptedDecoder::new(25.0, vec![true; 50]);
        let mut source = FrameSource::from_decoder(Box::new(decoder), "dropped", &cfg);
        assert!(source.next_frame().is_some());
        assert!(!released.load(Ordering::SeqCst));
        drop(source);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn max_frames_caps_the_stream() {
        let cfg = DetectorConfig {
            max_frames: Some(4),
            ..DetectorConfig::default()
        };
        let (decoder, released) = ScriptedDecoder::new(25.0, vec![true; 50]);
        let source = FrameSource::from_decoder(Box::new(decoder), "capped", &cfg);
        assert_eq!(source.count(), 4);
        assert!(released.load(Ordering::SeqCst));
    }
}
