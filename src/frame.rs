//! Decoded video frames.
//!
//! A `Frame` is transient: it exists only while the video is traversed and is
//! dropped as soon as its landmarks have been extracted. Frame content is
//! never logged or written anywhere.

use anyhow::{anyhow, Result};

/// One decoded RGB24 image and its position in the video.
pub struct Frame {
    /// Zero-based ordinal of the frame within the video.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB24 pixel rows, `width * height * 3` bytes.
    pixels: Vec<u8>,
}

impl Frame {
    /// Build a frame, checking the pixel buffer against the dimensions.
    pub fn new(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = expected_rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame {} expected {} RGB bytes, received {}",
                index,
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            index,
            width,
            height,
            pixels,
        })
    }

    /// A frame with no pixels. Decoders may yield these for corrupt packets.
    pub fn empty(index: u64) -> Self {
        Self {
            index,
            width: 0,
            height: 0,
            pixels: Vec::new(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty() || self.width == 0 || self.height == 0
    }

    /// Mean intensity over all channels, in `0.0..=255.0`.
    pub fn mean_intensity(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.pixels.iter().map(|&p| p as u64).sum();
        sum as f32 / self.pixels.len() as f32
    }
}

fn expected_rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_pixel_buffer() {
        assert!(Frame::new(0, 4, 4, vec![0u8; 10]).is_err());
        assert!(Frame::new(0, 4, 4, vec![0u8; 48]).is_ok());
    }

    #[test]
    fn empty_frame_reports_empty() {
        let frame = Frame::empty(3);
        assert!(frame.is_empty());
        assert_eq!(frame.index, 3);
        assert_eq!(frame.mean_intensity(), 0.0);
    }

    #[test]
    fn mean_intensity_averages_channels() {
        let frame = Frame::new(0, 1, 2, vec![0, 0, 0, 255, 255, 255]).unwrap();
        assert!((frame.mean_intensity() - 127.5).abs() < 1e-4);
    }
}
