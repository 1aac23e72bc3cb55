//! Fixed-length sequence windowing.
//!
//! The landmark stream is cut into non-overlapping windows of exactly
//! `sequence_length` vectors. A trailing partial window is dropped and never
//! classified.

use anyhow::{anyhow, Result};

use crate::landmarks::LandmarkVector;

/// Exactly `sequence_length` consecutive landmark vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    index: usize,
    frames: Vec<LandmarkVector>,
}

impl Sequence {
    /// Build a sequence, enforcing its length.
    pub fn new(index: usize, frames: Vec<LandmarkVector>, sequence_length: usize) -> Result<Self> {
        if frames.len() != sequence_length || sequence_length == 0 {
            return Err(anyhow!(
                "sequence {} has {} frames, expected {}",
                index,
                frames.len(),
                sequence_length
            ));
        }
        Ok(Self { index, frames })
    }

    /// Ordinal of this window within the video.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[LandmarkVector] {
        &self.frames
    }

    /// Row-major `[len, 132]` copy for model input.
    pub fn flatten(&self) -> Vec<f32> {
        self.frames
            .iter()
            .flat_map(|v| v.as_slice().iter().copied())
            .collect()
    }

    /// Fraction of frames with a detected pose.
    pub fn pose_coverage(&self) -> f32 {
        let detected = self.frames.iter().filter(|v| !v.is_zero()).count();
        detected as f32 / self.frames.len() as f32
    }
}

/// Incremental, non-overlapping windower.
pub struct SequenceWindower {
    sequence_length: usize,
    pending: Vec<LandmarkVector>,
    emitted: usize,
}

impl SequenceWindower {
    pub fn new(sequence_length: usize) -> Result<Self> {
        if sequence_length == 0 {
            return Err(anyhow!("sequence_length must be at least 1"));
        }
        Ok(Self {
            sequence_length,
            pending: Vec::with_capacity(sequence_length),
            emitted: 0,
        })
    }

    /// Add one vector; returns a sequence each time a window fills.
    pub fn push(&mut self, vector: LandmarkVector) -> Option<Sequence> {
        self.pending.push(vector);
        if self.pending.len() < self.sequence_length {
            return None;
        }
        let frames = std::mem::replace(&mut self.pending, Vec::with_capacity(self.sequence_length));
        let sequence = Sequence {
            index: self.emitted,
            frames,
        };
        self.emitted += 1;
        Some(sequence)
    }

    /// Vectors in the unfinished window; these are dropped at end of stream.
    pub fn dropped(&self) -> usize {
        self.pending.len()
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Window a complete stream at once.
    pub fn windows<I>(sequence_length: usize, vectors: I) -> Result<Vec<Sequence>>
    where
        I: IntoIterator<Item = LandmarkVector>,
    {
        let mut windower = Self::new(sequence_length)?;
        let sequences: Vec<Sequence> = vectors
            .into_iter()
            .filter_map(|v| windower.push(v))
            .collect();
        if windower.dropped() > 0 {
            log::debug!(
                "dropped {} trailing frames shorter than a {}-frame window",
                windower.dropped(),
                sequence_length
            );
        }
        Ok(sequences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(n: usize) -> Vec<LandmarkVector> {
        (0..n).map(|_| LandmarkVector::zeros()).collect()
    }

    #[test]
    fn drops_trailing_partial_window() {
        let sequences = SequenceWindower::windows(30, stream(95)).unwrap();
        assert_eq!(sequences.len(), 3);
        assert!(sequences.iter().all(|s| s.len() == 30));
        assert_eq!(
            sequences.iter().map(|s| s.index()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn ten_seconds_at_thirty_fps_is_ten_windows() {
        let sequences = SequenceWindower::windows(30, stream(300)).unwrap();
        assert_eq!(sequences.len(), 10);
    }

    #[test]
    fn short_stream_yields_nothing() {
        let mut windower = SequenceWindower::new(30).unwrap();
        for v in stream(29) {
            assert!(windower.push(v).is_none());
        }
        assert_eq!(windower.dropped(), 29);
        assert_eq!(windower.emitted(), 0);
    }

    #[test]
    fn rejects_zero_length() {
        assert!(SequenceWindower::new(0).is_err());
        assert!(Sequence::new(0, stream(3), 4).is_err());
        assert!(Sequence::new(0, stream(4), 4).is_ok());
    }

    #[test]
    fn flatten_and_coverage() {
        let mut frames = stream(3);
        frames[1] = LandmarkVector::from_slice(&[0.5; 132]).unwrap();
        let seq = Sequence::new(0, frames, 3).unwrap();
        assert_eq!(seq.flatten().len(), 3 * 132);
        assert!((seq.pose_coverage() - 1.0 / 3.0).abs() < 1e-6);
    }
}
