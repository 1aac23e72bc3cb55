use anyhow::{anyhow, Result};

use crate::pipeline::Sequence;

/// Sequence classifier backend.
///
/// Maps one fixed-length landmark sequence to a score per class. Scores may
/// be probabilities or raw logits; `SequencePrediction::from_scores`
/// normalizes them.
pub trait BehaviorClassifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class labels, in model output order.
    fn classes(&self) -> &[String];

    /// Score one sequence. Returns one value per class.
    fn predict(&mut self, sequence: &Sequence) -> Result<Vec<f32>>;
}

/// Classifier output for one sequence. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct SequencePrediction {
    window_index: usize,
    label: String,
    confidence: f32,
    probabilities: Vec<(String, f32)>,
}

impl SequencePrediction {
    /// Normalize scores and take the argmax. Ties go to the earliest class.
    pub fn from_scores(window_index: usize, classes: &[String], scores: &[f32]) -> Result<Self> {
        if classes.is_empty() {
            return Err(anyhow!("classifier has no classes"));
        }
        if scores.len() != classes.len() {
            return Err(anyhow!(
                "classifier returned {} scores for {} classes",
                scores.len(),
                classes.len()
            ));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(anyhow!("classifier returned non-finite scores"));
        }
        let probs = normalize_scores(scores);
        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }
        Ok(Self {
            window_index,
            label: classes[best].clone(),
            confidence: probs[best],
            probabilities: classes.iter().cloned().zip(probs).collect(),
        })
    }

    pub fn window_index(&self) -> usize {
        self.window_index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn probabilities(&self) -> &[(String, f32)] {
        &self.probabilities
    }

    pub fn probability_of(&self, label: &str) -> Option<f32> {
        self.probabilities
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }
}

/// Scores that already form a distribution pass through; anything else is
/// treated as logits and softmaxed.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    if in_range && (sum - 1.0).abs() < 1e-3 {
        return scores.to_vec();
    }
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Run a classifier on one sequence and build its prediction.
pub fn classify(
    classifier: &mut dyn BehaviorClassifier,
    sequence: &Sequence,
) -> Result<SequencePrediction> {
    let scores = classifier.predict(sequence)?;
    SequencePrediction::from_scores(sequence.index(), classifier.classes(), &scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        ["hand_flapping", "head_banging", "normal"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn picks_argmax_of_probabilities() {
        let p = SequencePrediction::from_scores(4, &classes(), &[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(p.window_index(), 4);
        assert_eq!(p.label(), "head_banging");
        assert!((p.confidence() - 0.7).abs() < 1e-6);
        assert_eq!(p.probability_of("normal"), Some(0.2));
        assert_eq!(p.probability_of("spinning"), None);
    }

    #[test]
    fn ties_go_to_first_class() {
        let p = SequencePrediction::from_scores(0, &classes(), &[0.4, 0.4, 0.2]).unwrap();
        assert_eq!(p.label(), "hand_flapping");
    }

    #[test]
    fn logits_are_softmaxed() {
        let p = SequencePrediction::from_scores(0, &classes(), &[2.0, 0.0, -1.0]).unwrap();
        let total: f32 = p.probabilities().iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(p.label(), "hand_flapping");
        assert!(p.confidence() > 0.8);
    }

    #[test]
    fn rejects_malformed_scores() {
        assert!(SequencePrediction::from_scores(0, &classes(), &[0.5, 0.5]).is_err());
        assert!(SequencePrediction::from_scores(0, &classes(), &[f32::NAN, 0.5, 0.5]).is_err());
        assert!(SequencePrediction::from_scores(0, &[], &[]).is_err());
    }
}
