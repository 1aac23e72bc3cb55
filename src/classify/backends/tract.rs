#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::classifier::BehaviorClassifier;
use crate::classify::labels::LabelEncoder;
use crate::landmarks::LANDMARK_VECTOR_LEN;
use crate::pipeline::Sequence;

/// Tract-based sequence classifier for ONNX models.
///
/// The model takes a `1 x sequence_length x 132` tensor and returns one score
/// per label-encoder class.
pub struct TractClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: LabelEncoder,
    sequence_length: usize,
}

impl TractClassifier {
    /// Load an ONNX classifier from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        labels: LabelEncoder,
        sequence_length: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| {
                format!("failed to load classifier model from {}", model_path.display())
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, sequence_length, LANDMARK_VECTOR_LEN),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize classifier model")?
            .into_runnable()
            .context("failed to build runnable classifier model")?;

        Ok(Self {
            model,
            labels,
            sequence_length,
        })
    }
}

impl BehaviorClassifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classes(&self) -> &[String] {
        self.labels.classes()
    }

    fn predict(&mut self, sequence: &Sequence) -> Result<Vec<f32>> {
        if sequence.len() != self.sequence_length {
            return Err(anyhow!(
                "sequence has {} frames, model expects {}",
                sequence.len(),
                self.sequence_length
            ));
        }
        let input = tract_ndarray::Array3::from_shape_vec(
            (1, self.sequence_length, LANDMARK_VECTOR_LEN),
            sequence.flatten(),
        )
        .context("failed to shape classifier input")?;
        let outputs = self
            .model
            .run(tvec!(input.into_tensor().into()))
            .context("classifier inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("classifier produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("classifier output tensor was not f32")?;
        Ok(scores.iter().copied().collect())
    }
}
