#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::PoseBackend;
use crate::frame::Frame;
use crate::landmarks::LANDMARK_VECTOR_LEN;

/// Presence scores below this mean no person is in the frame.
const MIN_POSE_PRESENCE: f32 = 0.5;

/// Tract-based pose backend for ONNX landmark models.
///
/// The model takes a `1x3xSxS` RGB tensor in `0..1` and returns the 33
/// keypoints as `x, y, z, visibility`, optionally followed by a pose
/// presence score. It does not perform any network I/O or write to disk
/// beyond model loading.
pub struct TractPoseBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
}

impl TractPoseBackend {
    /// Load an ONNX pose model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| {
                format!("failed to load pose model from {}", model_path.display())
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize pose model")?
            .into_runnable()
            .context("failed to build runnable pose model")?;

        Ok(Self {
            model,
            input_size,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let rgb = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = image::imageops::resize(
            &rgb,
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );
        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn parse_output(&self, outputs: TVec<TValue>) -> Result<Option<Vec<f32>>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("pose model produced no outputs"))?;
        let values = output
            .to_array_view::<f32>()
            .context("pose model output tensor was not f32")?;
        let values: Vec<f32> = values.iter().copied().collect();
        if values.len() < LANDMARK_VECTOR_LEN {
            return Err(anyhow!(
                "pose model produced {} values, expected at least {}",
                values.len(),
                LANDMARK_VECTOR_LEN
            ));
        }
        if let Some(presence) = values.get(LANDMARK_VECTOR_LEN) {
            if *presence < MIN_POSE_PRESENCE {
                return Ok(None);
            }
        }
        Ok(Some(values[..LANDMARK_VECTOR_LEN].to_vec()))
    }
}

impl PoseBackend for TractPoseBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<Vec<f32>>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("pose inference failed")?;
        self.parse_output(outputs)
    }
}
