#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, DetectionResult};

/// Tract-based backend for ONNX subject detectors.
///
/// The model takes a `1x1xHxW` grayscale tensor scaled to `0..1` and yields
/// rows of `[x, y, w, h, score]` with coordinates normalized to the input.
/// Rows scoring below `MIN_SCORE` are discarded.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
}

const MIN_SCORE: f32 = 0.5;

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 1, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, image: &GrayImage) -> Result<Tensor> {
        let (width, height) = image.dimensions();
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let raw = image.as_raw();
        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 1, height as usize, width),
            |(_, _, y, x)| raw[y * width + x] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }

    fn extract_boxes(&self, outputs: TVec<TValue>) -> Result<Vec<BoundingBox>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let values: Vec<f32> = rows.iter().cloned().collect();
        if values.len() % 5 != 0 {
            return Err(anyhow!(
                "model output has {} values, expected rows of 5",
                values.len()
            ));
        }

        let (fw, fh) = (self.width as f32, self.height as f32);
        Ok(values
            .chunks_exact(5)
            .filter(|row| row[4].is_finite() && row[4] >= MIN_SCORE)
            .map(|row| {
                BoundingBox::new(row[0] * fw, row[1] * fh, row[2] * fw, row[3] * fh)
                    .with_score(row[4])
            })
            .collect())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image: &GrayImage) -> Result<DetectionResult> {
        let input = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        Ok(DetectionResult::new(self.extract_boxes(outputs)?))
    }
}
