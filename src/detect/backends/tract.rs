#![cfg(feature = "backend-tract")]

//! Tract-based ONNX detection backend.
//!
//! Loads a local YOLO-family model and performs inference on RGB frames.
//! No network I/O; the model file is the only disk access. Output layout is
//! `[1, 4 + num_classes, N]`: box center/size rows followed by per-class
//! scores, decoded with class-aware non-maximum suppression.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::{Device, DetectorBackend, RawDetection};
use crate::detect::coco;

const INPUT_WIDTH: u32 = 640;
const INPUT_HEIGHT: u32 = 640;
const IOU_THRESHOLD: f32 = 0.45;

pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    class_names: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            class_names: coco::class_table(),
        })
    }

    fn build_input(&self, frame: &RgbImage) -> Tensor {
        let resized = imageops::resize(
            frame,
            INPUT_WIDTH,
            INPUT_HEIGHT,
            imageops::FilterType::Triangle,
        );
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        frame_width: u32,
        frame_height: u32,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[1] < 5 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let num_classes = shape[1] - 4;
        let candidates = shape[2];
        let scale_x = frame_width as f32 / INPUT_WIDTH as f32;
        let scale_y = frame_height as f32 / INPUT_HEIGHT as f32;

        let mut detections = Vec::new();
        for i in 0..candidates {
            let mut best_class = 0usize;
            let mut best_score = 0.0f32;
            for class_idx in 0..num_classes {
                let score = view[[0, 4 + class_idx, i]];
                if score > best_score {
                    best_score = score;
                    best_class = class_idx;
                }
            }
            // Inclusive lower bound.
            if best_score < confidence_threshold {
                continue;
            }
            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];
            if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
                continue;
            }
            detections.push(RawDetection {
                x1: (cx - w / 2.0) * scale_x,
                y1: (cy - h / 2.0) * scale_y,
                x2: (cx + w / 2.0) * scale_x,
                y2: (cy + h / 2.0) * scale_y,
                score: best_score,
                class_id: best_class,
            });
        }

        Ok(non_max_suppress(detections, IOU_THRESHOLD))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn infer(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs, frame.width(), frame.height(), confidence_threshold)
    }
}

/// Greedy class-aware NMS: highest score wins, overlapping same-class boxes
/// above the IoU threshold are dropped.
fn non_max_suppress(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut keep: Vec<RawDetection> = Vec::new();
    'candidates: for det in detections {
        for kept in &keep {
            if kept.class_id == det.class_id && iou(kept, &det) > iou_threshold {
                continue 'candidates;
            }
        }
        keep.push(det);
    }
    keep
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
