//! Stub backend for testing and `stub://` model sources.

use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::{Device, DetectorBackend, RawDetection};
use crate::detect::coco;

/// Scripted backend. Every `infer` call returns the scripted detection
/// list, filtered by the requested threshold.
pub struct StubBackend {
    detections: Vec<RawDetection>,
    class_names: Vec<String>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            detections: Vec::new(),
            class_names: coco::class_table(),
        }
    }

    /// Script the detections returned by `infer` (before thresholding).
    pub fn with_detections(mut self, detections: Vec<RawDetection>) -> Self {
        self.detections = detections;
        self
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn infer(
        &mut self,
        _frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        // The scripted list has no native thresholding; filter here to keep
        // the inclusive-threshold contract.
        Ok(self
            .detections
            .iter()
            .copied()
            .filter(|det| det.score >= confidence_threshold)
            .collect())
    }
}
