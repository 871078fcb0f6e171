//! Detector adapter boundary.
//!
//! The service treats detection as an opaque capability: given a raster and
//! a confidence threshold, a backend returns bounding boxes with class ids
//! and scores. Backends run in-process with full privileges; they must not
//! retain frames beyond a single `infer` call.

use anyhow::Result;
use image::RgbImage;

use crate::detect::annotate;

/// One raw detection in source-image pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
}

/// Compute device a backend runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detector backend trait.
///
/// `infer` returns only detections with `score >= confidence_threshold`
/// (inclusive lower bound). A backend whose underlying capability lacks
/// native thresholding must filter itself to preserve this contract.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Device tag reported in responses.
    fn device(&self) -> Device;

    /// Class table, indexed by contiguous class id.
    fn class_names(&self) -> &[String];

    /// Run detection on a frame. Emission order is preserved all the way to
    /// the wire; callers never re-sort.
    fn infer(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>>;

    /// Draw boxes and labels for the streaming path.
    ///
    /// Returns a new raster; the input frame stays untouched so fallback
    /// paths can still encode it when annotation fails.
    fn annotate(&self, frame: &RgbImage, detections: &[RawDetection]) -> Result<RgbImage> {
        Ok(annotate::draw_detections(frame, detections, self.class_names()))
    }
}
