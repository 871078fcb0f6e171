//! Command dispatchers.
//!
//! Each service reads one command payload, routes it to the matching
//! operation, and produces exactly one JSON response object. All typed
//! errors collapse into the `{success:false, error}` envelope here and
//! nowhere else; nothing escapes the command cycle.

use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;
use serde_json::{json, Value};

use crate::camera::CameraSession;
use crate::codec::{self, ImagePayload};
use crate::detect::{coco, normalize, DetectionRecord, ModelState};
use crate::error::ServiceError;
use crate::protocol::{failure, DetectionResponse, FrameResponse, Request};

const DEFAULT_CONFIDENCE: f64 = 0.5;

// ----------------------------------------------------------------------------
// Still-image service
// ----------------------------------------------------------------------------

/// Single-shot detection on a supplied still image.
///
/// Actions: `detect` (default), `info`, `classes`.
pub struct DetectService {
    model: ModelState,
    default_confidence: f64,
}

impl DetectService {
    pub fn new(model: ModelState) -> Self {
        Self {
            model,
            default_confidence: DEFAULT_CONFIDENCE,
        }
    }

    /// Override the threshold applied when a command omits `confidence`.
    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence;
        self
    }

    /// Process one raw command payload into exactly one response object.
    pub fn handle(&mut self, input: &[u8]) -> Value {
        let trimmed = input.trim_ascii();
        if trimmed.is_empty() {
            return failure(&ServiceError::EmptyInput);
        }
        match std::str::from_utf8(trimmed) {
            Ok(text) => match serde_json::from_str::<Request>(text) {
                Ok(request) => self.route(request),
                // Not a JSON command: treat the whole blob as image data.
                Err(_) => self.detect(ImagePayload::Text(text), self.default_confidence),
            },
            // Binary payload: raw image bytes.
            Err(_) => self.detect(ImagePayload::Bytes(trimmed), self.default_confidence),
        }
    }

    fn route(&mut self, request: Request) -> Value {
        let action = request.action.as_deref().unwrap_or("detect");
        let confidence = request.confidence.unwrap_or(self.default_confidence);
        match action {
            "detect" => self.detect(ImagePayload::Text(&request.image_data), confidence),
            "info" => self.model_summary(),
            "classes" => self.classes(),
            other => failure(&ServiceError::UnknownAction(other.to_string())),
        }
    }

    fn detect(&mut self, payload: ImagePayload<'_>, confidence: f64) -> Value {
        let (backend, label) = match &mut self.model {
            ModelState::Ready { backend, label } => (backend, label),
            // No camera-streaming fallback on this variant: the request
            // strictly requires the model, so it fails whole.
            ModelState::Unavailable { label, .. } => {
                return json!({
                    "success": false,
                    "error": ServiceError::ModelUnavailable.to_string(),
                    "model": label.clone(),
                });
            }
        };

        let image = match codec::decode_payload(&payload) {
            Ok(image) => image,
            // Decode failures carry no model/device fields.
            Err(err) => return failure(&err),
        };

        let raw = match backend.infer(&image, confidence as f32) {
            Ok(raw) => raw,
            Err(err) => {
                log::error!("inference failed: {err:#}");
                return json!({
                    "success": false,
                    "error": format!("{err:#}"),
                    "model": label.clone(),
                });
            }
        };

        let detections: Vec<DetectionRecord> = raw
            .iter()
            .map(|det| normalize(det, backend.class_names()))
            .collect();
        let response = DetectionResponse {
            success: true,
            num_detections: detections.len(),
            detections,
            model: label.clone(),
            device: backend.device().as_str(),
            confidence_threshold: confidence,
            image_size: [image.width(), image.height()],
        };
        to_value(&response)
    }

    fn model_summary(&self) -> Value {
        json!({
            "success": true,
            "model": self.model.label(),
            "device": self.model.device_str(),
            "classes": self.model.class_names(),
            "num_classes": self.model.class_names().len(),
            "model_loaded": self.model.is_loaded(),
        })
    }

    fn classes(&self) -> Value {
        json!({
            "success": true,
            "classes": self.model.class_names(),
            "num_classes": self.model.class_names().len(),
            "description": coco::COCO_DESCRIPTION,
        })
    }
}

// ----------------------------------------------------------------------------
// Camera service
// ----------------------------------------------------------------------------

/// Live camera detection service.
///
/// Actions: `start_camera`, `stop_camera`, `get_frame`, `camera_info`,
/// `model_info`, `info` (default).
pub struct CameraService {
    model: ModelState,
    session: CameraSession,
    model_source: String,
    default_confidence: f64,
}

impl CameraService {
    pub fn new(model: ModelState, session: CameraSession, model_source: String) -> Self {
        Self {
            model,
            session,
            model_source,
            default_confidence: DEFAULT_CONFIDENCE,
        }
    }

    /// Override the threshold applied when a command omits `confidence`.
    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence;
        self
    }

    /// Process one raw command payload into exactly one response object.
    pub fn handle(&mut self, input: &[u8]) -> Value {
        let trimmed = input.trim_ascii();
        if trimmed.is_empty() {
            return failure(&ServiceError::EmptyInput);
        }
        // Unparseable input falls back to a plain `info` request.
        let request = std::str::from_utf8(trimmed)
            .ok()
            .and_then(|text| serde_json::from_str::<Request>(text).ok())
            .unwrap_or_default();

        let action = request.action.as_deref().unwrap_or("info");
        let confidence = request.confidence.unwrap_or(self.default_confidence);
        match action {
            "start_camera" => self.start_camera(request.camera_index),
            "stop_camera" => self.stop_camera(),
            "get_frame" => self.get_frame(confidence),
            "camera_info" => json!({"success": true, "camera_info": self.session.info()}),
            "model_info" => json!({"success": true, "model_info": self.model_info()}),
            "info" => self.info(),
            other => failure(&ServiceError::UnknownAction(other.to_string())),
        }
    }

    fn start_camera(&mut self, index: u32) -> Value {
        match self.session.start(index) {
            Ok(()) => json!({
                "success": true,
                "message": "Camera started",
                "model_info": self.model_info(),
            }),
            Err(err) => {
                log::warn!("{err}");
                json!({
                    "success": false,
                    "message": "Failed to start camera",
                    "model_info": self.model_info(),
                })
            }
        }
    }

    fn stop_camera(&mut self) -> Value {
        self.session.stop();
        json!({"success": true, "message": "Camera stopped"})
    }

    fn get_frame(&mut self, confidence: f64) -> Value {
        let Some(frame) = self.session.pull_frame() else {
            return failure(&ServiceError::FrameRead);
        };
        match self.frame_response(frame, confidence) {
            Ok(response) => to_value(&response),
            Err(err) => failure(&err),
        }
    }

    /// Build the frame response, degrading explicitly instead of failing:
    /// no model → plain frame with no detections; inference failure → plain
    /// frame, empty detections, error recorded; annotation failure → plain
    /// frame but the detections stand.
    fn frame_response(
        &mut self,
        frame: RgbImage,
        confidence: f64,
    ) -> Result<FrameResponse, ServiceError> {
        let timestamp = unix_timestamp()?;

        let (backend, label) = match &mut self.model {
            ModelState::Ready { backend, label } => (backend, label),
            ModelState::Unavailable { .. } => {
                let encoded = codec::encode_jpeg(&frame)?;
                return Ok(FrameResponse {
                    success: true,
                    frame: codec::to_base64(&encoded),
                    detections: Vec::new(),
                    timestamp,
                    model: "Fallback Mode".to_string(),
                    device: "Unknown".to_string(),
                    error: None,
                });
            }
        };

        match backend.infer(&frame, confidence as f32) {
            Ok(raw) => {
                let detections: Vec<DetectionRecord> = raw
                    .iter()
                    .map(|det| normalize(det, backend.class_names()))
                    .collect();
                let (encoded, error) = match backend.annotate(&frame, &raw) {
                    Ok(annotated) => (codec::encode_jpeg(&annotated)?, None),
                    Err(err) => {
                        log::warn!("annotation failed: {err:#}");
                        (codec::encode_jpeg(&frame)?, Some(format!("{err:#}")))
                    }
                };
                Ok(FrameResponse {
                    success: true,
                    frame: codec::to_base64(&encoded),
                    detections,
                    timestamp,
                    model: label.clone(),
                    device: backend.device().to_string(),
                    error,
                })
            }
            Err(err) => {
                log::warn!("frame inference failed: {err:#}");
                let encoded = codec::encode_jpeg(&frame)?;
                Ok(FrameResponse {
                    success: true,
                    frame: codec::to_base64(&encoded),
                    detections: Vec::new(),
                    timestamp,
                    model: format!("{label} (Error)"),
                    device: backend.device().to_string(),
                    error: Some(format!("{err:#}")),
                })
            }
        }
    }

    fn model_info(&self) -> Value {
        json!({
            "model_loaded": self.model.is_loaded(),
            "device": self.model.device_str(),
            "classes": self.model.class_names(),
            "num_classes": self.model.class_names().len(),
            "model_path": self.model_source,
        })
    }

    fn info(&self) -> Value {
        json!({
            "success": true,
            "model": self.model.label(),
            "device": self.model.device_str(),
            "classes": self.model.class_names(),
            "num_classes": self.model.class_names().len(),
            "model_loaded": self.model.is_loaded(),
            "model_info": self.model_info(),
        })
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn unix_timestamp() -> Result<f64, ServiceError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .map_err(|err| ServiceError::Internal(err.to_string()))
}

fn to_value<T: serde::Serialize>(response: &T) -> Value {
    serde_json::to_value(response)
        .unwrap_or_else(|err| failure(&ServiceError::Internal(err.to_string())))
}
