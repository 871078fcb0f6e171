//! Wire types for the stdin/stdout command protocol.
//!
//! One JSON command object in, exactly one JSON response object out. Every
//! response carries a boolean `success` discriminator; failure envelopes
//! carry a human-readable `error` string.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::detect::DetectionRecord;
use crate::error::ServiceError;

/// One parsed command. Unrecognized fields are ignored; recognized fields
/// fall back to their defaults when absent (the confidence default comes
/// from service configuration).
#[derive(Debug, Default, Deserialize)]
pub struct Request {
    pub action: Option<String>,
    #[serde(default)]
    pub image_data: String,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub camera_index: u32,
}

/// Successful still-image detection response.
#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub detections: Vec<DetectionRecord>,
    pub model: String,
    pub device: &'static str,
    pub confidence_threshold: f64,
    pub image_size: [u32; 2],
    pub num_detections: usize,
}

/// Successful camera frame response. `error` appears only when a degraded
/// path produced the frame.
#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub success: bool,
    pub frame: String,
    pub detections: Vec<DetectionRecord>,
    pub timestamp: f64,
    pub model: String,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The `{success:false, error}` envelope.
pub fn failure(error: &ServiceError) -> Value {
    json!({"success": false, "error": error.to_string()})
}
