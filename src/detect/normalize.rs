//! Detection normalization.
//!
//! Maps raw detections into the public record embedded in responses. All
//! integer conversions truncate toward zero — pixel-space box semantics,
//! not rounding.

use serde::Serialize;

use crate::detect::backend::RawDetection;

/// Public detection record.
///
/// Wire keys are fixed: `class`, `confidence`, `bbox` (x, y, width, height),
/// `classId`, `center`.
#[derive(Clone, Debug, Serialize)]
pub struct DetectionRecord {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub bbox: [i32; 4],
    #[serde(rename = "classId")]
    pub class_id: usize,
    pub center: [i32; 2],
}

/// Build a record from a raw detection.
///
/// Confidence is rounded to 3 decimal places; the class name is resolved by
/// indexing the model's class table. Callers preserve the adapter's emission
/// order — records are never re-sorted.
pub fn normalize(raw: &RawDetection, class_names: &[String]) -> DetectionRecord {
    let width = raw.x2 - raw.x1;
    let height = raw.y2 - raw.y1;
    let class_name = class_names.get(raw.class_id).cloned().unwrap_or_else(|| {
        log::warn!("class id {} outside class table", raw.class_id);
        format!("class_{}", raw.class_id)
    });

    DetectionRecord {
        class_name,
        confidence: round3(raw.score as f64),
        bbox: [raw.x1 as i32, raw.y1 as i32, width as i32, height as i32],
        class_id: raw.class_id,
        center: [
            ((raw.x1 + raw.x2) / 2.0) as i32,
            ((raw.y1 + raw.y2) / 2.0) as i32,
        ],
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
