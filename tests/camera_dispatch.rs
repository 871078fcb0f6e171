use anyhow::anyhow;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::RgbImage;
use serde_json::{json, Value};

use lookout::camera::{CameraSession, ScriptedDevice, ScriptedDeviceProvider};
use lookout::detect::{ModelState, RawDetection, StubBackend};
use lookout::{CameraService, CaptureSettings};

fn frame() -> RgbImage {
    RgbImage::from_fn(32, 24, |x, y| image::Rgb([x as u8 * 7, y as u8 * 9, 50]))
}

fn det(score: f32, class_id: usize) -> RawDetection {
    RawDetection {
        x1: 4.0,
        y1: 4.0,
        x2: 20.0,
        y2: 16.0,
        score,
        class_id,
    }
}

fn ready_model(detections: Vec<RawDetection>) -> ModelState {
    ModelState::Ready {
        backend: Box::new(StubBackend::new().with_detections(detections)),
        label: "stub".to_string(),
    }
}

fn service_with(
    model: ModelState,
    devices: Vec<anyhow::Result<ScriptedDevice>>,
) -> CameraService {
    let session = CameraSession::new(
        Box::new(ScriptedDeviceProvider::new(devices)),
        CaptureSettings::default(),
    );
    CameraService::new(model, session, "models/yolov8n.onnx".to_string())
}

fn handle(service: &mut CameraService, input: &str) -> Value {
    service.handle(input.as_bytes())
}

#[test]
fn empty_input_yields_protocol_error() {
    let mut service = service_with(ready_model(vec![]), vec![]);
    let response = service.handle(b"");
    assert_eq!(
        response,
        json!({"success": false, "error": "No input data provided"})
    );
}

#[test]
fn unknown_action_is_rejected() {
    let mut service = service_with(ready_model(vec![]), vec![]);
    let response = handle(&mut service, r#"{"action": "foo"}"#);
    assert_eq!(
        response,
        json!({"success": false, "error": "Unknown action: foo"})
    );
}

#[test]
fn unparseable_input_falls_back_to_info() {
    let mut service = service_with(ready_model(vec![]), vec![]);
    let response = handle(&mut service, "this is not json");
    assert_eq!(response["success"], json!(true));
    assert_eq!(response["model_loaded"], json!(true));
    assert_eq!(response["model"], json!("stub"));
}

#[test]
fn start_camera_reports_model_info() {
    let mut service = service_with(
        ready_model(vec![]),
        vec![Ok(ScriptedDevice::new(vec![Some(frame())]))],
    );
    let response = handle(&mut service, r#"{"action": "start_camera", "camera_index": 0}"#);

    assert_eq!(response["success"], json!(true));
    assert_eq!(response["message"], json!("Camera started"));
    assert_eq!(response["model_info"]["model_loaded"], json!(true));
    assert_eq!(response["model_info"]["num_classes"], json!(80));
    assert_eq!(
        response["model_info"]["model_path"],
        json!("models/yolov8n.onnx")
    );
}

#[test]
fn failed_open_reports_failure_message() {
    let mut service = service_with(ready_model(vec![]), vec![Err(anyhow!("device busy"))]);
    let response = handle(&mut service, r#"{"action": "start_camera"}"#);

    assert_eq!(response["success"], json!(false));
    assert_eq!(response["message"], json!("Failed to start camera"));
    assert_eq!(response["model_info"]["model_loaded"], json!(true));
}

#[test]
fn stop_camera_is_always_successful() {
    let mut service = service_with(ready_model(vec![]), vec![]);
    // Stopping a never-started session is a no-op, not an error.
    let response = handle(&mut service, r#"{"action": "stop_camera"}"#);
    assert_eq!(
        response,
        json!({"success": true, "message": "Camera stopped"})
    );
}

#[test]
fn get_frame_before_start_fails() {
    let mut service = service_with(ready_model(vec![]), vec![]);
    let response = handle(&mut service, r#"{"action": "get_frame"}"#);
    assert_eq!(
        response,
        json!({"success": false, "error": "Could not get frame"})
    );
}

#[test]
fn get_frame_returns_encoded_frame_and_detections() {
    let mut service = service_with(
        ready_model(vec![det(0.9, 2)]),
        vec![Ok(ScriptedDevice::new(vec![Some(frame())]))],
    );
    handle(&mut service, r#"{"action": "start_camera"}"#);
    let response = handle(&mut service, r#"{"action": "get_frame", "confidence": 0.5}"#);

    assert_eq!(response["success"], json!(true));
    assert_eq!(response["model"], json!("stub"));
    assert_eq!(response["device"], json!("cpu"));
    assert!(response["timestamp"].as_f64().expect("timestamp") > 0.0);
    assert!(response.get("error").is_none());

    let detections = response["detections"].as_array().expect("detections");
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["class"], json!("car"));

    // The frame is transportable base64 of a real image with the capture
    // dimensions intact.
    let encoded = response["frame"].as_str().expect("frame string");
    let bytes = BASE64.decode(encoded).expect("valid base64");
    let decoded = image::load_from_memory(&bytes).expect("valid image");
    assert_eq!(decoded.width(), 32);
    assert_eq!(decoded.height(), 24);
}

#[test]
fn frame_read_failure_is_reported_without_stopping() {
    let mut service = service_with(
        ready_model(vec![]),
        vec![Ok(ScriptedDevice::new(vec![None, Some(frame())]))],
    );
    handle(&mut service, r#"{"action": "start_camera"}"#);

    let response = handle(&mut service, r#"{"action": "get_frame"}"#);
    assert_eq!(
        response,
        json!({"success": false, "error": "Could not get frame"})
    );

    // The session survived the transient failure; the next pull succeeds.
    let response = handle(&mut service, r#"{"action": "get_frame"}"#);
    assert_eq!(response["success"], json!(true));
}

#[test]
fn degraded_model_serves_frames_without_detections() {
    let model = ModelState::Unavailable {
        label: "yolov8n".to_string(),
        reason: "file not found".to_string(),
    };
    let mut service = service_with(model, vec![Ok(ScriptedDevice::new(vec![Some(frame())]))]);
    handle(&mut service, r#"{"action": "start_camera"}"#);
    let response = handle(&mut service, r#"{"action": "get_frame"}"#);

    assert_eq!(response["success"], json!(true));
    assert_eq!(response["model"], json!("Fallback Mode"));
    assert_eq!(response["device"], json!("Unknown"));
    assert_eq!(response["detections"], json!([]));
    assert!(response["frame"].as_str().is_some());
}

#[test]
fn camera_info_tracks_session_state() {
    let mut service = service_with(
        ready_model(vec![]),
        vec![Ok(ScriptedDevice::new(vec![Some(frame())]))],
    );

    let response = handle(&mut service, r#"{"action": "camera_info"}"#);
    assert_eq!(response["camera_info"], json!({"available": false}));

    handle(&mut service, r#"{"action": "start_camera"}"#);
    let response = handle(&mut service, r#"{"action": "camera_info"}"#);
    assert_eq!(
        response["camera_info"],
        json!({"available": true, "width": 640, "height": 480, "fps": 30})
    );
}

#[test]
fn model_info_wraps_the_model_object() {
    let mut service = service_with(ready_model(vec![]), vec![]);
    let response = handle(&mut service, r#"{"action": "model_info"}"#);

    assert_eq!(response["success"], json!(true));
    let info = &response["model_info"];
    assert_eq!(info["model_loaded"], json!(true));
    assert_eq!(info["device"], json!("cpu"));
    assert_eq!(
        info["num_classes"].as_u64().expect("num_classes"),
        info["classes"].as_array().expect("classes").len() as u64
    );
}

#[test]
fn info_is_the_default_action() {
    let mut service = service_with(ready_model(vec![]), vec![]);
    let response = handle(&mut service, r#"{"confidence": 0.7}"#);
    assert_eq!(response["success"], json!(true));
    assert_eq!(response["model"], json!("stub"));
    assert_eq!(response["model_info"]["model_loaded"], json!(true));
}
