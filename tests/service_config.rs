use std::sync::Mutex;

use tempfile::NamedTempFile;

use lookout::config::ServiceConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LOOKOUT_CONFIG",
        "LOOKOUT_MODEL",
        "LOOKOUT_MODEL_FALLBACK",
        "LOOKOUT_CAMERA_DEVICE",
        "LOOKOUT_CONFIDENCE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ServiceConfig::load().expect("load config");

    assert_eq!(cfg.model.source, "models/yolov8n.onnx");
    assert_eq!(cfg.model.fallback_source, "yolov8n.onnx");
    assert_eq!(cfg.camera.device_pattern, "/dev/video{index}");
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.camera.fps, 30);
    assert_eq!(cfg.camera.buffer_depth, 1);
    assert_eq!(cfg.default_confidence, 0.5);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "source": "models/custom.onnx",
            "fallback_source": "backup.onnx"
        },
        "camera": {
            "device_pattern": "stub://camera{index}",
            "width": 800,
            "height": 600,
            "fps": 15,
            "buffer_depth": 2
        },
        "confidence": 0.4
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("LOOKOUT_CONFIG", file.path());
    std::env::set_var("LOOKOUT_MODEL", "stub://coco");
    std::env::set_var("LOOKOUT_CONFIDENCE", "0.25");

    let cfg = ServiceConfig::load().expect("load config");

    // Env wins over file.
    assert_eq!(cfg.model.source, "stub://coco");
    assert_eq!(cfg.default_confidence, 0.25);
    // File wins over defaults.
    assert_eq!(cfg.model.fallback_source, "backup.onnx");
    assert_eq!(cfg.camera.device_pattern, "stub://camera{index}");
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.camera.fps, 15);
    assert_eq!(cfg.camera.buffer_depth, 2);

    clear_env();
}

#[test]
fn out_of_range_confidence_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LOOKOUT_CONFIDENCE", "1.5");
    let err = ServiceConfig::load().expect_err("confidence out of range");
    assert!(err.to_string().contains("confidence"));

    clear_env();
}

#[test]
fn device_pattern_resolves_capture_index() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ServiceConfig::load().expect("load config");
    assert_eq!(cfg.camera.device_path(0), "/dev/video0");
    assert_eq!(cfg.camera.device_path(2), "/dev/video2");

    clear_env();
}
