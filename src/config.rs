//! Service configuration.
//!
//! A JSON config file (named by `LOOKOUT_CONFIG` or `--config`) provides
//! defaults; `LOOKOUT_*` environment variables override it; the merged
//! result is validated once at startup.

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

const DEFAULT_MODEL_SOURCE: &str = "models/yolov8n.onnx";
const DEFAULT_FALLBACK_SOURCE: &str = "yolov8n.onnx";
const DEFAULT_DEVICE_PATTERN: &str = "/dev/video{index}";
const DEFAULT_CONFIDENCE: f64 = 0.5;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_BUFFER_DEPTH: u32 = 1;

#[derive(Debug, Deserialize, Default)]
struct ServiceConfigFile {
    model: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    source: Option<String>,
    fallback_source: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device_pattern: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    buffer_depth: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub model: ModelSettings,
    pub camera: CaptureSettings,
    pub default_confidence: f64,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Primary model source: a file path or `stub://` scheme.
    pub source: String,
    /// Default source tried exactly once when the primary fails.
    pub fallback_source: String,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Device path pattern; `{index}` is replaced with the capture index.
    pub device_pattern: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Capture buffer depth. 1 favors freshness over completeness.
    pub buffer_depth: u32,
}

impl CaptureSettings {
    /// Resolve the device path for a capture index.
    pub fn device_path(&self, index: u32) -> String {
        self.device_pattern.replace("{index}", &index.to_string())
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_pattern: DEFAULT_DEVICE_PATTERN.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            buffer_depth: DEFAULT_BUFFER_DEPTH,
        }
    }
}

impl ServiceConfig {
    /// Load from the `LOOKOUT_CONFIG` file (if set) plus env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LOOKOUT_CONFIG").ok();
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit config path plus env overrides.
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(Path::new(path))?,
            None => ServiceConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ServiceConfigFile) -> Self {
        let model = ModelSettings {
            source: file
                .model
                .as_ref()
                .and_then(|model| model.source.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_SOURCE.to_string()),
            fallback_source: file
                .model
                .and_then(|model| model.fallback_source)
                .unwrap_or_else(|| DEFAULT_FALLBACK_SOURCE.to_string()),
        };
        let camera = CaptureSettings {
            device_pattern: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device_pattern.clone())
                .unwrap_or_else(|| DEFAULT_DEVICE_PATTERN.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_HEIGHT),
            fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.fps)
                .unwrap_or(DEFAULT_FPS),
            buffer_depth: file
                .camera
                .and_then(|camera| camera.buffer_depth)
                .unwrap_or(DEFAULT_BUFFER_DEPTH),
        };
        Self {
            model,
            camera,
            default_confidence: file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("LOOKOUT_MODEL") {
            if !source.trim().is_empty() {
                self.model.source = source;
            }
        }
        if let Ok(source) = std::env::var("LOOKOUT_MODEL_FALLBACK") {
            if !source.trim().is_empty() {
                self.model.fallback_source = source;
            }
        }
        if let Ok(pattern) = std::env::var("LOOKOUT_CAMERA_DEVICE") {
            if !pattern.trim().is_empty() {
                self.camera.device_pattern = pattern;
            }
        }
        if let Ok(confidence) = std::env::var("LOOKOUT_CONFIDENCE") {
            let value: f64 = confidence
                .parse()
                .map_err(|_| anyhow!("LOOKOUT_CONFIDENCE must be a number"))?;
            self.default_confidence = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.source.trim().is_empty() {
            return Err(anyhow!("model source must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(anyhow!("confidence must be within 0.0..=1.0"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }
        if self.camera.fps == 0 {
            return Err(anyhow!("camera fps must be greater than zero"));
        }
        if self.camera.buffer_depth == 0 {
            return Err(anyhow!("camera buffer depth must be at least 1"));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_file(ServiceConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<ServiceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
