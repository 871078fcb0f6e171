//! lookout: a stateful object-detection service exposed over stdio.
//!
//! One JSON command object is read from stdin per process invocation;
//! exactly one JSON response object is written to stdout; diagnostics go to
//! stderr so the response channel stays a single parseable object.
//!
//! # Module structure
//!
//! - `codec`: image payload decode/encode (base64, data-URI, JPEG)
//! - `detect`: detector backends, model loading, detection normalization
//! - `camera`: capture devices and the camera session state machine
//! - `protocol` / `dispatch`: wire types and the command dispatchers
//! - `config`: file + environment configuration
//! - `error`: the typed error taxonomy behind the wire envelope

pub mod camera;
pub mod codec;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod protocol;

pub use camera::{CameraInfo, CameraSession, CaptureDevice, DefaultDeviceProvider, DeviceProvider};
pub use config::{CaptureSettings, ModelSettings, ServiceConfig};
pub use detect::{
    load_with_fallback, DefaultModelProvider, DetectionRecord, DetectorBackend, Device,
    ModelProvider, ModelState, RawDetection, StubBackend,
};
pub use dispatch::{CameraService, DetectService};
pub use error::ServiceError;
