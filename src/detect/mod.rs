//! Detection capability: adapter boundary, backends, model loading, and
//! normalization into the public record shape.

mod annotate;
mod backend;
mod backends;
pub mod coco;
mod loader;
mod normalize;

pub use annotate::draw_detections;
pub use backend::{Device, DetectorBackend, RawDetection};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use loader::{load_with_fallback, DefaultModelProvider, ModelProvider, ModelState};
pub use normalize::{normalize, DetectionRecord};
