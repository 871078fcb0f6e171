//! Model acquisition with bounded fallback.
//!
//! Loading happens once, eagerly, at service construction. A failed primary
//! acquisition gets exactly one fallback attempt before the process enters
//! degraded (model unavailable) mode; it never terminates for a load
//! failure.

use std::path::Path;

use anyhow::Result;

use crate::config::ModelSettings;
use crate::detect::backend::{Device, DetectorBackend};
use crate::detect::backends::StubBackend;

/// Provider abstraction over model acquisition, so the retry policy is
/// testable with scripted failures.
pub trait ModelProvider {
    fn acquire(&self, source: &str) -> Result<Box<dyn DetectorBackend>>;
}

/// Maps `stub://` sources to the scripted backend and model file paths to
/// the tract backend (feature `backend-tract`).
pub struct DefaultModelProvider;

impl ModelProvider for DefaultModelProvider {
    fn acquire(&self, source: &str) -> Result<Box<dyn DetectorBackend>> {
        if source.starts_with("stub://") {
            return Ok(Box::new(StubBackend::new()));
        }
        #[cfg(feature = "backend-tract")]
        {
            Ok(Box::new(crate::detect::backends::TractBackend::new(
                source,
            )?))
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            Err(anyhow::anyhow!(
                "model source {source} requires the backend-tract feature"
            ))
        }
    }
}

/// Detection capability state, fixed for the life of the process.
pub enum ModelState {
    Ready {
        backend: Box<dyn DetectorBackend>,
        label: String,
    },
    Unavailable {
        label: String,
        reason: String,
    },
}

impl ModelState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Ready { .. })
    }

    /// Model identifier reported in responses, loaded or not.
    pub fn label(&self) -> &str {
        match self {
            ModelState::Ready { label, .. } => label,
            ModelState::Unavailable { label, .. } => label,
        }
    }

    pub fn device(&self) -> Option<Device> {
        match self {
            ModelState::Ready { backend, .. } => Some(backend.device()),
            ModelState::Unavailable { .. } => None,
        }
    }

    /// Device tag for responses; degraded mode reports `cpu`.
    pub fn device_str(&self) -> &'static str {
        self.device().unwrap_or(Device::Cpu).as_str()
    }

    /// Class table; empty in degraded mode.
    pub fn class_names(&self) -> &[String] {
        match self {
            ModelState::Ready { backend, .. } => backend.class_names(),
            ModelState::Unavailable { .. } => &[],
        }
    }
}

/// Acquire the primary model source, falling back to the default source
/// exactly once before entering degraded mode.
pub fn load_with_fallback(provider: &dyn ModelProvider, settings: &ModelSettings) -> ModelState {
    match provider.acquire(&settings.source) {
        Ok(backend) => {
            log::info!(
                "model loaded from {} ({})",
                settings.source,
                backend.device()
            );
            return ModelState::Ready {
                backend,
                label: label_for_source(&settings.source),
            };
        }
        Err(err) => log::warn!("model load failed for {}: {err:#}", settings.source),
    }

    match provider.acquire(&settings.fallback_source) {
        Ok(backend) => {
            log::info!("fallback model loaded from {}", settings.fallback_source);
            ModelState::Ready {
                backend,
                label: label_for_source(&settings.fallback_source),
            }
        }
        Err(err) => {
            log::error!(
                "fallback model load failed for {}: {err:#}; continuing without detection",
                settings.fallback_source
            );
            ModelState::Unavailable {
                label: label_for_source(&settings.source),
                reason: format!("{err:#}"),
            }
        }
    }
}

/// Short model identifier: file stem for paths, `stub` for stub sources.
fn label_for_source(source: &str) -> String {
    if source.starts_with("stub://") {
        return "stub".to_string();
    }
    Path::new(source)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(source)
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::anyhow;

    use super::*;

    /// Provider that pops one scripted outcome per acquisition.
    struct ScriptedProvider {
        outcomes: RefCell<Vec<Result<()>>>,
        attempts: RefCell<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<Result<()>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes),
                attempts: RefCell::new(Vec::new()),
            }
        }
    }

    impl ModelProvider for ScriptedProvider {
        fn acquire(&self, source: &str) -> Result<Box<dyn DetectorBackend>> {
            self.attempts.borrow_mut().push(source.to_string());
            let mut outcomes = self.outcomes.borrow_mut();
            if outcomes.is_empty() {
                return Err(anyhow!("no scripted outcome"));
            }
            outcomes
                .remove(0)
                .map(|_| Box::new(StubBackend::new()) as Box<dyn DetectorBackend>)
        }
    }

    fn settings() -> ModelSettings {
        ModelSettings {
            source: "models/primary.onnx".to_string(),
            fallback_source: "default.onnx".to_string(),
        }
    }

    #[test]
    fn primary_success_skips_fallback() {
        let provider = ScriptedProvider::new(vec![Ok(())]);
        let state = load_with_fallback(&provider, &settings());
        assert!(state.is_loaded());
        assert_eq!(state.label(), "primary");
        assert_eq!(provider.attempts.borrow().len(), 1);
    }

    #[test]
    fn primary_failure_triggers_exactly_one_fallback() {
        let provider = ScriptedProvider::new(vec![Err(anyhow!("missing file")), Ok(())]);
        let state = load_with_fallback(&provider, &settings());
        assert!(state.is_loaded());
        assert_eq!(state.label(), "default");
        assert_eq!(
            *provider.attempts.borrow(),
            vec!["models/primary.onnx", "default.onnx"]
        );
    }

    #[test]
    fn two_failures_enter_degraded_mode() {
        let provider =
            ScriptedProvider::new(vec![Err(anyhow!("missing")), Err(anyhow!("still missing"))]);
        let state = load_with_fallback(&provider, &settings());
        assert!(!state.is_loaded());
        assert_eq!(state.label(), "primary");
        assert!(state.class_names().is_empty());
        assert_eq!(provider.attempts.borrow().len(), 2);
    }

    #[test]
    fn stub_source_resolves_with_default_provider() {
        let settings = ModelSettings {
            source: "stub://coco".to_string(),
            fallback_source: "stub://coco".to_string(),
        };
        let state = load_with_fallback(&DefaultModelProvider, &settings);
        assert!(state.is_loaded());
        assert_eq!(state.label(), "stub");
        assert_eq!(state.class_names().len(), 80);
    }
}
