mod backend;
pub mod backends;
mod classifier;
mod result;

use anyhow::Result;

pub use backend::ClassifierBackend;
pub use backends::{CpuBackend, CpuThresholds, StubBackend, StubOutcome};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use classifier::QualityClassifier;
pub use result::{argmax, Classification};

use crate::config::{BackendKind, ModelSettings};

/// Load the configured backend. Runs once, at lifecycle stage one.
pub fn load_backend(settings: &ModelSettings) -> Result<Box<dyn ClassifierBackend>> {
    match settings.backend {
        BackendKind::Tract => load_tract(settings),
        BackendKind::Cpu => Ok(Box::new(CpuBackend::new())),
        BackendKind::Stub => Ok(Box::new(StubBackend::default())),
    }
}

#[cfg(feature = "backend-tract")]
fn load_tract(settings: &ModelSettings) -> Result<Box<dyn ClassifierBackend>> {
    Ok(Box::new(TractBackend::load(&settings.path)?))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_settings: &ModelSettings) -> Result<Box<dyn ClassifierBackend>> {
    Err(anyhow::anyhow!(
        "the tract backend requires the backend-tract feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cpu_and_stub_backends_load_without_model_file() -> Result<()> {
        for (kind, name) in [(BackendKind::Cpu, "cpu"), (BackendKind::Stub, "stub")] {
            let settings = ModelSettings {
                backend: kind,
                path: PathBuf::from("unused.onnx"),
            };
            assert_eq!(load_backend(&settings)?.name(), name);
        }
        Ok(())
    }

    #[test]
    fn tract_backend_fails_without_model() {
        let settings = ModelSettings {
            backend: BackendKind::Tract,
            path: PathBuf::from("missing/frame_quality.onnx"),
        };
        assert!(load_backend(&settings).is_err());
    }
}
