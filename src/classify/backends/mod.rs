pub mod cpu;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use cpu::{CpuBackend, CpuThresholds};
pub use stub::{StubBackend, StubOutcome};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
