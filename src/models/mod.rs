pub mod module;
pub mod record;

pub use module::{Module, STEPS_PER_MODULE};
pub use record::{Answers, DistractionMetrics, SampleKind, StepRecord, TelemetrySample};
