//! Diagnostic session engine for the SenseCheck companion app.
//!
//! The engine runs a multi-step sensory/behavioral assessment: it captures
//! audio and video telemetry, synthesizes tone stimuli, gates step
//! progression on required inputs, and emits an immutable record per step
//! transition through a host-supplied sink. Scoring is a pure function over
//! the accumulated record history.
//!
//! Nothing here makes a clinical diagnosis; scores are relative indices for
//! caregiver review only.

mod audio;
mod devices;
mod error;
mod locale;
mod models;
mod scoring;
mod session;
mod utils;
mod video;

pub use audio::{player::RodioTonePlayer, rms_to_db, tone::ToneBurst, AudioTelemetry, RECORD_CEILING};
pub use devices::{
    live::CpalMicrophone, sim, CameraBackend, CameraStream, MicStream, MicrophoneBackend,
    PermissionGateway, PermissionState, TonePlayer,
};
pub use error::{DeviceKind, EngineError, Result};
pub use locale::{resolve, Locale, MessageKey};
pub use models::{
    Answers, DistractionMetrics, Module, SampleKind, StepRecord, TelemetrySample,
    STEPS_PER_MODULE,
};
pub use scoring::{build_report, CollectedData, ModuleScore, Report, BONUS_PER_SIGNAL};
pub use session::{
    EnvEvent, EnvSignals, SessionConfig, SessionController, SessionStatus, StepOutcome,
    LOG_CAPACITY,
};
pub use video::{CaptureSummary, VideoCaptureController};
