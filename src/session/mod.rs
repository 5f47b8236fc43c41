pub mod controller;
pub mod guards;
pub mod signals;
pub mod state;

pub use controller::{SessionConfig, SessionController, StepOutcome};
pub use signals::{EnvEvent, EnvSignals};
pub use state::{SessionStatus, LOG_CAPACITY};
