pub mod live;
pub mod sim;

use std::time::Duration;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{DeviceKind, EngineError, Result};

/// Permission lifecycle for one device. "Not yet asked" and "explicitly
/// denied" are distinct because the retry strategy differs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// Host-supplied permission boundary. Microphone and camera are tracked
/// independently.
pub trait PermissionGateway: Send + Sync + 'static {
    fn microphone(&self) -> PermissionState;
    fn camera(&self) -> PermissionState;
    /// Prompts the user if the state is still `Unknown`; returns the
    /// resulting state.
    fn request_microphone(&self) -> PermissionState;
    fn request_camera(&self) -> PermissionState;
}

/// Factory for microphone streams. Acquired at most once per operation and
/// released (dropped) before any re-acquisition.
pub trait MicrophoneBackend: Send + Sync + 'static {
    fn acquire(&self) -> Result<Box<dyn MicStream>>;
}

/// An open microphone stream. Implementations release the underlying device
/// on drop.
pub trait MicStream: Send {
    /// RMS amplitude (0..1) of the frames observed since the previous call,
    /// or `None` when no frames arrived in the window.
    fn window_rms(&mut self) -> Result<Option<f64>>;

    /// Blocking bounded recording. Returns the realized duration, which is
    /// `ceiling` unless the device stops delivering frames early.
    fn record(&mut self, ceiling: Duration) -> Result<Duration>;
}

/// Audio output for synthesized tones. `play_tone` only enqueues; pacing is
/// the caller's job.
pub trait TonePlayer: Send + Sync + 'static {
    fn play_tone(&self, freq_hz: f32, duration: Duration) -> Result<()>;

    /// Closes the output context. Safe to call repeatedly; a later
    /// `play_tone` re-opens lazily.
    fn shutdown(&self);
}

/// Factory for camera streams.
pub trait CameraBackend: Send + Sync + 'static {
    fn acquire(&self) -> Result<Box<dyn CameraStream>>;
}

/// An open camera stream. Tracks are released on drop.
pub trait CameraStream: Send {
    /// Grabs the current frame as grayscale at whatever resolution the
    /// device delivers; the motion scorer downsamples it.
    fn grab_frame(&mut self) -> Result<GrayImage>;

    /// Starts the raw clip recorder. The clip content is not consumed by
    /// the engine.
    fn begin_clip(&mut self) -> Result<()>;

    /// Stops the clip recorder. Idempotent.
    fn end_clip(&mut self);
}

/// Maps a non-granted state to the matching permission error.
pub(crate) fn require_granted(state: PermissionState, device: DeviceKind) -> Result<()> {
    match state {
        PermissionState::Granted => Ok(()),
        _ => Err(EngineError::PermissionDenied(device)),
    }
}
