//! Simulated device backends for tests and host demos. Deterministic by
//! default; the noisy microphone adds small random jitter around a target
//! RMS level.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::devices::{
    CameraBackend, CameraStream, MicStream, MicrophoneBackend, PermissionGateway, PermissionState,
    TonePlayer,
};
use crate::error::{EngineError, Result};

/// Microphone that reports a configured RMS level, optionally jittered.
pub struct SimMicrophone {
    rms: f64,
    jitter: f64,
    available: bool,
}

impl SimMicrophone {
    pub fn steady(rms: f64) -> Self {
        Self {
            rms,
            jitter: 0.0,
            available: true,
        }
    }

    pub fn noisy(rms: f64, jitter: f64) -> Self {
        Self {
            rms,
            jitter,
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            rms: 0.0,
            jitter: 0.0,
            available: false,
        }
    }
}

impl MicrophoneBackend for SimMicrophone {
    fn acquire(&self) -> Result<Box<dyn MicStream>> {
        if !self.available {
            return Err(EngineError::DeviceUnavailable(
                "simulated microphone is offline".to_string(),
            ));
        }
        Ok(Box::new(SimMicStream {
            rms: self.rms,
            jitter: self.jitter,
            rng: StdRng::from_entropy(),
        }))
    }
}

struct SimMicStream {
    rms: f64,
    jitter: f64,
    rng: StdRng,
}

impl MicStream for SimMicStream {
    fn window_rms(&mut self) -> Result<Option<f64>> {
        let value = if self.jitter > 0.0 {
            self.rms + self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            self.rms
        };
        Ok(Some(value.clamp(0.0, 1.0)))
    }

    fn record(&mut self, ceiling: Duration) -> Result<Duration> {
        thread::sleep(ceiling);
        Ok(ceiling)
    }
}

/// Tone player that honors the interface without producing sound. Records
/// every tone it was asked to play so tests can assert on the sequence.
#[derive(Default)]
pub struct SimTonePlayer {
    played: Mutex<Vec<(f32, Duration)>>,
    open: AtomicBool,
}

impl SimTonePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<(f32, Duration)> {
        self.played.lock().unwrap().clone()
    }

    /// Whether the simulated output context is currently open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl TonePlayer for SimTonePlayer {
    fn play_tone(&self, freq_hz: f32, duration: Duration) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        self.played.lock().unwrap().push((freq_hz, duration));
        Ok(())
    }

    fn shutdown(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Builds a uniform grayscale frame, handy for scripting motion sequences.
pub fn uniform_frame(width: u32, height: u32, luma: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, image::Luma([luma]))
}

/// Camera that cycles through a scripted list of frames and counts its open
/// media tracks so teardown tests can assert everything was released.
pub struct SimCamera {
    frames: Vec<GrayImage>,
    open_tracks: Arc<AtomicUsize>,
    available: bool,
}

impl SimCamera {
    pub fn scripted(frames: Vec<GrayImage>) -> Self {
        assert!(!frames.is_empty(), "scripted camera needs at least one frame");
        Self {
            frames,
            open_tracks: Arc::new(AtomicUsize::new(0)),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            frames: vec![uniform_frame(64, 36, 0)],
            open_tracks: Arc::new(AtomicUsize::new(0)),
            available: false,
        }
    }

    /// Number of currently open media tracks (video track + clip recorder).
    pub fn open_tracks(&self) -> usize {
        self.open_tracks.load(Ordering::SeqCst)
    }
}

impl CameraBackend for SimCamera {
    fn acquire(&self) -> Result<Box<dyn CameraStream>> {
        if !self.available {
            return Err(EngineError::DeviceUnavailable(
                "simulated camera is offline".to_string(),
            ));
        }
        self.open_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimCameraStream {
            frames: self.frames.clone(),
            next: 0,
            open_tracks: Arc::clone(&self.open_tracks),
            clip_open: false,
        }))
    }
}

struct SimCameraStream {
    frames: Vec<GrayImage>,
    next: usize,
    open_tracks: Arc<AtomicUsize>,
    clip_open: bool,
}

impl CameraStream for SimCameraStream {
    fn grab_frame(&mut self) -> Result<GrayImage> {
        let frame = self.frames[self.next % self.frames.len()].clone();
        self.next += 1;
        Ok(frame)
    }

    fn begin_clip(&mut self) -> Result<()> {
        if !self.clip_open {
            self.clip_open = true;
            self.open_tracks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn end_clip(&mut self) {
        if self.clip_open {
            self.clip_open = false;
            self.open_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimCameraStream {
    fn drop(&mut self) {
        self.end_clip();
        self.open_tracks.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Permission gateway with fixed initial states. `Unknown` resolves to
/// granted or denied on request, depending on `grant_on_request`.
pub struct StaticPermissions {
    microphone: Mutex<PermissionState>,
    camera: Mutex<PermissionState>,
    grant_on_request: bool,
}

impl StaticPermissions {
    pub fn new(
        microphone: PermissionState,
        camera: PermissionState,
        grant_on_request: bool,
    ) -> Self {
        Self {
            microphone: Mutex::new(microphone),
            camera: Mutex::new(camera),
            grant_on_request,
        }
    }

    pub fn all_granted() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted, true)
    }

    pub fn all_denied() -> Self {
        Self::new(PermissionState::Denied, PermissionState::Denied, false)
    }

    /// Starts in `Unknown` for both devices and grants on first request.
    pub fn ask_then_grant() -> Self {
        Self::new(PermissionState::Unknown, PermissionState::Unknown, true)
    }

    fn resolve(&self, slot: &Mutex<PermissionState>) -> PermissionState {
        let mut state = slot.lock().unwrap();
        if *state == PermissionState::Unknown {
            *state = if self.grant_on_request {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
        }
        *state
    }
}

impl PermissionGateway for StaticPermissions {
    fn microphone(&self) -> PermissionState {
        *self.microphone.lock().unwrap()
    }

    fn camera(&self) -> PermissionState {
        *self.camera.lock().unwrap()
    }

    fn request_microphone(&self) -> PermissionState {
        self.resolve(&self.microphone)
    }

    fn request_camera(&self) -> PermissionState {
        self.resolve(&self.camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_permission_resolves_on_request() {
        let perms = StaticPermissions::ask_then_grant();
        assert_eq!(perms.microphone(), PermissionState::Unknown);
        assert_eq!(perms.request_microphone(), PermissionState::Granted);
        assert_eq!(perms.microphone(), PermissionState::Granted);
        // Camera tracked independently of microphone.
        assert_eq!(perms.camera(), PermissionState::Unknown);
    }

    #[test]
    fn camera_tracks_balance_on_drop() {
        let camera = SimCamera::scripted(vec![uniform_frame(64, 36, 128)]);
        {
            let mut stream = camera.acquire().unwrap();
            stream.begin_clip().unwrap();
            assert_eq!(camera.open_tracks(), 2);
        }
        assert_eq!(camera.open_tracks(), 0);
    }
}
