pub mod loop_worker;
pub mod motion;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::devices::{require_granted, CameraBackend, PermissionGateway, PermissionState};
use crate::error::{DeviceKind, EngineError, Result};

use loop_worker::{motion_loop, MotionStats};

/// What one camera observation produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub duration: Duration,
    pub motion_events: u32,
    pub motion_score_avg: f64,
    /// Scored frame intervals; weights this capture's average when several
    /// captures are folded into one session.
    pub intervals: u32,
}

/// Caregiver-toggled camera capture. Acquires the stream and clip recorder
/// on start, runs the motion sampling loop until stop, and guarantees both
/// are released exactly once.
pub struct VideoCaptureController {
    camera: Arc<dyn CameraBackend>,
    permissions: Arc<dyn PermissionGateway>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    stats: Option<Arc<Mutex<MotionStats>>>,
    started: Option<Instant>,
}

impl VideoCaptureController {
    pub fn new(camera: Arc<dyn CameraBackend>, permissions: Arc<dyn PermissionGateway>) -> Self {
        Self {
            camera,
            permissions,
            handle: None,
            cancel_token: None,
            stats: None,
            started: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(EngineError::Unexpected(
                "camera capture already active".to_string(),
            ));
        }

        let mut state = self.permissions.camera();
        if state == PermissionState::Unknown {
            state = self.permissions.request_camera();
        }
        require_granted(state, DeviceKind::Camera)?;

        let camera = Arc::clone(&self.camera);
        let stream = tokio::task::spawn_blocking(move || {
            let mut stream = camera.acquire()?;
            stream.begin_clip()?;
            Ok::<_, EngineError>(stream)
        })
        .await
        .map_err(|e| EngineError::Unexpected(format!("camera worker join failed: {e}")))??;

        let stats = Arc::new(Mutex::new(MotionStats::default()));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(motion_loop(stream, Arc::clone(&stats), cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.stats = Some(stats);
        self.started = Some(Instant::now());
        Ok(())
    }

    /// Stops the capture and reports what it saw. A second stop (or a stop
    /// with nothing running) returns `None`.
    pub async fn stop(&mut self) -> Result<Option<CaptureSummary>> {
        let Some(token) = self.cancel_token.take() else {
            return Ok(None);
        };
        token.cancel();

        // Clear all capture state before the join so a failed worker cannot
        // leave a half-stopped controller behind.
        let handle = self.handle.take();
        let started = self.started.take();
        let stats = self.stats.take();

        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| EngineError::Unexpected(format!("motion loop failed to join: {e}")))?;
        }

        let duration = started.map(|s| s.elapsed()).unwrap_or_default();
        let summary = match stats {
            Some(stats) => {
                let stats = stats.lock().unwrap();
                CaptureSummary {
                    duration,
                    motion_events: stats.events,
                    motion_score_avg: stats.average(),
                    intervals: stats.scores.len() as u32,
                }
            }
            None => CaptureSummary {
                duration,
                motion_events: 0,
                motion_score_avg: 0.0,
                intervals: 0,
            },
        };
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::sim::{uniform_frame, SimCamera, StaticPermissions};
    use motion::{MOTION_HEIGHT, MOTION_WIDTH};
    use pretty_assertions::assert_eq;

    fn alternating_camera() -> Arc<SimCamera> {
        Arc::new(SimCamera::scripted(vec![
            uniform_frame(MOTION_WIDTH, MOTION_HEIGHT, 0),
            uniform_frame(MOTION_WIDTH, MOTION_HEIGHT, 200),
        ]))
    }

    #[tokio::test]
    async fn capture_counts_motion_and_releases_tracks() {
        let camera = alternating_camera();
        let mut controller = VideoCaptureController::new(
            camera.clone(),
            Arc::new(StaticPermissions::all_granted()),
        );

        controller.start().await.unwrap();
        assert!(controller.is_active());
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let summary = controller.stop().await.unwrap().expect("summary");

        assert!(summary.motion_events >= 1, "no motion events counted");
        assert!(summary.motion_score_avg > motion::MOTION_EVENT_THRESHOLD);
        assert!(summary.duration >= Duration::from_millis(1000));
        assert_eq!(camera.open_tracks(), 0);
    }

    #[tokio::test]
    async fn double_stop_is_a_noop() {
        let camera = alternating_camera();
        let mut controller = VideoCaptureController::new(
            camera.clone(),
            Arc::new(StaticPermissions::all_granted()),
        );
        controller.start().await.unwrap();
        let first = controller.stop().await.unwrap();
        let second = controller.stop().await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn failed_worker_join_still_resets_capture_state() {
        let camera = alternating_camera();
        let mut controller = VideoCaptureController::new(
            camera.clone(),
            Arc::new(StaticPermissions::all_granted()),
        );
        controller.start().await.unwrap();
        // Stand in for a worker task that died mid-capture.
        controller.handle = Some(tokio::spawn(async { panic!("worker died") }));

        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, EngineError::Unexpected(_)));
        assert!(!controller.is_active());
        assert!(controller.stats.is_none());
        assert!(controller.started.is_none());

        // A fresh capture starts cleanly afterwards.
        controller.start().await.unwrap();
        controller.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(camera.open_tracks(), 0);
    }

    #[tokio::test]
    async fn denied_camera_permission_blocks_start() {
        let mut controller = VideoCaptureController::new(
            alternating_camera(),
            Arc::new(StaticPermissions::all_denied()),
        );
        let err = controller.start().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::PermissionDenied(DeviceKind::Camera)
        ));
    }
}
