pub mod player;
pub mod tone;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task;
use tokio::time::{Instant, MissedTickBehavior};

use crate::devices::{
    require_granted, MicrophoneBackend, PermissionGateway, PermissionState, TonePlayer,
};
use crate::error::{DeviceKind, EngineError, Result};

const ENABLE_LOGS: bool = true;
use crate::log_info;

/// Wall-clock bound for one ambient measurement.
const AMBIENT_TOTAL: Duration = Duration::from_millis(2200);
/// Sampling cadence within the ambient measurement window.
const AMBIENT_WINDOW: Duration = Duration::from_millis(110);
/// Fixed ceiling for utterance recordings.
pub const RECORD_CEILING: Duration = Duration::from_millis(3200);

/// Pseudo-decibel floor and ceiling. The mapping is an empirical relative
/// indicator, not an SPL measurement.
const DB_FLOOR: f64 = 20.0;
const DB_CEIL: f64 = 90.0;
/// Conventional full-scale reference offset for the log transform.
const DB_REF_OFFSET: f64 = 94.0;

/// Maps a mean RMS amplitude (0..1) to a clamped pseudo-decibel estimate.
pub fn rms_to_db(rms: f64) -> f64 {
    let rms = rms.max(1e-9);
    (DB_REF_OFFSET + 20.0 * rms.log10()).clamp(DB_FLOOR, DB_CEIL)
}

/// Audio telemetry over the device boundary: ambient sampling, tone
/// synthesis, utterance recording. The session controller serializes these;
/// no two audio operations run concurrently within one session.
pub struct AudioTelemetry {
    mic: Arc<dyn MicrophoneBackend>,
    player: Arc<dyn TonePlayer>,
    permissions: Arc<dyn PermissionGateway>,
    current_tone: watch::Sender<Option<f32>>,
}

impl AudioTelemetry {
    pub fn new(
        mic: Arc<dyn MicrophoneBackend>,
        player: Arc<dyn TonePlayer>,
        permissions: Arc<dyn PermissionGateway>,
    ) -> Self {
        let (current_tone, _) = watch::channel(None);
        Self {
            mic,
            player,
            permissions,
            current_tone,
        }
    }

    /// Side channel carrying the currently sounding tone frequency, `None`
    /// between tones. Intended for the wizard UI.
    pub fn current_tone(&self) -> watch::Receiver<Option<f32>> {
        self.current_tone.subscribe()
    }

    /// Verifies (requesting if never asked) that microphone use is allowed.
    pub fn ensure_microphone_permission(&self) -> Result<()> {
        self.checked_microphone()
    }

    fn checked_microphone(&self) -> Result<()> {
        let mut state = self.permissions.microphone();
        if state == PermissionState::Unknown {
            state = self.permissions.request_microphone();
        }
        require_granted(state, DeviceKind::Microphone)
    }

    /// Samples ambient RMS on a fixed cadence for a bounded wall-clock
    /// duration and maps the average into [20, 90] pseudo-dB. The stream is
    /// released on completion or error. Fails with `DeviceUnavailable` when
    /// the device delivered no frames at all.
    pub async fn measure_ambient_noise(&self) -> Result<f64> {
        self.checked_microphone()?;

        let mic = Arc::clone(&self.mic);
        let mut stream = task::spawn_blocking(move || mic.acquire())
            .await
            .map_err(|e| EngineError::Unexpected(format!("mic worker join failed: {e}")))??;

        let deadline = Instant::now() + AMBIENT_TOTAL;
        let mut ticker = tokio::time::interval(AMBIENT_WINDOW);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately

        let mut readings: Vec<f64> = Vec::new();
        while Instant::now() < deadline {
            ticker.tick().await;
            let (returned, rms) = task::spawn_blocking(move || {
                let rms = stream.window_rms();
                (stream, rms)
            })
            .await
            .map_err(|e| EngineError::Unexpected(format!("mic worker join failed: {e}")))?;
            stream = returned;
            if let Some(value) = rms? {
                readings.push(value);
            }
        }
        drop(stream);

        if readings.is_empty() {
            return Err(EngineError::DeviceUnavailable(
                "no audio frames captured".to_string(),
            ));
        }
        let mean = readings.iter().sum::<f64>() / readings.len() as f64;
        let db = rms_to_db(mean);
        log_info!("ambient noise: {:.1} dB from {} windows", db, readings.len());
        Ok(db)
    }

    /// Plays each frequency in order: tone, then gap, with no trailing gap
    /// after the final tone. `on_tone` fires as each tone starts so the
    /// caller can log it. Suspends until the whole series has sounded.
    pub async fn play_tones(
        &self,
        freqs_hz: &[f32],
        tone: Duration,
        gap: Duration,
        mut on_tone: impl FnMut(f32),
    ) -> Result<()> {
        let outcome = async {
            for (i, &freq) in freqs_hz.iter().enumerate() {
                self.player.play_tone(freq, tone)?;
                let _ = self.current_tone.send(Some(freq));
                on_tone(freq);
                tokio::time::sleep(tone).await;
                if i + 1 < freqs_hz.len() {
                    tokio::time::sleep(gap).await;
                }
            }
            Ok(())
        }
        .await;
        let _ = self.current_tone.send(None);
        outcome
    }

    /// Records a short utterance bounded by [`RECORD_CEILING`] and returns
    /// the realized duration. Permission denial and a missing recorder are
    /// distinct failures.
    pub async fn record_short_utterance(&self) -> Result<Duration> {
        self.checked_microphone()?;

        let mic = Arc::clone(&self.mic);
        let realized = task::spawn_blocking(move || {
            let mut stream = mic.acquire()?;
            stream.record(RECORD_CEILING)
        })
        .await
        .map_err(|e| EngineError::Unexpected(format!("recorder join failed: {e}")))??;

        log_info!("utterance recorded: {:.2}s", realized.as_secs_f64());
        Ok(realized)
    }

    /// Closes the shared audio-output context. Idempotent.
    pub fn shutdown_output(&self) {
        self.player.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::sim::{SimMicrophone, SimTonePlayer, StaticPermissions};
    use pretty_assertions::assert_eq;

    fn telemetry(mic: SimMicrophone) -> (AudioTelemetry, Arc<SimTonePlayer>) {
        let player = Arc::new(SimTonePlayer::new());
        let audio = AudioTelemetry::new(
            Arc::new(mic),
            player.clone(),
            Arc::new(StaticPermissions::all_granted()),
        );
        (audio, player)
    }

    #[test]
    fn rms_to_db_is_clamped_to_range() {
        assert_eq!(rms_to_db(0.0), 20.0);
        assert_eq!(rms_to_db(1e-8), 20.0);
        assert_eq!(rms_to_db(1.0), 90.0);
        assert_eq!(rms_to_db(1e9), 90.0);
        let mid = rms_to_db(0.01);
        assert!(mid > 20.0 && mid < 90.0);
    }

    #[test]
    fn rms_to_db_is_monotonic() {
        assert!(rms_to_db(0.02) > rms_to_db(0.01));
    }

    #[tokio::test]
    async fn ambient_measurement_stays_in_range() {
        let (audio, _) = telemetry(SimMicrophone::noisy(0.05, 0.02));
        let db = audio.measure_ambient_noise().await.unwrap();
        assert!((20.0..=90.0).contains(&db), "out of range: {db}");
    }

    #[tokio::test]
    async fn ambient_measurement_fails_without_device() {
        let (audio, _) = telemetry(SimMicrophone::unavailable());
        let err = audio.measure_ambient_noise().await.unwrap_err();
        assert!(matches!(err, EngineError::DeviceUnavailable(_)));
    }

    #[tokio::test]
    async fn single_tone_has_no_trailing_gap() {
        let (audio, player) = telemetry(SimMicrophone::steady(0.0));
        let tone = Duration::from_millis(260);
        let gap = Duration::from_millis(80);

        let started = std::time::Instant::now();
        audio
            .play_tones(&[440.0], tone, gap, |_| {})
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= tone, "finished early: {elapsed:?}");
        assert!(
            elapsed < tone + gap + Duration::from_millis(60),
            "trailing gap was waited: {elapsed:?}"
        );
        assert_eq!(player.played(), vec![(440.0, tone)]);
    }

    #[tokio::test]
    async fn tone_series_reports_each_frequency() {
        let (audio, player) = telemetry(SimMicrophone::steady(0.0));
        let mut seen = Vec::new();
        audio
            .play_tones(
                &[250.0, 500.0],
                Duration::from_millis(20),
                Duration::from_millis(10),
                |f| seen.push(f),
            )
            .await
            .unwrap();
        assert_eq!(seen, vec![250.0, 500.0]);
        assert_eq!(player.played().len(), 2);
        assert_eq!(*audio.current_tone().borrow(), None);
    }

    #[tokio::test]
    async fn recording_denied_without_permission() {
        let player = Arc::new(SimTonePlayer::new());
        let audio = AudioTelemetry::new(
            Arc::new(SimMicrophone::steady(0.1)),
            player,
            Arc::new(StaticPermissions::all_denied()),
        );
        let err = audio.record_short_utterance().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::PermissionDenied(DeviceKind::Microphone)
        ));
    }
}
