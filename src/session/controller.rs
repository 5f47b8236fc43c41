use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::info;
use tokio::sync::Mutex;

use crate::audio::AudioTelemetry;
use crate::devices::{CameraBackend, MicrophoneBackend, PermissionGateway, TonePlayer};
use crate::error::{DeviceKind, EngineError, Result};
use crate::locale::{resolve, Locale, MessageKey};
use crate::models::{Module, SampleKind, StepRecord, STEPS_PER_MODULE};
use crate::video::{CaptureSummary, VideoCaptureController};

use super::guards::guard_for;
use super::signals::{DistractionCounters, EnvSignals, SignalSubscription};
use super::state::{SessionState, SessionStatus};

const CALIBRATION_CUE_HZ: f32 = 440.0;
const ASCENDING_SERIES_HZ: [f32; 5] = [250.0, 500.0, 1000.0, 2000.0, 4000.0];
const NEUTRAL_TONE_HZ: f32 = 440.0;
const HAPPY_TONE_HZ: f32 = 659.0;
const SAD_TONE_HZ: f32 = 330.0;
const RESPONSE_CUE_HZ: f32 = 880.0;
const ALTERNATING_SERIES_HZ: [f32; 4] = [523.0, 659.0, 523.0, 659.0];

const CUE_TONE: Duration = Duration::from_millis(400);
const SERIES_TONE: Duration = Duration::from_millis(260);
const SERIES_GAP: Duration = Duration::from_millis(80);
const PAIR_GAP: Duration = Duration::from_millis(150);
const ALT_TONE: Duration = Duration::from_millis(220);
const ALT_GAP: Duration = Duration::from_millis(90);

/// What one "run current step" invocation did.
#[derive(Debug)]
pub enum StepOutcome {
    /// Step finished and the session moved on.
    Advanced { next_step: u8 },
    /// The final step finished; the session is complete.
    SessionCompleted,
    /// A required input is still missing; nothing advanced, retry any time.
    AwaitingInput,
    /// Another run is already in flight; this call was a no-op.
    Busy,
    /// The session has not been started yet.
    NotRunning,
    /// The session already completed.
    AlreadyCompleted,
    /// A subsystem call failed; the step index is unchanged and retryable.
    Failed(EngineError),
}

/// Everything a session needs from its host.
pub struct SessionConfig {
    pub module: Module,
    pub locale: Locale,
    pub mic: Arc<dyn MicrophoneBackend>,
    pub player: Arc<dyn TonePlayer>,
    pub camera: Arc<dyn CameraBackend>,
    pub permissions: Arc<dyn PermissionGateway>,
    pub signals: EnvSignals,
}

/// Drives one module's three-step session: executes step side effects,
/// gates on required inputs, emits an immutable record per transition, and
/// owns every device resource the session touches.
pub struct SessionController {
    state: Mutex<SessionState>,
    audio: AudioTelemetry,
    video: Mutex<VideoCaptureController>,
    signals: EnvSignals,
    counters: Arc<DistractionCounters>,
    subscription: Mutex<Option<SignalSubscription>>,
    sink: Arc<dyn Fn(StepRecord) + Send + Sync>,
    on_complete: Arc<dyn Fn(&StepRecord) + Send + Sync>,
    in_flight: AtomicBool,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        sink: impl Fn(StepRecord) + Send + Sync + 'static,
        on_complete: impl Fn(&StepRecord) + Send + Sync + 'static,
    ) -> Self {
        let audio = AudioTelemetry::new(
            config.mic,
            config.player,
            Arc::clone(&config.permissions),
        );
        let video = VideoCaptureController::new(config.camera, config.permissions);
        Self {
            state: Mutex::new(SessionState::new(config.module, config.locale)),
            audio,
            video: Mutex::new(video),
            signals: config.signals,
            counters: Arc::new(DistractionCounters::default()),
            subscription: Mutex::new(None),
            sink: Arc::new(sink),
            on_complete: Arc::new(on_complete),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Transitions `NotStarted → Running` and installs the distraction
    /// signal subscription. A second call is a no-op.
    pub async fn start(&self) -> Result<()> {
        {
            let mut st = self.state.lock().await;
            if st.status != SessionStatus::NotStarted {
                return Ok(());
            }
            st.status = SessionStatus::Running;
            st.started_at = Some(Utc::now());
            let msg = resolve(st.locale, MessageKey::SessionStarted);
            st.set_status(msg);
            st.push_log(msg);
            info!("session {} started ({})", st.session_id, st.module);
        }
        *self.subscription.lock().await = Some(SignalSubscription::install(
            &self.signals,
            Arc::clone(&self.counters),
        ));
        Ok(())
    }

    /// Runs the current step. Re-entrant calls while one is in flight are
    /// no-ops.
    pub async fn run_step(&self) -> StepOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return StepOutcome::Busy;
        }
        let outcome = self.run_step_inner().await;
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_step_inner(&self) -> StepOutcome {
        let (module, step) = {
            let st = self.state.lock().await;
            match st.status {
                SessionStatus::NotStarted => return StepOutcome::NotRunning,
                SessionStatus::Completed => return StepOutcome::AlreadyCompleted,
                SessionStatus::Running => (st.module, st.step_index),
            }
        };

        if let Err(err) = self.step_effects(module, step).await {
            let mut st = self.state.lock().await;
            let msg = resolve(st.locale, failure_key(&err));
            st.set_status(msg);
            st.push_log(format!("{msg} ({err})"));
            let record = self.snapshot(&st, false);
            drop(st);
            (self.sink)(record);
            return StepOutcome::Failed(err);
        }

        let mut st = self.state.lock().await;
        if let Some((guard, key)) = guard_for(module, step) {
            if !guard(&st.answers) {
                let prompt = resolve(st.locale, key);
                st.set_status(prompt);
                return StepOutcome::AwaitingInput;
            }
        }

        let final_step = step + 1 == STEPS_PER_MODULE;
        let msg = resolve(
            st.locale,
            if final_step {
                MessageKey::SessionComplete
            } else {
                MessageKey::StepDone
            },
        );
        st.set_status(msg);
        st.push_log(msg);
        let record = self.snapshot(&st, final_step);
        if final_step {
            st.status = SessionStatus::Completed;
            info!("session {} completed", st.session_id);
        } else {
            st.step_index += 1;
        }
        drop(st);

        (self.sink)(record.clone());
        if final_step {
            (self.on_complete)(&record);
            StepOutcome::SessionCompleted
        } else {
            StepOutcome::Advanced {
                next_step: step + 1,
            }
        }
    }

    async fn step_effects(&self, module: Module, step: u8) -> Result<()> {
        match (module, step) {
            (Module::Frequency, 0) => {
                let db = self.audio.measure_ambient_noise().await?;
                {
                    let mut st = self.state.lock().await;
                    st.mic_permission_granted = true;
                    st.push_sample(SampleKind::AmbientDb, db);
                    let msg = resolve(st.locale, MessageKey::AmbientMeasured);
                    st.push_log(format!("{msg}: {db:.1} dB"));
                }
                self.play_series(&[CALIBRATION_CUE_HZ], CUE_TONE, Duration::ZERO)
                    .await
            }
            (Module::Frequency, 1) => {
                self.play_series(&ASCENDING_SERIES_HZ, SERIES_TONE, SERIES_GAP)
                    .await
            }
            (Module::Speech, 0) => {
                self.audio.ensure_microphone_permission()?;
                self.state.lock().await.mic_permission_granted = true;
                Ok(())
            }
            (Module::Speech, 1) => {
                let realized = self.audio.record_short_utterance().await?;
                let mut st = self.state.lock().await;
                st.mic_permission_granted = true;
                st.push_sample(SampleKind::RecordingSecs, realized.as_secs_f64());
                let msg = resolve(st.locale, MessageKey::RecordingCaptured);
                st.push_log(format!("{msg}: {:.2}s", realized.as_secs_f64()));
                Ok(())
            }
            (Module::Intonation, 0) => {
                self.play_series(&[NEUTRAL_TONE_HZ], CUE_TONE, Duration::ZERO)
                    .await
            }
            (Module::Intonation, 1) => {
                self.play_series(&[HAPPY_TONE_HZ, SAD_TONE_HZ], CUE_TONE, PAIR_GAP)
                    .await
            }
            (Module::Responsiveness, 0) => {
                self.play_series(&[RESPONSE_CUE_HZ], CUE_TONE, Duration::ZERO)
                    .await
            }
            (Module::Responsiveness, 1) => {
                self.play_series(&ALTERNATING_SERIES_HZ, ALT_TONE, ALT_GAP).await
            }
            // Summary steps and the behavior questions have no device work.
            _ => Ok(()),
        }
    }

    async fn play_series(&self, freqs: &[f32], tone: Duration, gap: Duration) -> Result<()> {
        let mut played = Vec::new();
        self.audio
            .play_tones(freqs, tone, gap, |f| played.push(f))
            .await?;
        let mut st = self.state.lock().await;
        for f in played {
            st.push_sample(SampleKind::ToneHz, f as f64);
            let msg = resolve(st.locale, MessageKey::TonePlayed);
            st.push_log(format!("{msg}: {f:.0} Hz"));
        }
        Ok(())
    }

    fn snapshot(&self, st: &SessionState, completed: bool) -> StepRecord {
        st.snapshot_record(
            completed,
            self.counters.focus_lost_count(),
            self.counters.hidden_count(),
        )
    }

    // ---- caregiver-initiated video capture ------------------------------

    pub async fn start_video_capture(&self) -> Result<()> {
        match self.video.lock().await.start().await {
            Ok(()) => {
                let mut st = self.state.lock().await;
                let msg = resolve(st.locale, MessageKey::CaptureStarted);
                st.set_status(msg);
                st.push_log(msg);
                Ok(())
            }
            Err(err) => {
                let mut st = self.state.lock().await;
                let msg = resolve(st.locale, failure_key(&err));
                st.set_status(msg);
                st.push_log(format!("{msg} ({err})"));
                Err(err)
            }
        }
    }

    /// Stops the capture, folds its summary into the session's distraction
    /// metrics, and records the observation samples.
    pub async fn stop_video_capture(&self) -> Result<Option<CaptureSummary>> {
        let stopped = self.video.lock().await.stop().await?;
        if let Some(summary) = &stopped {
            let mut st = self.state.lock().await;
            st.motion_events += summary.motion_events;
            st.motion_score_sum += summary.motion_score_avg * summary.intervals as f64;
            st.motion_intervals += summary.intervals;
            st.push_sample(SampleKind::CaptureSecs, summary.duration.as_secs_f64());
            if summary.intervals > 0 {
                st.push_sample(SampleKind::MotionScore, summary.motion_score_avg);
            }
            let msg = resolve(st.locale, MessageKey::CaptureStopped);
            st.set_status(msg);
            st.push_log(msg);
        }
        Ok(stopped)
    }

    // ---- answers and live feedback --------------------------------------

    pub async fn pick_preferred_tone(&self, hz: u32) {
        self.state.lock().await.answers.preferred_tone_hz = Some(hz);
    }

    pub async fn pick_aversive_tone(&self, hz: u32) {
        self.state.lock().await.answers.aversive_tone_hz = Some(hz);
    }

    pub async fn answer_speech_questions(
        &self,
        heard_clearly: bool,
        was_distracted: bool,
        wants_repeat: bool,
    ) {
        let mut st = self.state.lock().await;
        st.answers.heard_clearly = Some(heard_clearly);
        st.answers.was_distracted = Some(was_distracted);
        st.answers.wants_repeat = Some(wants_repeat);
    }

    pub async fn answer_behavior_one(&self, answer: bool) {
        self.state.lock().await.answers.behavior_answer_one = Some(answer);
    }

    pub async fn answer_behavior_two(&self, answer: bool) {
        self.state.lock().await.answers.behavior_answer_two = Some(answer);
    }

    /// Live feedback toggles; their latest values ride along in every
    /// record emitted afterwards.
    pub async fn set_comfortable(&self, value: bool) {
        self.state.lock().await.answers.comfortable_now = Some(value);
    }

    pub async fn set_distracted(&self, value: bool) {
        self.state.lock().await.answers.distracted_now = Some(value);
    }

    // ---- introspection ---------------------------------------------------

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status
    }

    pub async fn step_index(&self) -> u8 {
        self.state.lock().await.step_index
    }

    pub async fn status_line(&self) -> String {
        self.state.lock().await.status_line.clone()
    }

    /// Bounded diagnostic log, newest first.
    pub async fn log_entries(&self) -> Vec<String> {
        self.state.lock().await.log.iter().cloned().collect()
    }

    pub async fn session_id(&self) -> String {
        self.state.lock().await.session_id.clone()
    }

    pub async fn started_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.state.lock().await.started_at
    }

    /// Side channel with the currently sounding tone frequency, for the
    /// wizard UI.
    pub fn current_tone(&self) -> tokio::sync::watch::Receiver<Option<f32>> {
        self.audio.current_tone()
    }

    /// Releases every device resource this session may hold: the signal
    /// subscription, any running camera capture, and the audio-output
    /// context. Unconditional and idempotent.
    pub async fn teardown(&self) {
        if let Some(sub) = self.subscription.lock().await.take() {
            sub.release().await;
        }
        let _ = self.video.lock().await.stop().await;
        self.audio.shutdown_output();
    }
}

fn failure_key(err: &EngineError) -> MessageKey {
    match err {
        EngineError::PermissionDenied(DeviceKind::Microphone) => MessageKey::MicPermissionDenied,
        EngineError::PermissionDenied(DeviceKind::Camera) => MessageKey::CameraPermissionDenied,
        EngineError::DeviceUnavailable(_) => MessageKey::DeviceUnavailable,
        EngineError::Unexpected(_) => MessageKey::GenericFailure,
    }
}
