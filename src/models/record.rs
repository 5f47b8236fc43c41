use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Module;

/// What a single telemetry scalar measures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SampleKind {
    /// Pseudo-decibel ambient noise estimate, clamped to [20, 90].
    AmbientDb,
    /// Frequency of a tone that finished playing, in Hz.
    ToneHz,
    /// Realized utterance recording duration, in seconds.
    RecordingSecs,
    /// Mean motion score over one camera observation.
    MotionScore,
    /// Elapsed camera observation duration, in seconds.
    CaptureSecs,
}

/// One timestamped scalar captured by a telemetry subsystem. Samples are
/// append-only and belong to the session that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub kind: SampleKind,
    pub value: f64,
    pub at: DateTime<Utc>,
}

impl TelemetrySample {
    pub fn now(kind: SampleKind, value: f64) -> Self {
        Self {
            kind,
            value,
            at: Utc::now(),
        }
    }
}

/// Distraction counters accumulated over one session. Reset only when a new
/// session starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractionMetrics {
    pub focus_lost_count: u32,
    pub hidden_count: u32,
    pub motion_events: u32,
    pub motion_score_avg: f64,
}

/// Questionnaire fields and live feedback toggles. All optional; the guard
/// table decides which of them a given step requires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answers {
    /// Frequency module: tone the subject liked most, in Hz.
    pub preferred_tone_hz: Option<u32>,
    /// Frequency module: tone the subject liked least, in Hz.
    pub aversive_tone_hz: Option<u32>,
    pub heard_clearly: Option<bool>,
    pub was_distracted: Option<bool>,
    pub wants_repeat: Option<bool>,
    pub behavior_answer_one: Option<bool>,
    pub behavior_answer_two: Option<bool>,
    /// Live feedback, settable at any time while the session runs.
    pub comfortable_now: Option<bool>,
    pub distracted_now: Option<bool>,
}

/// Immutable snapshot emitted once per step transition (and once per failed
/// step attempt, with `completed = false`). This is the only artifact that
/// crosses the engine boundary; the dashboard owns storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: String,
    pub session_id: String,
    pub module: Module,
    pub step_index: u8,
    pub completed: bool,
    pub at: DateTime<Utc>,
    pub mic_permission_granted: bool,
    pub samples: Vec<TelemetrySample>,
    pub answers: Answers,
    pub distraction: DistractionMetrics,
    /// Bounded diagnostic log, newest first, passed through unchanged.
    pub log: Vec<String>,
}
