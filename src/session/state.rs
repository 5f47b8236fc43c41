use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locale::Locale;
use crate::models::{
    Answers, DistractionMetrics, Module, SampleKind, StepRecord, TelemetrySample,
};

/// Most-recent-first diagnostic log entries kept per session.
pub const LOG_CAPACITY: usize = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    NotStarted,
    Running,
    Completed,
}

/// Mutable session state owned by the controller. `AwaitingInput` is not a
/// stored status; it is re-derived from the guard table on every step
/// attempt.
pub(crate) struct SessionState {
    pub module: Module,
    pub locale: Locale,
    pub session_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub step_index: u8,
    pub samples: Vec<TelemetrySample>,
    pub answers: Answers,
    pub mic_permission_granted: bool,
    pub motion_events: u32,
    pub motion_score_sum: f64,
    pub motion_intervals: u32,
    pub status_line: String,
    pub log: VecDeque<String>,
}

impl SessionState {
    pub fn new(module: Module, locale: Locale) -> Self {
        Self {
            module,
            locale,
            session_id: Uuid::new_v4().to_string(),
            started_at: None,
            status: SessionStatus::NotStarted,
            step_index: 0,
            samples: Vec::new(),
            answers: Answers::default(),
            mic_permission_granted: false,
            motion_events: 0,
            motion_score_sum: 0.0,
            motion_intervals: 0,
            status_line: String::new(),
            log: VecDeque::new(),
        }
    }

    pub fn push_sample(&mut self, kind: SampleKind, value: f64) {
        self.samples.push(TelemetrySample::now(kind, value));
    }

    /// Prepends a timestamped entry and drops the oldest past capacity.
    pub fn push_log(&mut self, text: impl Into<String>) {
        let entry = format!("{} {}", Utc::now().format("%H:%M:%S"), text.into());
        self.log.push_front(entry);
        self.log.truncate(LOG_CAPACITY);
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status_line = text.into();
    }

    /// Immutable snapshot of everything captured so far.
    pub fn snapshot_record(
        &self,
        completed: bool,
        focus_lost_count: u32,
        hidden_count: u32,
    ) -> StepRecord {
        StepRecord {
            id: Uuid::new_v4().to_string(),
            session_id: self.session_id.clone(),
            module: self.module,
            step_index: self.step_index,
            completed,
            at: Utc::now(),
            mic_permission_granted: self.mic_permission_granted,
            samples: self.samples.clone(),
            answers: self.answers.clone(),
            distraction: DistractionMetrics {
                focus_lost_count,
                hidden_count,
                motion_events: self.motion_events,
                // Interval-weighted average over every capture so far.
                motion_score_avg: if self.motion_intervals == 0 {
                    0.0
                } else {
                    self.motion_score_sum / self.motion_intervals as f64
                },
            },
            log: self.log.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_is_bounded_and_newest_first() {
        let mut state = SessionState::new(Module::Behavior, Locale::En);
        for i in 0..30 {
            state.push_log(format!("entry {i}"));
        }
        assert_eq!(state.log.len(), LOG_CAPACITY);
        assert!(state.log[0].ends_with("entry 29"));
        assert!(state.log[LOG_CAPACITY - 1].ends_with("entry 6"));
    }

    #[test]
    fn motion_averages_combine_interval_weighted() {
        let mut state = SessionState::new(Module::Behavior, Locale::En);
        // First capture: four intervals averaging 10, second: one at 40.
        state.motion_events += 2;
        state.motion_score_sum += 10.0 * 4.0;
        state.motion_intervals += 4;
        state.motion_score_sum += 40.0;
        state.motion_intervals += 1;

        let record = state.snapshot_record(false, 0, 0);
        assert_eq!(record.distraction.motion_score_avg, 16.0);
        assert_eq!(record.distraction.motion_events, 2);
    }

    #[test]
    fn snapshot_clones_current_samples_only() {
        let mut state = SessionState::new(Module::Frequency, Locale::En);
        state.push_sample(SampleKind::AmbientDb, 42.0);
        let record = state.snapshot_record(false, 1, 2);
        state.push_sample(SampleKind::ToneHz, 440.0);

        assert_eq!(record.samples.len(), 1);
        assert_eq!(record.distraction.focus_lost_count, 1);
        assert_eq!(record.distraction.hidden_count, 2);
        assert!(!record.completed);
    }
}
