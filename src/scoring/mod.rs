//! Report aggregation: a pure function from historical step records to a
//! caregiver-facing report. No controller state is involved; recomputing
//! from the same records always yields the same report.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{Module, SampleKind, StepRecord, STEPS_PER_MODULE};

const STEP_SCORE_MAX: f64 = 80.0;
const MODULE_SCORE_CAP: u32 = 100;
/// Points added per present-and-meaningful captured signal.
pub const BONUS_PER_SIGNAL: u32 = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleScore {
    pub module: Module,
    pub completed_steps: u32,
    pub step_score: u32,
    pub bonus: u32,
    pub score: u32,
}

/// Cross-module summary of the captured data, for the report's detail view.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectedData {
    pub ambient_db_avg: Option<f64>,
    pub motion_score_avg: Option<f64>,
    pub focus_lost_total: u32,
    pub hidden_total: u32,
    pub comfortable_yes: u32,
    pub distracted_yes: u32,
    pub preferred_tone_mode: Option<u32>,
    pub aversive_tone_mode: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub overall: u32,
    pub modules: Vec<ModuleScore>,
    pub collected: CollectedData,
}

impl Report {
    /// JSON export for the dashboard boundary.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds the report from the full record history (typically spanning many
/// sessions).
pub fn build_report(records: &[StepRecord]) -> Report {
    let modules: Vec<ModuleScore> = Module::ALL
        .iter()
        .map(|&module| module_score(module, records))
        .collect();
    let overall = (modules.iter().map(|m| m.score as f64).sum::<f64>() / modules.len() as f64)
        .round() as u32;
    Report {
        overall,
        modules,
        collected: collect_data(records),
    }
}

fn module_score(module: Module, records: &[StepRecord]) -> ModuleScore {
    let recs: Vec<&StepRecord> = records.iter().filter(|r| r.module == module).collect();
    let distinct: HashSet<u8> = recs
        .iter()
        .filter(|r| r.step_index < STEPS_PER_MODULE)
        .map(|r| r.step_index)
        .collect();
    let completed_steps = distinct.len() as u32;
    let step_score =
        ((completed_steps as f64 / STEPS_PER_MODULE as f64) * STEP_SCORE_MAX).round() as u32;
    let bonus = bonus_for(module, &recs);
    ModuleScore {
        module,
        completed_steps,
        step_score,
        bonus,
        score: (step_score + bonus).min(MODULE_SCORE_CAP),
    }
}

/// Records within one session are cumulative snapshots, so per-session
/// quantities are read from the latest record of each session. Encounter
/// order is preserved for deterministic tie-breaking.
fn latest_per_session<'a>(records: &[&'a StepRecord]) -> Vec<&'a StepRecord> {
    let mut latest: Vec<&StepRecord> = Vec::new();
    for &record in records {
        match latest
            .iter_mut()
            .find(|kept| kept.session_id == record.session_id)
        {
            Some(kept) => {
                if record.step_index >= kept.step_index {
                    *kept = record;
                }
            }
            None => latest.push(record),
        }
    }
    latest
}

fn bonus_for(module: Module, recs: &[&StepRecord]) -> u32 {
    let latest = latest_per_session(recs);
    let has_sample = |kind: SampleKind| {
        latest
            .iter()
            .any(|r| r.samples.iter().any(|s| s.kind == kind))
    };

    let mut signals = 0u32;
    if recs.iter().any(|r| r.mic_permission_granted) {
        signals += 1;
    }
    if has_sample(SampleKind::AmbientDb) {
        signals += 1;
    }
    if has_sample(SampleKind::ToneHz) {
        signals += 1;
    }
    if module == Module::Speech {
        let spoke = latest.iter().any(|r| {
            r.samples
                .iter()
                .any(|s| s.kind == SampleKind::RecordingSecs && s.value > 0.0)
        });
        if spoke {
            signals += 1;
        }
        if recs.iter().any(|r| r.answers.heard_clearly.is_some()) {
            signals += 1;
        }
    }
    if module == Module::Behavior {
        let answered = latest.iter().any(|r| {
            r.answers.behavior_answer_one.is_some() && r.answers.behavior_answer_two.is_some()
        });
        if answered {
            signals += 1;
        }
    }
    if module == Module::Frequency {
        let picked = latest.iter().any(|r| {
            r.answers.preferred_tone_hz.is_some() && r.answers.aversive_tone_hz.is_some()
        });
        if picked {
            signals += 1;
        }
    }
    if has_sample(SampleKind::CaptureSecs) {
        signals += 1;
    }
    if has_sample(SampleKind::MotionScore) {
        signals += 1;
    }
    if recs.iter().any(|r| r.answers.comfortable_now.is_some()) {
        signals += 1;
    }
    signals * BONUS_PER_SIGNAL
}

fn collect_data(records: &[StepRecord]) -> CollectedData {
    let all: Vec<&StepRecord> = records.iter().collect();
    let latest = latest_per_session(&all);

    let sample_mean = |kind: SampleKind| {
        let values: Vec<f64> = latest
            .iter()
            .flat_map(|r| r.samples.iter())
            .filter(|s| s.kind == kind)
            .map(|s| s.value)
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    let preferred: Vec<u32> = latest
        .iter()
        .filter_map(|r| r.answers.preferred_tone_hz)
        .collect();
    let aversive: Vec<u32> = latest
        .iter()
        .filter_map(|r| r.answers.aversive_tone_hz)
        .collect();

    CollectedData {
        ambient_db_avg: sample_mean(SampleKind::AmbientDb),
        motion_score_avg: sample_mean(SampleKind::MotionScore),
        focus_lost_total: latest.iter().map(|r| r.distraction.focus_lost_count).sum(),
        hidden_total: latest.iter().map(|r| r.distraction.hidden_count).sum(),
        comfortable_yes: records
            .iter()
            .filter(|r| r.answers.comfortable_now == Some(true))
            .count() as u32,
        distracted_yes: records
            .iter()
            .filter(|r| r.answers.distracted_now == Some(true))
            .count() as u32,
        preferred_tone_mode: mode(&preferred),
        aversive_tone_mode: mode(&aversive),
    }
}

/// Most frequent value; ties resolve to the first-encountered maximum.
fn mode(values: &[u32]) -> Option<u32> {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(u32, u32)> = None;
    for &v in values {
        let count = counts[&v];
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((v, count)),
        }
    }
    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answers, DistractionMetrics, TelemetrySample};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(module: Module, session: &str, step: u8) -> StepRecord {
        StepRecord {
            id: format!("{session}-{step}"),
            session_id: session.to_string(),
            module,
            step_index: step,
            completed: step + 1 == STEPS_PER_MODULE,
            at: Utc::now(),
            mic_permission_granted: false,
            samples: Vec::new(),
            answers: Answers::default(),
            distraction: DistractionMetrics::default(),
            log: Vec::new(),
        }
    }

    fn full_session(module: Module, session: &str) -> Vec<StepRecord> {
        (0..STEPS_PER_MODULE)
            .map(|step| record(module, session, step))
            .collect()
    }

    #[test]
    fn three_distinct_steps_without_signals_score_eighty() {
        let records = full_session(Module::Intonation, "s1");
        let report = build_report(&records);
        let score = report
            .modules
            .iter()
            .find(|m| m.module == Module::Intonation)
            .unwrap();
        assert_eq!(score.completed_steps, 3);
        assert_eq!(score.step_score, 80);
        assert_eq!(score.bonus, 0);
        assert_eq!(score.score, 80);
    }

    #[test]
    fn report_is_deterministic() {
        let mut records = full_session(Module::Behavior, "s1");
        records.extend(full_session(Module::Speech, "s2"));
        assert_eq!(build_report(&records), build_report(&records));
    }

    #[test]
    fn mode_prefers_first_encountered_maximum() {
        assert_eq!(mode(&[440, 440, 600]), Some(440));
        assert_eq!(mode(&[600, 440, 440, 600]), Some(600));
        assert_eq!(mode(&[]), None);
        assert_eq!(mode(&[880]), Some(880));
    }

    #[test]
    fn bonus_signals_add_ten_each_and_cap_at_hundred() {
        let mut records = full_session(Module::Frequency, "s1");
        for r in &mut records {
            r.mic_permission_granted = true;
            r.answers.preferred_tone_hz = Some(440);
            r.answers.aversive_tone_hz = Some(4000);
            r.answers.comfortable_now = Some(true);
        }
        records[2]
            .samples
            .push(TelemetrySample::now(SampleKind::AmbientDb, 41.0));
        records[2]
            .samples
            .push(TelemetrySample::now(SampleKind::ToneHz, 440.0));

        let report = build_report(&records);
        let score = report
            .modules
            .iter()
            .find(|m| m.module == Module::Frequency)
            .unwrap();
        // permission + ambient + tone + picks + comfort = 5 signals
        assert_eq!(score.bonus, 50);
        assert_eq!(score.score, 100);
    }

    #[test]
    fn behavior_module_with_answers_reaches_at_least_eighty() {
        let mut records = full_session(Module::Behavior, "s1");
        for r in &mut records {
            r.answers.behavior_answer_one = Some(true);
            r.answers.behavior_answer_two = Some(false);
        }
        let report = build_report(&records);
        let score = report
            .modules
            .iter()
            .find(|m| m.module == Module::Behavior)
            .unwrap();
        assert!(score.score >= 80);
        assert_eq!(score.bonus, BONUS_PER_SIGNAL);
    }

    #[test]
    fn collected_data_reads_latest_record_per_session() {
        let mut records = full_session(Module::Frequency, "s1");
        // Cumulative snapshots: every record of the session carries the
        // ambient sample once it exists.
        for r in &mut records {
            r.samples
                .push(TelemetrySample::now(SampleKind::AmbientDb, 40.0));
            r.distraction.focus_lost_count = 2;
        }
        let mut other = full_session(Module::Frequency, "s2");
        for r in &mut other {
            r.samples
                .push(TelemetrySample::now(SampleKind::AmbientDb, 60.0));
            r.answers.preferred_tone_hz = Some(440);
        }
        records.extend(other);

        let collected = build_report(&records).collected;
        assert_eq!(collected.ambient_db_avg, Some(50.0));
        assert_eq!(collected.focus_lost_total, 2);
        assert_eq!(collected.preferred_tone_mode, Some(440));
    }

    #[test]
    fn overall_is_rounded_mean_of_module_scores() {
        let records = full_session(Module::Intonation, "s1");
        let report = build_report(&records);
        // One module at 80, four at 0.
        assert_eq!(report.overall, 16);
    }
}
