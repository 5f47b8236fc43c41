use crate::locale::MessageKey;
use crate::models::{Answers, Module};

pub type GuardFn = fn(&Answers) -> bool;

/// Required-input guard for a (module, step) pair: a pure predicate over
/// the current answers plus the prompt to show while it is unmet. `None`
/// means the step has no gate.
pub fn guard_for(module: Module, step: u8) -> Option<(GuardFn, MessageKey)> {
    match (module, step) {
        (Module::Frequency, 2) => Some((
            |a| a.preferred_tone_hz.is_some() && a.aversive_tone_hz.is_some(),
            MessageKey::NeedTonePicks,
        )),
        (Module::Speech, 2) => Some((
            |a| {
                a.heard_clearly.is_some()
                    && a.was_distracted.is_some()
                    && a.wants_repeat.is_some()
            },
            MessageKey::NeedSpeechAnswers,
        )),
        (Module::Behavior, 0) => Some((
            |a| a.behavior_answer_one.is_some(),
            MessageKey::NeedBehaviorAnswer,
        )),
        (Module::Behavior, 1) => Some((
            |a| a.behavior_answer_two.is_some(),
            MessageKey::NeedBehaviorAnswer,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STEPS_PER_MODULE;

    #[test]
    fn frequency_summary_needs_both_picks() {
        let (guard, _) = guard_for(Module::Frequency, 2).unwrap();
        let mut answers = Answers::default();
        assert!(!guard(&answers));
        answers.preferred_tone_hz = Some(440);
        assert!(!guard(&answers));
        answers.aversive_tone_hz = Some(4000);
        assert!(guard(&answers));
    }

    #[test]
    fn speech_summary_needs_all_three_answers() {
        let (guard, _) = guard_for(Module::Speech, 2).unwrap();
        let answers = Answers {
            heard_clearly: Some(true),
            was_distracted: Some(false),
            ..Answers::default()
        };
        assert!(!guard(&answers));
        let answers = Answers {
            wants_repeat: Some(false),
            ..answers
        };
        assert!(guard(&answers));
    }

    #[test]
    fn behavior_gates_first_two_steps_only() {
        assert!(guard_for(Module::Behavior, 0).is_some());
        assert!(guard_for(Module::Behavior, 1).is_some());
        assert!(guard_for(Module::Behavior, 2).is_none());
    }

    #[test]
    fn ungated_modules_have_no_guards() {
        for module in [Module::Intonation, Module::Responsiveness] {
            for step in 0..STEPS_PER_MODULE {
                assert!(guard_for(module, step).is_none());
            }
        }
    }
}
