use serde::{Deserialize, Serialize};

/// Fixed number of steps in every module's session.
pub const STEPS_PER_MODULE: u8 = 3;

/// The five assessment categories. The module id decides which step
/// behaviors and input guards apply; it never changes once a session starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Module {
    Frequency,
    Speech,
    Intonation,
    Responsiveness,
    Behavior,
}

impl Module {
    pub const ALL: [Module; 5] = [
        Module::Frequency,
        Module::Speech,
        Module::Intonation,
        Module::Responsiveness,
        Module::Behavior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Frequency => "frequency",
            Module::Speech => "speech",
            Module::Intonation => "intonation",
            Module::Responsiveness => "responsiveness",
            Module::Behavior => "behavior",
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
