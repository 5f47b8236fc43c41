use serde::{Deserialize, Serialize};

/// Languages the engine can render status and log messages in.
/// Unknown locale tags fall back to English.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Locale {
    En,
    Es,
}

impl Default for Locale {
    fn default() -> Self {
        Locale::En
    }
}

impl Locale {
    pub fn from_tag(tag: &str) -> Self {
        match tag.split(['-', '_']).next().unwrap_or("") {
            "es" => Locale::Es,
            _ => Locale::En,
        }
    }
}

/// Fixed set of user-facing message identifiers. The engine never builds
/// sentences itself; every string shown to a caregiver comes out of this
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    SessionStarted,
    StepDone,
    SessionComplete,
    NeedTonePicks,
    NeedSpeechAnswers,
    NeedBehaviorAnswer,
    AmbientMeasured,
    TonePlayed,
    RecordingCaptured,
    CaptureStarted,
    CaptureStopped,
    MicPermissionDenied,
    CameraPermissionDenied,
    DeviceUnavailable,
    GenericFailure,
}

pub fn resolve(locale: Locale, key: MessageKey) -> &'static str {
    match locale {
        Locale::En => english(key),
        Locale::Es => spanish(key),
    }
}

fn english(key: MessageKey) -> &'static str {
    match key {
        MessageKey::SessionStarted => "Session started",
        MessageKey::StepDone => "Step completed",
        MessageKey::SessionComplete => "All steps completed",
        MessageKey::NeedTonePicks => "Pick a most pleasant and a least pleasant tone first",
        MessageKey::NeedSpeechAnswers => "Answer the three listening questions first",
        MessageKey::NeedBehaviorAnswer => "Answer the question to continue",
        MessageKey::AmbientMeasured => "Ambient noise measured",
        MessageKey::TonePlayed => "Played tone",
        MessageKey::RecordingCaptured => "Voice sample recorded",
        MessageKey::CaptureStarted => "Camera observation started",
        MessageKey::CaptureStopped => "Camera observation stopped",
        MessageKey::MicPermissionDenied => "Microphone access was denied",
        MessageKey::CameraPermissionDenied => "Camera access was denied",
        MessageKey::DeviceUnavailable => "A required device is not available",
        MessageKey::GenericFailure => "Something went wrong, please try again",
    }
}

fn spanish(key: MessageKey) -> &'static str {
    match key {
        MessageKey::SessionStarted => "Sesión iniciada",
        MessageKey::StepDone => "Paso completado",
        MessageKey::SessionComplete => "Todos los pasos completados",
        MessageKey::NeedTonePicks => "Primero elige el tono más agradable y el menos agradable",
        MessageKey::NeedSpeechAnswers => "Primero responde las tres preguntas de escucha",
        MessageKey::NeedBehaviorAnswer => "Responde la pregunta para continuar",
        MessageKey::AmbientMeasured => "Ruido ambiental medido",
        MessageKey::TonePlayed => "Tono reproducido",
        MessageKey::RecordingCaptured => "Muestra de voz grabada",
        MessageKey::CaptureStarted => "Observación con cámara iniciada",
        MessageKey::CaptureStopped => "Observación con cámara detenida",
        MessageKey::MicPermissionDenied => "Se denegó el acceso al micrófono",
        MessageKey::CameraPermissionDenied => "Se denegó el acceso a la cámara",
        MessageKey::DeviceUnavailable => "Un dispositivo necesario no está disponible",
        MessageKey::GenericFailure => "Algo salió mal, inténtalo de nuevo",
    }
}
