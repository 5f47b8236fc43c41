use thiserror::Error;

/// Device a permission or availability failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Microphone,
    Camera,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Microphone => write!(f, "microphone"),
            DeviceKind::Camera => write!(f, "camera"),
        }
    }
}

/// Failure taxonomy for device-facing operations.
///
/// Guard misses ("fill in the answers first") are not errors; they are a
/// normal return-path decision in the session controller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} permission denied")]
    PermissionDenied(DeviceKind),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Unexpected(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn anyhow_context_chain_folds_into_unexpected() {
        let source: anyhow::Result<()> = Err(anyhow::anyhow!("device busy"));
        let err: EngineError = source
            .context("failed to open input stream")
            .unwrap_err()
            .into();
        match err {
            EngineError::Unexpected(msg) => {
                assert!(msg.contains("failed to open input stream"));
                assert!(msg.contains("device busy"));
            }
            other => panic!("wrong variant: {other}"),
        }
    }
}
