use crate::domain::SourceKey;

/// Error surfaced at the binary boundary, carrying the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failure to obtain usable bytes for a source.
///
/// This is the only hard failure in the pipeline. The source reader converts it
/// into an empty table so it never propagates past that boundary.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network failure, timeout, HTTP error status, or a payload that is not tabular.
    #[error("source `{key}` unavailable: {reason}")]
    Unavailable { key: SourceKey, reason: String },

    /// The on-disk cache could not be read or written.
    #[error("cache storage error for `{key}`: {source}")]
    Storage {
        key: SourceKey,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn unavailable(key: SourceKey, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            key,
            reason: reason.into(),
        }
    }

    pub fn key(&self) -> SourceKey {
        match self {
            Self::Unavailable { key, .. } | Self::Storage { key, .. } => *key,
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::new(4, err.to_string())
    }
}
