use std::path::PathBuf;

/// Errors surfaced by the meta-d′ library.
///
/// Only malformed input or configuration aborts a call. Numerical trouble
/// during optimization is absorbed and reported through `FitResult::success`.
#[derive(Debug, thiserror::Error)]
pub enum DmcError {
    #[error("Input shape error: {0}")]
    InputShape(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(String),
}

impl DmcError {
    pub fn input_shape(message: impl Into<String>) -> Self {
        Self::InputShape(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code a wrapping tool should use for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DmcError::InvalidConfig(_) | DmcError::UnsupportedMode(_) => 2,
            DmcError::Io { .. } | DmcError::Json(_) => 2,
            DmcError::InputShape(_) | DmcError::InvalidInput(_) => 3,
        }
    }
}
