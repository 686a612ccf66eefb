use thiserror::Error;

/// Fatal error kinds raised by process lifecycle operations.
///
/// Non-zero exits, timeouts and unknown identifiers are not errors: they are
/// reported through [`RunResult`](crate::RunResult) flags and
/// [`Diagnostic`](crate::Diagnostic) values instead.
#[derive(Error, Debug)]
pub enum ProcmanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to decode base64 stdin: {0}")]
    Decoding(#[from] base64::DecodeError),

    #[error("Failed to spawn process `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for process exit: {0}")]
    Wait(String),

    #[error("Failed to kill process: {0}")]
    Kill(String),
}

impl ProcmanError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ProcmanError::Configuration(message.into())
    }

    /// Errors raised before any child process existed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ProcmanError::Configuration(_) | ProcmanError::Decoding(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProcmanError>;
