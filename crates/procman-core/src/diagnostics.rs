use serde::{Deserialize, Serialize};

const GENERIC_FAILURE: &str = "The spawned process exited with an exit code not equal to 0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// User-facing message attached to an operation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::warning(
            "Process timed out",
            format!("The process took longer than {timeout_ms}ms, so it was killed before ending."),
        )
    }

    /// Fatal diagnostic for a run whose final attempt failed.
    ///
    /// Prefers the trimmed stdout, then stderr, joined when both are present.
    pub fn run_failed(stdout: &str, stderr: &str) -> Self {
        let stdout = stdout.trim();
        let stderr = stderr.trim();

        let detail = match (stdout.is_empty(), stderr.is_empty()) {
            (false, false) => format!("{stdout}\n{stderr}"),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (true, true) => GENERIC_FAILURE.to_string(),
        };

        Self::error("Process failed to run", detail)
    }

    pub fn invalid_identifier(identifier: &str) -> Self {
        Self::warning(
            "Invalid process ID",
            format!(
                "`{identifier}` is not a live process ID. It must be the identifier returned by a \
                 start call in this session, and each identifier can only be ended once."
            ),
        )
    }
}
