use procman_core::{
    Diagnostic, ProcessHandle, ProcessIdentifier, ProcessRegistry, ProcmanError, Result,
};
use tracing::{info, warn};

/// Non-fatal outcome of ending a started process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    /// The process was killed or waited for
    Ended { has_error: bool },
    /// The identifier was never issued or has already been ended
    InvalidIdentifier { identifier: String },
}

impl EndOutcome {
    pub fn has_error(&self) -> bool {
        matches!(self, EndOutcome::Ended { has_error: true })
    }

    /// Warning to surface for an unusable identifier
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            EndOutcome::Ended { .. } => None,
            EndOutcome::InvalidIdentifier { identifier } => {
                Some(Diagnostic::invalid_identifier(identifier))
            }
        }
    }
}

/// Finalize the process registered under `id`.
///
/// The registry entry is consumed before anything else happens, so a second
/// call with the same identifier always yields
/// [`EndOutcome::InvalidIdentifier`]. With `force_kill` the whole process
/// tree is killed and reaped; otherwise this waits for a natural exit and
/// reports a non-zero status through `has_error`.
pub async fn terminate<H: ProcessHandle>(
    registry: &ProcessRegistry<H>,
    id: &ProcessIdentifier,
    force_kill: bool,
) -> Result<EndOutcome> {
    let Some(mut handle) = registry.take(id) else {
        warn!(identifier = %id, "Invalid or already ended process identifier");
        return Ok(EndOutcome::InvalidIdentifier {
            identifier: id.to_string(),
        });
    };
    let pid = handle.get_pid();

    if force_kill {
        handle
            .kill()
            .await
            .map_err(|e| ProcmanError::Kill(format!("{e:#}")))?;
        info!(identifier = %id, ?pid, "Killed process");
        return Ok(EndOutcome::Ended { has_error: false });
    }

    let status = handle
        .wait()
        .await
        .map_err(|e| ProcmanError::Wait(format!("{e:#}")))?;
    info!(identifier = %id, ?pid, code = status.code(), "Process ended");

    Ok(EndOutcome::Ended {
        has_error: !status.success(),
    })
}
