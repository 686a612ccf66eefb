//! Execution engine: one spawn, an optional deadline, buffered output.

use procman_core::{
    CapturedOutput, OutputMode, ProcessHandle, ProcessLifecycle, ProcmanError,
    ResolvedInvocation, Result, RunResult,
};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Reap `handle` and drain its output streams.
///
/// Output only reaches EOF once every process holding the pipes is gone,
/// which can be long after the direct child exits.
async fn finish<H: ProcessHandle>(handle: &mut H) -> (anyhow::Result<ExitStatus>, CapturedOutput) {
    let status = handle.wait().await;
    let output = handle.collect_output().await;
    (status, output)
}

/// Spawn `invocation`, wait for it and return its captured output.
///
/// With a `timeout`, one deadline covers both the exit of the child and the
/// draining of its output. Once it passes, the process tree is force-killed
/// and the result is flagged `timed_out`. Spawn and wait failures are
/// returned as errors; a non-zero exit is reported through `has_error`.
pub async fn run_once<M: ProcessLifecycle>(
    manager: &M,
    invocation: &ResolvedInvocation,
    timeout: Option<Duration>,
) -> Result<RunResult> {
    info!(argv = ?invocation.argv(), "Run command");
    let mut handle = manager
        .spawn_process(invocation, OutputMode::Buffered)
        .await?;
    let pid = handle.get_pid();

    let finished = match timeout {
        Some(limit) => {
            debug!(?pid, timeout_ms = limit.as_millis() as u64, "Killing process when not done in time");
            timeout_at(Instant::now() + limit, finish(&mut handle)).await.ok()
        }
        None => Some(finish(&mut handle).await),
    };

    let (status, output, timed_out) = match finished {
        Some((status, output)) => (status, output, false),
        None => {
            warn!(
                ?pid,
                timeout_ms = timeout.map(|t| t.as_millis() as u64),
                argv = ?invocation.argv(),
                "Command timed out"
            );
            handle
                .start_kill()
                .map_err(|e| ProcmanError::Kill(format!("{e:#}")))?;
            let (status, output) = finish(&mut handle).await;
            (status, output, true)
        }
    };

    let status = status.map_err(|e| ProcmanError::Wait(format!("{e:#}")))?;

    debug!(
        ?pid,
        stdout = %output.stdout,
        stderr = %output.stderr,
        "Process exited"
    );
    info!(?pid, code = status.code(), success = status.success(), timed_out, "Process finished");

    Ok(RunResult {
        stdout: output.stdout,
        stderr: output.stderr,
        has_error: timed_out || !status.success(),
        timed_out,
    })
}
