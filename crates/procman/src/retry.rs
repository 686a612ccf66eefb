use crate::execute::run_once;
use backon::{ConstantBuilder, Retryable};
use procman_core::{ProcessLifecycle, ProcmanError, ResolvedInvocation, Result, RunOptions, RunResult};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Outcome of one attempt as seen by the retry loop
enum AttemptError {
    /// The process ran but exited unsuccessfully
    Failed(RunResult),
    /// Spawning or waiting failed; never retried
    Fatal(ProcmanError),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        matches!(self, AttemptError::Failed(_))
    }
}

/// Run `invocation` up to `options.tries` times.
///
/// Stops at the first attempt without `has_error` and sleeps
/// `options.retry_interval()` between failing attempts. The returned result
/// is always the last attempt made. Fatal errors abort the loop at once.
pub async fn run_with_retries<M: ProcessLifecycle>(
    manager: &M,
    invocation: &ResolvedInvocation,
    options: &RunOptions,
) -> Result<RunResult> {
    options.validate()?;
    debug!(
        tries = options.tries,
        retry_interval_ms = options.retry_interval_ms,
        "Run process"
    );

    let backoff = ConstantBuilder::default()
        .with_delay(options.retry_interval())
        .with_max_times(options.tries.saturating_sub(1) as usize);
    let attempts = AtomicU32::new(0);

    let run_attempt = || async {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(attempt, tries = options.tries, "Starting attempt");

        match run_once(manager, invocation, options.timeout()).await {
            Ok(result) if result.has_error => Err(AttemptError::Failed(result)),
            Ok(result) => Ok(result),
            Err(e) => Err(AttemptError::Fatal(e)),
        }
    };

    let outcome = run_attempt
        .retry(backoff)
        .when(AttemptError::is_retryable)
        .notify(|_, delay| {
            let made = attempts.load(Ordering::Relaxed);
            warn!(
                attempt = made,
                retries_left = options.tries.saturating_sub(made),
                delay_ms = delay.as_millis() as u64,
                "Running process failed, retrying"
            );
        })
        .await;

    match outcome {
        Ok(result) | Err(AttemptError::Failed(result)) => Ok(result),
        Err(AttemptError::Fatal(e)) => Err(e),
    }
}
