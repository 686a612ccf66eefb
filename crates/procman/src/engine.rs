use crate::retry::run_with_retries;
use crate::sweeper::{ShutdownGuard, sweep};
use crate::termination::{EndOutcome, terminate};
use procman_core::{
    CommandSpec, Diagnostic, OutputMode, Platform, ProcessHandle, ProcessId, ProcessIdentifier,
    ProcessLifecycle, ProcessRegistry, ResolvedInvocation, Result, RunOptions, RunResult, resolve,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A process launched by [`ProcessEngine::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Started {
    pub identifier: ProcessIdentifier,
    pub pid: Option<ProcessId>,
}

/// Result of [`ProcessEngine::run`] together with its user-facing messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub result: RunResult,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Whether a diagnostic asks the caller to fail the operation
    pub fn is_failure(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Entry point for the start / run / end operations.
///
/// Owns the registry that bridges `start` and `end`. Clones share both the
/// process manager and the registry.
pub struct ProcessEngine<M: ProcessLifecycle> {
    manager: Arc<M>,
    registry: ProcessRegistry<M::Handle>,
    platform: Option<Platform>,
}

impl<M: ProcessLifecycle> Clone for ProcessEngine<M> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            registry: self.registry.clone(),
            platform: self.platform,
        }
    }
}

impl<M: ProcessLifecycle> ProcessEngine<M> {
    /// Engine resolving commands for the host platform
    pub fn new(manager: M) -> Self {
        Self {
            manager: Arc::new(manager),
            registry: ProcessRegistry::new(),
            platform: Platform::current(),
        }
    }

    /// Resolve commands as if running on `platform`
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn registry(&self) -> &ProcessRegistry<M::Handle> {
        &self.registry
    }

    /// Pick the invocation for this engine's platform.
    ///
    /// `None` when no spec applies, including on hosts with no known
    /// platform identifier.
    pub fn resolve(&self, specs: &[CommandSpec]) -> Result<Option<ResolvedInvocation>> {
        let Some(platform) = self.platform else {
            debug!("Host platform is not supported, no command applies");
            return Ok(None);
        };
        resolve(specs, platform)
    }

    /// Spawn the applicable command and register it without waiting.
    ///
    /// The child's stdout and stderr are discarded. Returns `None` when no
    /// command applies to the platform.
    pub async fn start(&self, specs: &[CommandSpec]) -> Result<Option<Started>> {
        let Some(invocation) = self.resolve(specs)? else {
            return Ok(None);
        };

        let handle = self
            .manager
            .spawn_process(&invocation, OutputMode::Discarded)
            .await?;
        let started = Started {
            identifier: ProcessIdentifier::new(),
            pid: handle.get_pid(),
        };
        self.registry.put(started.identifier, handle);

        info!(
            identifier = %started.identifier,
            pid = ?started.pid,
            argv = ?invocation.argv(),
            env = ?invocation.redacted_env(),
            "Started process"
        );
        Ok(Some(started))
    }

    /// Run the applicable command to completion, retrying per `options`.
    ///
    /// A timed out final attempt adds a warning; with `fail_on_error` an
    /// unsuccessful final attempt adds an error built from its output.
    pub async fn run(
        &self,
        specs: &[CommandSpec],
        options: &RunOptions,
    ) -> Result<Option<RunReport>> {
        options.validate()?;
        let Some(invocation) = self.resolve(specs)? else {
            return Ok(None);
        };

        let result = run_with_retries(self.manager.as_ref(), &invocation, options).await?;

        let mut diagnostics = Vec::new();
        if result.timed_out {
            diagnostics.push(Diagnostic::timed_out(options.timeout_ms));
        }
        if options.fail_on_error && result.has_error {
            diagnostics.push(Diagnostic::run_failed(&result.stdout, &result.stderr));
        }

        Ok(Some(RunReport {
            result,
            diagnostics,
        }))
    }

    /// Kill or wait for a process returned by [`ProcessEngine::start`]
    pub async fn end(&self, identifier: &ProcessIdentifier, kill: bool) -> Result<EndOutcome> {
        terminate(&self.registry, identifier, kill).await
    }

    /// Like [`ProcessEngine::end`] for an identifier in text form.
    ///
    /// Text that does not parse as an identifier is reported the same way
    /// as an unknown one.
    pub async fn end_str(&self, identifier: &str, kill: bool) -> Result<EndOutcome> {
        match identifier.parse::<ProcessIdentifier>() {
            Ok(id) => self.end(&id, kill).await,
            Err(_) => {
                warn!(identifier, "Malformed process identifier");
                Ok(EndOutcome::InvalidIdentifier {
                    identifier: identifier.to_string(),
                })
            }
        }
    }

    /// Number of started processes not yet ended
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Force-kill every started process that was never ended
    pub fn sweep(&self) -> usize {
        sweep(&self.registry)
    }

    /// Guard that sweeps this engine's registry when dropped
    pub fn shutdown_guard(&self) -> ShutdownGuard<M::Handle> {
        ShutdownGuard::new(self.registry.clone())
    }
}
