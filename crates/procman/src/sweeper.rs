use procman_core::{ProcessHandle, ProcessRegistry};
use tracing::{info, warn};

/// Force-kill every process still in `registry`.
///
/// Best effort: individual kill failures are logged and skipped. Entries are
/// left in place and nothing is awaited, so this is safe to call from `Drop`
/// or a signal handler. Returns the number of kills delivered.
pub fn sweep<H: ProcessHandle>(registry: &ProcessRegistry<H>) -> usize {
    let mut killed = 0;

    registry.for_each_mut(|id, handle| {
        let pid = handle.get_pid();
        match handle.start_kill() {
            Ok(()) => {
                killed += 1;
                info!(identifier = %id, ?pid, command = %handle.get_command(), "Killed orphaned process");
            }
            Err(e) => {
                warn!(identifier = %id, ?pid, error = %e, "Failed to kill orphaned process");
            }
        }
    });

    killed
}

/// Sweeps its registry when dropped.
///
/// Obtained from [`crate::ProcessEngine::shutdown_guard`] and held by the
/// host for as long as started processes may outlive their callers.
#[must_use = "the registry is swept as soon as the guard is dropped"]
pub struct ShutdownGuard<H: ProcessHandle> {
    registry: ProcessRegistry<H>,
}

impl<H: ProcessHandle> ShutdownGuard<H> {
    pub fn new(registry: ProcessRegistry<H>) -> Self {
        Self { registry }
    }
}

impl<H: ProcessHandle> Drop for ShutdownGuard<H> {
    fn drop(&mut self) {
        let count = self.registry.len();
        if count > 0 {
            info!(count, "Cleaning up started processes");
            sweep(&self.registry);
        }
    }
}
