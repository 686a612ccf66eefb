//! procman - start, run and end child processes from configuration
//!
//! [`ProcessEngine`] resolves the applicable [`CommandSpec`] for the host
//! platform and then either runs it to completion with timeout and retries,
//! or starts it in the background and hands out a [`ProcessIdentifier`] that
//! a later `end` call consumes.
//!
//! ```rust,no_run
//! use procman::{CommandSpec, Platform, RunOptions};
//!
//! # async fn demo() -> procman::Result<()> {
//! let engine = procman::for_current_platform();
//! let _guard = engine.shutdown_guard();
//!
//! let spec = CommandSpec::builder()
//!     .platforms(Platform::ALL)
//!     .command("echo hi")
//!     .build()
//!     .map_err(|e| procman::ProcmanError::configuration(e.to_string()))?;
//!
//! if let Some(report) = engine.run(&[spec], &RunOptions::default()).await? {
//!     println!("{}", report.result.stdout);
//! }
//! # Ok(())
//! # }
//! ```

mod engine;
mod execute;
mod factory;
mod retry;
mod sweeper;
mod termination;

#[cfg(all(test, unix))]
mod testing;

pub use engine::{ProcessEngine, RunReport, Started};
pub use execute::run_once;
pub use factory::{PlatformProcessManager, PlatformProcessManagerFactory};
pub use retry::run_with_retries;
pub use sweeper::{ShutdownGuard, sweep};
pub use termination::{EndOutcome, terminate};

// Re-export core functionality
pub use procman_core::*;

/// Engine backed by the process manager of the platform this crate was built for
pub type PlatformEngine = ProcessEngine<PlatformProcessManager>;

/// Create an engine for the host platform
pub fn for_current_platform() -> PlatformEngine {
    tracing::debug!(
        platform = PlatformProcessManagerFactory::platform_name(),
        "Creating process engine"
    );
    ProcessEngine::new(PlatformProcessManagerFactory::create_process_manager())
}
