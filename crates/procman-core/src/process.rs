use crate::error::Result as ProcmanResult;
use crate::resolve::ResolvedInvocation;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::ExitStatus;
use std::str::FromStr;
use uuid::Uuid;

/// Native OS process id
pub type ProcessId = u32;

/// Opaque token handed out by `start` and consumed by `end`.
///
/// Unique per spawn for the lifetime of the hosting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessIdentifier(Uuid);

impl ProcessIdentifier {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for ProcessIdentifier {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Captured output and outcome flags of one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    /// The process exited with a non-zero (or abnormal) status
    pub has_error: bool,
    /// The process was killed for exceeding its timeout
    pub timed_out: bool,
}

/// Text read from a child's stdout and stderr
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// What happens to a child's stdout/stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Buffer both streams in memory until the process exits
    Buffered,
    /// Send both streams to the null device
    Discarded,
}

/// Handle to a spawned child process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None once the process has been reaped)
    fn get_pid(&self) -> Option<ProcessId>;

    /// Get the program that started this process
    fn get_command(&self) -> &str;

    /// Get the arguments passed to this process
    fn get_args(&self) -> &[String];

    /// Check if the process is still running (non-blocking).
    ///
    /// A child that has exited reports `false` even before `wait` is called;
    /// its exit status stays available to a later `wait`.
    async fn is_running(&mut self) -> bool;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ExitStatus>;

    /// Deliver a forced kill without waiting for the process to go away.
    ///
    /// Safe to call from synchronous contexts such as shutdown hooks.
    fn start_kill(&mut self) -> Result<()>;

    /// Force kill the process and reap it
    async fn kill(&mut self) -> Result<()> {
        self.start_kill()?;
        self.wait().await?;
        Ok(())
    }

    /// Drain whatever the child wrote to its buffered streams.
    ///
    /// Returns empty output for [`OutputMode::Discarded`] handles.
    async fn collect_output(&mut self) -> CapturedOutput;
}

/// Platform-specific spawning of resolved invocations
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    /// The type of process handle this lifecycle manager produces
    type Handle: ProcessHandle + 'static;

    /// Spawn a new process; failures surface as `ProcmanError::Spawn`
    async fn spawn_process(
        &self,
        invocation: &ResolvedInvocation,
        output: OutputMode,
    ) -> ProcmanResult<Self::Handle>;
}

/// Factory trait for creating platform-specific process managers
pub trait ProcessManagerFactory {
    /// The type of process manager this factory creates
    type Manager: ProcessLifecycle;

    /// Create a process manager for the current platform
    fn create_process_manager() -> Self::Manager;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
