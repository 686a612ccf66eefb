use anyhow::Result;
use async_trait::async_trait;
use procman_core::stdio::{ChildIo, configure_output};
use procman_core::{
    CapturedOutput, OutputMode, ProcessHandle, ProcessId, ProcessLifecycle, ProcmanError,
    ResolvedInvocation,
};
use std::process::ExitStatus;
use sysinfo::System;
use tokio::process::Child;
use tracing::{debug, error, info, warn};

/// Windows-specific process handle implementation
pub struct WindowsProcessHandle {
    child: Child,
    command: String,
    args: Vec<String>,
    io: ChildIo,
}

impl WindowsProcessHandle {
    pub fn new(child: Child, command: String, args: Vec<String>, io: ChildIo) -> Self {
        Self {
            child,
            command,
            args,
            io,
        }
    }
}

#[async_trait]
impl ProcessHandle for WindowsProcessHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        self.child.id()
    }

    fn get_command(&self) -> &str {
        &self.command
    }

    fn get_args(&self) -> &[String] {
        &self.args
    }

    async fn is_running(&mut self) -> bool {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(command = %self.command, code = status.code(), "Process has exited");
            return false;
        }
        let Some(pid) = self.get_pid() else {
            warn!("Windows process handle has no PID - process may have exited");
            return false;
        };

        let mut system = System::new();
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            sysinfo::ProcessRefreshKind::everything(),
        );
        system.processes().keys().any(|p| p.as_u32() == pid)
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().await?;
        Ok(status)
    }

    fn start_kill(&mut self) -> Result<()> {
        let Some(pid) = self.get_pid() else {
            debug!(command = %self.command, "Process already reaped, nothing to kill");
            return Ok(());
        };

        match spawn_taskkill_tree(pid) {
            Ok(()) => {
                info!(pid, "Started taskkill for process tree");
                Ok(())
            }
            Err(e) => {
                warn!(pid, error = %e, "Could not start taskkill, killing process directly");
                self.child
                    .start_kill()
                    .map_err(|e| anyhow::anyhow!("Failed to kill process {pid}: {e}"))
            }
        }
    }

    async fn collect_output(&mut self) -> CapturedOutput {
        self.io.collect().await
    }
}

/// Launch `taskkill /F /T` against a process tree without waiting for it.
///
/// `start_kill` runs on runtime worker threads and under the registry lock
/// during a sweep, so it must not block. The caller's `wait` observes the
/// tree going away.
fn spawn_taskkill_tree(pid: u32) -> Result<()> {
    std::process::Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    Ok(())
}

/// Spawns children on Windows without a console window
#[derive(Debug, Default)]
pub struct WindowsProcessManager;

impl WindowsProcessManager {
    pub fn new() -> Self {
        debug!("Initializing Windows process manager");
        Self
    }
}

#[async_trait]
impl ProcessLifecycle for WindowsProcessManager {
    type Handle = WindowsProcessHandle;

    async fn spawn_process(
        &self,
        invocation: &ResolvedInvocation,
        output: OutputMode,
    ) -> procman_core::Result<WindowsProcessHandle> {
        let command = invocation.program().to_string();
        let args = invocation.args().to_vec();

        let mut cmd = invocation.to_command();
        configure_output(&mut cmd, output);
        cmd.kill_on_drop(output == OutputMode::Buffered);

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW (0x08000000) - Creates a process without a console window
            cmd.creation_flags(0x08000000);
        }

        let mut child = cmd.spawn().map_err(|source| {
            error!(command = %command, args = ?args, error = %source, "Could not start process");
            ProcmanError::Spawn {
                command: command.clone(),
                source,
            }
        })?;

        if let Some(pid) = child.id() {
            info!(pid, command = %command, args = ?args, "Spawned Windows process");
        }

        let io = ChildIo::attach(&mut child, invocation.stdin());
        Ok(WindowsProcessHandle::new(child, command, args, io))
    }
}
