#[cfg(unix)]
mod unix_impl {
    use anyhow::Result;
    use async_trait::async_trait;
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use procman_core::stdio::{ChildIo, configure_output};
    use procman_core::{
        CapturedOutput, OutputMode, ProcessHandle, ProcessId, ProcessLifecycle, ProcmanError,
        ResolvedInvocation,
    };
    use std::process::ExitStatus;
    use tokio::process::Child;
    use tracing::{debug, error, info};

    /// Unix-specific process handle implementation
    pub struct UnixProcessHandle {
        child: Child,
        /// Group the child leads; outlives the child once it is reaped
        process_group: Option<ProcessId>,
        command: String,
        args: Vec<String>,
        io: ChildIo,
    }

    impl UnixProcessHandle {
        pub fn new(child: Child, command: String, args: Vec<String>, io: ChildIo) -> Self {
            Self {
                process_group: child.id(),
                child,
                command,
                args,
                io,
            }
        }
    }

    #[async_trait]
    impl ProcessHandle for UnixProcessHandle {
        fn get_pid(&self) -> Option<ProcessId> {
            self.child.id()
        }

        fn get_command(&self) -> &str {
            &self.command
        }

        fn get_args(&self) -> &[String] {
            &self.args
        }

        // Signal 0 would still succeed for an exited, unreaped child, so ask
        // the child itself. The status is cached for the next `wait`.
        async fn is_running(&mut self) -> bool {
            match self.child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    debug!(command = %self.command, code = status.code(), "Process has exited");
                    false
                }
                Err(e) => {
                    debug!(command = %self.command, error = %e, "Could not poll process status");
                    false
                }
            }
        }

        async fn wait(&mut self) -> Result<ExitStatus> {
            let status = self.child.wait().await?;
            Ok(status)
        }

        fn start_kill(&mut self) -> Result<()> {
            let Some(pgid) = self.process_group else {
                debug!(command = %self.command, "Process exited before it was tracked, nothing to kill");
                return Ok(());
            };

            // Children lead their own process group, so this takes down
            // anything the interpreter forked as well, including background
            // jobs that outlive an already reaped interpreter.
            match signal::killpg(NixPid::from_raw(pgid as i32), Signal::SIGKILL) {
                Ok(()) => {
                    info!(pgid, "Sent SIGKILL to process group");
                    Ok(())
                }
                Err(Errno::ESRCH) if self.get_pid().is_none() => {
                    debug!(pgid, command = %self.command, "Process group already gone, nothing to kill");
                    Ok(())
                }
                Err(Errno::ESRCH) => {
                    debug!(pgid, "Process group not found, killing process directly");
                    self.child
                        .start_kill()
                        .map_err(|e| anyhow::anyhow!("Failed to kill process {pgid}: {e}"))
                }
                Err(e) => Err(anyhow::anyhow!(
                    "Failed to send SIGKILL to process group {pgid}: {e}"
                )),
            }
        }

        async fn collect_output(&mut self) -> CapturedOutput {
            self.io.collect().await
        }
    }

    /// Spawns children on Unix, each in a fresh process group
    #[derive(Debug, Default)]
    pub struct UnixProcessManager;

    impl UnixProcessManager {
        pub fn new() -> Self {
            debug!("Initializing Unix process manager");
            Self
        }
    }

    #[async_trait]
    impl ProcessLifecycle for UnixProcessManager {
        type Handle = UnixProcessHandle;

        async fn spawn_process(
            &self,
            invocation: &ResolvedInvocation,
            output: OutputMode,
        ) -> procman_core::Result<UnixProcessHandle> {
            let command = invocation.program().to_string();
            let args = invocation.args().to_vec();

            let mut cmd = invocation.to_command();
            configure_output(&mut cmd, output);
            cmd.process_group(0);
            // Runs are awaited to completion; a dropped run must not leak its child.
            cmd.kill_on_drop(output == OutputMode::Buffered);

            let mut child = cmd.spawn().map_err(|source| {
                error!(command = %command, args = ?args, error = %source, "Could not start process");
                ProcmanError::Spawn {
                    command: command.clone(),
                    source,
                }
            })?;

            if let Some(pid) = child.id() {
                info!(pid, command = %command, args = ?args, "Spawned Unix process");
            }

            let io = ChildIo::attach(&mut child, invocation.stdin());
            Ok(UnixProcessHandle::new(child, command, args, io))
        }
    }
}

// Re-export the Unix implementation when on Unix systems
#[cfg(unix)]
pub use unix_impl::{UnixProcessHandle, UnixProcessManager};

// Provide stub implementations for non-Unix systems
#[cfg(not(unix))]
pub struct UnixProcessHandle;

#[cfg(not(unix))]
#[derive(Debug, Default)]
pub struct UnixProcessManager;

#[cfg(not(unix))]
impl UnixProcessManager {
    pub fn new() -> Self {
        Self
    }
}
