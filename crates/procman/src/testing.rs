//! Scripted process manager for exercising the engine without real children.

use async_trait::async_trait;
use procman_core::{
    CapturedOutput, CommandSpec, OutputMode, Platform, ProcessHandle, ProcessId,
    ProcessLifecycle, ProcmanError, ResolvedInvocation, resolve,
};
use std::collections::VecDeque;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the next spawned fake process does
#[derive(Debug, Clone)]
pub enum Step {
    Exit { code: i32, stdout: String },
    /// Never exits on its own
    Hang,
    /// Exits cleanly, but its output stays open until it is killed
    Lingering { stdout: String },
    SpawnFails,
    WaitFails,
}

impl Step {
    pub fn exit(code: i32, stdout: &str) -> Self {
        Step::Exit {
            code,
            stdout: stdout.to_string(),
        }
    }

    pub fn lingering(stdout: &str) -> Self {
        Step::Lingering {
            stdout: stdout.to_string(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedManager {
    steps: Arc<Mutex<VecDeque<Step>>>,
    spawns: Arc<AtomicUsize>,
    kills: Arc<AtomicUsize>,
}

impl ScriptedManager {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Default::default()
        }
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

pub struct ScriptedHandle {
    pid: ProcessId,
    step: Step,
    killed: bool,
    reaped: bool,
    kills: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessHandle for ScriptedHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        (!self.reaped).then_some(self.pid)
    }

    fn get_command(&self) -> &str {
        "scripted"
    }

    fn get_args(&self) -> &[String] {
        &[]
    }

    async fn is_running(&mut self) -> bool {
        !self.reaped && !self.killed
    }

    async fn wait(&mut self) -> anyhow::Result<ExitStatus> {
        if self.killed {
            self.reaped = true;
            return Ok(ExitStatus::from_raw(9));
        }
        match &self.step {
            Step::Exit { code, .. } => {
                self.reaped = true;
                Ok(ExitStatus::from_raw(code << 8))
            }
            Step::Lingering { .. } => {
                self.reaped = true;
                Ok(ExitStatus::from_raw(0))
            }
            Step::WaitFails => Err(anyhow::anyhow!("no child processes")),
            Step::Hang | Step::SpawnFails => std::future::pending().await,
        }
    }

    fn start_kill(&mut self) -> anyhow::Result<()> {
        self.killed = true;
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn collect_output(&mut self) -> CapturedOutput {
        match &self.step {
            Step::Exit { stdout, .. } => CapturedOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            },
            Step::Lingering { stdout } if self.killed => CapturedOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            },
            Step::Lingering { .. } => std::future::pending().await,
            _ => CapturedOutput::default(),
        }
    }
}

#[async_trait]
impl ProcessLifecycle for ScriptedManager {
    type Handle = ScriptedHandle;

    async fn spawn_process(
        &self,
        invocation: &ResolvedInvocation,
        _output: OutputMode,
    ) -> procman_core::Result<ScriptedHandle> {
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted");
        let pid = self.spawns.fetch_add(1, Ordering::SeqCst) as ProcessId + 1000;

        if let Step::SpawnFails = step {
            return Err(ProcmanError::Spawn {
                command: invocation.program().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        Ok(ScriptedHandle {
            pid,
            step,
            killed: false,
            reaped: false,
            kills: self.kills.clone(),
        })
    }
}

pub fn spec(command: &str) -> CommandSpec {
    CommandSpec::builder()
        .platforms(Platform::ALL)
        .command(command)
        .build()
        .unwrap()
}

pub fn invocation() -> ResolvedInvocation {
    resolve(&[spec("scripted")], Platform::Linux)
        .unwrap()
        .unwrap()
}
