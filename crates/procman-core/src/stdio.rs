use crate::process::{CapturedOutput, OutputMode};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// In-memory buffer a child stream is pumped into while the process runs
#[derive(Clone, Default)]
pub struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, bytes: &[u8]) {
        self.0.lock().await.extend_from_slice(bytes);
    }

    /// Buffer contents decoded as UTF-8, invalid sequences replaced
    pub async fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().await).into_owned()
    }
}

/// Copy everything from `reader` into `buffer` until EOF
pub async fn pump<R: AsyncRead + Unpin>(mut reader: R, buffer: OutputBuffer) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.append(&chunk[..read]).await;
    }
}

/// Write `payload` to the child's stdin and close it.
///
/// A child that exits without reading its input is not an error.
pub async fn feed(mut stdin: ChildStdin, payload: Vec<u8>) {
    if let Err(e) = stdin.write_all(&payload).await {
        debug!(error = %e, "Child closed stdin before the payload was written");
        return;
    }
    if let Err(e) = stdin.shutdown().await {
        debug!(error = %e, "Failed to close child stdin");
    }
}

/// Configure stdout/stderr of `cmd` for the given mode
pub fn configure_output(cmd: &mut Command, mode: OutputMode) {
    match mode {
        OutputMode::Buffered => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        OutputMode::Discarded => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }
}

/// The stream side of a spawned child: stdin feeder and output pumps
pub struct ChildIo {
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    tasks: Vec<JoinHandle<()>>,
}

impl ChildIo {
    /// Take the child's pipes and start moving data through them
    pub fn attach(child: &mut Child, stdin: Option<&[u8]>) -> Self {
        let stdout = OutputBuffer::new();
        let stderr = OutputBuffer::new();
        let mut tasks = Vec::new();

        if let (Some(pipe), Some(payload)) = (child.stdin.take(), stdin) {
            tasks.push(tokio::spawn(feed(pipe, payload.to_vec())));
        }
        if let Some(pipe) = child.stdout.take() {
            tasks.push(spawn_pump(pipe, stdout.clone(), "stdout"));
        }
        if let Some(pipe) = child.stderr.take() {
            tasks.push(spawn_pump(pipe, stderr.clone(), "stderr"));
        }

        Self {
            stdout,
            stderr,
            tasks,
        }
    }

    /// Wait for the pumps to hit EOF and return what was captured.
    ///
    /// Cancel safe: tasks are only forgotten once they have finished, so a
    /// collect interrupted by a deadline can be resumed after a kill.
    pub async fn collect(&mut self) -> CapturedOutput {
        while let Some(task) = self.tasks.first_mut() {
            if let Err(e) = task.await {
                debug!(error = %e, "Child stream task did not complete");
            }
            self.tasks.remove(0);
        }

        CapturedOutput {
            stdout: self.stdout.contents().await,
            stderr: self.stderr.contents().await,
        }
    }
}

impl Drop for ChildIo {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_pump<R>(reader: R, buffer: OutputBuffer, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = pump(reader, buffer).await {
            debug!(stream, error = %e, "Failed to read child stream");
        }
    })
}
