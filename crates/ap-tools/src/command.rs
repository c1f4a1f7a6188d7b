//! Builder for executing external tool commands with timeout support.
//!
//! [`ToolCommand::execute`] runs a tool to completion and captures its
//! output. [`ToolCommand::stream_lines`] hands back a [`LineStream`] that
//! yields stdout and stderr lines while the tool is still running.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use ap_core::stream::{self, LineStream};
use ap_core::{Error, Result};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default command timeout: 30 minutes. Rebuilding large APKs is slow.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Number of trailing stderr lines quoted in a failure message.
const STDERR_TAIL: usize = 10;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use ap_tools::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> ap_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("java"))
///     .arg("-jar")
///     .arg("apktool.jar")
///     .arg("--version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run the tool from `dir` instead of the current directory.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if spawning fails, if the process times out,
    /// or if it exits with a non-zero status (message includes stderr).
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();
        tracing::debug!("exec: {} {}", self.program.display(), self.args.join(" "));

        let child = self
            .command()
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // The child was moved into the cancelled future; kill_on_drop
            // reaps it.
            Err(_elapsed) => Err(Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Run the command and stream its output line by line.
    ///
    /// Nothing is spawned until the stream is first polled. Stdout and stderr
    /// lines are yielded in the order they are read. The stream ends after
    /// the process has exited successfully; on spawn failure, timeout or a
    /// non-zero exit its last item is an [`Error::Tool`].
    pub fn stream_lines(&self) -> LineStream {
        let this = self.clone();
        Box::pin(futures::stream::once(async move { this.start_streaming() }).flatten())
    }

    fn start_streaming(&self) -> LineStream {
        let program_name = self.program_name();
        tracing::debug!("stream: {} {}", self.program.display(), self.args.join(" "));

        let child = match self.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                return stream::failing(
                    Vec::new(),
                    Error::tool(program_name, format!("failed to spawn: {e}")),
                )
            }
        };

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(supervise(child, program_name, self.timeout, tx));
        Box::pin(ReceiverStream::new(rx))
    }
}

/// Forward the child's output into `tx`, then report how it exited.
///
/// Dropping `tx` without sending an error is the success signal.
async fn supervise(
    mut child: Child,
    tool: String,
    timeout: Duration,
    tx: mpsc::Sender<Result<String>>,
) {
    let mut stdout_task = tokio::spawn(forward_lines(child.stdout.take(), tx.clone()));
    let mut stderr_task = tokio::spawn(forward_lines(child.stderr.take(), tx.clone()));

    let waited = tokio::time::timeout(timeout, async {
        let stdout = (&mut stdout_task).await.unwrap_or_default();
        let stderr = (&mut stderr_task).await.unwrap_or_default();
        (child.wait().await, stdout, stderr)
    })
    .await;

    let failure = match waited {
        Ok((Ok(status), stdout, stderr)) if status.success() => {
            match stdout.error.or(stderr.error) {
                Some(e) => Error::tool(tool, format!("failed to read output: {e}")),
                None => return,
            }
        }
        Ok((Ok(status), _, stderr)) => {
            let tail: Vec<String> = stderr.tail.into_iter().collect();
            Error::tool(tool, format!("exited with status {status}: {}", tail.join("\n")))
        }
        Ok((Err(e), _, _)) => Error::tool(tool, format!("I/O error waiting for process: {e}")),
        Err(_elapsed) => {
            // The error must be the last item, so no reader may send after it.
            stdout_task.abort();
            stderr_task.abort();
            let _ = child.start_kill();
            Error::tool(tool, format!("timed out after {timeout:?}"))
        }
    };

    let _ = tx.send(Err(failure)).await;
}

/// What one output pipe left behind once it was drained.
#[derive(Debug, Default)]
struct Forwarded {
    /// The last few lines read.
    tail: VecDeque<String>,
    /// The read error that stopped forwarding early, if any.
    error: Option<std::io::Error>,
}

/// Send every line of `reader` to `tx`.
///
/// Lines are decoded lossily so a stray non-UTF-8 byte never ends the
/// stream. A read error stops forwarding and is handed back to the caller,
/// which reports it after the process has exited.
async fn forward_lines<R>(reader: Option<R>, tx: mpsc::Sender<Result<String>>) -> Forwarded
where
    R: AsyncRead + Unpin,
{
    let mut forwarded = Forwarded {
        tail: VecDeque::with_capacity(STDERR_TAIL),
        error: None,
    };
    let Some(reader) = reader else {
        return forwarded;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                forwarded.error = Some(e);
                break;
            }
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        let line = String::from_utf8_lossy(&buf).into_owned();

        if forwarded.tail.len() == STDERR_TAIL {
            forwarded.tail.pop_front();
        }
        forwarded.tail.push_back(line.clone());
        if tx.send(Ok(line)).await.is_err() {
            // Consumer went away; stop reading.
            break;
        }
    }
    forwarded
}
