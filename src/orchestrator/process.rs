//! Child process runner and output relaying.
//!
//! [`spawn`] starts a program with its own working directory and environment and returns as soon as the OS reports
//! it started. Two relay tasks drain stdout and stderr line by line into the job's sinks, each line tagged
//! `[<job>]: `; a line longer than [`MAX_LINE`] bytes is relayed in pieces. A reaper task owns the child: it waits for exit, joins both relays, then publishes the exit status on
//! a watch channel, so every clone of the [`ProcessHandle`] can await or poll it.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tftest_core::env::split_entry;

use super::error::ProcessError;
use super::sink::{LineSink, OutputSinks};
use super::terminate;

/// Longest line relayed in one piece, in bytes.
pub const MAX_LINE: usize = 64 * 1024;

/// Everything needed to start one process.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
    /// `KEY=VALUE` entries layered over the inherited environment.
    pub env: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.into(),
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, env: &[String]) -> Self {
        self.env.extend_from_slice(env);
        self
    }
}

type ExitState = Option<Result<ExitStatus, String>>;

/// A started child process. Cheap to clone; all clones observe the same exit.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    program: String,
    pid: Option<u32>,
    exit: watch::Receiver<ExitState>,
}

impl ProcessHandle {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process has exited and its output has been fully relayed.
    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Wait for the process to exit and its output to be relayed.
    pub async fn wait(&self) -> Result<ExitStatus, ProcessError> {
        let mut exit = self.exit.clone();
        let state = exit.wait_for(Option::is_some).await.map_err(|_| ProcessError::Wait {
            program: self.program.clone(),
            message: "reaper task ended without an exit status".to_string(),
        })?;
        match state.as_ref() {
            Some(Ok(status)) => Ok(*status),
            Some(Err(message)) => Err(ProcessError::Wait {
                program: self.program.clone(),
                message: message.clone(),
            }),
            None => Err(ProcessError::Wait {
                program: self.program.clone(),
                message: "exit status missing".to_string(),
            }),
        }
    }

    /// Wait for exit and turn a non-zero status into [`ProcessError::Exit`].
    pub async fn success(&self) -> Result<(), ProcessError> {
        let status = self.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(ProcessError::Exit {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }
}

/// Start `spec`, relaying its output to `sinks` tagged with `tag`.
///
/// The child runs in its own process group (unix) so it can later be terminated together with everything it
/// spawned. A start failure returns an error and leaves nothing behind.
pub fn spawn(spec: &CommandSpec, tag: &str, sinks: &OutputSinks) -> Result<ProcessHandle, ProcessError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for entry in &spec.env {
        if let Some((key, value)) = split_entry(entry) {
            command.env(key, value);
        }
    }
    terminate::isolate(&mut command);

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    let pid = child.id();
    tracing::debug!(job = tag, program = %spec.program, args = ?spec.args, pid, "process started");

    let stdout = relay(child.stdout.take(), tag.to_string(), Arc::clone(&sinks.stdout));
    let stderr = relay(child.stderr.take(), tag.to_string(), Arc::clone(&sinks.stderr));

    let (tx, rx) = watch::channel(None);
    let job = tag.to_string();
    let program = spec.program.clone();
    tokio::spawn(async move {
        let result = child.wait().await.map_err(|e| e.to_string());
        for relay in [stdout, stderr] {
            if let Ok(Err(e)) = relay.await {
                tracing::warn!(job = %job, program = %program, error = %e, "output relay failed");
            }
        }
        tracing::debug!(job = %job, program = %program, status = ?result, "process exited");
        let _ = tx.send(Some(result));
    });

    Ok(ProcessHandle {
        program: spec.program.clone(),
        pid,
        exit: rx,
    })
}

/// Drain `stream` into `sink`, one tagged line at a time.
///
/// At most [`MAX_LINE`] bytes are buffered: a longer line is flushed in pieces, and a final line without a newline is
/// flushed at end of stream.
fn relay<R>(stream: Option<R>, tag: String, sink: Arc<dyn LineSink>) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else {
            return Ok(());
        };
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if !line.is_empty() {
                    emit(&tag, sink.as_ref(), &mut line);
                }
                return Ok(());
            }

            let window = &available[..available.len().min(MAX_LINE - line.len())];
            match window.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    line.extend_from_slice(&window[..end]);
                    reader.consume(end + 1);
                    emit(&tag, sink.as_ref(), &mut line);
                }
                None => {
                    let taken = window.len();
                    line.extend_from_slice(window);
                    reader.consume(taken);
                    if line.len() >= MAX_LINE {
                        emit(&tag, sink.as_ref(), &mut line);
                    }
                }
            }
        }
    })
}

/// Write one buffered line to `sink` and clear the buffer.
fn emit(tag: &str, sink: &dyn LineSink, line: &mut Vec<u8>) {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    {
        let text = String::from_utf8_lossy(line);
        if let Err(e) = sink.write_line(&format!("[{tag}]: {text}")) {
            tracing::warn!(job = %tag, error = %e, "failed to write relayed line");
        }
    }
    line.clear();
}

#[derive(Debug, Default)]
struct RegistryState {
    handles: Vec<ProcessHandle>,
    closed: bool,
}

/// The live processes a job has started.
///
/// Only grows while the job runs; [`ProcessRegistry::drain`] empties and closes it at cleanup. A handle offered to a
/// closed registry is handed back so the caller can terminate it.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    state: Mutex<RegistryState>,
}

impl ProcessRegistry {
    pub fn register(&self, handle: ProcessHandle) -> Result<(), ProcessHandle> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(handle);
        }
        state.handles.push(handle);
        Ok(())
    }

    /// Take every registered handle and refuse new ones from now on.
    pub fn drain(&self) -> Vec<ProcessHandle> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        std::mem::take(&mut state.handles)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
