//! Destinations for relayed child-process output.
//!
//! Sinks are passed explicitly to every job. The console sinks lock the standard stream for the duration of one
//! line, so concurrent jobs interleave whole lines, never fragments.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Something that accepts one complete line at a time.
pub trait LineSink: Send + Sync {
    /// Write `line` followed by a newline as a single operation.
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// The process's standard output.
pub struct Stdout;

impl LineSink for Stdout {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")
    }
}

/// The process's standard error.
pub struct Stderr;

impl LineSink for Stderr {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stderr().lock();
        writeln!(out, "{line}")
    }
}

/// In-memory sink, mainly for tests. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl LineSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// The pair of sinks a job relays its processes' stdout and stderr to.
#[derive(Clone)]
pub struct OutputSinks {
    pub stdout: Arc<dyn LineSink>,
    pub stderr: Arc<dyn LineSink>,
}

impl OutputSinks {
    pub fn new(stdout: Arc<dyn LineSink>, stderr: Arc<dyn LineSink>) -> Self {
        Self { stdout, stderr }
    }

    /// Send both streams to one in-memory buffer.
    pub fn memory(sink: &MemorySink) -> Self {
        Self::new(Arc::new(sink.clone()), Arc::new(sink.clone()))
    }
}

impl Default for OutputSinks {
    fn default() -> Self {
        Self::new(Arc::new(Stdout), Arc::new(Stderr))
    }
}

impl std::fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSinks").finish_non_exhaustive()
    }
}
