//! Process-tree termination.
//!
//! The infra tool and the mock service both start children of their own, so killing only the direct child would
//! leave orphans behind. On unix every child is started as the leader of a fresh process group and the whole group
//! receives `SIGKILL`; on Windows `taskkill /T /F` walks the tree.

use std::io;

use tokio::process::Command;

use super::process::ProcessHandle;

/// Terminates a started process together with its descendants.
pub trait Terminator: Send + Sync {
    fn terminate(&self, handle: &ProcessHandle) -> io::Result<()>;
}

/// Platform process-tree kill.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTreeKill;

impl Terminator for ProcessTreeKill {
    fn terminate(&self, handle: &ProcessHandle) -> io::Result<()> {
        match handle.pid() {
            Some(pid) => kill_tree(pid),
            // the child was already reaped by the time it was observed to start
            None => Ok(()),
        }
    }
}

/// Prepare `command` so its process tree can be terminated as a unit.
pub fn isolate(command: &mut Command) {
    #[cfg(unix)]
    command.process_group(0);
    #[cfg(not(unix))]
    let _ = command;
}

#[cfg(unix)]
fn kill_tree(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(windows)]
fn kill_tree(pid: u32) -> io::Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_tree(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process termination is not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::orchestrator::process::{CommandSpec, spawn};
    use crate::orchestrator::sink::{MemorySink, OutputSinks};

    #[tokio::test]
    async fn test_kills_process_and_its_children() {
        let sink = MemorySink::new();
        // the shell forks `sleep`, which holds stdout open; the wait only returns once both are gone
        let spec = CommandSpec::new("sh", std::env::temp_dir()).args(["-c", "sleep 30; echo done"]);
        let handle = spawn(&spec, "tree", &OutputSinks::memory(&sink)).unwrap();

        ProcessTreeKill.terminate(&handle).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("process tree should be gone")
            .unwrap();
        assert!(!status.success());
        assert!(!sink.contains("done"));
    }

    #[tokio::test]
    async fn test_terminating_an_exited_process_is_ok() {
        let spec = CommandSpec::new("sh", std::env::temp_dir()).args(["-c", "exit 0"]);
        let handle = spawn(&spec, "gone", &OutputSinks::memory(&MemorySink::new())).unwrap();
        handle.wait().await.unwrap();
        ProcessTreeKill.terminate(&handle).unwrap();
    }
}
