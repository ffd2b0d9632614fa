//! Sandboxed execution of compiled learner binaries.
//!
//! The orchestrator talks to a narrow capability trait so the isolation
//! backend can be swapped without touching evaluation logic. The default
//! backend runs the binary as a direct child process in its own process
//! group, with a cleared environment, rlimit ceilings applied between fork
//! and exec, and a hard wall-clock deadline that kills the whole
//! group, since learner code may fork and orphaned children must die
//! with it.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crucible_common::config::RunLimits;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Terminal states of one run: `Completed` is the only state whose output
/// is eligible for evaluation. Spawn failure is the `Err` arm of
/// [`Sandbox::execute`].
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        signal: Option<i32>,
        elapsed_ms: u64,
    },
    /// Wall-clock deadline expired; partial output is never scored.
    TimedOut { elapsed_ms: u64 },
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(&self, binary: &Path, limits: &RunLimits) -> Result<RunOutcome, EngineError>;
}

/// Process-group sandbox: direct child execution with rlimit ceilings.
/// Network isolation relies on the binary having no ambient credentials and
/// a cleared environment; stricter backends (namespaces, seccomp) can slot
/// in behind the same trait.
pub struct ProcessSandbox;

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn execute(&self, binary: &Path, limits: &RunLimits) -> Result<RunOutcome, EngineError> {
        let start = Instant::now();

        let mut cmd = Command::new(binary);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .kill_on_drop(true);

        if let Some(dir) = binary.parent() {
            cmd.current_dir(dir);
        }

        // Own process group, so deadline kill reaches forked children too
        cmd.process_group(0);

        let rlimits = PreExecLimits::from(limits);
        unsafe {
            cmd.pre_exec(move || apply_rlimits(&rlimits));
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::spawn("learner binary", e))?;
        let pid = child.id().map(|p| p as i32);

        let stdout_pipe = child.stdout.take().expect("stdout was piped");
        let stderr_pipe = child.stderr.take().expect("stderr was piped");
        let cap = limits.max_output_bytes;
        let stdout_task = tokio::spawn(drain_capped(stdout_pipe, cap));
        let stderr_task = tokio::spawn(drain_capped(stderr_pipe, cap));

        let deadline = Duration::from_millis(limits.wall_time_ms);
        let status = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => return Err(EngineError::spawn("learner binary", e)),
            Err(_) => None,
        };

        // Kill the whole group on every arm, not just on timeout: forked
        // children inherit the pipe write ends, so a surviving orphan would
        // hold the drain tasks open long after the leader exited
        if let Some(pid) = pid {
            match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                // ESRCH just means nothing in the group was left to kill
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => warn!(pid, error = %e, "killpg failed"),
            }
        }
        if status.is_none() {
            // Deadline expired: reap the leader after the group kill
            let _ = child.kill().await;
            let _ = child.wait().await;
        }

        let (stdout, stdout_truncated) = stdout_task.await.unwrap_or_default();
        let (stderr, _) = stderr_task.await.unwrap_or_default();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match status {
            None => Ok(RunOutcome::TimedOut { elapsed_ms }),
            Some(status) => {
                if stdout_truncated {
                    debug!(cap, "stdout exceeded capture cap; excess discarded");
                }
                let (exit_code, signal) = split_status(status);
                Ok(RunOutcome::Completed {
                    stdout,
                    stderr,
                    exit_code,
                    signal,
                    elapsed_ms,
                })
            }
        }
    }
}

#[cfg(unix)]
fn split_status(status: std::process::ExitStatus) -> (Option<i32>, Option<i32>) {
    use std::os::unix::process::ExitStatusExt;
    (status.code(), status.signal())
}

#[cfg(not(unix))]
fn split_status(status: std::process::ExitStatus) -> (Option<i32>, Option<i32>) {
    (status.code(), None)
}

/// Plain-old-data copy of the ceilings, safe to move into `pre_exec`.
#[derive(Clone, Copy)]
struct PreExecLimits {
    cpu_time_secs: Option<u64>,
    memory_bytes: Option<u64>,
    max_processes: Option<u64>,
}

impl From<&RunLimits> for PreExecLimits {
    fn from(limits: &RunLimits) -> Self {
        Self {
            cpu_time_secs: limits.cpu_time_secs,
            memory_bytes: limits.memory_bytes,
            max_processes: limits.max_processes,
        }
    }
}

/// Applied in the child between fork and exec. Only async-signal-safe
/// calls are allowed here.
#[cfg(unix)]
fn apply_rlimits(limits: &PreExecLimits) -> std::io::Result<()> {
    fn set(resource: libc::c_int, value: libc::rlim_t) -> std::io::Result<()> {
        let lim = libc::rlimit {
            rlim_cur: value,
            rlim_max: value,
        };
        // The resource constants share one integer type per platform; the
        // cast keeps this building on both glibc and musl.
        if unsafe { libc::setrlimit(resource as _, &lim) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    if let Some(secs) = limits.cpu_time_secs {
        set(libc::RLIMIT_CPU as libc::c_int, secs as libc::rlim_t)?;
    }
    if let Some(bytes) = limits.memory_bytes {
        set(libc::RLIMIT_AS as libc::c_int, bytes as libc::rlim_t)?;
    }
    if let Some(procs) = limits.max_processes {
        set(libc::RLIMIT_NPROC as libc::c_int, procs as libc::rlim_t)?;
    }
    // No core dumps, no file creation from learner code
    set(libc::RLIMIT_CORE as libc::c_int, 0)?;
    set(libc::RLIMIT_FSIZE as libc::c_int, 0)?;
    Ok(())
}

#[cfg(not(unix))]
fn apply_rlimits(_limits: &PreExecLimits) -> std::io::Result<()> {
    Ok(())
}

/// Read a stream to EOF, keeping at most `cap` bytes. Draining continues
/// past the cap so a full pipe can never wedge the child against the
/// wall-clock deadline.
async fn drain_capped<R>(mut reader: R, cap: usize) -> (String, bool)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut kept: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if kept.len() < cap {
                    let take = n.min(cap - kept.len());
                    kept.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
        }
    }

    (String::from_utf8_lossy(&kept).to_string(), truncated)
}
