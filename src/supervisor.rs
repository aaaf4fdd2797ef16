//! Host-side worker process lifecycle
//!
//! Spawns the worker executable, probes its liveness with non-blocking
//! waits and force-kills it on shutdown. Liveness is always queried from
//! the kernel, never cached, so a crashed worker is observed on the next
//! call rather than on the next job.

use std::{
    path::Path,
    process::{Child, Command, Stdio},
    sync::Mutex,
};

use nix::{
    sys::{
        signal::{kill, Signal},
        wait::{waitpid, WaitPidFlag, WaitStatus},
    },
    unistd::Pid,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShuttleError};

/// Lifecycle of the supervised worker process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerProcessState {
    NotStarted,
    Running,
    Exited,
}

/// Spawns and tracks a single worker process
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    tracked: Mutex<Option<TrackedChild>>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the worker executable with the given arguments
    ///
    /// Refuses while a previously started worker is still alive. A worker
    /// that already exited is replaced.
    pub fn start(&self, executable: &Path, args: &[&str]) -> Result<()> {
        let mut tracked = self.tracked.lock().unwrap();
        if let Some(child) = tracked.as_mut() {
            if child.probe_alive() {
                return Err(ShuttleError::ProcessAlreadyRunning);
            }
        }

        let child = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                ShuttleError::cannot_start(format!("spawning {}", executable.display()), Some(e))
            })?;
        log::info!("started worker process {}", child.id());

        *tracked = Some(TrackedChild {
            child,
            reaped: false,
        });
        Ok(())
    }

    /// Whether the worker process is currently alive
    pub fn is_running(&self) -> bool {
        let mut tracked = self.tracked.lock().unwrap();
        match tracked.as_mut() {
            Some(child) => child.probe_alive(),
            None => false,
        }
    }

    pub fn state(&self) -> WorkerProcessState {
        let mut tracked = self.tracked.lock().unwrap();
        match tracked.as_mut() {
            Some(child) => {
                if child.probe_alive() {
                    WorkerProcessState::Running
                } else {
                    WorkerProcessState::Exited
                }
            }
            None => WorkerProcessState::NotStarted,
        }
    }

    /// Kill the worker and wait for the kernel to reap it
    pub fn stop(&self) -> Result<()> {
        let mut tracked = self.tracked.lock().unwrap();
        match tracked.as_mut() {
            Some(child) => {
                if child.probe_alive() {
                    log::info!("stopping worker process {}", child.child.id());
                    child.kill_and_reap();
                    Ok(())
                } else {
                    Err(ShuttleError::ProcessNotRunning)
                }
            }
            None => Err(ShuttleError::ProcessNotRunning),
        }
    }

    /// Resident set size of the worker in bytes, 0 when not running
    pub fn used_memory(&self) -> u64 {
        let mut tracked = self.tracked.lock().unwrap();
        match tracked.as_mut() {
            Some(child) => {
                if child.probe_alive() {
                    read_rss_bytes(child.child.id()).unwrap_or(0)
                } else {
                    0
                }
            }
            None => 0,
        }
    }

    /// Process id of the worker while it is alive
    pub fn pid(&self) -> Option<u32> {
        let mut tracked = self.tracked.lock().unwrap();
        match tracked.as_mut() {
            Some(child) => {
                if child.probe_alive() {
                    Some(child.child.id())
                } else {
                    None
                }
            }
            None => None,
        }
    }
}

#[derive(Debug)]
struct TrackedChild {
    child: Child,
    /// Set once the kernel has collected the exit status
    reaped: bool,
}

impl TrackedChild {
    /// Non-blocking liveness probe, reaps the child if it exited
    fn probe_alive(&mut self) -> bool {
        if self.reaped {
            return false;
        }
        let pid = Pid::from_raw(self.child.id() as i32);
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            Ok(status) => {
                log::info!("worker process {} exited: {:?}", pid, status);
                self.reaped = true;
                false
            }
            Err(_) => {
                self.reaped = true;
                false
            }
        }
    }

    fn kill_and_reap(&mut self) {
        if self.reaped {
            return;
        }
        let pid = Pid::from_raw(self.child.id() as i32);
        let _ = kill(pid, Signal::SIGKILL);
        let _ = waitpid(pid, None);
        self.reaped = true;
    }
}

impl Drop for TrackedChild {
    fn drop(&mut self) {
        if self.probe_alive() {
            log::warn!(
                "worker process {} still alive on drop, killing it",
                self.child.id()
            );
            self.kill_and_reap();
        }
    }
}

/// VmRSS of a process in bytes, read from procfs
#[cfg(target_os = "linux")]
fn read_rss_bytes(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kib: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kib * 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn read_rss_bytes(_pid: u32) -> Option<u64> {
    None
}
