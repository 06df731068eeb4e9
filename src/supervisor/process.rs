//! Best-effort liveness check and termination of a process by pid.
//!
//! A recorded pid may have been reused by an unrelated process after the bot
//! exited; the check cannot tell the difference.

use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, Signal, System};
use tokio::time::{sleep, Instant};

use crate::core::config;

/// How a termination attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Nothing was running under the pid
    NotRunning,
    /// Exited after SIGTERM
    Terminated,
    /// Exited after SIGKILL
    Killed,
    /// Still alive when the wait ran out
    TimedOut,
}

impl TerminationOutcome {
    pub fn is_stopped(self) -> bool {
        !matches!(self, TerminationOutcome::TimedOut)
    }
}

/// Bounds of a termination attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub kill_on_timeout: bool,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            timeout: config::supervisor::terminate_timeout(),
            interval: config::supervisor::poll_interval(),
            kill_on_timeout: config::supervisor::KILL_ON_TIMEOUT,
        }
    }
}

/// Converts a stored pid, refusing values that can never name a bot process
pub fn to_pid(raw: i64) -> Option<Pid> {
    u32::try_from(raw).ok().filter(|pid| *pid > 1).map(Pid::from_u32)
}

/// True when `pid` names a running (non-zombie) process
pub fn is_alive(pid: Pid) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    system
        .process(pid)
        .is_some_and(|process| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

fn send_signal(pid: Pid, signal: Signal) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    match system.process(pid) {
        Some(process) => process.kill_with(signal).unwrap_or_else(|| process.kill()),
        None => false,
    }
}

async fn wait_for_exit(pid: Pid, timeout: Duration, interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(interval).await;
    }
}

/// SIGTERM, wait, then SIGKILL when the policy allows it.
///
/// A process that is already gone counts as success.
pub async fn terminate(pid: Pid, policy: TerminationPolicy) -> TerminationOutcome {
    if !is_alive(pid) {
        return TerminationOutcome::NotRunning;
    }

    log::info!("Sending SIGTERM to pid {}", pid);
    if !send_signal(pid, Signal::Term) && !is_alive(pid) {
        return TerminationOutcome::NotRunning;
    }
    if wait_for_exit(pid, policy.timeout, policy.interval).await {
        return TerminationOutcome::Terminated;
    }

    if !policy.kill_on_timeout {
        log::warn!("pid {} still alive after {:?}", pid, policy.timeout);
        return TerminationOutcome::TimedOut;
    }

    log::warn!("pid {} ignored SIGTERM for {:?}, sending SIGKILL", pid, policy.timeout);
    send_signal(pid, Signal::Kill);
    if wait_for_exit(pid, policy.timeout, policy.interval).await {
        TerminationOutcome::Killed
    } else {
        log::error!("pid {} survived SIGKILL", pid);
        TerminationOutcome::TimedOut
    }
}
