//! Process control actions: terminate (with one escalated retry), suspend,
//! resume, and the unimplemented priority change.
//!
//! Every path ends in an [`ActionResponse`]; nothing here panics or returns
//! an error to the caller.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::action::{Action, ActionRequest, ActionResponse, FailureKind};

use super::runner::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Kill,
    Stop,
    Continue,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("no such process")]
    NotFound,
    #[error("invalid pid")]
    InvalidPid,
    #[error("not supported on this platform")]
    Unsupported,
    #[error("{0}")]
    Failed(String),
}

impl ControlError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ControlError::PermissionDenied => FailureKind::PermissionDenied,
            ControlError::NotFound => FailureKind::NotFound,
            ControlError::InvalidPid => FailureKind::InvalidPid,
            ControlError::Unsupported => FailureKind::Unsupported,
            ControlError::Failed(_) => FailureKind::Other,
        }
    }
}

/// OS-level control primitives.
pub trait ProcessControl: Send + Sync {
    fn send_signal(&self, pid: u32, signal: ControlSignal) -> Result<(), ControlError>;
    /// Forced termination with elevated privileges.
    fn escalated_kill(&self, pid: u32) -> Result<(), ControlError>;
}

/// Pids that are safe to address with `kill(2)`. Zero and anything that
/// wraps negative would target a process group or every process.
pub fn validate_pid(pid: u32) -> Result<i32, ControlError> {
    match i32::try_from(pid) {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(ControlError::InvalidPid),
    }
}

/// Signals through the OS; escalation through a non-interactive
/// `sudo -n kill -KILL <pid>` (or another configured program).
pub struct SystemControl {
    runner: Arc<dyn CommandRunner>,
    escalation_program: String,
}

impl SystemControl {
    pub fn new(runner: Arc<dyn CommandRunner>, escalation_program: impl Into<String>) -> Self {
        SystemControl {
            runner,
            escalation_program: escalation_program.into(),
        }
    }
}

impl ProcessControl for SystemControl {
    #[cfg(unix)]
    fn send_signal(&self, pid: u32, signal: ControlSignal) -> Result<(), ControlError> {
        let pid = validate_pid(pid)?;
        let signo = match signal {
            ControlSignal::Kill => libc::SIGKILL,
            ControlSignal::Stop => libc::SIGSTOP,
            ControlSignal::Continue => libc::SIGCONT,
        };
        // SAFETY: kill(2) has no memory preconditions; pid is strictly positive.
        let rc = unsafe { libc::kill(pid as libc::pid_t, signo) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EPERM) => Err(ControlError::PermissionDenied),
            Some(libc::ESRCH) => Err(ControlError::NotFound),
            _ => Err(ControlError::Failed(err.to_string())),
        }
    }

    #[cfg(not(unix))]
    fn send_signal(&self, pid: u32, signal: ControlSignal) -> Result<(), ControlError> {
        use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

        validate_pid(pid)?;
        let sys_signal = match signal {
            ControlSignal::Kill => Signal::Kill,
            ControlSignal::Stop => Signal::Stop,
            ControlSignal::Continue => Signal::Continue,
        };
        let sys_pid = Pid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        let process = sys.process(sys_pid).ok_or(ControlError::NotFound)?;
        match process.kill_with(sys_signal) {
            Some(true) => Ok(()),
            Some(false) => Err(ControlError::PermissionDenied),
            None => Err(ControlError::Unsupported),
        }
    }

    #[cfg(unix)]
    fn escalated_kill(&self, pid: u32) -> Result<(), ControlError> {
        let pid = validate_pid(pid)?;
        let args = vec![
            "-n".to_string(),
            "kill".to_string(),
            "-KILL".to_string(),
            pid.to_string(),
        ];
        self.runner
            .run(&self.escalation_program, &args)
            .map(|_| ())
            .map_err(|err| ControlError::Failed(err.to_string()))
    }

    #[cfg(not(unix))]
    fn escalated_kill(&self, pid: u32) -> Result<(), ControlError> {
        validate_pid(pid)?;
        let _ = (&self.runner, &self.escalation_program);
        Err(ControlError::Unsupported)
    }
}

/// Terminate ladder: unprivileged attempt, then at most one escalated
/// attempt, then failure.
enum TerminateStep {
    Attempt,
    Escalate { first: ControlError },
    Failed {
        first: ControlError,
        escalated: Option<ControlError>,
    },
}

#[derive(Clone)]
pub struct ActionDispatcher {
    control: Arc<dyn ProcessControl>,
    escalation: bool,
}

impl ActionDispatcher {
    pub fn new(control: Arc<dyn ProcessControl>, escalation: bool) -> Self {
        ActionDispatcher {
            control,
            escalation,
        }
    }

    /// Run an action off the async scheduler. Escalation may block on an
    /// external program.
    pub async fn dispatch(&self, request: ActionRequest) -> ActionResponse {
        let dispatcher = self.clone();
        match tokio::task::spawn_blocking(move || dispatcher.execute(request)).await {
            Ok(response) => response,
            Err(err) => ActionResponse::failure(
                request,
                FailureKind::Other,
                format!("{} on process {} did not complete: {err}", request.action, request.pid),
            ),
        }
    }

    pub fn execute(&self, request: ActionRequest) -> ActionResponse {
        let ActionRequest { action, pid } = request;

        let outcome = match (action, validate_pid(pid)) {
            (Action::SetPriority, _) => Err((
                FailureKind::NotImplemented,
                format!("setPriority is not implemented (requested for process {pid})"),
            )),
            (_, Err(err)) => Err((err.kind(), format!("Cannot {action} process {pid}: {err}"))),
            (Action::Terminate, Ok(_)) => self.terminate(pid),
            (Action::Suspend, Ok(_)) => self.signal_once(action, pid, ControlSignal::Stop),
            (Action::Resume, Ok(_)) => self.signal_once(action, pid, ControlSignal::Continue),
        };

        match outcome {
            Ok(()) => {
                info!(%action, pid, "action succeeded");
                ActionResponse::success(request)
            }
            Err((kind, message)) => {
                warn!(%action, pid, ?kind, "{message}");
                ActionResponse::failure(request, kind, message)
            }
        }
    }

    fn signal_once(
        &self,
        action: Action,
        pid: u32,
        signal: ControlSignal,
    ) -> Result<(), (FailureKind, String)> {
        self.control
            .send_signal(pid, signal)
            .map_err(|err| (err.kind(), format!("Failed to {action} process {pid}: {err}")))
    }

    fn terminate(&self, pid: u32) -> Result<(), (FailureKind, String)> {
        let mut step = TerminateStep::Attempt;
        loop {
            step = match step {
                TerminateStep::Attempt => match self.control.send_signal(pid, ControlSignal::Kill) {
                    Ok(()) => return Ok(()),
                    Err(first) if self.escalation => TerminateStep::Escalate { first },
                    Err(first) => TerminateStep::Failed {
                        first,
                        escalated: None,
                    },
                },
                TerminateStep::Escalate { first } => match self.control.escalated_kill(pid) {
                    Ok(()) => {
                        info!(pid, "terminated with escalated privileges");
                        return Ok(());
                    }
                    Err(escalated) => TerminateStep::Failed {
                        first,
                        escalated: Some(escalated),
                    },
                },
                TerminateStep::Failed { first, escalated } => {
                    return Err(terminate_failure(pid, first, escalated));
                }
            };
        }
    }
}

fn terminate_failure(
    pid: u32,
    first: ControlError,
    escalated: Option<ControlError>,
) -> (FailureKind, String) {
    match (first, escalated) {
        (ControlError::NotFound, _) => (
            FailureKind::NotFound,
            format!("Failed to terminate process {pid}: no such process"),
        ),
        (_, Some(escalated)) => (
            FailureKind::PermissionDenied,
            format!(
                "Permission denied: could not terminate process {pid}; escalated retry failed: {escalated}"
            ),
        ),
        (first, None) => (
            FailureKind::PermissionDenied,
            format!("Permission denied: could not terminate process {pid}: {first}"),
        ),
    }
}
