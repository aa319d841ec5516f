use crate::types::JobId;
use std::fmt;

/// Exit code reported when the job's output or exit status could not be read.
pub const IO_ERROR_CODE: i32 = -1;

/// One line of a job's merged stdout/stderr, without its line terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub job_id: JobId,
    /// Position of the line within the job's output, starting at 0.
    pub seq: u64,
    pub line: String,
}

/// Terminal outcome of a job. Every job ends in exactly one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobResult {
    Succeeded,
    Failed { code: i32 },
    Cancelled,
    LaunchError(String),
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Succeeded)
    }

    /// Classify how the child process ended.
    ///
    /// A process killed by a signal the runner did not send is reported as a
    /// failure with the shell convention `128 + signal`.
    pub(crate) fn from_exit(code: Option<i32>, signal: Option<i32>, cancelled: bool) -> Self {
        if cancelled {
            return JobResult::Cancelled;
        }
        match (code, signal) {
            (Some(0), _) => JobResult::Succeeded,
            (Some(code), _) => JobResult::Failed { code },
            (None, Some(signal)) => JobResult::Failed { code: 128 + signal },
            (None, None) => JobResult::Failed {
                code: IO_ERROR_CODE,
            },
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::Succeeded => write!(f, "succeeded"),
            JobResult::Failed { code } => write!(f, "failed with exit code {}", code),
            JobResult::Cancelled => write!(f, "cancelled"),
            JobResult::LaunchError(reason) => write!(f, "failed to launch: {}", reason),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    /// Termination was requested and the process has not exited yet.
    Cancelling,
    Finished(JobResult),
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Finished(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_classification() {
        assert_eq!(JobResult::from_exit(Some(0), None, false), JobResult::Succeeded);
        assert_eq!(
            JobResult::from_exit(Some(7), None, false),
            JobResult::Failed { code: 7 }
        );
        assert_eq!(
            JobResult::from_exit(None, Some(9), false),
            JobResult::Failed { code: 137 }
        );
        assert_eq!(JobResult::from_exit(None, Some(15), true), JobResult::Cancelled);
        // a job that finished on its own while the cancel was in flight still counts as cancelled
        assert_eq!(JobResult::from_exit(Some(0), None, true), JobResult::Cancelled);
    }
}
