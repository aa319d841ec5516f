use std::time::Duration;

/// Tunables for a [`JobRunner`](crate::JobRunner).
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Time between SIGTERM and SIGKILL when a job is cancelled.
    pub grace_period: Duration,
    /// How long to keep reading output after the process exits before giving up on EOF.
    ///
    /// A grandchild that inherited the output pipe can hold it open forever.
    pub drain_timeout: Duration,
    /// Reject `start` with `JobError::Busy` once this many jobs are running.
    pub max_concurrent_jobs: Option<usize>,
    /// Keep at most this many lines of history per job for late subscribers.
    pub history_limit: Option<usize>,
    /// Capacity of the coordinator's message queue.
    pub message_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(3),
            drain_timeout: Duration::from_secs(2),
            max_concurrent_jobs: None,
            history_limit: None,
            message_capacity: 32,
        }
    }
}
