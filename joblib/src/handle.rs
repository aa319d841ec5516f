use crate::actors::{broadcaster::BroadcasterHandle, worker::WorkerHandle};
use crate::config::RunnerConfig;
use crate::events::{JobResult, JobStatus};
use crate::stream::LogStream;
use crate::types::{JobId, JobSpec};

use std::io;
use tokio::sync::{mpsc, oneshot};

/// A live reference to one job.
///
/// Clones refer to the same job. The child process belongs to the job's worker, which reaps it
/// and closes its pipes when the job finishes; if every handle is dropped first, the child is killed.
#[derive(Clone, Debug)]
pub struct JobHandle {
    id: JobId,
    worker: WorkerHandle,
    broadcaster: BroadcasterHandle,
}

impl JobHandle {
    pub(crate) fn spawn(
        id: JobId,
        spec: JobSpec,
        config: &RunnerConfig,
        reaper: mpsc::UnboundedSender<(JobId, JobResult)>,
    ) -> io::Result<Self> {
        let (output_tx, output_rx) = mpsc::unbounded_channel(); // channel for piping child process output
        let (drained_tx, drained_rx) = oneshot::channel();
        let worker = WorkerHandle::spawn(id, spec, config, output_tx, drained_rx, reaper)?;
        let broadcaster = BroadcasterHandle::spawn(output_rx, drained_tx, config.history_limit);
        Ok(Self {
            id,
            worker,
            broadcaster,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Stream the job's merged stdout/stderr from its first line.
    pub fn subscribe(&self) -> LogStream {
        self.broadcaster.subscribe()
    }

    pub async fn status(&self) -> JobStatus {
        self.worker.status().await
    }

    /// Wait for the job to finish.
    ///
    /// By the time this resolves, every subscriber has all of the job's lines queued.
    pub async fn result(&self) -> JobResult {
        self.worker.result().await
    }

    /// Ask the job to stop: SIGTERM, then SIGKILL after the runner's grace period.
    ///
    /// Does nothing if the job is already stopping or finished.
    pub fn cancel(&self) {
        self.worker.cancel();
    }
}
