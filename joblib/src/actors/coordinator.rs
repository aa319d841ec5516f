mod actor;
mod messages;

use self::{
    actor::JobCoordinator,
    messages::CoordinatorMessage::{self, GetJob, ListJobs, RemoveJob, StartJob},
};
use crate::config::RunnerConfig;
use crate::errors::{self, JobError};
use crate::events::{JobResult, JobStatus};
use crate::handle::JobHandle;
use crate::stream::LogStream;
use crate::types::{JobId, JobSpec};
use tokio::sync::{mpsc, oneshot};

/// A `JobRunner` which provides functionality for managing jobs and querying job state.
///
/// This struct is actually an actor handle, the real work is done in the actor spawned by `JobRunner::spawn`,
/// but from the user perspective all that matters is that this struct provides methods for managing jobs.
/// The actor-handle abstraction allows this struct to be cloned freely in a multi-thread async context,
/// without requiring an `Arc<Mutex>` or any other means of synchronization.
///
/// Any number of jobs may run at once unless `RunnerConfig::max_concurrent_jobs` says otherwise.
/// Finished jobs stay registered, with their log history, until [`JobRunner::remove`] is called.
#[derive(Clone, Debug)]
pub struct JobCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl JobCoordinatorHandle {
    /// Spawn a new runner. Must be called from within a tokio runtime.
    pub fn spawn(config: RunnerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.message_capacity.max(1));
        JobCoordinator::spawn(receiver, config);
        Self { sender }
    }

    async fn request<T>(
        &self,
        msg: impl FnOnce(oneshot::Sender<T>) -> CoordinatorMessage,
    ) -> errors::Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(msg(tx))
            .await
            .map_err(|_| JobError::RunnerGone)?;
        rx.await.map_err(|_| JobError::RunnerGone)
    }

    /// Start a new job.
    ///
    /// Returns as soon as the process is running. Fails with `JobError::Launch` if the program
    /// could not be started, in which case no job is registered.
    pub async fn start(&self, spec: JobSpec) -> errors::Result<JobHandle> {
        self.request(|response| StartJob { spec, response }).await?
    }

    /// Start a job and wait for it to finish, folding launch failures into the result.
    pub async fn run(&self, spec: JobSpec) -> JobResult {
        match self.start(spec).await {
            Ok(handle) => handle.result().await,
            Err(err) => JobResult::LaunchError(err.to_string()),
        }
    }

    /// Look up a registered job.
    pub async fn job(&self, job_id: JobId) -> errors::Result<JobHandle> {
        self.request(|response| GetJob { job_id, response }).await?
    }

    pub async fn subscribe(&self, job_id: JobId) -> errors::Result<LogStream> {
        Ok(self.job(job_id).await?.subscribe())
    }

    pub async fn result(&self, job_id: JobId) -> errors::Result<JobResult> {
        Ok(self.job(job_id).await?.result().await)
    }

    pub async fn status(&self, job_id: JobId) -> errors::Result<JobStatus> {
        Ok(self.job(job_id).await?.status().await)
    }

    /// Stop a job. A no-op for jobs that are already stopping or finished.
    pub async fn cancel(&self, job_id: JobId) -> errors::Result<()> {
        self.job(job_id).await?.cancel();
        Ok(())
    }

    /// Every registered job with its current status.
    pub async fn jobs(&self) -> errors::Result<Vec<(JobId, JobStatus)>> {
        let handles = self.request(|response| ListJobs { response }).await?;
        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            jobs.push((handle.id(), handle.status().await));
        }
        Ok(jobs)
    }

    /// Forget a finished job and its log history.
    pub async fn remove(&self, job_id: JobId) -> errors::Result<()> {
        self.request(|response| RemoveJob { job_id, response }).await?
    }
}
