use crate::errors;
use crate::handle::JobHandle;
use crate::types::{JobId, JobSpec};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum CoordinatorMessage {
    StartJob {
        spec: JobSpec,
        response: oneshot::Sender<errors::Result<JobHandle>>,
    },
    GetJob {
        job_id: JobId,
        response: oneshot::Sender<errors::Result<JobHandle>>,
    },
    ListJobs {
        response: oneshot::Sender<Vec<JobHandle>>,
    },
    RemoveJob {
        job_id: JobId,
        response: oneshot::Sender<errors::Result<()>>,
    },
}
