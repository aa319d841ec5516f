use crate::events::{JobResult, JobStatus};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum WorkerMessage {
    GetStatus {
        response: oneshot::Sender<JobStatus>,
    },
    AwaitResult {
        response: oneshot::Sender<JobResult>,
    },
    Cancel,
}
