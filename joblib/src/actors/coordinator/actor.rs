use super::messages::CoordinatorMessage;
use crate::config::RunnerConfig;
use crate::errors::{self, JobError};
use crate::events::JobResult;
use crate::handle::JobHandle;
use crate::types::{JobId, JobSpec};
use std::collections::HashMap;
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

struct JobEntry {
    handle: JobHandle,
    result: Option<JobResult>,
}

pub struct JobCoordinator {
    inbox: mpsc::Receiver<CoordinatorMessage>,
    reaper_tx: mpsc::UnboundedSender<(JobId, JobResult)>,
    reaper_rx: mpsc::UnboundedReceiver<(JobId, JobResult)>,
    config: RunnerConfig,
    jobs: HashMap<JobId, JobEntry>,
}

impl JobCoordinator {
    pub fn spawn(inbox: mpsc::Receiver<CoordinatorMessage>, config: RunnerConfig) {
        let (reaper_tx, reaper_rx) = mpsc::unbounded_channel();
        let actor = Self {
            inbox,
            reaper_tx,
            reaper_rx,
            config,
            jobs: HashMap::new(),
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        use self::CoordinatorMessage::*;
        loop {
            select! {
                // finished jobs first, so a caller that already saw a result never finds the job running
                biased;
                Some((job_id, result)) = self.reaper_rx.recv() => {
                    self.reap(job_id, result);
                }
                maybe_msg = self.inbox.recv() => {
                    let msg = match maybe_msg {
                        Some(msg) => msg,
                        None => return,
                    };
                    match msg {
                        StartJob { spec, response } => self.start_job(spec, response),
                        GetJob { job_id, response } => {
                            let _ = response.send(self.get_job(job_id));
                        }
                        ListJobs { response } => {
                            let handles = self.jobs.values().map(|e| e.handle.clone()).collect();
                            let _ = response.send(handles);
                        }
                        RemoveJob { job_id, response } => {
                            let _ = response.send(self.remove_job(job_id));
                        }
                    }
                }
            }
        }
    }

    fn running(&self) -> usize {
        self.jobs.values().filter(|e| e.result.is_none()).count()
    }

    fn start_job(&mut self, spec: JobSpec, response: oneshot::Sender<errors::Result<JobHandle>>) {
        if let Some(limit) = self.config.max_concurrent_jobs {
            if self.running() >= limit {
                let _ = response.send(Err(JobError::Busy { limit }));
                return;
            }
        }

        let job_id = uuid::Uuid::new_v4();
        let program = spec.program().clone();
        match JobHandle::spawn(job_id, spec, &self.config, self.reaper_tx.clone()) {
            Ok(handle) => {
                self.jobs.insert(
                    job_id,
                    JobEntry {
                        handle: handle.clone(),
                        result: None,
                    },
                );
                if let Err(Ok(handle)) = response.send(Ok(handle)) {
                    // the caller gave up waiting for the launch, nobody will ever stop this job
                    debug!(job = %job_id, "start abandoned, cancelling job");
                    handle.cancel();
                }
            }
            Err(source) => {
                warn!(program = %program.to_string_lossy(), error = %source, "failed to launch job");
                let _ = response.send(Err(JobError::Launch { program, source }));
            }
        }
    }

    fn get_job(&self, job_id: JobId) -> errors::Result<JobHandle> {
        self.jobs
            .get(&job_id)
            .map(|e| e.handle.clone())
            .ok_or(JobError::NotFound)
    }

    fn remove_job(&mut self, job_id: JobId) -> errors::Result<()> {
        match self.jobs.get(&job_id) {
            None => Err(JobError::NotFound),
            Some(JobEntry { result: None, .. }) => Err(JobError::StillRunning),
            Some(_) => {
                self.jobs.remove(&job_id);
                Ok(())
            }
        }
    }

    fn reap(&mut self, job_id: JobId, result: JobResult) {
        if let Some(entry) = self.jobs.get_mut(&job_id) {
            entry.result = Some(result);
        }
    }
}
