use super::messages::WorkerMessage;
use super::output::forward_lines;
use crate::config::RunnerConfig;
use crate::events::{JobResult, JobStatus, LogEvent, IO_ERROR_CODE};
use crate::types::JobId;

use futures::future::FutureExt;
use nix::{
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use std::{io, os::unix::process::ExitStatusExt, process::ExitStatus, time::Duration};
use tokio::{
    net::unix::pipe,
    process::Child,
    select,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

pub struct Actor {
    job_id: JobId,
    inbox: mpsc::UnboundedReceiver<WorkerMessage>,
    kill_tx: Option<oneshot::Sender<()>>,
    job_status: JobStatus,
    waiters: Vec<oneshot::Sender<JobResult>>,
    reaper: mpsc::UnboundedSender<(JobId, JobResult)>,
}

impl Actor {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        job_id: JobId,
        inbox: mpsc::UnboundedReceiver<WorkerMessage>,
        child: Child,
        output: pipe::Receiver,
        output_tx: mpsc::UnboundedSender<LogEvent>,
        drained_rx: oneshot::Receiver<()>,
        reaper: mpsc::UnboundedSender<(JobId, JobResult)>,
        config: &RunnerConfig,
    ) {
        let (kill_tx, kill_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        // pipe the merged output to the broadcaster
        let reader = tokio::spawn(forward_lines(job_id, output, output_tx));

        let supervisor = Supervisor {
            job_id,
            grace_period: config.grace_period,
            drain_timeout: config.drain_timeout,
        };
        tokio::spawn(async move {
            let result = supervisor.run(child, kill_rx, reader, drained_rx).await;
            let _ = outcome_tx.send(result);
        });

        let actor = Self {
            job_id,
            inbox,
            kill_tx: Some(kill_tx),
            job_status: JobStatus::Running,
            waiters: Vec::new(),
            reaper,
        };
        tokio::spawn(async move { actor.handle_messages(outcome_rx).await });
    }

    async fn handle_messages(mut self, outcome_rx: oneshot::Receiver<JobResult>) {
        use WorkerMessage::*;
        let mut outcome_rx = outcome_rx.fuse();
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    match maybe_msg {
                        Some(GetStatus { response }) => {
                            let _ = response.send(self.job_status.clone());
                        }
                        Some(AwaitResult { response }) => match &self.job_status {
                            JobStatus::Finished(result) => {
                                let _ = response.send(result.clone());
                            }
                            _ => self.waiters.push(response),
                        },
                        Some(Cancel) => self.cancel(),
                        None => {
                            // every handle dropped, make sure we kill the child process before we exit
                            if let Some(kill_tx) = self.kill_tx.take() {
                                let _ = kill_tx.send(());
                            }
                            return;
                        }
                    }
                }
                outcome = &mut outcome_rx => {
                    let result = outcome.unwrap_or(JobResult::Failed { code: IO_ERROR_CODE });
                    self.finish(result);
                }
            }
        }
    }

    fn cancel(&mut self) {
        if self.job_status != JobStatus::Running {
            debug!(job = %self.job_id, status = ?self.job_status, "cancel ignored");
            return;
        }
        if let Some(kill_tx) = self.kill_tx.take() {
            info!(job = %self.job_id, "cancel requested");
            self.job_status = JobStatus::Cancelling;
            let _ = kill_tx.send(());
        }
    }

    fn finish(&mut self, result: JobResult) {
        info!(job = %self.job_id, %result, "job finished");
        self.job_status = JobStatus::Finished(result.clone());
        self.kill_tx = None;
        // tell the coordinator before any waiter, so a caller that saw the result can rely on it
        let _ = self.reaper.send((self.job_id, result.clone()));
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }
}

/// Waits for the child to exit, terminating it on request, then waits for the output to drain.
struct Supervisor {
    job_id: JobId,
    grace_period: Duration,
    drain_timeout: Duration,
}

impl Supervisor {
    async fn run(
        &self,
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        reader: JoinHandle<io::Result<()>>,
        drained_rx: oneshot::Receiver<()>,
    ) -> JobResult {
        let (exit, cancelled) = select! {
            // a dropped sender means the actor is gone, kill the child either way
            _ = kill_rx => (self.terminate(&mut child).await, true),
            // wait for child pid to finish and cleanup its resources
            exit_status = child.wait() => (exit_status, false),
        };

        let read_result = self.drain(reader, drained_rx).await;
        self.classify(exit, read_result, cancelled)
    }

    /// SIGTERM the child's process group, escalating to SIGKILL after the grace period.
    async fn terminate(&self, child: &mut Child) -> io::Result<ExitStatus> {
        self.signal_group(child, Signal::SIGTERM);
        match timeout(self.grace_period, child.wait()).await {
            Ok(exit_status) => exit_status,
            Err(_) => {
                warn!(
                    job = %self.job_id,
                    grace_period = ?self.grace_period,
                    "job ignored SIGTERM, sending SIGKILL"
                );
                self.signal_group(child, Signal::SIGKILL);
                let _ = child.start_kill();
                child.wait().await
            }
        }
    }

    fn signal_group(&self, child: &Child, signal: Signal) {
        // the child leads its own process group, so its pid is also the group id
        if let Some(pid) = child.id() {
            if let Err(err) = killpg(Pid::from_raw(pid as i32), signal) {
                debug!(job = %self.job_id, ?signal, error = %err, "killpg failed");
            }
        }
    }

    /// Wait until every line has reached the broadcaster.
    ///
    /// A grandchild holding the pipe open would keep the reader alive forever, so after
    /// `drain_timeout` the reader is aborted. Lines read up to that point are still delivered.
    async fn drain(
        &self,
        reader: JoinHandle<io::Result<()>>,
        mut drained_rx: oneshot::Receiver<()>,
    ) -> io::Result<()> {
        if timeout(self.drain_timeout, &mut drained_rx).await.is_err() {
            warn!(
                job = %self.job_id,
                drain_timeout = ?self.drain_timeout,
                "output still open after exit, abandoning the rest"
            );
            reader.abort();
            let _ = drained_rx.await;
            return Ok(());
        }
        match reader.await {
            Ok(read_result) => read_result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
        }
    }

    fn classify(
        &self,
        exit: io::Result<ExitStatus>,
        read_result: io::Result<()>,
        cancelled: bool,
    ) -> JobResult {
        let exit_status = match exit {
            Ok(exit_status) => exit_status,
            Err(err) => {
                warn!(job = %self.job_id, error = %err, "failed to wait for job");
                return if cancelled {
                    JobResult::Cancelled
                } else {
                    JobResult::Failed {
                        code: IO_ERROR_CODE,
                    }
                };
            }
        };
        let result = JobResult::from_exit(exit_status.code(), exit_status.signal(), cancelled);
        match read_result {
            Err(err) if !cancelled => {
                warn!(job = %self.job_id, error = %err, "failed to read job output");
                JobResult::Failed {
                    code: IO_ERROR_CODE,
                }
            }
            _ => result,
        }
    }
}
