mod actor;
mod messages;
mod output;

use crate::config::RunnerConfig;
use crate::events::{JobResult, JobStatus, LogEvent, IO_ERROR_CODE};
use crate::types::{JobId, JobSpec};
use actor::Actor;
use messages::WorkerMessage;
use std::{fs::File, io, os::fd::OwnedFd, os::unix::process::CommandExt, process::Stdio};
use tokio::{
    net::unix::pipe,
    process,
    sync::{mpsc, oneshot},
};

/// Handle to the actor that owns one job's child process.
///
/// When the last handle is dropped while the child is still running, the child is killed.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<WorkerMessage>,
}

impl WorkerHandle {
    /// Launch `spec` and start supervising it.
    ///
    /// Fails without creating anything if the program cannot be started.
    pub fn spawn(
        job_id: JobId,
        spec: JobSpec,
        config: &RunnerConfig,
        output_tx: mpsc::UnboundedSender<LogEvent>,
        drained_rx: oneshot::Receiver<()>,
        reaper: mpsc::UnboundedSender<(JobId, JobResult)>,
    ) -> io::Result<Self> {
        let command_line = spec.command_line();
        let (child, output) = launch(&spec)?;
        tracing::info!(job = %job_id, pid = ?child.id(), command = %command_line, "job started");

        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(
            job_id,
            inbox,
            child,
            output,
            output_tx,
            drained_rx,
            reaper,
            config,
        );
        Ok(Self { sender })
    }

    pub async fn status(&self) -> JobStatus {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.send(WorkerMessage::GetStatus { response: tx });
        rx.await.unwrap_or(JobStatus::Finished(JobResult::Failed {
            code: IO_ERROR_CODE,
        }))
    }

    pub async fn result(&self) -> JobResult {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.send(WorkerMessage::AwaitResult { response: tx });
        rx.await.unwrap_or(JobResult::Failed {
            code: IO_ERROR_CODE,
        })
    }

    pub fn cancel(&self) {
        let _ = self.sender.send(WorkerMessage::Cancel);
    }
}

/// Spawn the child with stdout and stderr sharing one pipe, so the merged output keeps the
/// order in which the child wrote it.
fn launch(spec: &JobSpec) -> io::Result<(process::Child, pipe::Receiver)> {
    if spec.program().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty program name",
        ));
    }

    let (reader, writer) = io::pipe()?;
    let child = {
        let mut command = std::process::Command::new(spec.program());
        command
            .args(spec.get_args())
            .envs(spec.envs().iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            // own process group, so cancellation reaches grandchildren too
            .process_group(0);
        if let Some(dir) = spec.dir() {
            command.current_dir(dir);
        }
        let mut command = process::Command::from(command);
        command.kill_on_drop(true);
        command.spawn()?
        // `command` drops here and closes our copies of the write end
    };

    let output = pipe::Receiver::from_file(File::from(OwnedFd::from(reader)))?;
    Ok((child, output))
}
