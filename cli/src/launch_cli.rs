use joblib::{JobHandle, JobResult, JobRunner, JobSpec, RunnerConfig};
use std::future::Future;
use std::io::{self, Write};
use tokio::select;
use tracing::{info, warn};

/// Runs one conversion job and mirrors its log to a console.
pub struct LaunchCli {
    runner: JobRunner,
}

impl LaunchCli {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            runner: JobRunner::spawn(config),
        }
    }

    /// Run `spec` to completion, writing its log to `out`.
    ///
    /// The job is cancelled once `stop` resolves. The returned result has already been reported
    /// to `out`; only console write failures are errors. If the console fails while the job
    /// runs, the job is cancelled and has exited by the time the error is returned.
    pub async fn run<W, S>(&self, spec: JobSpec, out: &mut W, stop: S) -> anyhow::Result<JobResult>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        writeln!(out, "Running command: {}", spec.command_line())?;
        writeln!(out, "{}", "-".repeat(80))?;

        let handle = match self.runner.start(spec).await {
            Ok(handle) => handle,
            Err(err) => {
                let result = JobResult::LaunchError(err.to_string());
                report(out, &result)?;
                return Ok(result);
            }
        };

        if let Err(err) = follow(&handle, out, stop).await {
            warn!(job = %handle.id(), %err, "console write failed, cancelling conversion");
            handle.cancel();
            let result = handle.result().await;
            info!(job = %handle.id(), %result, "conversion stopped");
            return Err(err.into());
        }

        let result = handle.result().await;
        report(out, &result)?;
        Ok(result)
    }
}

/// Mirror the job's log to `out` until it ends, cancelling the job once `stop` resolves.
async fn follow<W, S>(handle: &JobHandle, out: &mut W, stop: S) -> io::Result<()>
where
    W: Write,
    S: Future<Output = ()>,
{
    let mut log = handle.subscribe();
    tokio::pin!(stop);
    let mut stopping = false;
    loop {
        select! {
            maybe_event = log.recv() => match maybe_event {
                Some(event) => writeln!(out, "{}", event.line)?,
                None => return Ok(()),
            },
            _ = &mut stop, if !stopping => {
                info!(job = %handle.id(), "stop requested, cancelling conversion");
                stopping = true;
                handle.cancel();
            }
        }
    }
}

fn report<W: Write>(out: &mut W, result: &JobResult) -> io::Result<()> {
    writeln!(out)?;
    match result {
        JobResult::Succeeded => writeln!(out, "✓ Conversion completed successfully!"),
        JobResult::Failed { code } => {
            warn!(code, "conversion failed");
            writeln!(out, "✗ Conversion failed with return code {}", code)
        }
        JobResult::Cancelled => writeln!(out, "⚠ Conversion stopped by user."),
        JobResult::LaunchError(reason) => {
            warn!(%reason, "conversion could not be started");
            writeln!(out, "✗ Could not start the conversion: {}", reason)
        }
    }
}

/// Process exit code for a finished conversion.
pub fn exit_code(result: &JobResult) -> i32 {
    match result {
        JobResult::Succeeded => 0,
        JobResult::Failed { code } if (1..=255).contains(code) => *code,
        JobResult::Failed { .. } => 1,
        JobResult::Cancelled => 130,
        JobResult::LaunchError(_) => 2,
    }
}
