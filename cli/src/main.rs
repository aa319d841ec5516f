mod arg_parser;
mod conversion;
mod launch_cli;
mod logging;

use anyhow::Context;
use arg_parser::ArgParser;
use clap::Parser;
use conversion::Conversion;
use joblib::RunnerConfig;
use launch_cli::LaunchCli;
use std::{future::Future, io, process, time::Duration};
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Log lines kept for replay. The launcher subscribes right after launch.
const LOG_HISTORY_LINES: usize = 1024;

#[tokio::main]
async fn main() {
    let args = ArgParser::parse();
    let code = match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            2
        }
    };
    process::exit(code);
}

async fn run(args: ArgParser) -> anyhow::Result<i32> {
    logging::init_logging(args.log_level)?;

    let conversion = Conversion::from_args(&args);
    conversion.validate().context("invalid conversion settings")?;

    let stop = stop_signals().context("cannot install signal handlers")?;
    let cli = LaunchCli::new(runner_config(&args));
    let result = cli.run(conversion.job_spec(), &mut io::stdout(), stop).await?;
    Ok(launch_cli::exit_code(&result))
}

fn runner_config(args: &ArgParser) -> RunnerConfig {
    RunnerConfig {
        grace_period: Duration::from_secs(args.grace_period_secs),
        // one conversion at a time
        max_concurrent_jobs: Some(1),
        history_limit: Some(LOG_HISTORY_LINES),
        ..RunnerConfig::default()
    }
}

/// Resolves on the first SIGINT, SIGTERM or SIGHUP.
///
/// The handlers are installed before this returns, so a signal that arrives before the future is
/// first polled is not lost.
fn stop_signals() -> io::Result<impl Future<Output = ()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    Ok(async move {
        select! {
            Some(()) = interrupt.recv() => info!("received SIGINT"),
            Some(()) = terminate.recv() => info!("received SIGTERM"),
            Some(()) = hangup.recv() => info!("received SIGHUP"),
            else => std::future::pending::<()>().await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{raise, Signal};

    #[test]
    fn runner_config_follows_the_args() {
        let args = ArgParser::parse_from([
            "fp8-launch",
            "-i",
            "model.safetensors",
            "--grace-period-secs",
            "7",
        ]);
        let config = runner_config(&args);
        assert_eq!(config.grace_period, Duration::from_secs(7));
        assert_eq!(config.max_concurrent_jobs, Some(1));
        assert_eq!(config.history_limit, Some(LOG_HISTORY_LINES));
    }

    #[tokio::test]
    async fn sighup_stops_the_launcher() {
        let stop = stop_signals().expect("signal handlers install");
        raise(Signal::SIGHUP).expect("raise SIGHUP");
        tokio::time::timeout(Duration::from_secs(5), stop)
            .await
            .expect("stop resolves on SIGHUP");
    }
}
