use std::{ffi::OsString, io, result};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("failed to launch {}: {source}", program.to_string_lossy())]
    Launch {
        program: OsString,
        #[source]
        source: io::Error,
    },
    #[error("no such job exists")]
    NotFound,
    #[error("job limit of {limit} running jobs reached")]
    Busy { limit: usize },
    #[error("job is still running")]
    StillRunning,
    #[error("job runner has shut down")]
    RunnerGone,
}

pub type Result<T> = result::Result<T, JobError>;
