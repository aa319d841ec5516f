//! Run external programs as supervised jobs.
//!
//! A [`JobRunner`] launches programs described by a [`JobSpec`], merges each child's stdout and
//! stderr into one stream of [`LogEvent`] lines, and reports exactly one [`JobResult`] per job.
//! Jobs can be cancelled at any time: the child's process group gets SIGTERM, then SIGKILL once
//! the configured grace period runs out.

mod actors;
pub mod config;
pub mod errors;
pub mod events;
mod handle;
mod stream;
pub mod types;

// re-export the job coord handle as if it is the job runner itself.
pub use actors::coordinator::JobCoordinatorHandle as JobRunner;
pub use config::RunnerConfig;
pub use errors::JobError;
pub use events::{JobResult, JobStatus, LogEvent};
pub use handle::JobHandle;
pub use stream::LogStream;
pub use types::{JobId, JobSpec};
