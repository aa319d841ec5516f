//! Runs alone in its own test binary: it counts the process's open descriptors.

use joblib::{JobError, JobRunner, JobSpec, RunnerConfig};
use std::fs;

fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

async fn fail_to_launch(runner: &JobRunner, spec: JobSpec) {
    match runner.start(spec).await {
        Err(JobError::Launch { .. }) => {}
        other => panic!("expected a launch error, got {:?}", other.map(|h| h.id())),
    }
}

#[tokio::test]
async fn failed_launches_release_their_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let runner = JobRunner::spawn(RunnerConfig::default());
    let missing = dir.path().join("missing");

    // let the runtime and the runner settle first
    fail_to_launch(&runner, JobSpec::new(&missing)).await;
    let before = open_fds();

    for _ in 0..500 {
        fail_to_launch(&runner, JobSpec::new(&missing)).await;
        fail_to_launch(&runner, JobSpec::new(dir.path())).await;
        fail_to_launch(&runner, JobSpec::new("")).await;
    }

    let after = open_fds();
    assert!(after <= before, "{} descriptors before, {} after", before, after);
    assert!(runner.jobs().await.unwrap().is_empty());
}
