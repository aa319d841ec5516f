use std::ffi::OsString;
use std::path::PathBuf;
use uuid::Uuid;

pub type Program = OsString;
pub type Args = Vec<OsString>;
pub type Dir = Option<PathBuf>;
pub type Envs = Vec<(OsString, OsString)>;
pub type JobId = Uuid;

/// Everything needed to launch one job.
///
/// A `JobSpec` is consumed by [`JobRunner::start`](crate::JobRunner::start), so the
/// argument list can no longer change once the job is running.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobSpec {
    program: Program,
    args: Args,
    dir: Dir,
    envs: Envs,
}

impl JobSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the program from `dir` instead of the runner's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Add an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<OsString>, val: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), val.into()));
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn dir(&self) -> Option<&PathBuf> {
        self.dir.as_ref()
    }

    pub fn envs(&self) -> &[(OsString, OsString)] {
        &self.envs
    }

    /// The command line as a single display string, arguments separated by spaces.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_argument_order() {
        let spec = JobSpec::new("python3")
            .arg("script.py")
            .args(["--input", "a.safetensors"])
            .arg("--t5xxl");
        assert_eq!(
            spec.get_args(),
            &["script.py", "--input", "a.safetensors", "--t5xxl"].map(OsString::from)
        );
        assert_eq!(
            spec.command_line(),
            "python3 script.py --input a.safetensors --t5xxl"
        );
    }

    #[test]
    fn dir_and_env_are_optional() {
        let spec = JobSpec::new("echo");
        assert!(spec.dir().is_none());
        assert!(spec.envs().is_empty());

        let spec = spec.current_dir("/tmp").env("FOO", "bar");
        assert_eq!(spec.dir(), Some(&PathBuf::from("/tmp")));
        assert_eq!(spec.envs(), &[(OsString::from("FOO"), OsString::from("bar"))]);
    }
}
