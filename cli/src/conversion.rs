use crate::arg_parser::{ArgParser, FAST2_SCRIPT};

use joblib::JobSpec;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("please select an input file")]
    MissingInput,
    #[error("input file {0:?} does not exist")]
    InputNotFound(PathBuf),
    #[error("please specify an output file")]
    MissingOutput,
    #[error("output file cannot be the same as input file")]
    OutputIsInput,
    #[error("cannot create output directory {dir:?}: {source}")]
    OutputDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot find script: {0:?}")]
    ScriptNotFound(PathBuf),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// One run of the conversion script, as the user asked for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversion {
    pub python: PathBuf,
    pub script: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub calib_samples: u32,
    pub num_iter: u32,
    pub top_k: Option<u32>,
    pub t5xxl: bool,
    pub keep_distillation: bool,
}

impl Conversion {
    pub fn from_args(args: &ArgParser) -> Self {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&args.input, args.keep_distillation));
        Self {
            python: args.python.clone(),
            script: args.script.clone(),
            input: args.input.clone(),
            output,
            calib_samples: args.calib_samples,
            num_iter: args.num_iter,
            top_k: args.top_k.or_else(|| default_top_k(&args.script)),
            t5xxl: args.t5xxl,
            keep_distillation: args.keep_distillation,
        }
    }

    /// Check the settings before anything is launched, creating the output directory if needed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input.as_os_str().is_empty() {
            return Err(ValidationError::MissingInput);
        }
        if !self.input.exists() {
            return Err(ValidationError::InputNotFound(self.input.clone()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ValidationError::MissingOutput);
        }
        if same_path(&self.input, &self.output) {
            return Err(ValidationError::OutputIsInput);
        }
        for (name, value) in [
            ("calibration samples", Some(self.calib_samples)),
            ("iterations", Some(self.num_iter)),
            ("top-k", self.top_k),
        ] {
            if value == Some(0) {
                return Err(ValidationError::Zero(name));
            }
        }
        if !self.script.is_file() {
            return Err(ValidationError::ScriptNotFound(self.script.clone()));
        }

        if let Some(dir) = self.output.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                info!(dir = %dir.display(), "creating output directory");
                fs::create_dir_all(dir).map_err(|source| ValidationError::OutputDir {
                    dir: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// The script's command line:
    /// `<python> <script> --input <in> --output <out> --calib_samples <n> --num_iter <n>
    /// [--top_k <k>] [--t5xxl] [--keep_distillation]`
    pub fn job_spec(&self) -> JobSpec {
        let mut spec = JobSpec::new(&self.python)
            .arg(&self.script)
            .arg("--input")
            .arg(&self.input)
            .arg("--output")
            .arg(&self.output)
            .arg("--calib_samples")
            .arg(self.calib_samples.to_string())
            .arg("--num_iter")
            .arg(self.num_iter.to_string());
        if let Some(top_k) = self.top_k {
            spec = spec.arg("--top_k").arg(top_k.to_string());
        }
        if self.t5xxl {
            spec = spec.arg("--t5xxl");
        }
        if self.keep_distillation {
            spec = spec.arg("--keep_distillation");
        }
        spec
    }
}

/// The fast2 script is always given `--top_k`, 1 unless asked otherwise.
fn default_top_k(script: &Path) -> Option<u32> {
    (script.file_name() == Some(OsStr::new(FAST2_SCRIPT))).then(|| 1)
}

/// `<input minus extension>_float8_e4m3fn_scaled_learned[_nodistill]_svd.safetensors`
pub fn default_output_path(input: &Path, keep_distillation: bool) -> PathBuf {
    let mut name: OsString = input.with_extension("").into_os_string();
    if keep_distillation {
        name.push("_float8_e4m3fn_scaled_learned_nodistill_svd.safetensors");
    } else {
        name.push("_float8_e4m3fn_scaled_learned_svd.safetensors");
    }
    PathBuf::from(name)
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => match (std::path::absolute(a), std::path::absolute(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn conversion(dir: &Path) -> Conversion {
        let input = dir.join("model.safetensors");
        let script = dir.join("convert.py");
        fs::write(&input, b"weights").unwrap();
        fs::write(&script, b"print('hi')").unwrap();
        Conversion {
            python: "python3".into(),
            script,
            input,
            output: dir.join("out").join("model_fp8.safetensors"),
            calib_samples: 3072,
            num_iter: 500,
            top_k: None,
            t5xxl: false,
            keep_distillation: false,
        }
    }

    #[test]
    fn output_name_is_derived_from_input() {
        assert_eq!(
            default_output_path(Path::new("/models/flux.safetensors"), false),
            PathBuf::from("/models/flux_float8_e4m3fn_scaled_learned_svd.safetensors")
        );
        assert_eq!(
            default_output_path(Path::new("t5xxl.v1.safetensors"), true),
            PathBuf::from("t5xxl.v1_float8_e4m3fn_scaled_learned_nodistill_svd.safetensors")
        );
        assert_eq!(
            default_output_path(Path::new("model"), false),
            PathBuf::from("model_float8_e4m3fn_scaled_learned_svd.safetensors")
        );
    }

    #[test]
    fn from_args_fills_in_output() {
        let args = ArgParser::parse_from([
            "fp8-launch",
            "-i",
            "a/b.safetensors",
            "--keep-distillation",
        ]);
        let conversion = Conversion::from_args(&args);
        assert_eq!(
            conversion.output,
            PathBuf::from("a/b_float8_e4m3fn_scaled_learned_nodistill_svd.safetensors")
        );

        let args =
            ArgParser::parse_from(["fp8-launch", "-i", "a/b.safetensors", "-o", "c.safetensors"]);
        assert_eq!(
            Conversion::from_args(&args).output,
            PathBuf::from("c.safetensors")
        );
    }

    #[test]
    fn fast2_script_gets_top_k_by_default() {
        let args = ArgParser::parse_from(["fp8-launch", "-i", "m.safetensors"]);
        assert_eq!(Conversion::from_args(&args).top_k, Some(1));

        let args = ArgParser::parse_from([
            "fp8-launch",
            "-i",
            "m.safetensors",
            "--script",
            "tools/convert_fp8_scaled_learned_svd_fast2.py",
            "--top-k",
            "4",
        ]);
        assert_eq!(Conversion::from_args(&args).top_k, Some(4));

        let args = ArgParser::parse_from([
            "fp8-launch",
            "-i",
            "m.safetensors",
            "--script",
            "convert_fp8_scaled_learned_svd.py",
        ]);
        assert_eq!(Conversion::from_args(&args).top_k, None);
    }

    #[test]
    fn command_line_follows_the_script_contract() {
        let dir = tempfile::tempdir().unwrap();
        let mut conversion = conversion(dir.path());
        conversion.python = "py".into();
        conversion.script = "s.py".into();
        conversion.input = "in.safetensors".into();
        conversion.output = "out.safetensors".into();
        assert_eq!(
            conversion.job_spec().command_line(),
            "py s.py --input in.safetensors --output out.safetensors --calib_samples 3072 --num_iter 500"
        );

        conversion.top_k = Some(3);
        conversion.t5xxl = true;
        conversion.keep_distillation = true;
        assert_eq!(
            conversion.job_spec().command_line(),
            "py s.py --input in.safetensors --output out.safetensors --calib_samples 3072 \
             --num_iter 500 --top_k 3 --t5xxl --keep_distillation"
        );
    }

    #[test]
    fn valid_settings_create_the_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let conversion = conversion(dir.path());
        conversion.validate().expect("settings are valid");
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn missing_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut conversion = conversion(dir.path());
        conversion.input = dir.path().join("nope.safetensors");
        assert!(matches!(
            conversion.validate(),
            Err(ValidationError::InputNotFound(_))
        ));
        conversion.input = PathBuf::new();
        assert!(matches!(
            conversion.validate(),
            Err(ValidationError::MissingInput)
        ));
    }

    #[test]
    fn output_must_differ_from_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut conversion = conversion(dir.path());
        conversion.output = dir.path().join(".").join("model.safetensors");
        assert!(matches!(
            conversion.validate(),
            Err(ValidationError::OutputIsInput)
        ));
        conversion.output = PathBuf::new();
        assert!(matches!(
            conversion.validate(),
            Err(ValidationError::MissingOutput)
        ));
    }

    #[test]
    fn script_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut conversion = conversion(dir.path());
        conversion.script = dir.path().join("missing.py");
        assert!(matches!(
            conversion.validate(),
            Err(ValidationError::ScriptNotFound(_))
        ));
    }

    #[test]
    fn zero_parameters_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut conversion = conversion(dir.path());
        conversion.top_k = Some(0);
        assert!(matches!(
            conversion.validate(),
            Err(ValidationError::Zero("top-k"))
        ));
        conversion.top_k = None;
        conversion.num_iter = 0;
        assert!(matches!(
            conversion.validate(),
            Err(ValidationError::Zero("iterations"))
        ));
    }
}
