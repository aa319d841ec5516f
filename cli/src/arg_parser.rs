use clap::{ArgEnum, Parser};
use std::path::PathBuf;

pub const FAST2_SCRIPT: &str = "convert_fp8_scaled_learned_svd_fast2.py";

/// Run the FP8 learned-rounding conversion script and follow its log
#[derive(Debug, Parser)]
#[clap(name = "fp8-launch", version)]
pub struct ArgParser {
    /// The .safetensors model to convert
    #[clap(short, long, env = "FP8_INPUT", parse(from_os_str))]
    pub input: PathBuf,

    /// Where to write the converted model [default: derived from the input name]
    #[clap(short, long, env = "FP8_OUTPUT", parse(from_os_str))]
    pub output: Option<PathBuf>,

    /// Number of calibration samples
    #[clap(long, env = "FP8_CALIB_SAMPLES", default_value_t = 3072)]
    pub calib_samples: u32,

    /// Number of optimization iterations
    #[clap(long, env = "FP8_NUM_ITER", default_value_t = 500)]
    pub num_iter: u32,

    /// Top-k value passed to the script [default: 1 for the fast2 script, otherwise the script's own]
    #[clap(long, env = "FP8_TOP_K")]
    pub top_k: Option<u32>,

    /// T5XXL model (exclude certain layers)
    #[clap(long)]
    pub t5xxl: bool,

    /// Keep distillation layers
    #[clap(long)]
    pub keep_distillation: bool,

    /// Python interpreter used to run the script
    #[clap(long, env = "FP8_PYTHON", default_value = "python3", parse(from_os_str))]
    pub python: PathBuf,

    /// Path of the conversion script
    #[clap(
        long,
        env = "FP8_SCRIPT",
        default_value = FAST2_SCRIPT,
        parse(from_os_str)
    )]
    pub script: PathBuf,

    /// Seconds to wait after SIGTERM before killing a cancelled conversion
    #[clap(long, env = "FP8_GRACE_PERIOD_SECS", default_value_t = 3)]
    pub grace_period_secs: u64,

    /// Log verbosity of the launcher itself
    #[clap(long, arg_enum, ignore_case = true, env = "FP8_LAUNCH_LOG")]
    pub log_level: Option<LogLevel>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ArgEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
