use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::evaluate::EvaluatorConfig;

/// Checks whether a wav recording is usable and tags the file name when it is not.
#[derive(Parser, Debug)]
#[clap(name = "wavgate", version, about)]
pub struct Args {
    /// Lower limit of the RMS (%). If RMS is lower than this value, the data is non-effective.
    #[clap(long = "tr", value_name = "PERCENT", default_value_t = 1.0)]
    pub rms_threshold: f64,

    /// Upper limit of the clipped samples ratio (%). If the ratio of clipped samples is higher than this value, the data is non-effective.
    #[clap(long = "tc", value_name = "PERCENT", default_value_t = 0.0)]
    pub clip_ratio_threshold: f64,

    /// Disable the checking process regarding unstability and abnormality.
    #[clap(short = 'd')]
    pub disable_stability_checks: bool,

    /// Print the verdict as a JSON line instead of plain text.
    #[clap(long)]
    pub json: bool,

    /// Sound data file whose format is wav.
    #[clap(value_name = "SOUNDFILE")]
    pub files: Vec<PathBuf>,
}

impl Args {
    /// Parses the process arguments, also accepting `-tr` and `-tc`.
    pub fn parse_env() -> Self {
        Self::parse_from(normalize_flags(std::env::args_os()))
    }

    /// The single input file, or `None` if zero or several were given.
    pub fn input(&self) -> Option<&PathBuf> {
        match self.files.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            rms_threshold_percent: self.rms_threshold,
            clip_ratio_threshold_percent: self.clip_ratio_threshold,
            disable_stability_checks: self.disable_stability_checks,
            ..Default::default()
        }
    }
}

/// Rewrites single-dash long flags (`-tr 2`, `-tc=0.5`) to their `--` form.
pub fn normalize_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let rewritten = arg.to_str().and_then(|s| {
                ["-tr", "-tc"]
                    .iter()
                    .find(|flag| s == **flag || s.starts_with(&format!("{}=", flag)))
                    .map(|_| OsString::from(format!("-{}", s)))
            });
            rewritten.unwrap_or(arg)
        })
        .collect()
}
