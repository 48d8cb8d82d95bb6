//! Effectiveness check for a single decoded recording.
//!
//! The checks run in a fixed order and stop at the first failure:
//!
//! 1. whole-file RMS below the configured floor -> `Weak`
//! 2. share of samples at or above the clip level -> `Clipped`
//! 3. per-segment RMS drifting outside [0.5, 1.5] of the previous one -> `Unstable`
//! 4. per-segment peaks staying inside mean +/- 1.5 RMS -> `Abnormal`
//!
//! Checks 3 and 4 can be switched off with `disable_stability_checks`.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Absolute sample value at which a sample counts as clipped.
pub const CLIP_LEVEL: f64 = 0.98;
/// Target segment length in seconds.
pub const SEGMENT_SECONDS: usize = 2;
pub const STABILITY_MIN_RATIO: f64 = 0.50;
pub const STABILITY_MAX_RATIO: f64 = 1.50;
/// Peaks must leave mean +/- this many RMS in at least one direction.
pub const SHAPE_FACTOR: f64 = 1.5;

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("sample stream is empty")]
    EmptyInput,

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Starting values for the running max/min of a pass.
///
/// The whole-file pass starts both at 0.0 and the segment pass starts at
/// -1.0/+1.0, so an all-positive file reports a global min of 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremaSeed {
    pub max: f64,
    pub min: f64,
}

impl ExtremaSeed {
    pub const GLOBAL: ExtremaSeed = ExtremaSeed { max: 0.0, min: 0.0 };
    pub const SEGMENT: ExtremaSeed = ExtremaSeed { max: -1.0, min: 1.0 };
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    /// RMS floor in percent of full scale.
    pub rms_threshold_percent: f64,
    /// Allowed share of clipped samples in percent.
    pub clip_ratio_threshold_percent: f64,
    pub disable_stability_checks: bool,
    pub global_extrema_seed: ExtremaSeed,
    pub segment_extrema_seed: ExtremaSeed,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            rms_threshold_percent: 1.0,
            clip_ratio_threshold_percent: 0.0,
            disable_stability_checks: false,
            global_extrema_seed: ExtremaSeed::GLOBAL,
            segment_extrema_seed: ExtremaSeed::SEGMENT,
        }
    }
}

/// Running statistics over a run of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub sum_sq: f64,
    pub sum: f64,
    pub max: f64,
    pub min: f64,
    pub clipped: usize,
}

impl Stats {
    pub fn empty(seed: ExtremaSeed) -> Self {
        Self {
            count: 0,
            sum_sq: 0.0,
            sum: 0.0,
            max: seed.max,
            min: seed.min,
            clipped: 0,
        }
    }

    pub fn push(mut self, v: f64) -> Self {
        self.count += 1;
        self.sum_sq += v * v;
        self.sum += v;
        self.max = self.max.max(v);
        self.min = self.min.min(v);
        if v.abs() >= CLIP_LEVEL {
            self.clipped += 1;
        }
        self
    }

    pub fn collect(samples: &[f64], seed: ExtremaSeed) -> Self {
        samples.iter().fold(Self::empty(seed), |acc, &v| acc.push(v))
    }

    /// Combines statistics of two adjacent runs. Both sides should share a seed.
    pub fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            sum_sq: self.sum_sq + other.sum_sq,
            sum: self.sum + other.sum,
            max: self.max.max(other.max),
            min: self.min.min(other.min),
            clipped: self.clipped + other.clipped,
        }
    }

    pub fn rms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum_sq / self.count as f64).sqrt()
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    pub fn clip_ratio(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.clipped as f64 / self.count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    Weak,
    Clipped,
    Unstable,
    Abnormal,
}

impl Reason {
    /// Tag inserted before `.wav` when the recording is renamed.
    pub fn suffix(&self) -> &'static str {
        match self {
            Reason::Weak => "weak",
            Reason::Clipped => "clipped",
            Reason::Unstable => "unstable",
            Reason::Abnormal => "abnormal",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Why a recording was rejected, with the metrics that decided it.
/// `segment` is the index of the first sample of the failing segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "lowercase")]
pub enum Rejection {
    Weak {
        rms: f64,
    },
    Clipped {
        ratio: f64,
        threshold: f64,
    },
    Unstable {
        segment: usize,
        ratio: f64,
    },
    Abnormal {
        segment: usize,
        max: f64,
        min: f64,
        ave: f64,
        rms: f64,
    },
}

impl Rejection {
    pub fn reason(&self) -> Reason {
        match self {
            Rejection::Weak { .. } => Reason::Weak,
            Rejection::Clipped { .. } => Reason::Clipped,
            Rejection::Unstable { .. } => Reason::Unstable,
            Rejection::Abnormal { .. } => Reason::Abnormal,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Weak { rms } => {
                write!(f, "rms ({rms}) is too weak. tune the gain.")
            }
            Rejection::Clipped { ratio, threshold } => write!(
                f,
                "clipping is detected. tune the gain. clipping ratio ({ratio}) > threshold ({threshold})"
            ),
            Rejection::Unstable { segment, ratio } => write!(
                f,
                "unstable: rms_segment / prev_rms = {ratio:.6} for segment {segment}"
            ),
            Rejection::Abnormal {
                segment,
                max,
                min,
                ave,
                rms,
            } => write!(
                f,
                "abnormal shape: max_segment({max:.6}) < ave_segment({ave:.6})+rms_segment({rms:.6})*1.5 \
                 and min_segment({min:.6}) > ave_segment({ave:.6})-rms_segment({rms:.6})*1.5 for segment {segment}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Effective,
    Ineffective(Rejection),
}

impl Verdict {
    pub fn is_effective(&self) -> bool {
        matches!(self, Verdict::Effective)
    }

    pub fn reason(&self) -> Option<Reason> {
        match self {
            Verdict::Effective => None,
            Verdict::Ineffective(rejection) => Some(rejection.reason()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Effective => f.write_str("effective"),
            Verdict::Ineffective(rejection) => write!(f, "{rejection}"),
        }
    }
}

/// Returns `(segment_count, segment_size)` for a stream of `total` samples.
/// Only `total / segment_size` complete segments are analysed; the tail is dropped.
pub fn segment_layout(total: usize, sample_rate: u32) -> (usize, usize) {
    let per_segment = sample_rate as usize * SEGMENT_SECONDS;
    match total / per_segment {
        0 => (1, total),
        count => (count, total / count),
    }
}

pub fn evaluate(
    samples: &[f64],
    sample_rate: u32,
    config: &EvaluatorConfig,
) -> Result<Verdict, EvalError> {
    if samples.is_empty() {
        return Err(EvalError::EmptyInput);
    }
    if sample_rate == 0 {
        return Err(EvalError::InvalidSampleRate(sample_rate));
    }

    let stats = Stats::collect(samples, config.global_extrema_seed);
    let rms = stats.rms();
    info!(
        samples = stats.count,
        rms,
        ave = stats.mean(),
        max = stats.max,
        min = stats.min,
        "whole-file statistics"
    );

    // A silent file never counts as effective, even with a zero floor.
    if rms < config.rms_threshold_percent / 100.0 || rms == 0.0 {
        return Ok(Verdict::Ineffective(Rejection::Weak { rms }));
    }
    debug!(rms, floor = config.rms_threshold_percent / 100.0, "rms check passed");

    let clip_threshold = config.clip_ratio_threshold_percent / 100.0;
    let ratio = stats.clip_ratio();
    if ratio > clip_threshold {
        return Ok(Verdict::Ineffective(Rejection::Clipped {
            ratio,
            threshold: clip_threshold,
        }));
    }
    debug!(ratio, threshold = clip_threshold, "clipping check passed");

    let (segment_count, segment_size) = segment_layout(samples.len(), sample_rate);
    debug!(segment_count, segment_size, "segmenting");

    let outcome = samples
        .chunks_exact(segment_size)
        .enumerate()
        .try_fold(rms, |prev_rms, (index, segment)| {
            check_segment(index * segment_size, segment, prev_rms, config)
        });

    Ok(match outcome {
        Ok(_) => Verdict::Effective,
        Err(rejection) => Verdict::Ineffective(rejection),
    })
}

/// Runs checks 3 and 4 on one segment. Returns the segment RMS as the next baseline.
fn check_segment(
    start: usize,
    segment: &[f64],
    prev_rms: f64,
    config: &EvaluatorConfig,
) -> Result<f64, Rejection> {
    let stats = Stats::collect(segment, config.segment_extrema_seed);
    let rms = stats.rms();
    let ave = stats.mean();
    info!(
        segment = start,
        rms,
        ave,
        max = stats.max,
        min = stats.min,
        "segment statistics"
    );

    if config.disable_stability_checks {
        return Ok(rms);
    }

    let ratio = rms / prev_rms;
    if ratio < STABILITY_MIN_RATIO || ratio > STABILITY_MAX_RATIO {
        return Err(Rejection::Unstable {
            segment: start,
            ratio,
        });
    }
    debug!(segment = start, ratio, "stability check passed");

    let spread = rms * SHAPE_FACTOR;
    if stats.max < ave + spread && stats.min > ave - spread {
        return Err(Rejection::Abnormal {
            segment: start,
            max: stats.max,
            min: stats.min,
            ave,
            rms,
        });
    }
    debug!(
        segment = start,
        upper = ave + spread,
        lower = ave - spread,
        "shape check passed"
    );

    Ok(rms)
}
