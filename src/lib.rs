//! Quality gate for recorded wav files.
//!
//! [`evaluate::evaluate`] classifies a decoded mono stream as effective or
//! rejects it as weak, clipped, unstable or abnormal. The binary wraps it with
//! decoding and the file rename side channel.

pub mod args;
pub mod audio;
pub mod evaluate;
pub mod naming;

pub use evaluate::{EvalError, EvaluatorConfig, Reason, Rejection, Verdict};
