use clap::CommandFactory;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wavgate::args::Args;
use wavgate::{audio, evaluate, naming};
use wavgate::{EvaluatorConfig, Reason, Verdict};

/// Machine-readable result printed with `--json`.
#[derive(Debug, Serialize)]
struct Report<'a> {
    file: &'a Path,
    #[serde(flatten)]
    verdict: &'a Verdict,
    detail: String,
    target: &'a Path,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse_env();
    let Some(input) = args.input() else {
        eprint!("{}", Args::command().render_help());
        return Ok(());
    };

    run(input, &args.evaluator_config(), args.json)
}

fn run(wav_file: &Path, config: &EvaluatorConfig, json: bool) -> anyhow::Result<()> {
    if !naming::has_wav_extension(wav_file) {
        println!("you should specify wav file.");
        return Ok(());
    }

    let wav = match audio::load_first_channel(wav_file) {
        Ok(wav) => wav,
        Err(e) => {
            error!("{:#}", e);
            let target = naming::target_path(wav_file, Some(naming::UNAVAILABLE_TAG));
            naming::apply_rename(wav_file, &target)?;
            return Ok(());
        }
    };
    info!(
        "decoded {}: sample_rate={} channels={} samples={}",
        wav_file.display(),
        wav.sample_rate,
        wav.channels,
        wav.samples.len()
    );

    let verdict = evaluate::evaluate(&wav.samples, wav.sample_rate, config)?;
    let target = rename_target(wav_file, verdict.reason());

    if json {
        let report = Report {
            file: wav_file,
            verdict: &verdict,
            detail: verdict.to_string(),
            target: &target,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", verdict);
    }

    naming::apply_rename(wav_file, &target)?;
    Ok(())
}

/// Where the file should live after evaluation. An effective file only
/// loses a stale tag.
fn rename_target(wav_file: &Path, reason: Option<Reason>) -> PathBuf {
    naming::target_path(wav_file, reason.as_ref().map(Reason::suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::fs;
    use wavgate::Rejection;

    fn write_wav(path: &Path, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn spiky(len: usize) -> Vec<i16> {
        [29491, -29491, 8000, -8000, 8000, -8000, 8000, -8000]
            .iter()
            .copied()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn weak_file_gets_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet.wav");
        write_wav(&path, &[10; 64]);

        run(&path, &EvaluatorConfig::default(), false).unwrap();
        assert!(!path.exists());
        assert!(dir.path().join("quiet.weak.wav").exists());
    }

    #[test]
    fn effective_file_loses_stale_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.clipped.wav");
        write_wav(&path, &spiky(64));

        run(&path, &EvaluatorConfig::default(), true).unwrap();
        assert!(dir.path().join("take.wav").exists());
    }

    #[test]
    fn effective_untagged_file_stays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        write_wav(&path, &spiky(64));

        run(&path, &EvaluatorConfig::default(), false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn undecodable_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.weak.wav");
        fs::write(&path, b"definitely not riff").unwrap();

        run(&path, &EvaluatorConfig::default(), false).unwrap();
        assert!(dir.path().join("broken.unavailable.wav").exists());
    }

    #[test]
    fn non_wav_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();

        run(&path, &EvaluatorConfig::default(), false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn empty_recording_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[]);

        let err = run(&path, &EvaluatorConfig::default(), false).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(path.exists());
    }

    #[test]
    fn report_serializes_reason() {
        let verdict = Verdict::Ineffective(Rejection::Weak { rms: 0.0 });
        let report = Report {
            file: Path::new("a.wav"),
            verdict: &verdict,
            detail: verdict.to_string(),
            target: Path::new("a.weak.wav"),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["verdict"], "ineffective");
        assert_eq!(value["reason"], "weak");
        assert_eq!(value["target"], "a.weak.wav");
    }
}
