use anyhow::Context;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

/// Tag used when the file could not be opened or decoded.
pub const UNAVAILABLE_TAG: &str = "unavailable";

static TAGGED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+)\.(weak|unstable|clipped|abnormal|unavailable)\.(wav|csv)$")
        .expect("tag pattern is valid")
});

pub fn has_wav_extension(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".wav")
}

/// File name without its extension and without a tag left by an earlier run.
pub fn canonical_stem(path: &Path) -> String {
    let name = file_name(path);
    if let Some(caps) = TAGGED_NAME.captures(&name) {
        return caps[1].to_string();
    }
    plain_stem(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn plain_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<dir>/<stem>.<tag>.wav`, or `<dir>/<stem>.wav` without a tag.
pub fn target_path(path: &Path, tag: Option<&str>) -> PathBuf {
    let stem = canonical_stem(path);
    let name = match tag {
        Some(tag) => format!("{}.{}.wav", stem, tag),
        None => format!("{}.wav", stem),
    };
    path.with_file_name(name)
}

/// Moves `from` to `to` unless they already match. Returns the new path if renamed.
pub fn apply_rename(from: &Path, to: &Path) -> anyhow::Result<Option<PathBuf>> {
    if from == to {
        return Ok(None);
    }
    fs::rename(from, to)
        .with_context(|| format!("failed to rename {} to {}", from.display(), to.display()))?;
    info!("change filename from {} to {}", from.display(), to.display());
    Ok(Some(to.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_previous_tag() {
        assert_eq!(canonical_stem(Path::new("/data/mic1.weak.wav")), "mic1");
        assert_eq!(canonical_stem(Path::new("mic1.CLIPPED.WAV")), "mic1");
        assert_eq!(canonical_stem(Path::new("a/b.c.unavailable.wav")), "b.c");
        assert_eq!(canonical_stem(Path::new("mic1.abnormal.csv")), "mic1");
    }

    #[test]
    fn untagged_name_keeps_stem() {
        assert_eq!(canonical_stem(Path::new("/data/mic1.wav")), "mic1");
        assert_eq!(canonical_stem(Path::new("take.2.wav")), "take.2");
        assert_eq!(canonical_stem(Path::new(".weak.wav")), ".weak");
    }

    #[test]
    fn wav_extension_is_case_sensitive() {
        assert!(has_wav_extension(Path::new("x/y.wav")));
        assert!(!has_wav_extension(Path::new("x/y.WAV")));
        assert!(!has_wav_extension(Path::new("x/y.mp3")));
    }

    #[test]
    fn target_replaces_tag_instead_of_stacking() {
        let p = Path::new("/data/mic1.unstable.wav");
        assert_eq!(target_path(p, Some("weak")), PathBuf::from("/data/mic1.weak.wav"));
        assert_eq!(target_path(p, None), PathBuf::from("/data/mic1.wav"));
        assert_eq!(
            target_path(Path::new("mic1.wav"), None),
            PathBuf::from("mic1.wav")
        );
    }

    #[test]
    fn rename_moves_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("rec.weak.wav");
        fs::write(&from, b"RIFF").unwrap();

        let to = target_path(&from, None);
        assert_eq!(apply_rename(&from, &to).unwrap(), Some(to.clone()));
        assert!(to.exists());
        assert!(!from.exists());

        assert_eq!(apply_rename(&to, &to).unwrap(), None);
    }

    #[test]
    fn rename_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("missing.wav");
        let to = target_path(&from, Some(UNAVAILABLE_TAG));
        let err = apply_rename(&from, &to).unwrap_err();
        assert!(err.to_string().contains("failed to rename"));
    }
}
