//! Loading analysis sidecars produced by the decoder/FFT stage.
//!
//! Each audio file `song.mp3` has a `song.mp3.json` next to it:
//! `{ "Bpm": 124.0, "Key": "8A", "Map": [[bass, mid, high, time], ...] }`,
//! optionally with `"Title"` and `"DurationSeconds"`.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::frames::SpectralFrame;
use crate::track::{Track, TrackAnalysis};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid analysis in {path}: {message}")]
    InvalidAnalysis { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, LibraryError>;

/// On-disk analysis document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AnalysisDocument {
    #[serde(default)]
    bpm: f64,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    map: Vec<Vec<f64>>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration_seconds: Option<f64>,
}

/// Sidecar extension.
pub const ANALYSIS_EXTENSION: &str = "json";

/// Parse one analysis sidecar into a fully analyzed track.
pub fn load_analysis(path: &Path) -> Result<Track> {
    let contents = std::fs::read_to_string(path)?;
    parse_analysis(path, &contents)
}

fn parse_analysis(path: &Path, contents: &str) -> Result<Track> {
    let doc: AnalysisDocument = serde_json::from_str(contents).map_err(|e| LibraryError::Json {
        path: path.display().to_string(),
        source: e,
    })?;

    let frames = doc
        .map
        .iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [bass, mid, high, .., time] => Ok(SpectralFrame::new(
                bass.max(0.0),
                mid.max(0.0),
                high.max(0.0),
                *time,
            )),
            _ => Err(LibraryError::InvalidAnalysis {
                path: path.display().to_string(),
                message: format!("frame {} has {} values, expected at least 4", i, row.len()),
            }),
        })
        .collect::<Result<Vec<_>>>()?;

    // The sidecar sits next to the audio file: strip the ".json"
    let audio_path = path.with_extension("");
    let title = doc.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| {
        audio_path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    let duration = doc
        .duration_seconds
        .filter(|d| *d > 0.0)
        .or_else(|| frames.last().map(|f| f.time))
        .unwrap_or(0.0);

    let track = Track::from_analysis(TrackAnalysis {
        title,
        path: audio_path,
        bpm: doc.bpm.max(0.0),
        duration,
        key: doc.key,
        frames,
    });
    log::debug!(
        "Loaded \"{}\": {:.1} BPM, key {}, mix {:.1}s-{:.1}s",
        track.title,
        track.bpm,
        track.key.as_deref().unwrap_or("?"),
        track.mix_in_point(),
        track.mix_out_point()
    );
    Ok(track)
}

/// Collect analysis sidecars under the given files or directories.
pub fn find_analyses(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if ext == ANALYSIS_EXTENSION {
                found.push(entry.into_path());
            }
        }
    }
    found.sort();
    found.dedup();
    found
}

/// Load every analysis under `paths` in parallel. Files that fail to load are
/// logged and skipped. Tracks come back sorted by path.
pub fn load_library(paths: &[PathBuf], workers: usize) -> Result<Vec<Track>> {
    for path in paths {
        if !path.exists() {
            return Err(LibraryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
    }

    let files = find_analyses(paths);
    if files.is_empty() {
        log::info!("No analysis files found");
        return Ok(Vec::new());
    }
    log::info!("Loading {} analyses with {} workers", files.len(), workers);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| LibraryError::Io(std::io::Error::other(e)))?;

    let results: Vec<(PathBuf, Result<Track>)> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let result = load_analysis(path);
                pb.inc(1);
                (path.clone(), result)
            })
            .collect()
    });

    let mut tracks = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok(track) => tracks.push(track),
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }
    pb.finish_with_message(format!("{} loaded, {} failed", tracks.len(), failed));

    tracks.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_analysis(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(format!("{}.json", name));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_minimal() {
        let track = parse_analysis(
            Path::new("/music/Intro Song.mp3.json"),
            r#"{"Bpm": 124.0, "Key": "8A", "Map": [[0.1, 0.2, 0.1, 0.0], [0.2, 0.2, 0.2, 0.1]]}"#,
        )
        .unwrap();
        assert_eq!(track.title, "Intro Song.mp3");
        assert_eq!(track.path, PathBuf::from("/music/Intro Song.mp3"));
        assert_eq!(track.key.as_deref(), Some("8A"));
        assert_eq!(track.frames().len(), 2);
        assert!((track.duration - 0.1).abs() < 1e-9);
        assert!((track.energy() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_with_metadata() {
        let track = parse_analysis(
            Path::new("a.mp3.json"),
            r#"{"Bpm": 0, "Key": "", "Map": [], "Title": "Named", "DurationSeconds": 210.5}"#,
        )
        .unwrap();
        assert_eq!(track.title, "Named");
        assert_eq!(track.duration, 210.5);
        assert!(track.key.is_none());
        assert_eq!(track.mix_out_point(), 200.5);
    }

    #[test]
    fn test_negative_bands_clamped() {
        let track = parse_analysis(Path::new("a.mp3.json"), r#"{"Map": [[-1.0, 0.5, 0.0, 0.0]]}"#).unwrap();
        assert_eq!(track.frames()[0].bass, 0.0);
        assert_eq!(track.bpm, 0.0);
    }

    #[test]
    fn test_short_frame_rejected() {
        let err = parse_analysis(Path::new("a.mp3.json"), r#"{"Map": [[0.1, 0.2]]}"#).unwrap_err();
        assert!(matches!(err, LibraryError::InvalidAnalysis { .. }));
    }

    #[test]
    fn test_bad_json() {
        let err = parse_analysis(Path::new("a.mp3.json"), "[1, 2").unwrap_err();
        assert!(matches!(err, LibraryError::Json { .. }));
    }

    #[test]
    fn test_load_library_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("crate");
        fs::create_dir(&sub).unwrap();
        write_analysis(dir.path(), "b.mp3", r#"{"Bpm": 120, "Map": [[0.1, 0.1, 0.1, 0.0]]}"#);
        write_analysis(&sub, "a.mp3", r#"{"Bpm": 126, "Key": "9A", "Map": [[0.1, 0.1, 0.1, 0.0]]}"#);
        write_analysis(dir.path(), "broken.mp3", "{ nope");
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let tracks = load_library(&[dir.path().to_path_buf()], 2).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title, "b.mp3");
        assert_eq!(tracks[1].title, "a.mp3");
    }

    #[test]
    fn test_load_library_missing_dir() {
        let err = load_library(&[PathBuf::from("/definitely/not/here")], 1).unwrap_err();
        assert!(matches!(err, LibraryError::Io(_)));
    }
}
