use std::path::PathBuf;

use crate::frames::SpectralFrame;
use crate::key::CamelotKey;
use crate::mixpoints;

/// Raw output of the analysis producer for one audio file.
#[derive(Debug, Clone, Default)]
pub struct TrackAnalysis {
    pub title: String,
    pub path: PathBuf,
    /// Beats per minute; 0 when undetectable
    pub bpm: f64,
    /// Seconds
    pub duration: f64,
    /// Camelot notation, e.g. "8A"
    pub key: Option<String>,
    pub frames: Vec<SpectralFrame>,
}

/// An analyzed track. Energy and mix points are derived once at construction
/// and never change afterwards.
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    pub path: PathBuf,
    pub bpm: f64,
    pub duration: f64,
    pub key: Option<String>,
    frames: Vec<SpectralFrame>,
    energy: f64,
    mix_in: f64,
    mix_out: f64,
}

impl Track {
    /// Build a track and detect its mix points from the frame trace.
    pub fn from_analysis(analysis: TrackAnalysis) -> Self {
        let beats = mixpoints::beat_energies(&analysis.frames, analysis.bpm);
        let mix_in = mixpoints::find_mix_in(&beats);
        let mix_out = mixpoints::find_mix_out(&beats, analysis.duration);
        Self::from_analysis_with_mix_points(analysis, mix_in, mix_out)
    }

    /// Build a track from mix points computed elsewhere.
    ///
    /// Points are clamped so that `0 <= mix_in <= mix_out <= duration`.
    pub fn from_analysis_with_mix_points(analysis: TrackAnalysis, mix_in: f64, mix_out: f64) -> Self {
        let TrackAnalysis { title, path, bpm, duration, key, frames } = analysis;

        let duration = duration.max(0.0);
        let mix_out = mix_out.clamp(0.0, duration);
        let mix_in = mix_in.clamp(0.0, mix_out);
        let key = key.and_then(normalize_key);
        let energy = mean_energy(&frames);

        Self { title, path, bpm, duration, key, frames, energy, mix_in, mix_out }
    }

    pub fn frames(&self) -> &[SpectralFrame] {
        &self.frames
    }

    /// Mean summed band energy, clamped to [0, 1].
    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn mix_in_point(&self) -> f64 {
        self.mix_in
    }

    pub fn mix_out_point(&self) -> f64 {
        self.mix_out
    }

    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Both tracks carry a key and the keys are wheel neighbors.
    pub fn is_harmonic_with(&self, other: &Track) -> bool {
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => crate::key::is_harmonic_neighbor(a, b),
            _ => false,
        }
    }
}

/// Canonical spelling for parseable keys ("8a" -> "8A"); others are kept trimmed.
fn normalize_key(key: String) -> Option<String> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .parse::<CamelotKey>()
            .map_or_else(|_| trimmed.to_string(), |k| k.to_string()),
    )
}

fn mean_energy(frames: &[SpectralFrame]) -> f64 {
    if frames.is_empty() {
        return 0.0;
    }
    let mean = frames.iter().map(SpectralFrame::energy).sum::<f64>() / frames.len() as f64;
    mean.clamp(0.0, 1.0)
}
