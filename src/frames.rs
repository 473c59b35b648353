//! Per-frame spectral energy trace and the window/beat aggregations built on it.
//!
//! Frames are assumed sorted by timestamp; window lookups use binary search
//! instead of scanning the whole trace.

use serde::{Deserialize, Serialize};

/// Sampling cadence of the analysis producer.
pub const FRAME_INTERVAL_SECS: f64 = 0.1;
/// Frames per second at that cadence. Frame index = `floor(time * FRAMES_PER_SECOND)`.
pub const FRAMES_PER_SECOND: f64 = 10.0;

/// One snapshot of 3-band energy at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectralFrame {
    pub bass: f64,
    pub mid: f64,
    pub high: f64,
    /// Seconds from track start
    pub time: f64,
}

impl SpectralFrame {
    pub fn new(bass: f64, mid: f64, high: f64, time: f64) -> Self {
        Self { bass, mid, high, time }
    }

    /// Summed band energy (bass + mid + high).
    pub fn energy(&self) -> f64 {
        self.bass + self.mid + self.high
    }

    pub fn bands(&self) -> [f64; 3] {
        [self.bass, self.mid, self.high]
    }
}

/// Frames whose timestamp lies in the closed interval `[start, end]`.
pub fn window(frames: &[SpectralFrame], start: f64, end: f64) -> &[SpectralFrame] {
    let lo = frames.partition_point(|f| f.time < start);
    let hi = frames.partition_point(|f| f.time <= end);
    if lo >= hi { &[] } else { &frames[lo..hi] }
}

/// Average (bass, mid, high) over `[start, end]`; zeros when the window is empty.
pub fn window_average_spectrum(frames: &[SpectralFrame], start: f64, end: f64) -> [f64; 3] {
    average_bands(window(frames, start, end))
}

/// Average summed energy over `[start, end]`; 0 when the window is empty.
pub fn window_average_energy(frames: &[SpectralFrame], start: f64, end: f64) -> f64 {
    let w = window(frames, start, end);
    if w.is_empty() {
        return 0.0;
    }
    w.iter().map(SpectralFrame::energy).sum::<f64>() / w.len() as f64
}

fn average_bands(frames: &[SpectralFrame]) -> [f64; 3] {
    if frames.is_empty() {
        return [0.0; 3];
    }
    let n = frames.len() as f64;
    let mut acc = [0.0_f64; 3];
    for f in frames {
        acc[0] += f.bass;
        acc[1] += f.mid;
        acc[2] += f.high;
    }
    [acc[0] / n, acc[1] / n, acc[2] / n]
}

/// Groove fingerprint: per-beat average spectra for up to `beats` consecutive
/// beats starting at `start`. Stops at the first beat with no frames.
pub fn groove_fingerprint(
    frames: &[SpectralFrame],
    bpm: f64,
    start: f64,
    beats: usize,
) -> Vec<[f64; 3]> {
    if frames.is_empty() || bpm <= 0.0 || beats == 0 {
        return Vec::new();
    }
    let beat_len = 60.0 / bpm;

    let mut seq = Vec::with_capacity(beats);
    for b in 0..beats {
        let t_start = start + b as f64 * beat_len;
        let w = window(frames, t_start, t_start + beat_len);
        if w.is_empty() {
            break;
        }
        seq.push(average_bands(w));
    }
    seq
}

/// Euclidean distance between two band triples.
pub fn spectrum_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    (d0 * d0 + d1 * d1 + d2 * d2).sqrt()
}

/// RMS of per-beat Euclidean distances over the shorter of the two sequences.
/// Returns `None` if either sequence is empty.
pub fn sequence_distance(a: &[[f64; 3]], b: &[[f64; 3]]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n == 0 {
        return None;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = spectrum_distance(x, y);
            d * d
        })
        .sum();
    Some((sum / n as f64).sqrt())
}
