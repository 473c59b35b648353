//! Entry-point search in the incoming track.
//!
//! Every beat-grid position in the incoming track is scored against the tail of
//! the outgoing track on four axes: groove pattern (per-beat spectra), average
//! spectrum continuity, energy change versus the desired change, and a soft
//! penalty for landing late in the song.

use rayon::prelude::*;

use crate::frames::{
    groove_fingerprint, sequence_distance, spectrum_distance, window_average_energy,
    window_average_spectrum,
};
use crate::track::Track;

/// Earliest entry, relative to the incoming mix-in point.
const MIN_ENTRY_AFTER_MIX_IN: f64 = 5.0;
/// Room kept after the entry window before the track ends.
const END_BUFFER: f64 = 2.0;
/// Grid step when the incoming tempo is unknown.
const FALLBACK_STEP: f64 = 0.25;
/// Fingerprint lengths tried in order.
const PATTERN_BEATS: [usize; 3] = [16, 8, 4];
/// Entries past this fraction of the track start to be penalised.
const TAIL_START: f64 = 0.6;

const W_PATTERN: f64 = 0.5;
const W_CONTINUITY: f64 = 0.3;
const W_ENERGY: f64 = 0.15;
const W_TAIL: f64 = 0.05;

/// Result of the entry search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryOffset {
    /// Seconds into the incoming track
    pub offset: f64,
    /// Fingerprint length used for pattern matching; 0 if skipped
    pub pattern_beats: usize,
}

impl EntryOffset {
    fn fallback(next: &Track) -> Self {
        Self { offset: next.mix_in_point(), pattern_beats: 0 }
    }
}

/// Tail of the outgoing track that candidates are compared against.
struct Reference {
    spectrum: [f64; 3],
    energy: f64,
    fingerprint: Vec<[f64; 3]>,
    beats: usize,
}

impl Reference {
    fn build(current: &Track, window_secs: f64) -> Self {
        let frames = current.frames();
        let end = current.mix_out_point();
        let start = (end - window_secs).max(0.0);

        // Try 16 beats, then 8, then 4, ending at the mix-out point
        let fingerprint_for = |beats: usize| {
            let beat_len = if current.bpm > 0.0 {
                60.0 / current.bpm
            } else {
                window_secs / beats as f64
            };
            let seq_start = (end - beat_len * beats as f64).max(0.0);
            groove_fingerprint(frames, current.bpm, seq_start, beats)
        };
        let mut beats = PATTERN_BEATS[0];
        let mut fingerprint = fingerprint_for(beats);
        if fingerprint.len() < PATTERN_BEATS[1] {
            beats = PATTERN_BEATS[1];
            fingerprint = fingerprint_for(beats);
        }
        if fingerprint.len() < PATTERN_BEATS[2] {
            beats = PATTERN_BEATS[2];
            fingerprint = fingerprint_for(beats);
        }

        Self {
            spectrum: window_average_spectrum(frames, start, end),
            energy: window_average_energy(frames, start, end),
            fingerprint,
            beats,
        }
    }
}

/// Find the best place to start the incoming track.
///
/// Candidates lie on the incoming beat grid within
/// `[mix_in + 5, duration - window - 2]`. Falls back to the incoming mix-in
/// point when either track has no frames or that range is empty. Ties go to
/// the earliest candidate.
pub fn find_best_entry_offset(
    current: &Track,
    next: &Track,
    window_secs: f64,
    desired_energy_delta: f64,
) -> EntryOffset {
    if !current.has_frames() || !next.has_frames() {
        return EntryOffset::fallback(next);
    }

    let reference = Reference::build(current, window_secs);

    let min_start = next.mix_in_point() + MIN_ENTRY_AFTER_MIX_IN;
    let max_start = next.duration - window_secs - END_BUFFER;
    if max_start <= min_start {
        return EntryOffset::fallback(next);
    }

    let use_pattern = reference.fingerprint.len() >= 2 && next.bpm > 0.0;
    let pattern_beats = if use_pattern { reference.beats } else { 0 };

    let candidates = candidate_grid(next.bpm, min_start, max_start);
    let best = candidates
        .par_iter()
        .map(|&t| {
            let s = score_candidate(&reference, next, t, window_secs, desired_energy_delta, use_pattern);
            (t, s)
        })
        .reduce_with(|a, b| {
            // highest score, then earliest offset
            if b.1 > a.1 || (b.1 == a.1 && b.0 < a.0) { b } else { a }
        });

    let offset = best.map_or(min_start, |(t, _)| t);
    log::trace!(
        "Entry search: {} candidates in [{:.2}, {:.2}], best {:.2}s, {} pattern beats",
        candidates.len(),
        min_start,
        max_start,
        offset,
        pattern_beats
    );

    EntryOffset { offset, pattern_beats }
}

/// Beat-aligned candidate offsets from the first grid point at or after
/// `min_start` up to `max_start`.
fn candidate_grid(bpm: f64, min_start: f64, max_start: f64) -> Vec<f64> {
    let (first, step) = if bpm > 0.0 {
        let beat_len = 60.0 / bpm;
        let mut t0 = (min_start / beat_len).ceil() * beat_len;
        if t0 < min_start {
            t0 += beat_len;
        }
        (t0, beat_len)
    } else {
        (min_start, FALLBACK_STEP)
    };

    (0..)
        .map(|k| first + k as f64 * step)
        .take_while(|&t| t <= max_start)
        .collect()
}

fn score_candidate(
    reference: &Reference,
    next: &Track,
    t: f64,
    window_secs: f64,
    desired_energy_delta: f64,
    use_pattern: bool,
) -> f64 {
    let frames = next.frames();
    let end = t + window_secs;

    let pattern = if use_pattern {
        let fingerprint = groove_fingerprint(frames, next.bpm, t, reference.beats);
        if fingerprint.len() >= 2 {
            sequence_distance(&reference.fingerprint, &fingerprint).map_or(0.0, |d| -d)
        } else {
            0.0
        }
    } else {
        0.0
    };

    let continuity = -spectrum_distance(&reference.spectrum, &window_average_spectrum(frames, t, end));

    let energy_delta = window_average_energy(frames, t, end) - reference.energy;
    let energy = -(energy_delta - desired_energy_delta).abs();

    let tail = tail_penalty(t, next.duration);

    W_PATTERN * pattern + W_CONTINUITY * continuity + W_ENERGY * energy + W_TAIL * tail
}

/// 0 up to 60% of the track, falling linearly to -1 at the end.
fn tail_penalty(t: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    let center = duration * TAIL_START;
    if t <= center {
        return 0.0;
    }
    -((t - center) / (duration - center)).clamp(0.0, 1.0)
}
