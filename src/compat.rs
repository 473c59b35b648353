//! Pairwise track compatibility and fade sizing.

use crate::frames::FRAMES_PER_SECOND;
use crate::key::is_harmonic_neighbor;
use crate::track::Track;

/// Frames skipped after the mix-in point before looking for the intro's end (~1s).
const INTRO_SCAN_SKIP: usize = 10;
/// Frames scanned past the mix-in point (~30s).
const INTRO_SCAN_FRAMES: usize = 300;
const INTRO_DEFAULT_SECS: f64 = 8.0;

/// Harmonic + tempo compatibility in [0, 1].
///
/// Tempo contributes 40% and reaches zero at a 15 BPM difference. Harmony
/// contributes 60%: same key 1.0, wheel neighbor 0.8, clash 0.1, unknown 0.5.
pub fn compatibility(a: &Track, b: &Track) -> f64 {
    let tempo = (1.0 - (a.bpm - b.bpm).abs() / 15.0).max(0.0);
    let harmonic = harmonic_score(a.key.as_deref(), b.key.as_deref());
    (harmonic * 0.6 + tempo * 0.4).clamp(0.0, 1.0)
}

fn harmonic_score(a: Option<&str>, b: Option<&str>) -> f64 {
    match (a, b) {
        (Some(ka), Some(kb)) if ka == kb => 1.0,
        (Some(ka), Some(kb)) if is_harmonic_neighbor(ka, kb) => 0.8,
        (Some(_), Some(_)) => 0.1,
        _ => 0.5,
    }
}

/// How long the intro lasts past the mix-in point, in seconds.
///
/// Looks for the first frame (1-30s after mix-in) that is 1.5× louder than the
/// frame at mix-in, or above 0.4 absolute. Frame indices assume the producer's
/// fixed 0.1s cadence.
pub fn intro_window(track: &Track) -> f64 {
    let frames = track.frames();
    if frames.is_empty() {
        return 0.0;
    }
    let start = (track.mix_in_point() * FRAMES_PER_SECOND).floor() as usize;
    let Some(initial) = frames.get(start).map(|f| f.energy()) else {
        return INTRO_DEFAULT_SECS;
    };

    let end = (start + INTRO_SCAN_FRAMES).min(frames.len());
    frames
        .get(start + INTRO_SCAN_SKIP..end)
        .and_then(|scan| {
            scan.iter()
                .find(|f| f.energy() > initial * 1.5 || f.energy() > 0.4)
        })
        .map(|f| f.time - track.mix_in_point())
        .unwrap_or(INTRO_DEFAULT_SECS)
}

/// Crossfade length in milliseconds based on the incoming intro and key relation.
pub fn intuitive_fade_ms(current: &Track, next: &Track) -> u32 {
    let intro = intro_window(next);
    let mut secs: f64 = 8.0;
    if intro > 12.0 {
        secs = 10.0;
    }
    if intro < 5.0 {
        secs = 4.0;
    }

    if current.key.is_some() && next.key.is_some() {
        if current.is_harmonic_with(next) {
            secs *= 1.4;
        } else {
            secs *= 0.6;
        }
    } else {
        secs = secs.clamp(4.0, 8.0);
    }

    (secs * 1000.0).round() as u32
}
