use crate::frames::SpectralFrame;

/// Beats per plateau window (2 bars of 4/4).
const PLATEAU_BEATS: usize = 8;
/// Beats of low energy required after the mix-out plateau.
const TAIL_BEATS: usize = 8;

/// Mix-in scanning ignores anything before this point.
const MIX_IN_MIN_TIME: f64 = 2.0;
const MIX_IN_THRESHOLD_RATIO: f64 = 1.4;
/// A plateau's max may not exceed its min by this factor.
const PLATEAU_STABILITY_RATIO: f64 = 1.4;

const MIX_OUT_HIGH_RATIO: f64 = 1.1;
const MIX_OUT_LOW_RATIO: f64 = 0.6;
/// Mix-out never lands closer than this to the end of the track.
const MIX_OUT_END_MARGIN: f64 = 5.0;
/// Fallback mix-out distance from the end.
const MIX_OUT_FALLBACK: f64 = 10.0;

/// Average frame energy within one beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEnergySample {
    pub index: usize,
    /// Midpoint of the beat window, seconds
    pub time: f64,
    pub energy: f64,
}

/// Aggregate frame energy into beat windows `[k·len, (k+1)·len)` starting at 0.
/// Beats without frames are dropped. Empty for unknown tempo.
pub fn beat_energies(frames: &[SpectralFrame], bpm: f64) -> Vec<BeatEnergySample> {
    if bpm <= 0.0 || frames.is_empty() {
        return Vec::new();
    }
    let beat_len = 60.0 / bpm;

    // (beat, energy sum, frame count) for consecutive frames in the same beat
    let mut acc: Vec<(usize, f64, usize)> = Vec::new();
    for frame in frames.iter().filter(|f| f.time >= 0.0) {
        let beat = (frame.time / beat_len).floor() as usize;
        match acc.last_mut() {
            Some(last) if last.0 == beat => {
                last.1 += frame.energy();
                last.2 += 1;
            }
            _ => acc.push((beat, frame.energy(), 1)),
        }
    }

    acc.into_iter()
        .map(|(index, sum, count)| BeatEnergySample {
            index,
            time: (index as f64 + 0.5) * beat_len,
            energy: sum / count as f64,
        })
        .collect()
}

/// Median by value; 0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn energies(beats: &[BeatEnergySample]) -> Vec<f64> {
    beats.iter().map(|b| b.energy).collect()
}

/// First stable high-energy plateau at or after 2 s.
///
/// Threshold is 1.4× the median energy of the first half of the track's beats.
/// Falls back to the first beat's time (0 if there are no beats).
pub fn find_mix_in(beats: &[BeatEnergySample]) -> f64 {
    let Some(first) = beats.first() else {
        return 0.0;
    };

    let half = &beats[..beats.len() / 2];
    let reference = if half.is_empty() { beats } else { half };
    let threshold = median(&energies(reference)) * MIX_IN_THRESHOLD_RATIO;

    let start = beats.partition_point(|b| b.time < MIX_IN_MIN_TIME);
    if beats.len() >= PLATEAU_BEATS {
        for i in start..=beats.len() - PLATEAU_BEATS {
            let window = &beats[i..i + PLATEAU_BEATS];
            if is_stable_plateau(window, threshold) {
                return beats[i].time;
            }
        }
    }

    first.time
}

fn is_stable_plateau(window: &[BeatEnergySample], threshold: f64) -> bool {
    if !window.iter().all(|b| b.energy > threshold) {
        return false;
    }
    let (min, max) = window.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
        (lo.min(b.energy), hi.max(b.energy))
    });
    max < min * PLATEAU_STABILITY_RATIO
}

/// Last high-energy plateau in the second half that is followed by a clear drop.
///
/// Scans backwards for 8 beats above 1.1× median immediately followed by 8 beats
/// below 0.6× median. The plateau's last beat is the mix-out, kept at least 5 s
/// before the end. Falls back to `duration - 10` (not below 0).
pub fn find_mix_out(beats: &[BeatEnergySample], duration: f64) -> f64 {
    let fallback = (duration - MIX_OUT_FALLBACK).max(0.0);
    if beats.is_empty() {
        return fallback;
    }

    let half = &beats[beats.len() / 2..];
    let region = if half.is_empty() { beats } else { half };
    let med = median(&energies(region));
    let high = med * MIX_OUT_HIGH_RATIO;
    let low = med * MIX_OUT_LOW_RATIO;

    let span = PLATEAU_BEATS + TAIL_BEATS;
    if region.len() < span {
        return fallback;
    }

    for start in (0..=region.len() - span).rev() {
        let plateau = &region[start..start + PLATEAU_BEATS];
        let tail = &region[start + PLATEAU_BEATS..start + span];
        if plateau.iter().all(|b| b.energy > high) && tail.iter().all(|b| b.energy < low) {
            let point = plateau[PLATEAU_BEATS - 1].time;
            return point.min(duration - MIX_OUT_END_MARGIN).max(0.0);
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FRAME_INTERVAL_SECS;
    use crate::track::{Track, TrackAnalysis};

    /// Frames every 0.1s whose summed energy is `level(t)`.
    fn frames_with(duration: f64, level: impl Fn(f64) -> f64) -> Vec<SpectralFrame> {
        let n = (duration / FRAME_INTERVAL_SECS) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 * FRAME_INTERVAL_SECS;
                SpectralFrame::new(level(t), 0.0, 0.0, t)
            })
            .collect()
    }

    #[test]
    fn test_beat_aggregation() {
        // 120 BPM → 0.5s beats, 5 frames per beat
        let frames = frames_with(2.0, |t| if t < 1.0 { 1.0 } else { 3.0 });
        let beats = beat_energies(&frames, 120.0);
        assert_eq!(beats.len(), 4);
        assert_eq!(beats[0].index, 0);
        assert!((beats[0].time - 0.25).abs() < 1e-9);
        assert!((beats[0].energy - 1.0).abs() < 1e-9);
        assert!((beats[3].energy - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_beat_aggregation_skips_gaps() {
        let frames = vec![
            SpectralFrame::new(1.0, 0.0, 0.0, 0.1),
            SpectralFrame::new(2.0, 0.0, 0.0, 1.6),
        ];
        let beats = beat_energies(&frames, 120.0);
        assert_eq!(beats.len(), 2);
        assert_eq!(beats[1].index, 3);
        assert!((beats[1].time - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_beat_aggregation_degenerate() {
        assert!(beat_energies(&[], 120.0).is_empty());
        let frames = frames_with(2.0, |_| 1.0);
        assert!(beat_energies(&frames, 0.0).is_empty());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        // robust to a spike
        assert_eq!(median(&[1.0, 1.0, 100.0]), 1.0);
    }

    #[test]
    fn test_mix_in_flat_falls_back_to_first_beat() {
        let frames = frames_with(60.0, |_| 1.0);
        let beats = beat_energies(&frames, 120.0);
        assert!((find_mix_in(&beats) - beats[0].time).abs() < 1e-9);
    }

    #[test]
    fn test_mix_in_finds_groove() {
        // quieter intro, full groove from 40s
        let frames = frames_with(120.0, |t| if t < 40.0 { 0.4 } else { 1.0 });
        let beats = beat_energies(&frames, 120.0);
        let mix_in = find_mix_in(&beats);
        assert!((mix_in - 40.25).abs() < 1e-9, "mix_in = {}", mix_in);
    }

    #[test]
    fn test_mix_in_skips_ramp() {
        // 4s ramp into the groove; the ramp itself is not a stable plateau
        let frames = frames_with(120.0, |t| {
            if t < 40.0 {
                0.3
            } else if t < 44.0 {
                0.3 + (t - 40.0) / 4.0 * 0.7
            } else {
                1.0
            }
        });
        let beats = beat_energies(&frames, 120.0);
        let mix_in = find_mix_in(&beats);
        assert!(mix_in > 41.0 && mix_in <= 44.25, "mix_in = {}", mix_in);
    }

    #[test]
    fn test_mix_in_empty() {
        assert_eq!(find_mix_in(&[]), 0.0);
    }

    #[test]
    fn test_mix_out_finds_breakdown() {
        // full energy until 100s, breakdown after, track ends at 120s
        let frames = frames_with(120.0, |t| if t < 100.0 { 1.0 } else { 0.1 });
        let beats = beat_energies(&frames, 120.0);
        let mix_out = find_mix_out(&beats, 120.0);
        // median of the second half: 1.0 (80 beats high, 40 low) → plateau must exceed 1.1
        // which never happens, so this falls back
        assert!((mix_out - 110.0).abs() < 1e-9, "mix_out = {}", mix_out);

        // a lifted final chorus clears the 1.1× bar
        let frames = frames_with(120.0, |t| {
            if t < 60.0 {
                0.5
            } else if t < 90.0 {
                0.8
            } else if t < 100.0 {
                1.2
            } else {
                0.1
            }
        });
        let beats = beat_energies(&frames, 120.0);
        let mix_out = find_mix_out(&beats, 120.0);
        assert!((mix_out - 99.75).abs() < 1e-9, "mix_out = {}", mix_out);
    }

    #[test]
    fn test_mix_out_clamped_before_end() {
        let frames = frames_with(40.0, |t| {
            if t < 30.0 {
                0.8
            } else if t < 34.0 {
                1.2
            } else {
                0.0
            }
        });
        let beats = beat_energies(&frames, 120.0);
        // plateau ends at 33.75s but the track is only 36s long
        let mix_out = find_mix_out(&beats, 36.0);
        assert!((mix_out - 31.0).abs() < 1e-9, "mix_out = {}", mix_out);
        assert!((find_mix_out(&beats, 40.0) - 33.75).abs() < 1e-9);
    }

    #[test]
    fn test_mix_out_fallbacks() {
        assert_eq!(find_mix_out(&[], 100.0), 90.0);
        assert_eq!(find_mix_out(&[], 4.0), 0.0);
    }

    #[test]
    fn test_mix_points_ordered_for_synthetic_traces() {
        let shapes: Vec<Box<dyn Fn(f64) -> f64>> = vec![
            Box::new(|_| 0.5),
            Box::new(|t| (t * 0.7).sin().abs()),
            Box::new(|t| if (t as i64) % 20 < 10 { 1.0 } else { 0.05 }),
            Box::new(|t| t / 200.0),
        ];
        for duration in [3.0, 30.0, 180.0] {
            for shape in &shapes {
                for bpm in [0.0, 90.0, 128.0, 174.0] {
                    let frames = frames_with(duration, |t| shape(t));
                    let beats = beat_energies(&frames, bpm);
                    let mix_out = find_mix_out(&beats, duration);
                    assert!(mix_out <= duration);
                    assert!(find_mix_in(&beats).is_finite());

                    let track = Track::from_analysis(TrackAnalysis {
                        bpm,
                        duration,
                        frames,
                        ..Default::default()
                    });
                    assert!(track.mix_in_point() <= track.mix_out_point());
                    assert!(track.mix_out_point() <= track.duration);
                }
            }
        }
    }
}
