use super::TransitionWaypoint;

/// Outgoing high-pass sweep, Hz.
const OUT_CUTOFF_START: f64 = 200.0;
const OUT_CUTOFF_RANGE: f64 = 4000.0;
/// Incoming low-pass sweep, Hz.
const IN_CUTOFF_START: f64 = 8000.0;
const IN_CUTOFF_RANGE: f64 = 6000.0;

/// Upper bound on curve resolution (10 minutes at 10 points per second).
pub const MAX_STEPS: usize = 6000;

/// Shape parameters for one transition curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveShape {
    pub duration: f64,
    pub harmonic_merge: bool,
    /// Target minus current energy
    pub energy_delta: f64,
    /// Outgoing BPM / incoming BPM, 1 when either is unknown
    pub bpm_ratio: f64,
}

/// Sample the transition at ~10 points per second (at least 4 steps, at most `MAX_STEPS`).
pub fn synthesize(shape: &CurveShape) -> Vec<TransitionWaypoint> {
    let steps = ((shape.duration * 10.0).round().min(MAX_STEPS as f64) as usize).max(4);
    let step_len = shape.duration / steps as f64;
    // rising energy eases in faster
    let power = if shape.energy_delta >= 0.0 { 0.8 } else { 1.2 };

    (0..=steps)
        .map(|i| {
            let t = i as f64 * step_len;
            let p = if shape.duration > 0.0 { (t / shape.duration).min(1.0) } else { 0.0 };

            let (volume_out, volume_in) = if shape.harmonic_merge {
                merge_volumes(p)
            } else {
                ((1.0 - p).powf(power), p.powf(power))
            };

            TransitionWaypoint {
                time: t,
                volume_out,
                volume_in,
                cutoff_out: OUT_CUTOFF_START + p * OUT_CUTOFF_RANGE,
                cutoff_in: IN_CUTOFF_START - p * IN_CUTOFF_RANGE,
                tempo_in: 100.0 + p * (shape.bpm_ratio * 100.0 - 100.0),
            }
        })
        .collect()
}

/// Three-phase overlap: bring B up under A, hold both high, then drop A.
fn merge_volumes(p: f64) -> (f64, f64) {
    if p < 0.3 {
        (1.0, (p / 0.3).powf(0.8))
    } else if p < 0.7 {
        let mid = (p - 0.3) / 0.4;
        (1.0 - 0.2 * mid, 0.8 + 0.2 * mid)
    } else {
        let end = (p - 0.7) / 0.3;
        (0.8 * (1.0 - end), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(duration: f64, harmonic_merge: bool, energy_delta: f64) -> CurveShape {
        CurveShape { duration, harmonic_merge, energy_delta, bpm_ratio: 1.0 }
    }

    #[test]
    fn test_step_count() {
        assert_eq!(synthesize(&shape(8.0, false, 0.0)).len(), 81);
        assert_eq!(synthesize(&shape(0.2, false, 0.0)).len(), 5);
        // 2.46s → 25 steps
        assert_eq!(synthesize(&shape(2.46, false, 0.0)).len(), 26);
    }

    #[test]
    fn test_step_count_bounded() {
        let pts = synthesize(&shape(1e300, false, 0.0));
        assert_eq!(pts.len(), MAX_STEPS + 1);
        assert_eq!(pts[0].time, 0.0);
        assert!((pts.last().unwrap().volume_in - 1.0).abs() < 1e-9);
        // an unbounded length never reaches the allocator
        assert_eq!(synthesize(&shape(f64::INFINITY, false, 0.0)).len(), MAX_STEPS + 1);
    }

    #[test]
    fn test_crossfade_endpoints() {
        let pts = synthesize(&shape(8.0, false, 0.2));
        let first = pts.first().unwrap();
        let last = pts.last().unwrap();
        assert_eq!(first.time, 0.0);
        assert!((last.time - 8.0).abs() < 1e-9);
        assert!((first.volume_out - 1.0).abs() < 1e-9);
        assert!(first.volume_in.abs() < 1e-9);
        assert!(last.volume_out.abs() < 1e-9);
        assert!((last.volume_in - 1.0).abs() < 1e-9);
        assert!((first.cutoff_out - 200.0).abs() < 1e-9);
        assert!((last.cutoff_out - 4200.0).abs() < 1e-6);
        assert!((first.cutoff_in - 8000.0).abs() < 1e-9);
        assert!((last.cutoff_in - 2000.0).abs() < 1e-6);
        assert!(pts.windows(2).all(|w| w[1].time >= w[0].time));
    }

    #[test]
    fn test_curve_power_follows_energy() {
        // halfway point of a 4s fade (step 20 of 40)
        let rising = synthesize(&shape(4.0, false, 0.1))[20];
        let falling = synthesize(&shape(4.0, false, -0.1))[20];
        assert!((rising.volume_in - 0.5_f64.powf(0.8)).abs() < 1e-9);
        assert!((falling.volume_in - 0.5_f64.powf(1.2)).abs() < 1e-9);
        assert!(rising.volume_in > falling.volume_in);
    }

    #[test]
    fn test_merge_phases() {
        assert_eq!(merge_volumes(0.0), (1.0, 0.0));
        let (out, inn) = merge_volumes(0.5);
        assert!((out - 0.9).abs() < 1e-9);
        assert!((inn - 0.9).abs() < 1e-9);
        let (out, inn) = merge_volumes(1.0);
        assert!(out.abs() < 1e-9);
        assert_eq!(inn, 1.0);
        // outgoing volume is continuous at phase boundaries
        let (o1, _) = merge_volumes(0.3 - 1e-9);
        let (o2, _) = merge_volumes(0.3);
        assert!((o1 - o2).abs() < 1e-6);
        let (o1, _) = merge_volumes(0.7 - 1e-9);
        let (o2, _) = merge_volumes(0.7);
        assert!((o1 - o2).abs() < 1e-6);
    }

    #[test]
    fn test_tempo_glide() {
        let mut s = shape(4.0, false, 0.0);
        s.bpm_ratio = 120.0 / 125.0;
        let pts = synthesize(&s);
        assert!((pts[0].tempo_in - 100.0).abs() < 1e-9);
        assert!((pts.last().unwrap().tempo_in - 96.0).abs() < 1e-6);
    }
}
