//! Next-track selection from a candidate pool.

use crate::compat::compatibility;
use crate::track::Track;

/// What the set should do next.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext {
    /// Desired energy of the next track (0-1). `None` keeps the current level.
    pub target_energy: Option<f64>,
}

impl SelectionContext {
    pub fn with_target(target_energy: f64) -> Self {
        Self { target_energy: Some(target_energy) }
    }
}

/// Weighted fitness of `candidate` following `current`.
///
/// 50% compatibility, 30% energy match against the target, 20% soft tempo
/// match (zero at 30 BPM apart). Negative infinity if either track is missing.
pub fn score(current: Option<&Track>, candidate: Option<&Track>, ctx: Option<&SelectionContext>) -> f64 {
    let (Some(current), Some(candidate)) = (current, candidate) else {
        return f64::NEG_INFINITY;
    };

    let compat = compatibility(current, candidate);

    let tempo = (1.0 - (current.bpm - candidate.bpm).abs() / 30.0).max(0.0);

    let desired = ctx
        .and_then(|c| c.target_energy)
        .unwrap_or_else(|| current.energy())
        .clamp(0.0, 1.0);
    let energy = 1.0 - (candidate.energy().clamp(0.0, 1.0) - desired).abs();

    compat * 0.5 + energy * 0.3 + tempo * 0.2
}

/// Highest-scoring pool member; the earliest one wins ties.
///
/// The pool is left untouched; removing the pick is the caller's job.
pub fn choose_next<'a>(
    pool: &'a [Track],
    current: Option<&Track>,
    ctx: Option<&SelectionContext>,
) -> Option<&'a Track> {
    let current = current?;
    let mut best: Option<(&Track, f64)> = None;
    for candidate in pool {
        let s = score(Some(current), Some(candidate), ctx);
        if best.is_none_or(|(_, top)| s > top) {
            best = Some((candidate, s));
        }
    }
    best.map(|(track, s)| {
        log::debug!("Selected \"{}\" (score {:.3})", track.title, s);
        track
    })
}

/// Full ranking of the pool, best first (stable for ties).
pub fn rank<'a>(
    pool: &'a [Track],
    current: &Track,
    ctx: Option<&SelectionContext>,
) -> Vec<(&'a Track, f64)> {
    let mut ranked: Vec<(&Track, f64)> = pool
        .iter()
        .map(|t| (t, score(Some(current), Some(t), ctx)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}
