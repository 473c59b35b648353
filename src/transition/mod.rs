//! Transition planning: entry point, duration, and the automation curve that
//! blends the outgoing track into the incoming one.

pub mod curve;
pub mod entry;

use serde::Serialize;

use crate::compat::intuitive_fade_ms;
use crate::track::Track;
use curve::CurveShape;
use entry::find_best_entry_offset;

/// Inputs for planning one transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext<'a> {
    pub current: Option<&'a Track>,
    pub next: Option<&'a Track>,
    pub current_energy: f64,
    pub target_energy: f64,
    /// Carried through for strategies that use it; the heuristic planner does not.
    pub intensity: f64,
    /// Preferred transition length in seconds; <= 0 means no preference
    pub preferred_duration: f64,
}

impl<'a> TransitionContext<'a> {
    /// Context for `current → next` with energies taken from the tracks.
    pub fn between(current: &'a Track, next: &'a Track) -> Self {
        Self {
            current: Some(current),
            next: Some(next),
            current_energy: current.energy(),
            target_energy: next.energy(),
            ..Default::default()
        }
    }

    pub fn with_preferred_duration(mut self, secs: f64) -> Self {
        self.preferred_duration = secs;
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }
}

/// One automation point, relative to the start of the transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionWaypoint {
    /// Seconds since transition start
    pub time: f64,
    pub volume_out: f64,
    pub volume_in: f64,
    /// Outgoing high-pass cutoff, Hz
    pub cutoff_out: f64,
    /// Incoming low-pass cutoff, Hz
    pub cutoff_in: f64,
    /// Incoming playback tempo, percent (100 = unchanged)
    pub tempo_in: f64,
}

/// Declarative transition plan for the playback applier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionPlan {
    /// Seconds
    pub duration: f64,
    /// Where the outgoing track should be when the transition starts (informational)
    pub start_offset_out: f64,
    /// Where the incoming track must be seeked to before playing
    pub start_offset_in: f64,
    pub waypoints: Vec<TransitionWaypoint>,
}

/// Intermediate values of one planning call, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlanDiagnostics {
    pub base_fade_secs: f64,
    pub preferred_secs: f64,
    pub final_duration_secs: f64,
    pub harmonic_merge: bool,
    pub start_offset_out: f64,
    pub start_offset_in: f64,
    /// Entry position as a fraction of the incoming track
    pub entry_position: f64,
    pub window_secs: f64,
    pub desired_energy_delta: f64,
    /// Groove fingerprint length used for entry matching; 0 if skipped
    pub pattern_beats: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedTransition {
    pub plan: TransitionPlan,
    pub diagnostics: PlanDiagnostics,
}

/// A transition planning strategy.
pub trait TransitionPlanner: Send + Sync {
    /// `None` when either track is missing.
    fn plan(&self, ctx: &TransitionContext<'_>) -> Option<PlannedTransition>;
}

/// Multiplier for harmonically related tracks.
const MERGE_STRETCH: f64 = 1.5;
/// Minimum length of the comparison window, seconds.
const MIN_WINDOW_SECS: f64 = 2.0;

/// Groove-matching planner with harmonic-merge curves.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPlanner;

impl TransitionPlanner for HeuristicPlanner {
    fn plan(&self, ctx: &TransitionContext<'_>) -> Option<PlannedTransition> {
        let current = ctx.current?;
        let next = ctx.next?;

        let base_fade = f64::from(intuitive_fade_ms(current, next)) / 1000.0;
        let desired = if ctx.preferred_duration.is_finite() && ctx.preferred_duration > 0.0 {
            ctx.preferred_duration
        } else {
            base_fade
        };
        let mut duration = 0.5 * base_fade + 0.5 * desired;

        let harmonic_merge = current.is_harmonic_with(next);
        if harmonic_merge {
            duration *= MERGE_STRETCH;
        }

        let start_offset_out = (current.mix_out_point() - duration * 0.8).max(0.0);

        let desired_energy_delta = ctx.target_energy - ctx.current_energy;
        let window_secs = (duration * 0.8).max(MIN_WINDOW_SECS);
        let entry = find_best_entry_offset(current, next, window_secs, desired_energy_delta);
        let start_offset_in = entry.offset;

        let entry_position = if next.duration > 0.0 { start_offset_in / next.duration } else { 0.0 };
        duration *= entry_stretch(entry_position, harmonic_merge);

        let bpm_ratio = if current.bpm > 0.0 && next.bpm > 0.0 { current.bpm / next.bpm } else { 1.0 };
        let waypoints = curve::synthesize(&CurveShape {
            duration,
            harmonic_merge,
            energy_delta: desired_energy_delta,
            bpm_ratio,
        });

        let diagnostics = PlanDiagnostics {
            base_fade_secs: base_fade,
            preferred_secs: desired,
            final_duration_secs: duration,
            harmonic_merge,
            start_offset_out,
            start_offset_in,
            entry_position,
            window_secs,
            desired_energy_delta,
            pattern_beats: entry.pattern_beats,
        };
        log::debug!(
            "Planned \"{}\" -> \"{}\": {:.2}s (base {:.2}s, merge {}), in at {:.2}s ({:.0}%), {} pattern beats",
            current.title,
            next.title,
            duration,
            base_fade,
            harmonic_merge,
            start_offset_in,
            entry_position * 100.0,
            entry.pattern_beats
        );

        Some(PlannedTransition {
            plan: TransitionPlan { duration, start_offset_out, start_offset_in, waypoints },
            diagnostics,
        })
    }
}

/// Longer fades when entering early in the incoming track, shorter when late.
fn entry_stretch(entry_position: f64, harmonic_merge: bool) -> f64 {
    let (early, late) = if harmonic_merge { (1.1, 0.9) } else { (1.2, 0.8) };
    if entry_position < 0.3 {
        early
    } else if entry_position > 0.7 {
        late
    } else {
        1.0
    }
}
