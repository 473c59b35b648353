//! Set bookkeeping: which track is playing, which is queued, and what is left.

use serde::Serialize;

use crate::config::TransitionConfig;
use crate::selector::{SelectionContext, choose_next};
use crate::track::Track;
use crate::transition::{PlannedTransition, TransitionContext, TransitionPlanner};

/// One planned hand-over in a simulated set.
#[derive(Debug, Clone, Serialize)]
pub struct SetStep {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub transition: PlannedTransition,
}

/// Drives track order over a pool. The session owns the pool and removes
/// tracks from it only when they start playing.
pub struct DjSession<P: TransitionPlanner> {
    pool: Vec<Track>,
    planner: P,
    config: TransitionConfig,
    current: Option<Track>,
    next: Option<usize>,
}

impl<P: TransitionPlanner> DjSession<P> {
    pub fn new(pool: Vec<Track>, planner: P, config: TransitionConfig) -> Self {
        Self { pool, planner, config, current: None, next: None }
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&Track> {
        self.next.and_then(|i| self.pool.get(i))
    }

    pub fn remaining(&self) -> &[Track] {
        &self.pool
    }

    /// Open the set with the slowest track. `false` if the pool is empty.
    pub fn start(&mut self) -> bool {
        let slowest = self
            .pool
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.bpm.partial_cmp(&b.1.bpm).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i);
        let Some(i) = slowest else {
            return false;
        };
        let track = self.pool.remove(i);
        log::info!("Opening with \"{}\" ({:.1} BPM)", track.title, track.bpm);
        self.current = Some(track);
        self.next = None;
        true
    }

    /// Queue the best follow-up for the current track, aiming to hold its energy.
    pub fn select_next(&mut self) -> Option<&Track> {
        self.next = None;
        let current = self.current.as_ref()?;
        let ctx = SelectionContext::with_target(current.energy());
        let chosen = choose_next(&self.pool, Some(current), Some(&ctx))?;
        // choose_next returns a reference into the pool; recover its index
        self.next = self.pool.iter().position(|t| std::ptr::eq(t, chosen));
        self.next()
    }

    /// Plan the hand-over from the current track to the queued one.
    pub fn prepare_transition(&self) -> Option<PlannedTransition> {
        let current = self.current()?;
        let next = self.next()?;
        let ctx = TransitionContext::between(current, next)
            .with_intensity(self.config.intensity)
            .with_preferred_duration(self.config.preferred_duration_secs);
        self.planner.plan(&ctx)
    }

    /// The queued track starts playing: it becomes current and leaves the pool.
    pub fn advance(&mut self) {
        self.current = self.next.take().map(|i| self.pool.remove(i));
        if let Some(track) = &self.current {
            log::info!("Now playing \"{}\" ({} left in pool)", track.title, self.pool.len());
        }
    }

    /// Seek target a few seconds before the current track's mix-out.
    pub fn pre_mix_out_position(&self, seconds_before: f64) -> Option<f64> {
        self.current().map(|t| (t.mix_out_point() - seconds_before).max(0.0))
    }

    /// Play through the pool without audio, collecting every planned transition.
    /// Stops after `max_tracks` tracks when given.
    pub fn run_set(&mut self, max_tracks: Option<usize>) -> Vec<SetStep> {
        let mut steps = Vec::new();
        if self.current.is_none() && !self.start() {
            return steps;
        }
        let mut played = 1;

        while max_tracks.is_none_or(|max| played < max) {
            if self.select_next().is_none() {
                break;
            }
            let (Some(current), Some(next)) = (self.current(), self.next()) else {
                break;
            };
            let (from, to) = (current.title.clone(), next.title.clone());
            if let Some(transition) = self.prepare_transition() {
                steps.push(SetStep { from, to, transition });
            } else {
                log::warn!("No transition plan for \"{}\" -> \"{}\"", from, to);
            }
            self.advance();
            played += 1;
        }

        steps
    }
}
