use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::core::input::Lane;
use crate::error::EngineError;
use crate::game::chart::Chart;
use crate::game::judgment::{self, JudgeParams, JudgmentPolicy, Outcome};
use crate::game::lanes::LaneGeometry;
use crate::game::note::{ActiveNote, NoteDescriptor, NoteId, NoteKind, NoteLifetimes, NoteState};
use crate::game::scores::HoldResult;
use crate::game::timing_windows::TierTable;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScrollSettings {
    /// Seconds a note is on screen before its hit time.
    pub lead_time: f32,
    /// Field units per second at a multiplier of 1.
    pub scroll_speed: f32,
    pub speed_multiplier: f32,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            lead_time: 3.0,
            scroll_speed: 300.0,
            speed_multiplier: 1.0,
        }
    }
}

impl ScrollSettings {
    #[inline(always)]
    pub fn max_distance(&self, tiers: &TierTable) -> f32 {
        judgment::max_distance(
            self.scroll_speed,
            self.speed_multiplier,
            tiers.ok_threshold(),
            self.lead_time,
        )
    }
}

/// What one frame did. Nothing here is fatal; errors are collected for the
/// caller to log or display.
#[derive(Debug, Default)]
pub struct StepReport {
    pub track_time: f32,
    /// Scheduling was frozen this frame (clock went backwards or stopped).
    pub frozen: bool,
    pub spawned: Vec<NoteId>,
    pub became_ready: Vec<NoteId>,
    /// Notes that scrolled past their end point unhit this frame.
    pub misses: Vec<NoteId>,
    /// Outcomes of lane presses processed during this frame.
    pub judgments: Vec<Outcome>,
    pub hold_results: Vec<(Lane, HoldResult)>,
    pub destroyed: usize,
    pub errors: Vec<EngineError>,
}

/// Owns the chart cursor and the active set. The active set is the single
/// source of truth for which notes exist: a note is pushed on spawn and
/// removed from the vector once it reaches `Destroyed`.
#[derive(Debug)]
pub struct Scheduler {
    chart: Arc<Chart>,
    geometry: LaneGeometry,
    settings: ScrollSettings,
    lifetimes: NoteLifetimes,
    cursor: usize,
    active: Vec<ActiveNote>,
    // Highest track time scrolling has been evaluated at.
    last_time: Option<f32>,
    in_anomaly: bool,
    // Track time the previous run had reached. Set after a reset until the
    // transport reports a time below it.
    awaiting_rewind: Option<f32>,
}

impl Scheduler {
    pub fn new(
        chart: Arc<Chart>,
        geometry: LaneGeometry,
        settings: ScrollSettings,
        lifetimes: NoteLifetimes,
    ) -> Self {
        Self {
            chart,
            geometry,
            settings,
            lifetimes,
            cursor: 0,
            active: Vec::new(),
            last_time: None,
            in_anomaly: false,
            awaiting_rewind: None,
        }
    }

    /// A fresh scheduler for the same chart that stays silently frozen until
    /// the transport has rewound below the time this one reached. A stale
    /// clock read before the restart lands can then neither spawn nor miss.
    pub fn restarted(&self) -> Self {
        let mut fresh = Self::new(
            Arc::clone(&self.chart),
            self.geometry,
            self.settings,
            self.lifetimes,
        );
        fresh.awaiting_rewind = self.last_time.filter(|&t| t > 0.0);
        fresh
    }

    /// Back to the start of the chart in one assignment, so the active set and
    /// the cursor can never be observed out of step.
    pub fn reset(&mut self) {
        let dropped = self.active.len();
        *self = self.restarted();
        debug!("Scheduler reset, dropped {dropped} active notes.");
    }

    /// Full frame in one call: clock read, spawn, scroll, then retirement.
    pub fn step(&mut self, track_time: f32, is_playing: bool, dt: f32) -> StepReport {
        let mut report = StepReport::default();
        self.scroll_to(track_time, is_playing, &mut report);
        self.retire(dt, &mut report);
        report
    }

    /// Spawns due notes and re-derives every position from `track_time`.
    /// Returns false when the clock is anomalous and scrolling stayed frozen.
    pub fn scroll_to(&mut self, track_time: f32, is_playing: bool, report: &mut StepReport) -> bool {
        report.track_time = track_time;
        if let Some(anomaly) = self.check_clock(track_time, is_playing) {
            report.frozen = true;
            if let Some(err) = anomaly {
                warn!("{err}; scheduling frozen until the clock recovers.");
                report.errors.push(err);
            }
            return false;
        }
        if self.in_anomaly {
            info!("Track clock recovered at {track_time:.3}s, resuming scheduling.");
            self.in_anomaly = false;
        }
        self.last_time = Some(track_time);

        self.spawn_due(track_time, report);

        let lead = self.settings.lead_time;
        let radius = self.lifetimes.hit_window_radius;
        for note in &mut self.active {
            if note.advance(track_time, lead, radius) {
                trace!("Note #{} ready in lane {}", note.id.0, note.lane);
                report.became_ready.push(note.id);
            }
        }
        true
    }

    /// `Some(None)` freezes silently, `Some(Some(err))` freezes and reports
    /// the start of an anomaly episode.
    fn check_clock(&mut self, track_time: f32, is_playing: bool) -> Option<Option<EngineError>> {
        if let Some(stale) = self.awaiting_rewind {
            if !(track_time < stale) {
                return Some(None);
            }
            debug!("Transport rewound to {track_time:.3}s after reset.");
            self.awaiting_rewind = None;
        }
        let previous = self.last_time;
        let anomaly = if !track_time.is_finite() {
            Some(EngineError::ClockAnomaly {
                previous: previous.unwrap_or(0.0),
                current: track_time,
            })
        } else if !is_playing {
            // Not started yet, or stopped after the last note: nothing to report.
            if previous.is_none() || self.is_finished() {
                return Some(None);
            }
            Some(EngineError::TransportStopped { at: track_time })
        } else {
            match previous {
                Some(prev) if track_time < prev => Some(EngineError::ClockAnomaly {
                    previous: prev,
                    current: track_time,
                }),
                _ => None,
            }
        };
        let err = anomaly?;
        if self.in_anomaly {
            return Some(None);
        }
        self.in_anomaly = true;
        Some(Some(err))
    }

    fn spawn_due(&mut self, track_time: f32, report: &mut StepReport) {
        let lead = self.settings.lead_time;
        while let Some(desc) = self.chart.notes().get(self.cursor).copied() {
            // Non-finite times are let through so they get rejected below
            // instead of stalling the cursor.
            if desc.time.is_finite() && desc.time - track_time > lead {
                break;
            }
            let index = self.cursor;
            self.cursor += 1;
            match self.instantiate(NoteId(index), desc) {
                Ok(note) => {
                    trace!(
                        "Spawned note #{index} (lane {}, t={:.3}) at {track_time:.3}s",
                        note.lane, desc.time
                    );
                    report.spawned.push(note.id);
                    self.active.push(note);
                }
                Err(err) => {
                    warn!("{err}");
                    report.errors.push(err);
                }
            }
        }
    }

    fn instantiate(&self, id: NoteId, desc: NoteDescriptor) -> Result<ActiveNote, EngineError> {
        let reject = |reason: String| EngineError::Configuration {
            index: id.0,
            lane: desc.lane,
            reason,
        };
        if !desc.time.is_finite() || desc.time < 0.0 {
            return Err(reject(format!("note time {} must be finite and >= 0", desc.time)));
        }
        if desc.kind == NoteKind::Hold
            && (!desc.hold_duration.is_finite() || desc.hold_duration < 0.0)
        {
            return Err(reject(format!(
                "hold duration {} must be finite and >= 0",
                desc.hold_duration
            )));
        }
        let lane = Lane::from_chart_lane(desc.lane)
            .ok_or_else(|| reject("lane must be 0..=3".to_string()))?;
        let points = self
            .geometry
            .get(lane)
            .ok_or_else(|| reject(format!("no geometry configured for lane {lane}")))?;
        Ok(ActiveNote::new(id, desc, lane, points))
    }

    /// Passive misses, then the linger timers. Timers run on `dt`, so notes
    /// are cleaned up even while the clock is frozen.
    pub fn retire(&mut self, dt: f32, report: &mut StepReport) {
        for note in &mut self.active {
            if !note.state().is_judged() && note.passed_end() && note.mark_missed() {
                debug!("Note #{} in lane {} scrolled past unhit: miss.", note.id.0, note.lane);
                report.misses.push(note.id);
            }
            if note.tick_retirement(dt, &self.lifetimes) {
                report.destroyed += 1;
            }
        }
        self.purge_destroyed();
    }

    /// Judges a press in `lane` against the current positions. A hit note is
    /// removed straight away unless hit linger is configured.
    pub fn judge(&mut self, lane: Lane, policy: JudgmentPolicy, tiers: &TierTable) -> Outcome {
        let params = JudgeParams {
            policy,
            max_distance: self.settings.max_distance(tiers),
            tiers,
        };
        let outcome = judgment::judge_lane_press(&mut self.active, lane, params);
        if outcome.is_hit() && self.lifetimes.hit_linger <= 0.0 {
            if let Some(id) = outcome.note {
                for note in self.active.iter_mut().filter(|n| n.id == id) {
                    note.destroy();
                }
                self.purge_destroyed();
            }
        }
        outcome
    }

    #[inline(always)]
    fn purge_destroyed(&mut self) {
        self.active.retain(|n| n.state() != NoteState::Destroyed);
    }

    #[inline(always)]
    pub fn active_notes(&self) -> &[ActiveNote] {
        &self.active
    }

    #[inline(always)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline(always)]
    pub fn chart(&self) -> &Arc<Chart> {
        &self.chart
    }

    #[inline(always)]
    pub fn settings(&self) -> &ScrollSettings {
        &self.settings
    }

    #[inline(always)]
    pub fn lifetimes(&self) -> &NoteLifetimes {
        &self.lifetimes
    }

    #[inline(always)]
    pub fn is_frozen(&self) -> bool {
        self.in_anomaly || self.awaiting_rewind.is_some()
    }

    /// Every descriptor has been spawned (or rejected) and nothing is left on
    /// the field.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.chart.len() && self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::lanes::LanePoints;
    use crate::game::timing_windows::JudgeTier;
    use glam::Vec2;

    const DT: f32 = 1.0 / 60.0;

    fn scheduler(notes: Vec<NoteDescriptor>) -> Scheduler {
        Scheduler::new(
            Arc::new(Chart::new(notes)),
            LaneGeometry::default(),
            ScrollSettings::default(),
            NoteLifetimes::default(),
        )
    }

    #[test]
    fn spawns_exactly_at_lead_time() {
        let mut s = scheduler(vec![NoteDescriptor::tap(5.0, 0)]);
        let r = s.step(1.9, true, DT);
        assert!(r.spawned.is_empty());
        assert!(s.active_notes().is_empty(), "nothing on the field at t=1.9");

        let r = s.step(2.0, true, DT);
        assert_eq!(r.spawned, vec![NoteId(0)]);
        assert_eq!(s.active_notes().len(), 1);
        let note = &s.active_notes()[0];
        assert_eq!(note.lane, Lane::Left);
        assert_eq!(note.state(), NoteState::Moving);
    }

    #[test]
    fn repeated_steps_never_spawn_twice() {
        let notes = (0..20)
            .map(|i| NoteDescriptor::tap(3.0 + i as f32 * 0.25, i % 4))
            .collect();
        let mut s = scheduler(notes);
        let mut seen = Vec::new();
        for frame in 0..200 {
            let t = frame as f32 * 0.05;
            for _ in 0..3 {
                seen.extend(s.step(t, true, DT).spawned);
            }
        }
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(seen.len(), unique.len(), "a descriptor was spawned twice");
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn stepping_twice_at_same_time_is_idempotent() {
        let mut s = scheduler(vec![NoteDescriptor::tap(5.0, 1), NoteDescriptor::tap(5.5, 2)]);
        s.step(3.3, true, 0.0);
        let first: Vec<Vec2> = s.active_notes().iter().map(|n| n.position).collect();
        s.step(3.3, true, 0.0);
        let second: Vec<Vec2> = s.active_notes().iter().map(|n| n.position).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unhit_note_misses_then_leaves_active_set() {
        let mut s = scheduler(vec![NoteDescriptor::tap(5.0, 2)]);
        let mut t = 2.0;
        let mut missed_at = None;
        while t < 7.0 {
            let r = s.step(t, true, DT);
            if !r.misses.is_empty() {
                assert_eq!(r.misses, vec![NoteId(0)]);
                missed_at = Some(t);
                assert_eq!(s.active_notes()[0].state(), NoteState::Missed);
            }
            t += DT;
        }
        let missed_at = missed_at.expect("note should have been missed");
        assert!(missed_at >= 5.0 - 1e-3, "missed before reaching the end point");
        assert!(s.active_notes().is_empty(), "destroyed notes must be removed");
        assert!(s.is_finished());
    }

    #[test]
    fn bad_descriptors_are_rejected_once() {
        let geometry = LaneGeometry::empty().with_lane(
            Lane::Left,
            LanePoints::new(Vec2::new(0.0, 600.0), Vec2::new(0.0, -300.0), Vec2::new(0.0, -270.0)),
        );
        let mut s = Scheduler::new(
            Arc::new(Chart::new(vec![
                NoteDescriptor::tap(-1.0, 0),
                NoteDescriptor::tap(1.0, 7),
                NoteDescriptor::tap(1.0, 2),
                NoteDescriptor::tap(1.0, 0),
                NoteDescriptor::hold(1.5, 0, f32::NAN),
            ])),
            geometry,
            ScrollSettings::default(),
            NoteLifetimes::default(),
        );
        let r = s.step(0.0, true, DT);
        assert_eq!(r.errors.len(), 4, "{:?}", r.errors);
        assert!(
            r.errors
                .iter()
                .all(|e| matches!(e, EngineError::Configuration { .. }))
        );
        assert_eq!(r.spawned, vec![NoteId(3)]);
        assert!(s.step(0.5, true, DT).errors.is_empty(), "errors surface only once");
    }

    #[test]
    fn backwards_clock_freezes_without_duplicates() {
        let mut s = scheduler(vec![NoteDescriptor::tap(4.0, 0), NoteDescriptor::tap(8.0, 1)]);
        s.step(2.0, true, DT);
        let position = s.active_notes()[0].position;

        let r = s.step(1.0, true, DT);
        assert!(r.frozen);
        assert!(matches!(r.errors.as_slice(), [EngineError::ClockAnomaly { .. }]));
        assert_eq!(s.active_notes()[0].position, position, "frozen notes must not move");

        let r = s.step(1.5, true, DT);
        assert!(r.frozen && r.errors.is_empty(), "one report per anomaly episode");

        let r = s.step(5.5, true, DT);
        assert!(!r.frozen);
        assert_eq!(r.spawned, vec![NoteId(1)]);
        assert_eq!(s.cursor(), 2);
    }

    #[test]
    fn stopped_transport_freezes_mid_song() {
        let mut s = scheduler(vec![NoteDescriptor::tap(4.0, 0), NoteDescriptor::tap(9.0, 1)]);
        let r = s.step(0.0, false, DT);
        assert!(r.frozen && r.errors.is_empty(), "not started yet is not an anomaly");

        s.step(1.5, true, DT);
        let r = s.step(1.6, false, DT);
        assert!(matches!(r.errors.as_slice(), [EngineError::TransportStopped { .. }]));
        assert!(s.is_frozen());
        s.step(1.6, true, DT);
        assert!(!s.is_frozen());
    }

    #[test]
    fn judge_removes_hit_note_immediately() {
        let mut s = scheduler(vec![NoteDescriptor::tap(5.0, 3)]);
        s.step(4.9, true, DT);
        // Judged between scrolling and retirement, as the engine does.
        s.scroll_to(5.0, true, &mut StepReport::default());
        let tiers = TierTable::default();
        let out = s.judge(Lane::Right, JudgmentPolicy::Gated, &tiers);
        assert_eq!(out.tier, JudgeTier::Perfect);
        assert!(s.active_notes().is_empty());
    }

    #[test]
    fn reset_waits_for_the_transport_to_rewind() {
        let notes = (0..20)
            .map(|i| NoteDescriptor::tap(1.0 + i as f32 * 0.25, i % 4))
            .collect();
        let mut s = scheduler(notes);
        let mut stale = 0.0;
        while stale < 8.0 {
            stale += DT;
            s.step(stale, true, DT);
        }
        s.reset();

        let r = s.step(stale, true, DT);
        assert!(r.frozen && r.errors.is_empty(), "stale clock is ignored silently");
        assert!(r.spawned.is_empty() && r.misses.is_empty());
        assert!(s.active_notes().is_empty());
        assert_eq!(s.cursor(), 0);

        let r = s.step(0.0, true, DT);
        assert!(!r.frozen);
        assert!(!s.is_frozen());
        assert!(!r.spawned.is_empty(), "notes within the lead spawn after the rewind");
        assert!(r.misses.is_empty());
    }

    #[test]
    fn reset_matches_fresh_scheduler() {
        let notes = vec![NoteDescriptor::tap(1.0, 0), NoteDescriptor::tap(2.5, 1)];
        let mut s = scheduler(notes.clone());
        for i in 0..120 {
            s.step(i as f32 * DT * 2.0, true, DT);
        }
        s.reset();
        let mut fresh = scheduler(notes);
        s.step(0.0, true, DT);
        fresh.step(0.0, true, DT);
        let ids = |s: &Scheduler| s.active_notes().iter().map(|n| (n.id, n.position)).collect::<Vec<_>>();
        assert_eq!(ids(&s), ids(&fresh));
        assert_eq!(s.cursor(), fresh.cursor());
    }
}
