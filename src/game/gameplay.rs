use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info};

use crate::core::audio::{MusicClock, TransportCommand};
use crate::core::input::{InputReceiver, InputSource, Lane, LaneEdge, NUM_LANES};
use crate::game::chart::Chart;
use crate::game::judgment::{JudgmentPolicy, Outcome};
use crate::game::lanes::LaneGeometry;
use crate::game::note::{ActiveNote, NoteId, NoteKind, NoteLifetimes};
use crate::game::scores::{HoldResult, ScoreState, ScoreTracker};
use crate::game::scroll::{Scheduler, ScrollSettings, StepReport};
use crate::game::timing_windows::TierTable;

/// Everything the engine needs that stays fixed for a song.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EngineSettings {
    pub scroll: ScrollSettings,
    pub lifetimes: NoteLifetimes,
    pub tiers: TierTable,
    pub policy: JudgmentPolicy,
    pub geometry: LaneGeometry,
}

/// A hold whose head was hit and whose tail has not been reached yet.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveHold {
    pub note: NoteId,
    pub end_time: f32,
    pub is_pressed: bool,
}

/// Per-run state. Replaced as a whole on reset so a half-cleared run can never
/// be observed.
#[derive(Debug)]
struct RunState {
    scheduler: Scheduler,
    scores: ScoreTracker,
    active_holds: [Option<ActiveHold>; NUM_LANES],
    keyboard_lane_state: [bool; NUM_LANES],
    pad_lane_state: [bool; NUM_LANES],
    pending_edges: VecDeque<LaneEdge>,
    last_track_time: f32,
    log_timer: f32,
}

impl RunState {
    fn new(chart: Arc<Chart>, settings: &EngineSettings) -> Self {
        Self::with_scheduler(
            Scheduler::new(chart, settings.geometry, settings.scroll, settings.lifetimes),
            settings,
        )
    }

    fn with_scheduler(scheduler: Scheduler, settings: &EngineSettings) -> Self {
        Self {
            scheduler,
            scores: ScoreTracker::new(settings.tiers),
            active_holds: std::array::from_fn(|_| None),
            keyboard_lane_state: [false; NUM_LANES],
            pad_lane_state: [false; NUM_LANES],
            pending_edges: VecDeque::new(),
            last_track_time: 0.0,
            log_timer: 0.0,
        }
    }

    #[inline(always)]
    fn lane_down(&self, lane: Lane) -> bool {
        let i = lane.index();
        self.keyboard_lane_state[i] || self.pad_lane_state[i]
    }
}

/// Composition root for one song: the scheduler, the judge and the score
/// tracker, driven by an injected transport clock.
pub struct Engine {
    settings: EngineSettings,
    clock: Box<dyn MusicClock>,
    input: Option<InputReceiver>,
    run: RunState,
    transport_requests: Vec<TransportCommand>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("track_time", &self.clock.track_time())
            .field("run", &self.run)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// An engine with an empty chart; call `initialize_notes` to load a song.
    pub fn new(settings: EngineSettings, clock: Box<dyn MusicClock>) -> Self {
        Self {
            run: RunState::new(Arc::new(Chart::default()), &settings),
            settings,
            clock,
            input: None,
            transport_requests: Vec::new(),
        }
    }

    pub fn initialize_notes(&mut self, chart: Chart, clock: Box<dyn MusicClock>) {
        info!(
            "Initializing {} notes ({} lanes configured, {} judging).",
            chart.len(),
            self.settings.geometry.configured_lanes(),
            self.settings.policy.as_str()
        );
        self.clock = clock;
        self.run = RunState::new(Arc::new(chart), &self.settings);
        if let Some(input) = self.input.as_mut() {
            input.reset();
        }
    }

    /// Hooks up the consumer half of an input channel; it is drained once per
    /// `update`.
    pub fn attach_input(&mut self, receiver: InputReceiver) {
        self.input = Some(receiver);
    }

    /// Queues an edge produced on the engine thread. Processed on the next
    /// `update`, in arrival order.
    pub fn queue_input_edge(&mut self, edge: LaneEdge) {
        self.run.pending_edges.push_back(edge);
    }

    /// One frame: read the clock, spawn and scroll, judge queued input, settle
    /// holds, then retire passive misses.
    pub fn update(&mut self, delta_time: f32) -> StepReport {
        let track_time = self.clock.track_time();
        let is_playing = self.clock.is_playing();
        let mut report = StepReport::default();

        let live = self
            .run
            .scheduler
            .scroll_to(track_time, is_playing, &mut report);
        if live {
            self.run.last_track_time = track_time;
        }

        if let Some(input) = self.input.as_mut() {
            self.run.pending_edges.extend(input.drain());
        }
        self.process_input_edges(&mut report);
        if live {
            self.update_active_holds(&mut report);
        }

        self.run.scheduler.retire(delta_time, &mut report);
        for _ in &report.misses {
            self.run.scores.on_miss();
        }

        self.run.log_timer += delta_time.max(0.0);
        if self.run.log_timer >= 1.0 {
            let s = self.run.scores.state();
            debug!(
                "Time: {:.2}, Score: {}, Combo: {}, Active Notes: {}{}",
                track_time,
                s.score,
                s.combo,
                self.run.scheduler.active_notes().len(),
                if self.run.scheduler.is_frozen() { " (frozen)" } else { "" }
            );
            self.run.log_timer -= 1.0;
        }
        report
    }

    /// Alias kept for callers that think in fixed steps.
    #[inline(always)]
    pub fn step(&mut self, dt: f32) -> StepReport {
        self.update(dt)
    }

    fn process_input_edges(&mut self, report: &mut StepReport) {
        while let Some(edge) = self.run.pending_edges.pop_front() {
            let lane_idx = edge.lane.index();
            let was_down = self.run.lane_down(edge.lane);
            match edge.source {
                InputSource::Keyboard => self.run.keyboard_lane_state[lane_idx] = edge.pressed,
                InputSource::Pad => self.run.pad_lane_state[lane_idx] = edge.pressed,
            }
            let is_down = self.run.lane_down(edge.lane);
            if edge.pressed && is_down && !was_down {
                report.judgments.push(self.on_lane_press(edge.lane));
            } else if !edge.pressed && was_down && !is_down {
                if let Some(result) = self.on_lane_release(edge.lane) {
                    report.hold_results.push((edge.lane, result));
                }
            }
        }
    }

    /// Judges a press in `lane` and feeds the outcome to the score tracker.
    pub fn on_lane_press(&mut self, lane: Lane) -> Outcome {
        let outcome = self
            .run
            .scheduler
            .judge(lane, self.settings.policy, &self.settings.tiers);
        if !outcome.is_hit() {
            self.run.scores.on_miss();
            return outcome;
        }
        self.run.scores.on_hit(outcome.tier);

        let hold = outcome
            .note
            .and_then(|id| self.run.scheduler.chart().get(id).map(|d| (id, *d)))
            .filter(|(_, d)| d.kind == NoteKind::Hold);
        if let Some((id, desc)) = hold {
            if let Some(prev) = self.run.active_holds[lane.index()].take() {
                debug!("Hold #{} in lane {lane} cut short by a new hold.", prev.note.0);
                self.run.scores.on_hold_end(HoldResult::LetGo);
            }
            self.run.active_holds[lane.index()] = Some(ActiveHold {
                note: id,
                end_time: desc.end_time(),
                is_pressed: true,
            });
        }
        outcome
    }

    /// Releases `lane`. Returns the hold result if this let go of a hold
    /// before its tail.
    pub fn on_lane_release(&mut self, lane: Lane) -> Option<HoldResult> {
        let slot = &mut self.run.active_holds[lane.index()];
        let active = slot.as_mut()?;
        active.is_pressed = false;
        if self.run.last_track_time >= active.end_time {
            // Let `update_active_holds` award it on the next frame.
            return None;
        }
        let note = active.note;
        *slot = None;
        debug!("Hold #{} in lane {lane} let go.", note.0);
        self.run.scores.on_hold_end(HoldResult::LetGo);
        Some(HoldResult::LetGo)
    }

    fn update_active_holds(&mut self, report: &mut StepReport) {
        let now = self.run.last_track_time;
        for lane in Lane::ALL {
            let slot = &mut self.run.active_holds[lane.index()];
            let Some(active) = slot.as_ref() else {
                continue;
            };
            if now < active.end_time {
                continue;
            }
            debug!("Hold #{} in lane {lane} held to the end.", active.note.0);
            *slot = None;
            self.run.scores.on_hold_end(HoldResult::Held);
            report.hold_results.push((lane, HoldResult::Held));
        }
    }

    /// Restarts the song. The whole run is swapped in one assignment, then a
    /// restart is requested from the transport owner. Until the transport
    /// actually rewinds, `update` stays frozen instead of replaying the old
    /// track time against the new run.
    pub fn reset(&mut self) {
        self.run = RunState::with_scheduler(self.run.scheduler.restarted(), &self.settings);
        if let Some(input) = self.input.as_mut() {
            input.reset();
        }
        self.transport_requests.push(TransportCommand::Restart);
        info!("Song reset.");
    }

    /// Transport commands issued since the last call, oldest first.
    pub fn take_transport_requests(&mut self) -> Vec<TransportCommand> {
        std::mem::take(&mut self.transport_requests)
    }

    #[inline(always)]
    pub fn score_state(&self) -> &ScoreState {
        self.run.scores.state()
    }

    #[inline(always)]
    pub fn active_notes(&self) -> &[ActiveNote] {
        self.run.scheduler.active_notes()
    }

    pub fn active_hold(&self, lane: Lane) -> Option<&ActiveHold> {
        self.run.active_holds[lane.index()].as_ref()
    }

    #[inline(always)]
    pub fn track_time(&self) -> f32 {
        self.clock.track_time()
    }

    #[inline(always)]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[inline(always)]
    pub fn chart(&self) -> &Chart {
        self.run.scheduler.chart()
    }

    pub fn is_finished(&self) -> bool {
        self.run.scheduler.is_finished() && self.run.active_holds.iter().all(Option::is_none)
    }
}
