use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::input::Lane;
use crate::game::lanes::LanePoints;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    #[serde(alias = "Normal", alias = "tap")]
    Normal,
    #[serde(alias = "Hold")]
    Hold,
}

/// One entry of the normalized note list an importer produces.
///
/// `lane` stays a raw integer here: an out-of-range lane is only rejected when
/// the scheduler tries to spawn it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteDescriptor {
    pub time: f32,
    pub lane: i32,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    #[serde(rename = "holdDuration", default)]
    pub hold_duration: f32,
}

impl NoteDescriptor {
    pub const fn tap(time: f32, lane: i32) -> Self {
        Self {
            time,
            lane,
            kind: NoteKind::Normal,
            hold_duration: 0.0,
        }
    }

    pub const fn hold(time: f32, lane: i32, hold_duration: f32) -> Self {
        Self {
            time,
            lane,
            kind: NoteKind::Hold,
            hold_duration,
        }
    }

    #[inline(always)]
    pub fn end_time(&self) -> f32 {
        match self.kind {
            NoteKind::Normal => self.time,
            NoteKind::Hold => self.time + self.hold_duration.max(0.0),
        }
    }
}

/// Index of the descriptor in its chart. Unique within the active set because
/// each descriptor is spawned at most once per run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NoteState {
    Moving,
    ReadyToHit,
    Hit,
    Missed,
    Destroyed,
}

impl NoteState {
    #[inline(always)]
    pub const fn is_judged(self) -> bool {
        matches!(self, Self::Hit | Self::Missed | Self::Destroyed)
    }
}

/// Timers and radii shared by every note of a song.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoteLifetimes {
    /// Moving -> ReadyToHit once the note is closer than this to its hit point.
    pub hit_window_radius: f32,
    /// Missed notes that have scrolled past their end point linger this long.
    pub retire_delay: f32,
    /// How long a Hit note stays in the active set. Zero removes it at judgment.
    pub hit_linger: f32,
    /// Hard cap on how long any Missed note can linger.
    pub max_miss_grace: f32,
}

impl Default for NoteLifetimes {
    fn default() -> Self {
        Self {
            hit_window_radius: 70.0,
            retire_delay: 0.5,
            hit_linger: 0.0,
            max_miss_grace: 5.0,
        }
    }
}

/// Interpolation fraction along spawn -> end for a note due at `note_time`.
#[inline(always)]
pub fn scroll_progress(note_time: f32, track_time: f32, lead_time: f32) -> f32 {
    if lead_time <= 0.0 {
        return if track_time >= note_time { 1.0 } else { 0.0 };
    }
    ((track_time - (note_time - lead_time)) / lead_time).clamp(0.0, 1.0)
}

#[derive(Clone, Debug)]
pub struct ActiveNote {
    pub id: NoteId,
    pub descriptor: NoteDescriptor,
    pub lane: Lane,
    pub spawn_position: Vec2,
    pub end_position: Vec2,
    pub hit_position: Vec2,
    pub position: Vec2,
    pub progress: f32,
    pub elapsed_in_miss_grace: f32,
    elapsed_since_hit: f32,
    state: NoteState,
}

impl ActiveNote {
    pub fn new(id: NoteId, descriptor: NoteDescriptor, lane: Lane, points: LanePoints) -> Self {
        Self {
            id,
            descriptor,
            lane,
            spawn_position: points.spawn,
            end_position: points.end,
            hit_position: points.hit,
            position: points.spawn,
            progress: 0.0,
            elapsed_in_miss_grace: 0.0,
            elapsed_since_hit: 0.0,
            state: NoteState::Moving,
        }
    }

    #[inline(always)]
    pub const fn state(&self) -> NoteState {
        self.state
    }

    #[inline(always)]
    pub fn distance_to_hit(&self) -> f32 {
        self.position.distance(self.hit_position)
    }

    #[inline(always)]
    pub fn passed_end(&self) -> bool {
        self.progress >= 1.0
    }

    /// Re-derives position from the track clock. Only depends on `track_time`,
    /// so calling it twice with the same time is a no-op. Returns true when the
    /// note just became ReadyToHit.
    pub fn advance(&mut self, track_time: f32, lead_time: f32, hit_window_radius: f32) -> bool {
        if self.state == NoteState::Destroyed {
            return false;
        }
        self.progress = scroll_progress(self.descriptor.time, track_time, lead_time);
        self.position = self.spawn_position.lerp(self.end_position, self.progress);

        if self.state == NoteState::Moving && self.distance_to_hit() < hit_window_radius {
            self.state = NoteState::ReadyToHit;
            return true;
        }
        false
    }

    /// Moving/ReadyToHit -> Hit. Refuses any other source state so a note can
    /// only ever be judged once.
    pub fn mark_hit(&mut self) -> bool {
        if self.state.is_judged() {
            return false;
        }
        self.state = NoteState::Hit;
        self.elapsed_since_hit = 0.0;
        true
    }

    /// Moving/ReadyToHit -> Missed, same single-visit rule as `mark_hit`.
    pub fn mark_missed(&mut self) -> bool {
        if self.state.is_judged() {
            return false;
        }
        self.state = NoteState::Missed;
        self.elapsed_in_miss_grace = 0.0;
        true
    }

    /// Advances the Hit/Missed linger timers by frame time (not track time, so
    /// cleanup still happens while the clock is frozen). Returns true on the
    /// transition to Destroyed.
    pub fn tick_retirement(&mut self, dt: f32, lifetimes: &NoteLifetimes) -> bool {
        let dt = dt.max(0.0);
        let destroy = match self.state {
            NoteState::Hit => {
                self.elapsed_since_hit += dt;
                self.elapsed_since_hit >= lifetimes.hit_linger
            }
            NoteState::Missed => {
                self.elapsed_in_miss_grace += dt;
                (self.passed_end() && self.elapsed_in_miss_grace >= lifetimes.retire_delay)
                    || self.elapsed_in_miss_grace >= lifetimes.max_miss_grace
            }
            _ => false,
        };
        if destroy {
            self.state = NoteState::Destroyed;
        }
        destroy
    }

    /// Forced end of life, used by judgment when a hit note is not kept around.
    pub(crate) fn destroy(&mut self) {
        self.state = NoteState::Destroyed;
    }
}
