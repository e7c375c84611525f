use std::cmp::Ordering;
use std::str::FromStr;

use log::debug;

use crate::core::input::Lane;
use crate::error::EngineError;
use crate::game::note::{ActiveNote, NoteId, NoteState};
use crate::game::timing_windows::{JudgeTier, TierTable};

/// Which notes a lane press may judge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum JudgmentPolicy {
    /// Only notes that have reached `ReadyToHit`. A note still `Moving`
    /// cannot be hit early.
    #[default]
    Gated,
    /// Any unjudged note inside the distance envelope, whatever its state.
    Ungated,
}

impl JudgmentPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gated => "Gated",
            Self::Ungated => "Ungated",
        }
    }

    #[inline(always)]
    fn admits(self, state: NoteState) -> bool {
        match self {
            Self::Gated => state == NoteState::ReadyToHit,
            Self::Ungated => matches!(state, NoteState::Moving | NoteState::ReadyToHit),
        }
    }
}

impl FromStr for JudgmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gated" => Ok(Self::Gated),
            "ungated" => Ok(Self::Ungated),
            other => Err(format!("'{other}' is not a valid JudgmentPolicy")),
        }
    }
}

/// Outer edge of the judgment window in field units. Scales with scroll speed
/// and lead time so faster songs get proportionally wider windows.
#[inline(always)]
pub fn max_distance(scroll_speed: f32, speed_multiplier: f32, ok_threshold: f32, lead_time: f32) -> f32 {
    scroll_speed * speed_multiplier * ok_threshold * lead_time
}

/// `1.0` is dead on the hit point, `0.0` is at (or past) the window edge.
#[inline(always)]
pub fn normalized_accuracy(distance: f32, max_distance: f32) -> f32 {
    if max_distance <= 0.0 {
        return if distance <= 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - (distance / max_distance).clamp(0.0, 1.0)
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Outcome {
    pub lane: Lane,
    pub tier: JudgeTier,
    /// `None` for a global Miss that no note can be blamed for.
    pub note: Option<NoteId>,
    pub accuracy: f32,
    pub distance: Option<f32>,
}

impl Outcome {
    pub const fn global_miss(lane: Lane) -> Self {
        Self {
            lane,
            tier: JudgeTier::Miss,
            note: None,
            accuracy: 0.0,
            distance: None,
        }
    }

    #[inline(always)]
    pub const fn is_hit(&self) -> bool {
        self.tier.is_hit()
    }
}

/// Window parameters for a single press.
#[derive(Copy, Clone, Debug)]
pub struct JudgeParams<'a> {
    pub policy: JudgmentPolicy,
    pub max_distance: f32,
    pub tiers: &'a TierTable,
}

/// Index into `notes` of the best candidate in `lane`: the admissible note
/// closest to its hit point, ties going to the earlier note time.
pub fn select_candidate(
    notes: &[ActiveNote],
    lane: Lane,
    policy: JudgmentPolicy,
    max_distance: f32,
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, note) in notes.iter().enumerate() {
        if note.lane != lane || !policy.admits(note.state()) {
            continue;
        }
        let distance = note.distance_to_hit();
        if !(distance <= max_distance) {
            continue;
        }
        let better = match best {
            None => true,
            Some((j, best_distance)) => match distance.total_cmp(&best_distance) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => {
                    let (a, b) = (&note.descriptor, &notes[j].descriptor);
                    a.time < b.time || (a.time == b.time && note.id < notes[j].id)
                }
            },
        };
        if better {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
}

/// Judges one press against the active set and applies the resulting
/// transition to the chosen note (`Hit`, or `Missed` when the accuracy falls
/// below every tier). Scoring and removal are left to the caller.
pub fn judge_lane_press(notes: &mut [ActiveNote], lane: Lane, params: JudgeParams<'_>) -> Outcome {
    let Some(index) = select_candidate(notes, lane, params.policy, params.max_distance) else {
        debug!(
            "{}: global miss.",
            EngineError::NoCandidateInLane { lane: lane.index() }
        );
        return Outcome::global_miss(lane);
    };

    let note = &mut notes[index];
    let distance = note.distance_to_hit();
    let accuracy = normalized_accuracy(distance, params.max_distance);
    let tier = params.tiers.classify(accuracy);
    if tier.is_hit() {
        note.mark_hit();
    } else {
        note.mark_missed();
    }
    debug!(
        "Lane {lane} judged note #{} {tier} (accuracy {accuracy:.3}, distance {distance:.1})",
        note.id.0
    );
    Outcome {
        lane,
        tier,
        note: Some(note.id),
        accuracy,
        distance: Some(distance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::lanes::LanePoints;
    use crate::game::note::NoteDescriptor;
    use glam::Vec2;

    const LEAD: f32 = 3.0;
    const RADIUS: f32 = 70.0;

    // 900 units over the lead, hit point 30 units before the end.
    fn lane_points() -> LanePoints {
        LanePoints::new(
            Vec2::new(0.0, 600.0),
            Vec2::new(0.0, -300.0),
            Vec2::new(0.0, -270.0),
        )
    }

    fn note(id: usize, time: f32, lane: Lane, track_time: f32) -> ActiveNote {
        let mut n = ActiveNote::new(
            NoteId(id),
            NoteDescriptor::tap(time, lane.index() as i32),
            lane,
            lane_points(),
        );
        n.advance(track_time, LEAD, RADIUS);
        n
    }

    fn window() -> f32 {
        max_distance(300.0, 1.0, TierTable::default().ok_threshold(), LEAD)
    }

    #[test]
    fn window_scales_with_speed_and_lead() {
        assert!((window() - 180.0).abs() <= 1e-3);
        assert!((max_distance(300.0, 2.0, 0.2, 3.0) - 360.0).abs() <= 1e-3);
    }

    #[test]
    fn accuracy_is_normalized_and_clamped() {
        assert_eq!(normalized_accuracy(0.0, 180.0), 1.0);
        assert!((normalized_accuracy(18.0, 180.0) - 0.9).abs() <= 1e-6);
        assert_eq!(normalized_accuracy(400.0, 180.0), 0.0);
    }

    #[test]
    fn picks_closest_ready_note_in_lane() {
        // Hit point is reached at track time = note time - 0.1s.
        let mut notes = vec![
            note(0, 5.0, Lane::Left, 4.88),
            note(1, 5.05, Lane::Left, 4.88),
            note(2, 5.0, Lane::Down, 4.88),
        ];
        assert_eq!(notes[0].state(), NoteState::ReadyToHit);
        assert_eq!(notes[1].state(), NoteState::ReadyToHit);
        let tiers = TierTable::default();
        let out = judge_lane_press(
            &mut notes,
            Lane::Left,
            JudgeParams {
                policy: JudgmentPolicy::Gated,
                max_distance: window(),
                tiers: &tiers,
            },
        );
        assert_eq!(out.note, Some(NoteId(0)));
        assert_eq!(out.tier, JudgeTier::Perfect);
        assert_eq!(notes[0].state(), NoteState::Hit);
        assert_eq!(notes[1].state(), NoteState::ReadyToHit);
        assert_eq!(notes[2].state(), NoteState::ReadyToHit, "other lanes untouched");
    }

    #[test]
    fn ties_go_to_the_earlier_note() {
        let mut a = note(7, 5.0, Lane::Up, 4.9);
        let b = note(3, 5.0, Lane::Up, 4.9);
        a.descriptor.time = 4.99;
        let notes = vec![b, a];
        let idx = select_candidate(&notes, Lane::Up, JudgmentPolicy::Ungated, window());
        assert_eq!(idx, Some(1));
    }

    #[test]
    fn gated_policy_ignores_moving_notes() {
        let mut notes = vec![note(0, 5.0, Lane::Right, 4.5)];
        assert_eq!(notes[0].state(), NoteState::Moving);
        let tiers = TierTable::default();
        let gated = judge_lane_press(
            &mut notes,
            Lane::Right,
            JudgeParams {
                policy: JudgmentPolicy::Gated,
                max_distance: window(),
                tiers: &tiers,
            },
        );
        assert_eq!(gated, Outcome::global_miss(Lane::Right));
        assert_eq!(notes[0].state(), NoteState::Moving, "a global miss blames no note");

        // Ungated, the same note is in the envelope (120 units out) but too
        // far for any tier, so it is an attributable miss.
        let ungated = judge_lane_press(
            &mut notes,
            Lane::Right,
            JudgeParams {
                policy: JudgmentPolicy::Ungated,
                max_distance: window(),
                tiers: &tiers,
            },
        );
        assert_eq!(ungated.tier, JudgeTier::Miss);
        assert_eq!(ungated.note, Some(NoteId(0)));
        assert_eq!(notes[0].state(), NoteState::Missed);
    }

    #[test]
    fn judged_notes_are_not_candidates_again() {
        let mut notes = vec![note(0, 5.0, Lane::Left, 4.9)];
        assert!(notes[0].mark_hit());
        assert_eq!(
            select_candidate(&notes, Lane::Left, JudgmentPolicy::Ungated, window()),
            None
        );
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("gated".parse::<JudgmentPolicy>(), Ok(JudgmentPolicy::Gated));
        assert_eq!(" Ungated ".parse::<JudgmentPolicy>(), Ok(JudgmentPolicy::Ungated));
        assert!("loose".parse::<JudgmentPolicy>().is_err());
    }
}
