use log::trace;

use crate::game::timing_windows::{JudgeTier, TierTable};

/// How a hold note ended once its head was hit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HoldResult {
    Held,
    LetGo,
}

/// Snapshot of scoring progress, read by UI and evaluation collaborators.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub last_tier: Option<JudgeTier>,
    /// Indexed by `JudgeTier::index()`.
    pub tier_counts: [u32; 5],
    pub holds_held: u32,
    pub holds_let_go: u32,
}

impl ScoreState {
    #[inline(always)]
    pub fn tier_count(&self, tier: JudgeTier) -> u32 {
        self.tier_counts[tier.index()]
    }

    pub fn judged_count(&self) -> u32 {
        self.tier_counts.iter().sum()
    }
}

/// Pure reducer from judgment events to `ScoreState`.
#[derive(Clone, Debug, Default)]
pub struct ScoreTracker {
    tiers: TierTable,
    state: ScoreState,
}

impl ScoreTracker {
    pub fn new(tiers: TierTable) -> Self {
        Self {
            tiers,
            state: ScoreState::default(),
        }
    }

    /// Awards `basePoints(tier) * max(1, combo)` and then extends the combo.
    /// A Miss tier is routed to `on_miss`.
    pub fn on_hit(&mut self, tier: JudgeTier) -> u64 {
        if !tier.is_hit() {
            self.on_miss();
            return 0;
        }
        let multiplier = u64::from(self.state.combo.max(1));
        let points = u64::from(self.tiers.base_points(tier)) * multiplier;
        let s = &mut self.state;
        s.score = s.score.saturating_add(points);
        s.combo = s.combo.saturating_add(1);
        s.max_combo = s.max_combo.max(s.combo);
        s.last_tier = Some(tier);
        s.tier_counts[tier.index()] += 1;
        trace!("{tier} +{points} (score {}, combo {})", s.score, s.combo);
        points
    }

    pub fn on_miss(&mut self) {
        let s = &mut self.state;
        s.combo = 0;
        s.last_tier = Some(JudgeTier::Miss);
        s.tier_counts[JudgeTier::Miss.index()] += 1;
    }

    /// Hold tails never award points. Letting go breaks the combo like a miss
    /// but does not count as a judged Miss tier.
    pub fn on_hold_end(&mut self, result: HoldResult) {
        match result {
            HoldResult::Held => self.state.holds_held += 1,
            HoldResult::LetGo => {
                self.state.holds_let_go += 1;
                self.state.combo = 0;
            }
        }
    }

    #[inline(always)]
    pub fn state(&self) -> &ScoreState {
        &self.state
    }
}
