// Shared judgment tier definitions so scoring and feedback agree on thresholds.

// Thresholds are fractions of the judgment window: a tier needs
// normalized accuracy >= 1 - threshold.
pub const PERFECT_THRESHOLD: f32 = 0.05;
pub const GREAT_THRESHOLD: f32 = 0.10;
pub const GOOD_THRESHOLD: f32 = 0.15;
pub const OK_THRESHOLD: f32 = 0.20;

pub const PERFECT_POINTS: u32 = 300;
pub const GREAT_POINTS: u32 = 150;
pub const GOOD_POINTS: u32 = 100;
pub const OK_POINTS: u32 = 50;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JudgeTier {
    Perfect,
    Great,
    Good,
    Ok,
    Miss,
}

impl JudgeTier {
    pub const ALL: [Self; 5] = [Self::Perfect, Self::Great, Self::Good, Self::Ok, Self::Miss];

    #[inline(always)]
    pub const fn is_hit(self) -> bool {
        !matches!(self, Self::Miss)
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Perfect => "PERFECT!",
            Self::Great => "GREAT!",
            Self::Good => "GOOD",
            Self::Ok => "OK",
            Self::Miss => "MISS",
        }
    }
}

impl std::fmt::Display for JudgeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct TierRow {
    pub min_accuracy: f32,
    pub tier: JudgeTier,
    pub base_points: u32,
}

/// Hit tiers ordered from strictest to loosest. Classification walks the rows
/// once and takes the first one the accuracy clears; anything below the last
/// row is a Miss.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TierTable {
    rows: [TierRow; 4],
}

impl Default for TierTable {
    fn default() -> Self {
        // The defaults are monotonic, so this cannot fail.
        Self::build([PERFECT_THRESHOLD, GREAT_THRESHOLD, GOOD_THRESHOLD, OK_THRESHOLD])
    }
}

impl TierTable {
    /// `thresholds` are Perfect, Great, Good, Ok window fractions. They must be
    /// in `[0, 1]` and non-decreasing, otherwise the tiers would overlap.
    pub fn from_thresholds(thresholds: [f32; 4]) -> Result<Self, String> {
        for (tier, t) in JudgeTier::ALL.iter().zip(thresholds) {
            if !t.is_finite() || !(0.0..=1.0).contains(&t) {
                return Err(format!("{tier:?} threshold {t} must be within 0..=1"));
            }
        }
        if thresholds.windows(2).any(|w| w[0] > w[1]) {
            return Err(format!(
                "tier thresholds {thresholds:?} must be ordered Perfect <= Great <= Good <= Ok"
            ));
        }
        if thresholds[3] <= 0.0 {
            return Err("Ok threshold must be greater than zero".to_string());
        }
        Ok(Self::build(thresholds))
    }

    const fn build(t: [f32; 4]) -> Self {
        Self {
            rows: [
                TierRow {
                    min_accuracy: 1.0 - t[0],
                    tier: JudgeTier::Perfect,
                    base_points: PERFECT_POINTS,
                },
                TierRow {
                    min_accuracy: 1.0 - t[1],
                    tier: JudgeTier::Great,
                    base_points: GREAT_POINTS,
                },
                TierRow {
                    min_accuracy: 1.0 - t[2],
                    tier: JudgeTier::Good,
                    base_points: GOOD_POINTS,
                },
                TierRow {
                    min_accuracy: 1.0 - t[3],
                    tier: JudgeTier::Ok,
                    base_points: OK_POINTS,
                },
            ],
        }
    }

    #[inline(always)]
    pub fn classify(&self, normalized_accuracy: f32) -> JudgeTier {
        self.rows
            .iter()
            .find(|row| normalized_accuracy >= row.min_accuracy)
            .map_or(JudgeTier::Miss, |row| row.tier)
    }

    #[inline(always)]
    pub fn base_points(&self, tier: JudgeTier) -> u32 {
        self.rows
            .iter()
            .find(|row| row.tier == tier)
            .map_or(0, |row| row.base_points)
    }

    /// Fraction of the lead time the outermost (Ok) tier spans; it sizes the
    /// judgment window.
    #[inline(always)]
    pub fn ok_threshold(&self) -> f32 {
        1.0 - self.rows[3].min_accuracy
    }

    pub fn thresholds(&self) -> [f32; 4] {
        let r = &self.rows;
        [
            1.0 - r[0].min_accuracy,
            1.0 - r[1].min_accuracy,
            1.0 - r[2].min_accuracy,
            1.0 - r[3].min_accuracy,
        ]
    }
}
