use glam::Vec2;

use crate::core::input::{Lane, NUM_LANES};

/// Reference points for one lane: where notes appear, where they leave the
/// field, and the receptor they should be hit on.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LanePoints {
    pub spawn: Vec2,
    pub end: Vec2,
    pub hit: Vec2,
}

impl LanePoints {
    pub const fn new(spawn: Vec2, end: Vec2, hit: Vec2) -> Self {
        Self { spawn, end, hit }
    }

    /// Parses `spawnX,spawnY|endX,endY|hitX,hitY`. `;` is avoided because INI
    /// readers treat it as a comment marker.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut points = [Vec2::ZERO; 3];
        let mut parts = s.split('|');
        for (i, slot) in points.iter_mut().enumerate() {
            let part = parts
                .next()
                .ok_or_else(|| format!("lane points '{s}' need 3 'x,y' pairs, found {i}"))?;
            *slot = parse_point(part).ok_or_else(|| format!("'{part}' is not an 'x,y' pair"))?;
        }
        if parts.next().is_some() {
            return Err(format!("lane points '{s}' have more than 3 'x,y' pairs"));
        }
        Ok(Self::new(points[0], points[1], points[2]))
    }

    pub fn to_ini_value(&self) -> String {
        format!(
            "{},{}|{},{}|{},{}",
            self.spawn.x, self.spawn.y, self.end.x, self.end.y, self.hit.x, self.hit.y
        )
    }
}

fn parse_point(s: &str) -> Option<Vec2> {
    let (x, y) = s.split_once(',')?;
    let x = x.trim().parse::<f32>().ok()?;
    let y = y.trim().parse::<f32>().ok()?;
    (x.is_finite() && y.is_finite()).then(|| Vec2::new(x, y))
}

/// Per-lane geometry for a song. A lane may be left unset; notes in it are
/// rejected at spawn time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LaneGeometry {
    lanes: [Option<LanePoints>; NUM_LANES],
}

// Notes travel 900 units top to bottom, which matches the default scroll
// speed of 300 units/s over a 3s lead. The receptor sits on the end point so
// a note is dead on it exactly at its chart time.
const DEFAULT_LANE_X: [f32; NUM_LANES] = [-192.0, -64.0, 64.0, 192.0];
const DEFAULT_SPAWN_Y: f32 = 600.0;
const DEFAULT_END_Y: f32 = -300.0;
const DEFAULT_HIT_Y: f32 = DEFAULT_END_Y;

impl Default for LaneGeometry {
    fn default() -> Self {
        let mut lanes = [None; NUM_LANES];
        for (slot, x) in lanes.iter_mut().zip(DEFAULT_LANE_X) {
            *slot = Some(LanePoints::new(
                Vec2::new(x, DEFAULT_SPAWN_Y),
                Vec2::new(x, DEFAULT_END_Y),
                Vec2::new(x, DEFAULT_HIT_Y),
            ));
        }
        Self { lanes }
    }
}

impl LaneGeometry {
    pub const fn empty() -> Self {
        Self {
            lanes: [None; NUM_LANES],
        }
    }

    pub fn with_lane(mut self, lane: Lane, points: LanePoints) -> Self {
        self.lanes[lane.index()] = Some(points);
        self
    }

    pub fn set(&mut self, lane: Lane, points: Option<LanePoints>) {
        self.lanes[lane.index()] = points;
    }

    #[inline(always)]
    pub fn get(&self, lane: Lane) -> Option<LanePoints> {
        self.lanes[lane.index()]
    }

    pub fn configured_lanes(&self) -> usize {
        self.lanes.iter().filter(|l| l.is_some()).count()
    }
}
