use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};

use log::{debug, warn};
use smallvec::SmallVec;

pub const NUM_LANES: usize = 4;

// Caps how much of a backlog one frame will chew through; the rest waits for
// the next drain so a flooded queue cannot stall a frame.
pub const MAX_INPUT_MESSAGES_PER_FRAME: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Lane {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
}

impl Lane {
    pub const ALL: [Self; NUM_LANES] = [Self::Left, Self::Down, Self::Up, Self::Right];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Down),
            2 => Some(Self::Up),
            3 => Some(Self::Right),
            _ => None,
        }
    }

    /// Chart lanes arrive as plain integers; anything outside 0..=3 is `None`.
    #[inline(always)]
    pub fn from_chart_lane(lane: i32) -> Option<Self> {
        usize::try_from(lane).ok().and_then(Self::from_index)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Down => "Down",
            Self::Up => "Up",
            Self::Right => "Right",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Pad,
}

impl InputSource {
    #[inline(always)]
    const fn index(self) -> usize {
        match self {
            Self::Keyboard => 0,
            Self::Pad => 1,
        }
    }
}

pub const NUM_INPUT_SOURCES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneEdge {
    pub lane: Lane,
    pub pressed: bool,
    pub source: InputSource,
}

/// Button state for all lanes at one instant, index = `Lane::index()`.
pub type LaneSnapshot = [bool; NUM_LANES];

pub type EdgeList = SmallVec<[LaneEdge; NUM_LANES * 2]>;

/// Turns per-frame boolean snapshots into press/release edges.
///
/// A snapshot yields at most one edge per lane, emitted in lane order, so
/// feeding the same sequence of snapshots always replays the same edges.
#[derive(Clone, Debug)]
pub struct EdgeDetector {
    source: InputSource,
    prev: LaneSnapshot,
}

impl EdgeDetector {
    pub const fn new(source: InputSource) -> Self {
        Self {
            source,
            prev: [false; NUM_LANES],
        }
    }

    pub fn feed(&mut self, snapshot: LaneSnapshot) -> EdgeList {
        let mut out = EdgeList::new();
        self.feed_into(snapshot, &mut out);
        out
    }

    fn feed_into(&mut self, snapshot: LaneSnapshot, out: &mut EdgeList) {
        for lane in Lane::ALL {
            let i = lane.index();
            if snapshot[i] != self.prev[i] {
                out.push(LaneEdge {
                    lane,
                    pressed: snapshot[i],
                    source: self.source,
                });
            }
        }
        self.prev = snapshot;
    }

    /// Keeps the detector in sync with an edge that bypassed it.
    fn note_edge(&mut self, edge: &LaneEdge) {
        self.prev[edge.lane.index()] = edge.pressed;
    }

    #[inline(always)]
    pub const fn state(&self) -> LaneSnapshot {
        self.prev
    }

    pub fn reset(&mut self) {
        self.prev = [false; NUM_LANES];
    }
}

#[derive(Clone, Copy, Debug)]
enum InputMessage {
    Snapshot(InputSource, LaneSnapshot),
    Edge(LaneEdge),
}

/// Producer half of the input handoff. Lives on the reader thread; never
/// touches engine state, only enqueues.
#[derive(Debug)]
pub struct InputSender {
    tx: Sender<InputMessage>,
}

impl InputSender {
    /// Returns false once the engine side has been dropped.
    pub fn send_snapshot(&self, source: InputSource, snapshot: LaneSnapshot) -> bool {
        self.tx
            .send(InputMessage::Snapshot(source, snapshot))
            .is_ok()
    }

    /// For collaborators that already debounce into edges.
    pub fn send_edge(&self, edge: LaneEdge) -> bool {
        self.tx.send(InputMessage::Edge(edge)).is_ok()
    }
}

/// Consumer half, owned by the engine thread and drained once per frame.
#[derive(Debug)]
pub struct InputReceiver {
    rx: Receiver<InputMessage>,
    detectors: [EdgeDetector; NUM_INPUT_SOURCES],
    disconnected: bool,
}

impl InputReceiver {
    pub fn drain(&mut self) -> EdgeList {
        let mut out = EdgeList::new();
        for _ in 0..MAX_INPUT_MESSAGES_PER_FRAME {
            match self.rx.try_recv() {
                Ok(InputMessage::Snapshot(source, snapshot)) => {
                    self.detectors[source.index()].feed_into(snapshot, &mut out);
                }
                Ok(InputMessage::Edge(edge)) => {
                    let detector = &mut self.detectors[edge.source.index()];
                    if detector.state()[edge.lane.index()] == edge.pressed {
                        debug!("Dropping duplicate {:?} edge on lane {}", edge.source, edge.lane);
                        continue;
                    }
                    detector.note_edge(&edge);
                    out.push(edge);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        warn!("Input producer disconnected; no further lane input will arrive.");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }
        out
    }

    /// Forgets held buttons and throws away anything still queued, e.g. across
    /// a song reset. Returns how many messages were discarded.
    pub fn reset(&mut self) -> usize {
        let discarded = self.rx.try_iter().count();
        if discarded > 0 {
            debug!("Discarded {discarded} queued input messages on reset.");
        }
        for detector in &mut self.detectors {
            detector.reset();
        }
        discarded
    }

    #[inline(always)]
    pub const fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

pub fn input_channel() -> (InputSender, InputReceiver) {
    let (tx, rx) = channel();
    (
        InputSender { tx },
        InputReceiver {
            rx,
            detectors: [
                EdgeDetector::new(InputSource::Keyboard),
                EdgeDetector::new(InputSource::Pad),
            ],
            disconnected: false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_lanes_outside_range_are_rejected() {
        assert_eq!(Lane::from_chart_lane(0), Some(Lane::Left));
        assert_eq!(Lane::from_chart_lane(3), Some(Lane::Right));
        assert_eq!(Lane::from_chart_lane(4), None);
        assert_eq!(Lane::from_chart_lane(-1), None);
    }

    #[test]
    fn edge_detector_reports_only_changes() {
        let mut det = EdgeDetector::new(InputSource::Pad);
        let edges = det.feed([true, false, false, true]);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].lane, Lane::Left);
        assert!(edges[0].pressed);
        assert_eq!(edges[1].lane, Lane::Right);

        assert!(det.feed([true, false, false, true]).is_empty(), "held buttons must not repeat");

        let edges = det.feed([false, false, false, true]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].lane, Lane::Left);
        assert!(!edges[0].pressed, "expected a release edge");
    }

    #[test]
    fn edge_detector_is_replayable() {
        let frames = [
            [false, true, false, false],
            [true, true, false, false],
            [false, false, true, false],
        ];
        let mut a = EdgeDetector::new(InputSource::Keyboard);
        let mut b = EdgeDetector::new(InputSource::Keyboard);
        for frame in frames {
            assert_eq!(a.feed(frame), b.feed(frame));
        }
    }

    #[test]
    fn channel_converts_snapshots_from_another_thread() {
        let (tx, mut rx) = input_channel();
        let handle = std::thread::spawn(move || {
            tx.send_snapshot(InputSource::Pad, [false, false, true, false]);
            tx.send_snapshot(InputSource::Pad, [false, false, false, false]);
        });
        handle.join().expect("reader thread panicked");

        let edges = rx.drain();
        assert_eq!(edges.len(), 2);
        assert!(edges[0].pressed && edges[0].lane == Lane::Up);
        assert!(!edges[1].pressed && edges[1].lane == Lane::Up);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn duplicate_edges_are_dropped() {
        let (tx, mut rx) = input_channel();
        let edge = LaneEdge {
            lane: Lane::Down,
            pressed: true,
            source: InputSource::Keyboard,
        };
        assert!(tx.send_edge(edge));
        assert!(tx.send_edge(edge));
        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn drain_is_bounded_per_frame() {
        let (tx, mut rx) = input_channel();
        for i in 0..(MAX_INPUT_MESSAGES_PER_FRAME + 10) {
            let on = i % 2 == 0;
            tx.send_snapshot(InputSource::Pad, [on, false, false, false]);
        }
        assert_eq!(rx.drain().len(), MAX_INPUT_MESSAGES_PER_FRAME);
        assert_eq!(rx.drain().len(), 10);
    }

    #[test]
    fn reset_discards_queued_snapshots() {
        let (tx, mut rx) = input_channel();
        tx.send_snapshot(InputSource::Keyboard, [true, false, false, false]);
        tx.send_snapshot(InputSource::Pad, [false, true, false, false]);
        assert_eq!(rx.reset(), 2);
        assert!(rx.drain().is_empty(), "stale held buttons must not become presses");

        tx.send_snapshot(InputSource::Keyboard, [true, false, false, false]);
        let edges = rx.drain();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].pressed && edges[0].lane == Lane::Left);
    }

    #[test]
    fn dropped_sender_is_reported_once() {
        let (tx, mut rx) = input_channel();
        drop(tx);
        assert!(rx.drain().is_empty());
        assert!(rx.is_disconnected());
    }
}
