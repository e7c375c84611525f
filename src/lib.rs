//! Timing core of a four-lane rhythm game: note scheduling against the audio
//! clock, lane-press judgment and score/combo tracking.

pub mod config;
pub mod core;
pub mod error;
pub mod game;

pub use crate::config::Config;
pub use crate::core::audio::{ManualClock, MusicClock, TransportCommand};
pub use crate::core::input::{InputSource, Lane, LaneEdge, input_channel};
pub use crate::error::{EngineError, EngineResult};
pub use crate::game::chart::Chart;
pub use crate::game::gameplay::{Engine, EngineSettings};
pub use crate::game::judgment::{JudgmentPolicy, Outcome};
pub use crate::game::note::{NoteDescriptor, NoteId, NoteKind, NoteState};
pub use crate::game::scores::ScoreState;
pub use crate::game::scroll::StepReport;
pub use crate::game::timing_windows::JudgeTier;
