use thiserror::Error;

/// Everything the engine can report. Only the loading surfaces return these
/// as `Err`; per-frame conditions are collected into a `StepReport` instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A chart descriptor could not be spawned (bad lane, bad time, or the lane
    /// has no geometry). The song keeps playing without that note.
    #[error("Configuration error: note #{index} (lane {lane}): {reason}")]
    Configuration {
        index: usize,
        lane: i32,
        reason: String,
    },

    /// The transport clock went backwards.
    #[error("Clock anomaly: track time moved from {previous:.3}s back to {current:.3}s")]
    ClockAnomaly { previous: f32, current: f32 },

    /// The transport reported that it is no longer playing mid-song.
    #[error("Clock anomaly: transport stopped at {at:.3}s")]
    TransportStopped { at: f32 },

    /// A lane press found nothing to judge; resolved as a global Miss.
    #[error("No candidate note in lane {lane}")]
    NoCandidateInLane { lane: usize },

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
