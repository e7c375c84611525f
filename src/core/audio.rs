use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Read-only view of the playback transport. The engine schedules everything
/// off `track_time`; it never drives playback through this trait.
pub trait MusicClock {
    /// Current playback position in seconds.
    fn track_time(&self) -> f32;
    fn is_playing(&self) -> bool;
}

/// Requests the engine hands back to whoever owns playback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransportCommand {
    /// Stop and start again from `0.0`.
    Restart,
}

/// A transport whose position is set by hand. Cloning shares the same clock,
/// so a test (or the headless runner) can keep one handle and give the other
/// to the engine. Position is stored as f32 bits in an atomic so an audio
/// thread could publish it.
#[derive(Clone, Debug)]
pub struct ManualClock {
    time_bits: Arc<AtomicU32>,
    playing: Arc<AtomicBool>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            time_bits: Arc::new(AtomicU32::new(0.0_f32.to_bits())),
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn playing_at(time: f32) -> Self {
        let clock = Self::new();
        clock.set_time(time);
        clock.play();
        clock
    }

    pub fn set_time(&self, time: f32) {
        self.time_bits.store(time.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, dt: f32) {
        self.set_time(self.track_time() + dt);
    }

    pub fn play(&self) {
        self.playing.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Release);
    }

    /// Applies a command the engine issued.
    pub fn apply(&self, command: TransportCommand) {
        match command {
            TransportCommand::Restart => {
                self.set_time(0.0);
                self.play();
            }
        }
    }
}

impl MusicClock for ManualClock {
    #[inline(always)]
    fn track_time(&self) -> f32 {
        f32::from_bits(self.time_bits.load(Ordering::Acquire))
    }

    #[inline(always)]
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_position() {
        let clock = ManualClock::playing_at(1.25);
        let engine_side = clock.clone();
        clock.advance(0.5);
        assert!((engine_side.track_time() - 1.75).abs() <= 1e-6);
        clock.stop();
        assert!(!engine_side.is_playing());
    }

    #[test]
    fn restart_rewinds_and_plays() {
        let clock = ManualClock::new();
        clock.set_time(42.0);
        clock.apply(TransportCommand::Restart);
        assert_eq!(clock.track_time(), 0.0);
        assert!(clock.is_playing());
    }
}
