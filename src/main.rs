use std::path::Path;

use log::{error, info, warn};

use stepline::config::{self, Config};
use stepline::core::input::{LaneSnapshot, NUM_LANES};
use stepline::game::note::{NoteState, scroll_progress};
use stepline::{
    Chart, Engine, InputSource, JudgeTier, Lane, ManualClock, MusicClock, NoteDescriptor,
    input_channel,
};

const FRAME_RATE: f32 = 60.0;
// Runs past the last note end so trailing misses and holds settle.
const TAIL_SECONDS: f32 = 2.0;

fn demo_chart() -> Chart {
    let mut notes = Vec::new();
    for i in 0..32 {
        let time = 3.0 + i as f32 * 0.25;
        notes.push(NoteDescriptor::tap(time, i % 4));
    }
    notes.push(NoteDescriptor::hold(12.0, 1, 1.5));
    notes.push(NoteDescriptor::hold(12.0, 2, 0.75));
    Chart::new(notes)
}

/// Lanes to hold down next frame: any lane whose next ready note will be at
/// its hit point then, plus lanes with a hold still running.
fn autoplay_snapshot(engine: &Engine, next_time: f32, dt: f32) -> LaneSnapshot {
    let mut snapshot = [false; NUM_LANES];
    let lead = engine.settings().scroll.lead_time;
    for note in engine.active_notes() {
        if note.state() != NoteState::ReadyToHit || lead <= 0.0 {
            continue;
        }
        let travel = note.spawn_position.distance(note.end_position) / lead * dt;
        let p = scroll_progress(note.descriptor.time, next_time, lead);
        let next = note.spawn_position.lerp(note.end_position, p);
        if next.distance(note.hit_position) <= travel * 0.5 {
            snapshot[note.lane.index()] = true;
        }
    }
    for lane in Lane::ALL {
        if engine.active_hold(lane).is_some() {
            snapshot[lane.index()] = true;
        }
    }
    snapshot
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let config = Config::load_or_create(Path::new(config::CONFIG_PATH));
    log::set_max_level(config.log_level.as_level_filter());

    let chart = match std::env::args().nth(1) {
        Some(path) => Chart::from_json_file(Path::new(&path)).inspect_err(|e| {
            error!("Could not load chart '{path}': {e}");
        })?,
        None => {
            info!("No chart given, playing the built-in demo chart.");
            demo_chart()
        }
    };
    let song_end = chart.last_end_time() + TAIL_SECONDS;

    let clock = ManualClock::new();
    let mut engine = Engine::new(config.engine_settings(), Box::new(clock.clone()));
    engine.initialize_notes(chart, Box::new(clock.clone()));
    let (tx, rx) = input_channel();
    engine.attach_input(rx);

    let dt = 1.0 / FRAME_RATE;
    clock.play();
    while clock.track_time() < song_end {
        let report = engine.update(dt);
        for err in &report.errors {
            warn!("Frame at {:.3}s: {err}", report.track_time);
        }
        for command in engine.take_transport_requests() {
            clock.apply(command);
        }

        let next_time = clock.track_time() + dt;
        if !tx.send_snapshot(InputSource::Pad, autoplay_snapshot(&engine, next_time, dt)) {
            warn!("Engine input channel closed; stopping autoplay.");
            break;
        }
        clock.advance(dt);
    }
    clock.stop();

    let s = engine.score_state();
    info!(
        "Finished at {:.2}s: score {}, max combo {}, holds held {}/{}",
        clock.track_time(),
        s.score,
        s.max_combo,
        s.holds_held,
        s.holds_held + s.holds_let_go
    );
    for tier in JudgeTier::ALL {
        info!("  {:<9} {}", tier.as_str(), s.tier_count(tier));
    }
    Ok(())
}
