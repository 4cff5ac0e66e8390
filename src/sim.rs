//! Headless frame runner. Drives the engine the way a game loop would, at a
//! fixed frame rate, with either bot play or a simulated human whose timing
//! is jittered by a seeded RNG.

use crate::config::{ConfigError, EngineConfig};
use crate::game::chart::Chart;
use crate::game::events::GameEvent;
use crate::game::gameplay::{self, State};
use crate::game::judgment::Rating;
use crate::game::note::{Lane, Owner};
use crate::game::scores::{ComboClear, Grade};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimPlayer {
    Bot,
    Human {
        /// Presses land uniformly within `±jitter_ms` of the strum time.
        jitter_ms: f64,
        /// Chance in `[0, 1]` that a note is not played at all.
        miss_chance: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimOptions {
    pub player: SimPlayer,
    pub frame_ms: f64,
    pub seed: u64,
    /// Extra time simulated past the last note before giving up.
    pub tail_ms: f64,
    pub stop_on_defeat: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            player: SimPlayer::Bot,
            frame_ms: 1000.0 / 60.0,
            seed: 0,
            tail_ms: 3000.0,
            stop_on_defeat: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimReport {
    pub score: i64,
    pub accuracy: f64,
    pub misses: u32,
    pub max_combo: u32,
    pub judgment_counts: [u32; 5],
    pub grade: Grade,
    pub full_combo: Option<ComboClear>,
    pub defeated: bool,
    pub completed: bool,
    pub frames: u64,
    pub events: usize,
}

#[derive(Clone, Copy, Debug)]
struct ScheduledEdge {
    at_ms: f64,
    lane: Lane,
    pressed: bool,
}

// Taps are released shortly after the press.
const TAP_RELEASE_MS: f64 = 40.0;

fn schedule_human(
    state: &State,
    jitter_ms: f64,
    miss_chance: f64,
    rng: &mut StdRng,
) -> Vec<ScheduledEdge> {
    let mut edges = Vec::new();
    let jitter = jitter_ms.abs();
    let miss_chance = miss_chance.clamp(0.0, 1.0);
    for note in state.timeline().notes() {
        if note.owner != Owner::Player {
            continue;
        }
        if miss_chance > 0.0 && rng.random_bool(miss_chance) {
            continue;
        }
        let offset = if jitter > 0.0 {
            rng.random_range(-jitter..=jitter)
        } else {
            0.0
        };
        let press = note.strum_time_ms + offset;
        let release = if note.is_hold() {
            note.end_time_ms() + offset.max(0.0)
        } else {
            press + TAP_RELEASE_MS
        };
        edges.push(ScheduledEdge { at_ms: press, lane: note.lane, pressed: true });
        edges.push(ScheduledEdge { at_ms: release, lane: note.lane, pressed: false });
    }
    // Releases sort ahead of presses at the same instant so back-to-back
    // notes in one lane are not eaten by the repeat-press filter.
    edges.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms).then(a.pressed.cmp(&b.pressed)));
    edges
}

pub fn run(
    chart: &Chart,
    config: &EngineConfig,
    options: &SimOptions,
) -> Result<SimReport, ConfigError> {
    if !options.frame_ms.is_finite() || options.frame_ms <= 0.0 {
        return Err(ConfigError::invalid("Sim", "FrameMs", options.frame_ms));
    }
    let mut state = gameplay::init(chart, config)?;
    let mut rng = StdRng::seed_from_u64(options.seed);

    let schedule = match options.player {
        SimPlayer::Bot => {
            gameplay::set_bot_play(&mut state, true);
            Vec::new()
        }
        SimPlayer::Human { jitter_ms, miss_chance } => {
            gameplay::set_bot_play(&mut state, false);
            schedule_human(&state, jitter_ms, miss_chance, &mut rng)
        }
    };
    info!(
        "Simulating {:?} at {:.2}ms frames, {} scheduled edges, seed {}",
        options.player,
        options.frame_ms,
        schedule.len(),
        options.seed
    );

    let stop_at = state.music_end_time_ms() + options.tail_ms;
    let mut next_edge = 0;
    let mut frames: u64 = 0;
    let mut event_count = 0;
    let mut defeated = false;
    let mut completed = false;

    loop {
        let pos = frames as f64 * options.frame_ms;
        while next_edge < schedule.len() && schedule[next_edge].at_ms <= pos {
            let edge = schedule[next_edge];
            gameplay::queue_timed_input_edge(&mut state, edge.lane, edge.pressed, edge.at_ms);
            next_edge += 1;
        }

        gameplay::update(&mut state, pos, options.frame_ms);
        frames += 1;

        for event in gameplay::drain_events(&mut state) {
            event_count += 1;
            match event {
                GameEvent::Defeated => defeated = true,
                GameEvent::SongCompleted => completed = true,
                GameEvent::Miss { note, lane, owner: Owner::Player } => {
                    debug!("sim miss: note {:?} lane {:?} at {:.1}ms", note, lane, pos);
                }
                _ => {}
            }
        }

        if completed || (defeated && options.stop_on_defeat) || pos >= stop_at {
            break;
        }
    }

    let scores = state.scores();
    let score_state = scores.state();
    let report = SimReport {
        score: score_state.score,
        accuracy: score_state.accuracy(),
        misses: score_state.misses,
        max_combo: score_state.max_combo,
        judgment_counts: score_state.judgment_counts,
        grade: scores.grade(),
        full_combo: scores.full_combo(),
        defeated,
        completed,
        frames,
        events: event_count,
    };
    info!(
        "Simulation done after {} frames: score {}, acc {:.2}%, S/G/B/Sh/M {}/{}/{}/{}/{}",
        report.frames,
        report.score,
        report.accuracy * 100.0,
        report.judgment_counts[Rating::Sick.index()],
        report.judgment_counts[Rating::Good.index()],
        report.judgment_counts[Rating::Bad.index()],
        report.judgment_counts[Rating::Shit.index()],
        report.judgment_counts[Rating::Miss.index()],
    );
    Ok(report)
}
