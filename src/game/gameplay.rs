use crate::config::{ConfigError, EngineConfig};
use crate::game::chart::Chart;
use crate::game::conductor::{Conductor, Tick};
use crate::game::events::{GameEvent, Outcome};
use crate::game::hold::HoldRegistry;
use crate::game::input::{BotInput, Driver, InputDriver, InputEdge, Playfield};
use crate::game::note::{Lane, Owner};
use crate::game::scores::ScoreAggregator;
use crate::game::timeline::{NoteTimeline, VisibleNote};
use log::{debug, info, trace};
use std::collections::VecDeque;

pub struct State {
    config: EngineConfig,
    chart_speed: f64,
    conductor: Conductor,
    timeline: NoteTimeline,
    player_holds: HoldRegistry,
    opponent_holds: HoldRegistry,
    driver: Driver,
    opponent: BotInput,
    scores: ScoreAggregator,

    lead_time_ms: f64,
    music_end_time_ms: f64,
    song_completed: bool,

    pending_edges: VecDeque<InputEdge>,
    outcomes: Vec<Outcome>,
    events: Vec<GameEvent>,

    log_timer: f64,
}

impl State {
    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline(always)]
    pub fn conductor(&self) -> &Conductor {
        &self.conductor
    }

    #[inline(always)]
    pub fn timeline(&self) -> &NoteTimeline {
        &self.timeline
    }

    #[inline(always)]
    pub fn lead_time_ms(&self) -> f64 {
        self.lead_time_ms
    }

    #[inline(always)]
    pub fn music_end_time_ms(&self) -> f64 {
        self.music_end_time_ms
    }

    #[inline(always)]
    pub fn scores(&self) -> &ScoreAggregator {
        &self.scores
    }

    #[inline(always)]
    pub fn player_holds(&self) -> &HoldRegistry {
        &self.player_holds
    }

    #[inline(always)]
    pub fn is_bot_play(&self) -> bool {
        self.driver.is_bot()
    }

    #[inline(always)]
    pub fn song_completed(&self) -> bool {
        self.song_completed
    }

    #[inline(always)]
    pub fn chart_speed(&self) -> f64 {
        self.chart_speed
    }

    /// Scroll positions of the live notes of one strumline at the current
    /// song position.
    pub fn visible_notes(&self, owner: Owner) -> Vec<VisibleNote> {
        self.timeline.visible(
            owner,
            self.conductor.song_position_ms(),
            self.config.scroll_speed,
            self.chart_speed,
        )
    }
}

pub fn init(chart: &Chart, config: &EngineConfig) -> Result<State, ConfigError> {
    config.validate()?;
    let conductor = Conductor::new(chart.bpm)?;
    let notes = chart.build_notes()?;
    let timeline = NoteTimeline::new(notes);

    let mut lead_time_ms = config
        .scroll_speed
        .travel_time_ms(config.draw_distance_px, chart.speed);
    if !lead_time_ms.is_finite() || lead_time_ms <= 0.0 {
        return Err(ConfigError::invalid("Gameplay", "ScrollSpeed", config.scroll_speed));
    }
    // Never spawn later than the judge can reach.
    lead_time_ms = lead_time_ms.max(config.hit_windows.max_judge_range_ms);

    let music_end_time_ms = timeline.end_time_ms();
    let player_notes = timeline.notes().iter().filter(|n| n.owner == Owner::Player).count();
    info!(
        "Gameplay init: {} notes ({} player), BPM {:.1}, speed {:.2} ({}), lead {:.0}ms",
        timeline.len(),
        player_notes,
        chart.bpm,
        chart.speed,
        config.scroll_speed,
        lead_time_ms
    );
    info!(
        "Song ends at {:.0}ms, bot play {}",
        music_end_time_ms, config.bot_play
    );

    Ok(State {
        config: config.clone(),
        chart_speed: chart.speed,
        conductor,
        timeline,
        player_holds: HoldRegistry::new(Owner::Player),
        opponent_holds: HoldRegistry::new(Owner::Opponent),
        driver: Driver::new(config.bot_play, config.ghost_tapping),
        opponent: BotInput,
        scores: ScoreAggregator::new(config.hit_windows, config.life),
        lead_time_ms,
        music_end_time_ms,
        song_completed: false,
        pending_edges: VecDeque::new(),
        outcomes: Vec::new(),
        events: Vec::new(),
        log_timer: 0.0,
    })
}

/// Queues a lane edge to be judged at the next frame's song position.
pub fn queue_input_edge(state: &mut State, lane: Lane, pressed: bool) {
    state.pending_edges.push_back(InputEdge {
        lane,
        pressed,
        song_time_ms: None,
    });
}

/// Queues a lane edge that happened at a known song position between
/// frames. It is judged at that position, never later than the frame.
pub fn queue_timed_input_edge(state: &mut State, lane: Lane, pressed: bool, song_time_ms: f64) {
    state.pending_edges.push_back(InputEdge {
        lane,
        pressed,
        song_time_ms: Some(song_time_ms),
    });
}

pub fn drain_events(state: &mut State) -> Vec<GameEvent> {
    std::mem::take(&mut state.events)
}

/// Hands the player strumline to the bot or back. Holds owned by the
/// outgoing driver are released first, using the outgoing driver's rules.
pub fn set_bot_play(state: &mut State, enabled: bool) {
    if state.driver.is_bot() == enabled {
        return;
    }
    let now_ms = state.conductor.song_position_ms();
    {
        let mut field = Playfield {
            timeline: &mut state.timeline,
            holds: &mut state.player_holds,
            windows: &state.config.hit_windows,
            out: &mut state.outcomes,
        };
        state.driver.disengage(&mut field, now_ms);
    }
    apply_outcomes(state);

    if !state.pending_edges.is_empty() {
        trace!("Dropping {} queued edges on driver change", state.pending_edges.len());
        state.pending_edges.clear();
    }
    state.driver = Driver::new(enabled, state.config.ghost_tapping);
    info!("Bot play {} at {:.1}ms.", if enabled { "enabled" } else { "disabled" }, now_ms);
    state.events.push(GameEvent::BotPlayChanged(enabled));
}

/// Rewinds the session to its initial state in one call.
pub fn reset(state: &mut State) {
    state.conductor.reset();
    state.timeline.reset();
    state.player_holds.clear();
    state.opponent_holds.clear();
    state.scores.reset();
    state.driver = Driver::new(state.driver.is_bot(), state.config.ghost_tapping);
    state.pending_edges.clear();
    state.outcomes.clear();
    state.events.clear();
    state.song_completed = false;
    state.log_timer = 0.0;
    debug!("Gameplay state reset.");
}

fn apply_outcomes(state: &mut State) {
    for outcome in state.outcomes.drain(..) {
        let player_result = match outcome {
            Outcome::Hit {
                note,
                owner,
                lane,
                judgment,
            } => {
                state.events.push(GameEvent::Hit {
                    note,
                    rating: judgment.rating,
                    time_diff_ms: judgment.time_diff_ms,
                    owner,
                    lane,
                });
                (owner == Owner::Player)
                    .then(|| state.scores.on_hit(judgment.rating, judgment.time_diff_ms))
            }
            Outcome::Miss { note, owner, lane } => {
                state.events.push(GameEvent::Miss { note, owner, lane });
                (owner == Owner::Player).then(|| state.scores.on_miss())
            }
            Outcome::HoldFinished { note, owner, lane } => {
                state.events.push(GameEvent::HoldFinished { note, owner, lane });
                None
            }
        };

        if let Some(snapshot) = player_result {
            state.events.push(GameEvent::HealthChanged {
                value: state.scores.health(),
                max: state.scores.max_health(),
            });
            state.events.push(GameEvent::ScoreChanged {
                score: snapshot.score,
                misses: snapshot.misses,
                accuracy: snapshot.accuracy,
            });
            if state.scores.take_defeat() {
                state.events.push(GameEvent::Defeated);
            }
        }
    }
}

#[inline(always)]
fn process_input_edges(state: &mut State, song_position_ms: f64) {
    let mut field = Playfield {
        timeline: &mut state.timeline,
        holds: &mut state.player_holds,
        windows: &state.config.hit_windows,
        out: &mut state.outcomes,
    };
    while let Some(edge) = state.pending_edges.pop_front() {
        let at = edge
            .song_time_ms
            .map_or(song_position_ms, |t| t.min(song_position_ms));
        if edge.pressed {
            state.driver.press(&mut field, edge.lane, at);
        } else {
            state.driver.release(&mut field, edge.lane, at);
        }
    }
}

pub fn update(state: &mut State, song_position_ms: f64, delta_ms: f64) {
    for tick in state.conductor.update_from_song(song_position_ms) {
        state.events.push(match tick {
            Tick::Step(step) => GameEvent::Step(step),
            Tick::Beat(beat) => GameEvent::Beat(beat),
        });
    }
    let now = state.conductor.song_position_ms();

    state
        .timeline
        .spawn(now, state.lead_time_ms, state.config.stale_note_ms);

    state
        .player_holds
        .finish_due(&mut state.timeline, now, &mut state.outcomes);
    state
        .opponent_holds
        .finish_due(&mut state.timeline, now, &mut state.outcomes);

    {
        let mut field = Playfield {
            timeline: &mut state.timeline,
            holds: &mut state.player_holds,
            windows: &state.config.hit_windows,
            out: &mut state.outcomes,
        };
        state.driver.passive_sweep(&mut field, now);
    }

    process_input_edges(state, now);

    {
        let mut field = Playfield {
            timeline: &mut state.timeline,
            holds: &mut state.player_holds,
            windows: &state.config.hit_windows,
            out: &mut state.outcomes,
        };
        state.driver.autoplay(&mut field, now);

        let mut opponent_field = Playfield {
            timeline: &mut state.timeline,
            holds: &mut state.opponent_holds,
            windows: &state.config.hit_windows,
            out: &mut state.outcomes,
        };
        state.opponent.autoplay(&mut opponent_field, now);
    }

    apply_outcomes(state);

    state.timeline.cull(now, state.config.cull_after_ms);

    if !state.song_completed
        && now >= state.music_end_time_ms
        && state.timeline.is_exhausted()
        && state.player_holds.active_count() == 0
        && state.opponent_holds.active_count() == 0
    {
        state.song_completed = true;
        let score = state.scores.state();
        info!(
            "Song completed: score {}, accuracy {:.2}%, misses {}, max combo {}, grade {:?}",
            score.score,
            score.accuracy() * 100.0,
            score.misses,
            score.max_combo,
            state.scores.grade()
        );
        state.events.push(GameEvent::SongCompleted);
    }

    state.log_timer += delta_ms;
    if state.log_timer >= 1000.0 {
        let score = state.scores.state();
        info!(
            "Beat: {:.2}, Time: {:.0}ms, Combo: {}, Misses: {}, Health: {:.2}, Active Arrows: {}",
            state.conductor.current_beat(),
            now,
            score.combo,
            score.misses,
            score.health,
            state.timeline.live_count()
        );
        state.log_timer -= 1000.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GhostTapping;
    use crate::game::chart::ChartNote;
    use crate::game::judgment::Rating;
    use crate::game::life::LifeConfig;
    use crate::game::note::NoteState;
    use crate::game::scroll::ScrollSpeedSetting;

    fn note(lane: u8, t: f64, sustain: f64, owner: Owner) -> ChartNote {
        ChartNote {
            lane,
            strum_time_ms: t,
            sustain_length_ms: sustain,
            owner,
        }
    }

    fn chart(bpm: f64, notes: Vec<ChartNote>) -> Chart {
        Chart {
            bpm,
            speed: 1.0,
            notes,
        }
    }

    fn count(events: &[GameEvent], pred: impl Fn(&GameEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(*e)).count()
    }

    #[test]
    fn init_rejects_bad_charts() {
        let config = EngineConfig::default();
        assert!(matches!(
            init(&chart(0.0, vec![note(0, 0.0, 0.0, Owner::Player)]), &config),
            Err(ConfigError::InvalidBpm(_))
        ));
        assert!(matches!(init(&chart(120.0, vec![]), &config), Err(ConfigError::EmptyChart)));
    }

    #[test]
    fn lead_and_end_times_come_from_chart_and_scroll() {
        let notes = vec![
            note(0, 1000.0, 0.0, Owner::Player),
            note(1, 2000.0, 500.0, Owner::Opponent),
        ];
        let state = init(&chart(120.0, notes.clone()), &EngineConfig::default()).unwrap();
        assert!((state.lead_time_ms() - 2000.0).abs() < 1e-6);
        assert_eq!(state.music_end_time_ms(), 2500.0);

        // Fast scroll would spawn inside the judge range without the floor.
        let config = EngineConfig {
            scroll_speed: ScrollSpeedSetting::CMod(90_000.0),
            ..EngineConfig::default()
        };
        let state = init(&chart(120.0, notes), &config).unwrap();
        assert_eq!(state.lead_time_ms(), config.hit_windows.max_judge_range_ms);
    }

    #[test]
    fn steps_fire_once_per_boundary() {
        let mut state =
            init(&chart(100.0, vec![note(0, 5000.0, 0.0, Owner::Player)]), &EngineConfig::default())
                .unwrap();
        let mut steps = Vec::new();
        for pos in [0.0, 140.0, 150.0, 151.0] {
            update(&mut state, pos, 16.0);
            steps.extend(
                drain_events(&mut state)
                    .into_iter()
                    .filter(|e| matches!(e, GameEvent::Step(_) | GameEvent::Beat(_))),
            );
        }
        assert_eq!(steps, vec![GameEvent::Step(1)]);
    }

    #[test]
    fn three_passive_misses_from_max_health() {
        let config = EngineConfig {
            life: LifeConfig {
                starting_health: 2.0,
                ..LifeConfig::default()
            },
            ..EngineConfig::default()
        };
        let notes = (0..3)
            .map(|i| note(0, 1000.0 + i as f64 * 100.0, 0.0, Owner::Player))
            .collect();
        let mut state = init(&chart(120.0, notes), &config).unwrap();
        update(&mut state, 0.0, 16.0);
        update(&mut state, 2000.0, 16.0);
        let events = drain_events(&mut state);

        assert_eq!(count(&events, |e| matches!(e, GameEvent::Miss { note: Some(_), .. })), 3);
        assert!((state.scores().health() - 1.7).abs() < 1e-9);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::Defeated)), 0);
        assert!(state.timeline().notes().iter().all(|n| n.state() == NoteState::Missed));
    }

    #[test]
    fn lethal_misses_clamp_and_defeat_once() {
        let config = EngineConfig {
            life: LifeConfig {
                starting_health: 2.0,
                miss: -0.9,
                ..LifeConfig::default()
            },
            ..EngineConfig::default()
        };
        let notes = (0..4).map(|i| note(1, 1000.0 + i as f64 * 50.0, 0.0, Owner::Player)).collect();
        let mut state = init(&chart(120.0, notes), &config).unwrap();
        update(&mut state, 0.0, 16.0);
        update(&mut state, 2000.0, 16.0);
        let events = drain_events(&mut state);

        assert_eq!(state.scores().health(), 0.0);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::Defeated)), 1);
        let last_health = events.iter().rev().find_map(|e| match e {
            GameEvent::HealthChanged { value, .. } => Some(*value),
            _ => None,
        });
        assert_eq!(last_health, Some(0.0));
    }

    #[test]
    fn held_hold_finishes_once_without_extra_judgments() {
        let notes = vec![note(2, 1000.0, 500.0, Owner::Player)];
        let mut state = init(&chart(120.0, notes), &EngineConfig::default()).unwrap();
        update(&mut state, 0.0, 16.0);
        queue_input_edge(&mut state, Lane::Up, true);
        update(&mut state, 1000.0, 16.0);
        drain_events(&mut state);

        for pos in [1200.0, 1499.0, 1500.0, 1600.0, 1700.0] {
            update(&mut state, pos, 16.0);
        }
        let events = drain_events(&mut state);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::HoldFinished { note: 0, .. })), 1);
        let judged = count(&events, |e| {
            matches!(e, GameEvent::Hit { .. } | GameEvent::Miss { .. })
        });
        assert_eq!(judged, 0);
        assert_eq!(state.timeline().note(0).state(), NoteState::Finished);

        // Releasing after the fact changes nothing.
        queue_input_edge(&mut state, Lane::Up, false);
        update(&mut state, 1710.0, 16.0);
        assert!(
            drain_events(&mut state)
                .iter()
                .all(|e| matches!(e, GameEvent::Step(_) | GameEvent::Beat(_)))
        );
    }

    #[test]
    fn bot_toggle_releases_human_hold_first() {
        let notes = vec![note(1, 1000.0, 1000.0, Owner::Player)];
        let mut state = init(&chart(120.0, notes), &EngineConfig::default()).unwrap();
        update(&mut state, 0.0, 16.0);
        queue_input_edge(&mut state, Lane::Down, true);
        update(&mut state, 1000.0, 16.0);
        drain_events(&mut state);
        assert!(state.timeline().note(0).is_being_held());

        update(&mut state, 1300.0, 16.0);
        drain_events(&mut state);
        set_bot_play(&mut state, true);
        let events = drain_events(&mut state);

        let miss_at = events
            .iter()
            .position(|e| matches!(e, GameEvent::Miss { note: Some(0), .. }))
            .unwrap();
        let toggle_at = events
            .iter()
            .position(|e| *e == GameEvent::BotPlayChanged(true))
            .unwrap();
        assert!(miss_at < toggle_at);
        assert_eq!(state.timeline().note(0).state(), NoteState::ReleasedEarly);
        assert_eq!(state.player_holds().active_count(), 0);
        assert!(state.is_bot_play());
    }

    #[test]
    fn bot_to_human_completes_the_hold() {
        let config = EngineConfig {
            bot_play: true,
            ..EngineConfig::default()
        };
        let notes = vec![note(3, 1000.0, 1000.0, Owner::Player)];
        let mut state = init(&chart(120.0, notes), &config).unwrap();
        update(&mut state, 0.0, 16.0);
        update(&mut state, 1000.0, 16.0);
        update(&mut state, 1100.0, 16.0);
        drain_events(&mut state);

        set_bot_play(&mut state, false);
        let events = drain_events(&mut state);
        assert_eq!(
            events[0],
            GameEvent::HoldFinished { note: 0, owner: Owner::Player, lane: Lane::Right }
        );
        assert_eq!(events[1], GameEvent::BotPlayChanged(false));
        assert!(!state.is_bot_play());
    }

    #[test]
    fn bot_play_clears_chart_perfectly() {
        let config = EngineConfig {
            bot_play: true,
            ..EngineConfig::default()
        };
        let notes = vec![
            note(0, 500.0, 0.0, Owner::Player),
            note(1, 750.0, 300.0, Owner::Player),
            note(2, 1000.0, 0.0, Owner::Player),
        ];
        let mut state = init(&chart(120.0, notes), &config).unwrap();
        let mut events = Vec::new();
        let mut pos = 0.0;
        while pos <= 2500.0 {
            update(&mut state, pos, 16.0);
            events.extend(drain_events(&mut state));
            pos += 16.0;
        }

        let ratings: Vec<Rating> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::Hit { rating, time_diff_ms, .. } => {
                    assert_eq!(*time_diff_ms, 0.0);
                    Some(*rating)
                }
                _ => None,
            })
            .collect();
        assert_eq!(ratings, vec![Rating::Sick; 3]);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::Miss { .. })), 0);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::HoldFinished { .. })), 1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::SongCompleted)), 1);
        assert_eq!(state.scores().state().score, 1500);
        assert_eq!(state.scores().state().max_combo, 3);
    }

    #[test]
    fn human_edges_are_ignored_during_bot_play() {
        let config = EngineConfig {
            bot_play: true,
            ghost_tapping: GhostTapping::Miss,
            ..EngineConfig::default()
        };
        let mut state =
            init(&chart(120.0, vec![note(0, 5000.0, 0.0, Owner::Player)]), &config).unwrap();
        queue_input_edge(&mut state, Lane::Left, true);
        update(&mut state, 100.0, 16.0);
        let events = drain_events(&mut state);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::Miss { .. })), 0);
    }

    #[test]
    fn opponent_is_autoplayed_without_scoring() {
        let notes = vec![
            note(0, 500.0, 0.0, Owner::Opponent),
            note(1, 600.0, 200.0, Owner::Opponent),
        ];
        let mut state = init(&chart(120.0, notes), &EngineConfig::default()).unwrap();
        update(&mut state, 0.0, 16.0);
        update(&mut state, 600.0, 16.0);
        update(&mut state, 900.0, 16.0);
        let events = drain_events(&mut state);

        assert_eq!(
            count(&events, |e| matches!(e, GameEvent::Hit { owner: Owner::Opponent, .. })),
            2
        );
        let finished = count(&events, |e| {
            matches!(e, GameEvent::HoldFinished { owner: Owner::Opponent, .. })
        });
        assert_eq!(finished, 1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::ScoreChanged { .. })), 0);
        assert_eq!(state.scores().state().total_played, 0);
    }

    #[test]
    fn ghost_tap_miss_policy_reports_lane_miss() {
        let config = EngineConfig {
            ghost_tapping: GhostTapping::Miss,
            ..EngineConfig::default()
        };
        let mut state =
            init(&chart(120.0, vec![note(0, 5000.0, 0.0, Owner::Player)]), &config).unwrap();
        queue_input_edge(&mut state, Lane::Right, true);
        update(&mut state, 100.0, 16.0);
        let events = drain_events(&mut state);
        assert!(events.contains(&GameEvent::Miss {
            note: None,
            owner: Owner::Player,
            lane: Lane::Right
        }));
        assert_eq!(state.scores().state().misses, 1);
    }

    #[test]
    fn timed_edges_are_judged_at_their_own_position() {
        let mut state =
            init(&chart(120.0, vec![note(0, 1000.0, 0.0, Owner::Player)]), &EngineConfig::default())
                .unwrap();
        update(&mut state, 0.0, 16.0);
        queue_timed_input_edge(&mut state, Lane::Left, true, 1002.0);
        update(&mut state, 1100.0, 16.0);
        let events = drain_events(&mut state);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Hit { rating: Rating::Sick, time_diff_ms, .. }
                if (*time_diff_ms - 2.0).abs() < 1e-9
        )));
    }

    #[test]
    fn seeking_past_old_notes_does_not_miss_them() {
        let notes = vec![note(0, 1000.0, 0.0, Owner::Player), note(1, 9000.0, 0.0, Owner::Player)];
        let mut state = init(&chart(120.0, notes), &EngineConfig::default()).unwrap();
        update(&mut state, 5000.0, 16.0);
        let events = drain_events(&mut state);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::Miss { .. })), 0);
        assert_eq!(state.timeline().skipped(), 1);
    }

    #[test]
    fn reset_replays_identically() {
        let notes = vec![note(0, 500.0, 0.0, Owner::Player), note(2, 800.0, 0.0, Owner::Opponent)];
        let mut state = init(&chart(100.0, notes), &EngineConfig::default()).unwrap();
        let run = |state: &mut State| {
            let mut all = Vec::new();
            for pos in [0.0, 300.0, 505.0, 900.0, 1500.0] {
                if pos == 505.0 {
                    queue_input_edge(state, Lane::Left, true);
                }
                update(state, pos, 16.0);
                all.extend(drain_events(state));
            }
            all
        };
        let first = run(&mut state);
        reset(&mut state);
        assert_eq!(state.scores().state().score, 0);
        assert_eq!(state.conductor().last_step(), 0);
        let second = run(&mut state);
        assert_eq!(first, second);
    }
}
