use crate::game::judgment::{Judgment, Rating};
use crate::game::note::{Lane, Owner};

/// Everything the engine reports to the outside world. The engine pushes
/// these into its own queue during `update`; the caller drains them once per
/// frame.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Step(u64),
    Beat(u64),
    /// `note` indexes into the timeline's note list.
    Hit {
        note: usize,
        rating: Rating,
        time_diff_ms: f64,
        owner: Owner,
        lane: Lane,
    },
    /// `note` is `None` for a ghost tap under the miss policy.
    Miss {
        note: Option<usize>,
        owner: Owner,
        lane: Lane,
    },
    HoldFinished {
        note: usize,
        owner: Owner,
        lane: Lane,
    },
    HealthChanged {
        value: f64,
        max: f64,
    },
    ScoreChanged {
        score: i64,
        misses: u32,
        accuracy: f64,
    },
    Defeated,
    BotPlayChanged(bool),
    SongCompleted,
}

/// A resolved judgment that still has to reach the aggregator. Drivers and
/// the hold sweep produce these; the frame loop turns them into score,
/// health and [`GameEvent`]s in production order.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Hit {
        note: usize,
        owner: Owner,
        lane: Lane,
        judgment: Judgment,
    },
    Miss {
        note: Option<usize>,
        owner: Owner,
        lane: Lane,
    },
    HoldFinished {
        note: usize,
        owner: Owner,
        lane: Lane,
    },
}
