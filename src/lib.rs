//! Rhythm timing and judgment engine.
//!
//! The engine is advanced once per rendered frame with the authoritative
//! song position. Everything it decides (ticks, hits, misses, health and
//! score changes) comes back out as [`game::events::GameEvent`] values that
//! the caller drains after each frame.

pub mod config;
pub mod game;
pub mod sim;

pub use config::{ConfigError, EngineConfig, GhostTapping};
pub use game::chart::{Chart, ChartNote};
pub use game::events::GameEvent;
pub use game::gameplay::{
    State, drain_events, init, queue_input_edge, queue_timed_input_edge, reset, set_bot_play,
    update,
};
pub use game::note::{Lane, Owner};
