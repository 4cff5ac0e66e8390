use crate::config::ConfigError;
use crate::game::note::{Lane, Note, Owner};
use serde::Deserialize;
use std::path::Path;

fn default_speed() -> f64 {
    1.0
}

fn default_owner() -> Owner {
    Owner::Player
}

/// One note as it appears in a chart file. Times are already resolved to
/// milliseconds; section and BPM-change bookkeeping happens upstream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartNote {
    pub lane: u8,
    pub strum_time_ms: f64,
    #[serde(default)]
    pub sustain_length_ms: f64,
    #[serde(default = "default_owner")]
    pub owner: Owner,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chart {
    pub bpm: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    pub notes: Vec<ChartNote>,
}

impl Chart {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks every note and returns them as engine notes, sorted by strum
    /// time. Ties keep chart order.
    pub fn build_notes(&self) -> Result<Vec<Note>, ConfigError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ConfigError::InvalidSpeed(self.speed));
        }
        if self.notes.is_empty() {
            return Err(ConfigError::EmptyChart);
        }

        let mut notes = Vec::with_capacity(self.notes.len());
        for (index, raw) in self.notes.iter().enumerate() {
            let lane = Lane::from_index(raw.lane as usize).ok_or(ConfigError::InvalidLane {
                index,
                lane: raw.lane,
            })?;
            if !raw.strum_time_ms.is_finite() {
                return Err(ConfigError::NonFiniteTime { index });
            }
            if !raw.sustain_length_ms.is_finite() || raw.sustain_length_ms < 0.0 {
                return Err(ConfigError::NegativeSustain {
                    index,
                    sustain: raw.sustain_length_ms,
                });
            }
            notes.push(Note::new(lane, raw.strum_time_ms, raw.sustain_length_ms, raw.owner));
        }
        notes.sort_by(|a, b| a.strum_time_ms.total_cmp(&b.strum_time_ms));
        Ok(notes)
    }
}
