use crate::game::judgment::HitWindows;
use crate::game::life::LifeConfig;
use crate::game::scroll::ScrollSpeedSetting;
use configparser::ini::Ini;
use log::{debug, info, warn};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Everything that can be wrong with a chart or an engine configuration.
/// All of these are rejected before the first frame runs.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("BPM must be a positive finite number, got {0}")]
    InvalidBpm(f64),

    #[error("Chart contains no notes")]
    EmptyChart,

    #[error("Note {index}: lane {lane} is out of range (expected 0-3)")]
    InvalidLane { index: usize, lane: u8 },

    #[error("Note {index}: sustain length {sustain} must be finite and non-negative")]
    NegativeSustain { index: usize, sustain: f64 },

    #[error("Note {index}: strum time is not finite")]
    NonFiniteTime { index: usize },

    #[error("Chart scroll speed must be positive and finite, got {0}")]
    InvalidSpeed(f64),

    #[error("Hit windows must be positive and strictly ascending, got {0:?}")]
    WindowsNotAscending([f64; 4]),

    #[error("Starting health {starting} must be in (0, {max}]")]
    InvalidHealth { starting: f64, max: f64 },

    #[error("[{section}] {key}: invalid value '{value}'")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(section: &'static str, key: &'static str, value: impl fmt::Display) -> Self {
        ConfigError::InvalidValue {
            section,
            key,
            value: value.to_string(),
        }
    }
}

/// What happens when a press finds no note in range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GhostTapping {
    /// Stray presses are free.
    #[default]
    Ignore,
    /// Stray presses count as a miss for that lane.
    Miss,
}

impl fmt::Display for GhostTapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GhostTapping::Ignore => write!(f, "Ignore"),
            GhostTapping::Miss => write!(f, "Miss"),
        }
    }
}

impl FromStr for GhostTapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" | "1" | "true" => Ok(GhostTapping::Ignore),
            "miss" | "0" | "false" => Ok(GhostTapping::Miss),
            other => Err(format!("GhostTapping '{}' must be 'Ignore' or 'Miss'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub hit_windows: HitWindows,
    pub life: LifeConfig,
    pub ghost_tapping: GhostTapping,
    pub scroll_speed: ScrollSpeedSetting,
    pub bot_play: bool,
    /// Notes this far behind the song position when the spawn window reaches
    /// them are skipped instead of spawned.
    pub stale_note_ms: f64,
    /// Finished notes are dropped from the visible set this long after their
    /// end time.
    pub cull_after_ms: f64,
    /// Pixels between the spawn edge and the receptors.
    pub draw_distance_px: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hit_windows: HitWindows::default(),
            life: LifeConfig::default(),
            ghost_tapping: GhostTapping::default(),
            scroll_speed: ScrollSpeedSetting::default(),
            bot_play: false,
            stale_note_ms: 1500.0,
            cull_after_ms: 1000.0,
            draw_distance_px: 900.0,
        }
    }
}

// Thin wrapper that turns missing keys into defaults and bad values into
// ConfigError::InvalidValue.
struct IniReader<'a> {
    ini: &'a Ini,
}

impl IniReader<'_> {
    fn parse<T: FromStr>(
        &self,
        section: &'static str,
        key: &'static str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.ini.get(section, key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::invalid(section, key, raw)),
            None => {
                warn!("[{}] {} not set, using default.", section, key);
                Ok(default)
            }
        }
    }

    fn float(
        &self,
        section: &'static str,
        key: &'static str,
        default: f64,
    ) -> Result<f64, ConfigError> {
        let value = self.parse::<f64>(section, key, default)?;
        if !value.is_finite() {
            return Err(ConfigError::invalid(section, key, value));
        }
        Ok(value)
    }

    fn flag(
        &self,
        section: &'static str,
        key: &'static str,
        default: bool,
    ) -> Result<bool, ConfigError> {
        match self.ini.get(section, key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(section, key, raw)),
            },
            None => {
                warn!("[{}] {} not set, using default.", section, key);
                Ok(default)
            }
        }
    }
}

impl EngineConfig {
    /// Loads `path`. A missing file is not an error: defaults are used and a
    /// default file is written in its place for the next run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config '{}' not found, using defaults.", path.display());
            let defaults = Self::default();
            if let Err(e) = defaults.write(path) {
                warn!("Failed to create default config '{}': {}", path.display(), e);
            }
            return Ok(defaults);
        }

        let mut ini = Ini::new();
        ini.load(path).map_err(ConfigError::Load)?;
        let config = Self::from_ini(&ini)?;
        info!(
            "Loaded config '{}' (ghost tapping {}, scroll {}, bot play {}).",
            path.display(),
            config.ghost_tapping,
            config.scroll_speed,
            config.bot_play
        );
        Ok(config)
    }

    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let mut ini = Ini::new();
        ini.read(contents.to_string()).map_err(ConfigError::Load)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let d = Self::default();
        let r = IniReader { ini };

        let hit_windows = HitWindows {
            sick_ms: r.float("Timing", "SickMs", d.hit_windows.sick_ms)?,
            good_ms: r.float("Timing", "GoodMs", d.hit_windows.good_ms)?,
            bad_ms: r.float("Timing", "BadMs", d.hit_windows.bad_ms)?,
            shit_ms: r.float("Timing", "ShitMs", d.hit_windows.shit_ms)?,
            max_judge_range_ms: r.float(
                "Timing",
                "MaxJudgeRangeMs",
                d.hit_windows.max_judge_range_ms,
            )?,
            miss_grace_ms: r.float("Timing", "MissGraceMs", d.hit_windows.miss_grace_ms)?,
            max_score: r.float("Scoring", "MaxScore", d.hit_windows.max_score)?,
            min_score: r.float("Scoring", "MinScore", d.hit_windows.min_score)?,
            miss_score: r.parse("Scoring", "MissScore", d.hit_windows.miss_score)?,
            perfect_threshold_ms: r.float(
                "Scoring",
                "PerfectThresholdMs",
                d.hit_windows.perfect_threshold_ms,
            )?,
            scoring_slope: r.float("Scoring", "Slope", d.hit_windows.scoring_slope)?,
            scoring_offset_ms: r.float("Scoring", "OffsetMs", d.hit_windows.scoring_offset_ms)?,
        };

        let life = LifeConfig {
            max_health: r.float("Health", "Max", d.life.max_health)?,
            starting_health: r.float("Health", "Starting", d.life.starting_health)?,
            sick: r.float("Health", "Sick", d.life.sick)?,
            good: r.float("Health", "Good", d.life.good)?,
            bad: r.float("Health", "Bad", d.life.bad)?,
            shit: r.float("Health", "Shit", d.life.shit)?,
            miss: r.float("Health", "Miss", d.life.miss)?,
        };

        let config = Self {
            hit_windows,
            life,
            ghost_tapping: r.parse("Gameplay", "GhostTapping", d.ghost_tapping)?,
            scroll_speed: r.parse("Gameplay", "ScrollSpeed", d.scroll_speed)?,
            bot_play: r.flag("Gameplay", "BotPlay", d.bot_play)?,
            stale_note_ms: r.float("Gameplay", "StaleNoteMs", d.stale_note_ms)?,
            cull_after_ms: r.float("Gameplay", "CullAfterMs", d.cull_after_ms)?,
            draw_distance_px: r.float("Gameplay", "DrawDistancePx", d.draw_distance_px)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hit_windows.validate()?;
        self.life.validate()?;
        if self.stale_note_ms < 0.0 || !self.stale_note_ms.is_finite() {
            return Err(ConfigError::invalid("Gameplay", "StaleNoteMs", self.stale_note_ms));
        }
        if self.cull_after_ms < 0.0 || !self.cull_after_ms.is_finite() {
            return Err(ConfigError::invalid("Gameplay", "CullAfterMs", self.cull_after_ms));
        }
        if self.draw_distance_px <= 0.0 || !self.draw_distance_px.is_finite() {
            return Err(ConfigError::invalid("Gameplay", "DrawDistancePx", self.draw_distance_px));
        }
        Ok(())
    }

    /// Writes every setting to `path`, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conf = Ini::new_cs();
        let mut put = |section: &str, key: &str, value: String| {
            conf.set(section, key, Some(value));
        };
        let w = &self.hit_windows;
        put("Timing", "SickMs", w.sick_ms.to_string());
        put("Timing", "GoodMs", w.good_ms.to_string());
        put("Timing", "BadMs", w.bad_ms.to_string());
        put("Timing", "ShitMs", w.shit_ms.to_string());
        put("Timing", "MaxJudgeRangeMs", w.max_judge_range_ms.to_string());
        put("Timing", "MissGraceMs", w.miss_grace_ms.to_string());
        put("Scoring", "MaxScore", w.max_score.to_string());
        put("Scoring", "MinScore", w.min_score.to_string());
        put("Scoring", "MissScore", w.miss_score.to_string());
        put("Scoring", "PerfectThresholdMs", w.perfect_threshold_ms.to_string());
        put("Scoring", "Slope", w.scoring_slope.to_string());
        put("Scoring", "OffsetMs", w.scoring_offset_ms.to_string());
        let l = &self.life;
        put("Health", "Max", l.max_health.to_string());
        put("Health", "Starting", l.starting_health.to_string());
        put("Health", "Sick", l.sick.to_string());
        put("Health", "Good", l.good.to_string());
        put("Health", "Bad", l.bad.to_string());
        put("Health", "Shit", l.shit.to_string());
        put("Health", "Miss", l.miss.to_string());
        put("Gameplay", "GhostTapping", self.ghost_tapping.to_string());
        put("Gameplay", "ScrollSpeed", self.scroll_speed.to_string());
        put("Gameplay", "BotPlay", if self.bot_play { "1" } else { "0" }.to_string());
        put("Gameplay", "StaleNoteMs", self.stale_note_ms.to_string());
        put("Gameplay", "CullAfterMs", self.cull_after_ms.to_string());
        put("Gameplay", "DrawDistancePx", self.draw_distance_px.to_string());

        conf.write(path)?;
        debug!("Wrote config to '{}'.", path.display());
        Ok(())
    }
}
