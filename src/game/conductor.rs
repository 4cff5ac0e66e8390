use crate::config::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Step(u64),
    Beat(u64),
}

/// Converts the audio clock into step/beat ticks.
///
/// The position is never advanced by the conductor itself; it is whatever
/// the caller last passed to [`Conductor::update_from_song`]. Ticks fire only
/// when the step index grows, so a seek forward fires a single step and a
/// seek backward stalls until the old index is passed again.
#[derive(Clone, Debug)]
pub struct Conductor {
    bpm: f64,
    crochet_ms: f64,
    step_crochet_ms: f64,
    song_position_ms: f64,
    last_step: u64,
    last_beat: u64,
}

impl Conductor {
    pub fn new(bpm: f64) -> Result<Self, ConfigError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(ConfigError::InvalidBpm(bpm));
        }
        let crochet_ms = 60_000.0 / bpm;
        Ok(Self {
            bpm,
            crochet_ms,
            step_crochet_ms: crochet_ms / 4.0,
            song_position_ms: 0.0,
            last_step: 0,
            last_beat: 0,
        })
    }

    pub fn update_from_song(&mut self, song_position_ms: f64) -> Vec<Tick> {
        self.song_position_ms = song_position_ms;
        let mut ticks = Vec::new();
        if !song_position_ms.is_finite() || song_position_ms < 0.0 {
            return ticks;
        }

        let new_step = (song_position_ms / self.step_crochet_ms).floor() as u64;
        if new_step > self.last_step {
            self.last_step = new_step;
            ticks.push(Tick::Step(new_step));

            let new_beat = new_step / 4;
            if new_beat > self.last_beat {
                self.last_beat = new_beat;
                ticks.push(Tick::Beat(new_beat));
            }
        }
        ticks
    }

    pub fn reset(&mut self) {
        self.song_position_ms = 0.0;
        self.last_step = 0;
        self.last_beat = 0;
    }

    #[inline(always)]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    #[inline(always)]
    pub fn crochet_ms(&self) -> f64 {
        self.crochet_ms
    }

    #[inline(always)]
    pub fn step_crochet_ms(&self) -> f64 {
        self.step_crochet_ms
    }

    #[inline(always)]
    pub fn song_position_ms(&self) -> f64 {
        self.song_position_ms
    }

    #[inline(always)]
    pub fn last_step(&self) -> u64 {
        self.last_step
    }

    #[inline(always)]
    pub fn last_beat(&self) -> u64 {
        self.last_beat
    }

    /// Fractional beat at the current position, for animation sync.
    pub fn current_beat(&self) -> f64 {
        (self.song_position_ms / self.crochet_ms).max(0.0)
    }
}
