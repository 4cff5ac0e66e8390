use crate::config::ConfigError;
use crate::game::judgment::Rating;

// Health runs from 0 to 2 with 1 as the neutral starting point, the same
// scale the health bar renders (half bar = 1.0).
pub const MAX_HEALTH: f64 = 2.0;
pub const STARTING_HEALTH: f64 = 1.0;

pub struct LifeChange;
impl LifeChange {
    pub const SICK: f64 = 0.04;
    pub const GOOD: f64 = 0.02;
    pub const BAD: f64 = 0.005;
    pub const SHIT: f64 = -0.02;
    pub const MISS: f64 = -0.1;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LifeConfig {
    pub max_health: f64,
    pub starting_health: f64,
    pub sick: f64,
    pub good: f64,
    pub bad: f64,
    pub shit: f64,
    pub miss: f64,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            max_health: MAX_HEALTH,
            starting_health: STARTING_HEALTH,
            sick: LifeChange::SICK,
            good: LifeChange::GOOD,
            bad: LifeChange::BAD,
            shit: LifeChange::SHIT,
            miss: LifeChange::MISS,
        }
    }
}

impl LifeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds_ok = self.max_health.is_finite()
            && self.max_health > 0.0
            && self.starting_health.is_finite()
            && self.starting_health > 0.0
            && self.starting_health <= self.max_health;
        if !bounds_ok {
            return Err(ConfigError::InvalidHealth {
                starting: self.starting_health,
                max: self.max_health,
            });
        }
        let deltas = [self.sick, self.good, self.bad, self.shit, self.miss];
        if deltas.iter().any(|d| !d.is_finite()) {
            return Err(ConfigError::invalid("Health", "Delta", "non-finite"));
        }
        Ok(())
    }

    pub fn delta_for(&self, rating: Rating) -> f64 {
        match rating {
            Rating::Sick => self.sick,
            Rating::Good => self.good,
            Rating::Bad => self.bad,
            Rating::Shit => self.shit,
            Rating::Miss => self.miss,
        }
    }
}
