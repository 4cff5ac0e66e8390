use crate::game::judgment::{HitWindows, Rating};
use crate::game::life::LifeConfig;
use log::{debug, info};
use std::fmt;

// --- Grade Definitions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    Perfect,
    Sick,
    Great,
    Good,
    Meh,
    Bad,
    Failed,
}

impl Grade {
    pub const fn label(self) -> &'static str {
        match self {
            Grade::Perfect => "Perfect!!",
            Grade::Sick => "Sick!",
            Grade::Great => "Great",
            Grade::Good => "Good",
            Grade::Meh => "Meh",
            Grade::Bad => "Bad",
            Grade::Failed => "Failed",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps accuracy in `[0, 1]` to a rating grade. Never returns `Failed`;
/// that one comes from running out of health.
pub fn accuracy_to_grade(accuracy: f64) -> Grade {
    if accuracy >= 1.00 { Grade::Perfect }
    else if accuracy >= 0.95 { Grade::Sick }
    else if accuracy >= 0.90 { Grade::Great }
    else if accuracy >= 0.80 { Grade::Good }
    else if accuracy >= 0.70 { Grade::Meh }
    else { Grade::Bad }
}

/// Full-combo tier, named after the worst judgment inside the combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboClear {
    /// Every note Sick.
    Sick,
    /// Nothing worse than Good.
    Good,
    /// No combo breaks.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSnapshot {
    pub score: i64,
    pub misses: u32,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreState {
    pub score: i64,
    pub misses: u32,
    pub hits: u32,
    pub total_played: u32,
    pub accuracy_points: f64,
    pub health: f64,
    pub combo: u32,
    pub max_combo: u32,
    pub judgment_counts: [u32; 5],
    pub full_combo_rating: Option<Rating>,
    pub combo_broken: bool,
    pub defeated: bool,
}

impl ScoreState {
    fn new(starting_health: f64) -> Self {
        Self {
            score: 0,
            misses: 0,
            hits: 0,
            total_played: 0,
            accuracy_points: 0.0,
            health: starting_health,
            combo: 0,
            max_combo: 0,
            judgment_counts: [0; 5],
            full_combo_rating: None,
            combo_broken: false,
            defeated: false,
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_played == 0 {
            0.0
        } else {
            self.accuracy_points / self.total_played as f64
        }
    }

    #[inline(always)]
    pub fn count(&self, rating: Rating) -> u32 {
        self.judgment_counts[rating.index()]
    }
}

/// The only writer of [`ScoreState`]. Every player judgment passes through
/// `on_hit` or `on_miss` exactly once.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    windows: HitWindows,
    life: LifeConfig,
    state: ScoreState,
    defeat_pending: bool,
}

impl ScoreAggregator {
    pub fn new(windows: HitWindows, life: LifeConfig) -> Self {
        Self {
            windows,
            life,
            state: ScoreState::new(life.starting_health),
            defeat_pending: false,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> &ScoreState {
        &self.state
    }

    #[inline(always)]
    pub fn health(&self) -> f64 {
        self.state.health
    }

    #[inline(always)]
    pub fn max_health(&self) -> f64 {
        self.life.max_health
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        ScoreSnapshot {
            score: self.state.score,
            misses: self.state.misses,
            accuracy: self.state.accuracy(),
        }
    }

    pub fn on_hit(&mut self, rating: Rating, time_diff_ms: f64) -> ScoreSnapshot {
        if rating == Rating::Miss {
            return self.on_miss();
        }
        let points = self.windows.score_note(time_diff_ms);
        self.add_score(points);
        self.state.hits += 1;
        self.record(rating);

        if rating.breaks_combo() {
            self.break_combo();
        } else {
            self.state.combo += 1;
            self.state.max_combo = self.state.max_combo.max(self.state.combo);
            if !self.state.combo_broken {
                let worst = self
                    .state
                    .full_combo_rating
                    .map_or(rating, |current| current.max(rating));
                self.state.full_combo_rating = Some(worst);
            }
        }
        self.apply_health(self.life.delta_for(rating));
        self.snapshot()
    }

    pub fn on_miss(&mut self) -> ScoreSnapshot {
        self.add_score(self.windows.miss_score);
        self.state.misses += 1;
        self.record(Rating::Miss);
        self.break_combo();
        self.apply_health(self.life.miss);
        self.snapshot()
    }

    /// True exactly once: the first time health reaches zero.
    pub fn take_defeat(&mut self) -> bool {
        std::mem::take(&mut self.defeat_pending)
    }

    pub fn grade(&self) -> Grade {
        if self.state.defeated {
            Grade::Failed
        } else {
            accuracy_to_grade(self.state.accuracy())
        }
    }

    pub fn full_combo(&self) -> Option<ComboClear> {
        if self.state.combo_broken {
            return None;
        }
        match self.state.full_combo_rating? {
            Rating::Sick => Some(ComboClear::Sick),
            Rating::Good => Some(ComboClear::Good),
            Rating::Bad => Some(ComboClear::Full),
            Rating::Shit | Rating::Miss => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = ScoreState::new(self.life.starting_health);
        self.defeat_pending = false;
    }

    fn add_score(&mut self, points: i64) {
        self.state.score = (self.state.score + points).max(0);
    }

    fn record(&mut self, rating: Rating) {
        self.state.total_played += 1;
        self.state.accuracy_points += rating.accuracy_weight();
        self.state.judgment_counts[rating.index()] += 1;
    }

    fn break_combo(&mut self) {
        if self.state.combo > 0 {
            debug!("Combo of {} broken.", self.state.combo);
        }
        self.state.combo = 0;
        self.state.combo_broken = true;
        self.state.full_combo_rating = None;
    }

    fn apply_health(&mut self, delta: f64) {
        self.state.health = (self.state.health + delta).clamp(0.0, self.life.max_health);
        if self.state.health <= 0.0 && !self.state.defeated {
            self.state.defeated = true;
            self.defeat_pending = true;
            info!("Player has failed!");
        }
    }
}
