use crate::config::ConfigError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    Sick,
    Good,
    Bad,
    Shit,
    Miss,
}

impl Rating {
    pub const ALL: [Rating; 5] = [
        Rating::Sick,
        Rating::Good,
        Rating::Bad,
        Rating::Shit,
        Rating::Miss,
    ];

    /// Contribution of one judgment to the weighted accuracy average.
    pub fn accuracy_weight(self) -> f64 {
        match self {
            Rating::Sick => 1.0,
            Rating::Good => 0.75,
            Rating::Bad => 0.5,
            Rating::Shit | Rating::Miss => 0.0,
        }
    }

    #[inline(always)]
    pub fn breaks_combo(self) -> bool {
        matches!(self, Rating::Shit | Rating::Miss)
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Judgment {
    pub rating: Rating,
    /// Input time minus strum time. Negative is early.
    pub time_diff_ms: f64,
    pub score_delta: i64,
}

/// Timing windows and the PBOT1 scoring curve.
///
/// Every timing decision in the engine (rating, hit range, long-miss sweep)
/// reads its thresholds from here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitWindows {
    pub sick_ms: f64,
    pub good_ms: f64,
    pub bad_ms: f64,
    pub shit_ms: f64,
    pub max_judge_range_ms: f64,
    pub miss_grace_ms: f64,

    pub max_score: f64,
    pub min_score: f64,
    pub miss_score: i64,
    pub perfect_threshold_ms: f64,
    pub scoring_slope: f64,
    pub scoring_offset_ms: f64,
}

impl Default for HitWindows {
    fn default() -> Self {
        Self {
            sick_ms: 45.0,
            good_ms: 90.0,
            bad_ms: 135.0,
            shit_ms: 160.0,
            max_judge_range_ms: 160.0,
            miss_grace_ms: 50.0,
            max_score: 500.0,
            min_score: 9.0,
            miss_score: -100,
            perfect_threshold_ms: 5.0,
            scoring_slope: 0.080,
            scoring_offset_ms: 54.99,
        }
    }
}

impl HitWindows {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tiers = [self.sick_ms, self.good_ms, self.bad_ms, self.shit_ms];
        let ascending = tiers.windows(2).all(|pair| pair[0] < pair[1]);
        if !ascending || tiers.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(ConfigError::WindowsNotAscending(tiers));
        }
        if !self.max_judge_range_ms.is_finite() || self.max_judge_range_ms <= 0.0 {
            return Err(ConfigError::invalid("Timing", "MaxJudgeRangeMs", self.max_judge_range_ms));
        }
        if !self.miss_grace_ms.is_finite() || self.miss_grace_ms < 0.0 {
            return Err(ConfigError::invalid("Timing", "MissGraceMs", self.miss_grace_ms));
        }
        if !self.scoring_slope.is_finite() || self.scoring_slope <= 0.0 {
            return Err(ConfigError::invalid("Scoring", "Slope", self.scoring_slope));
        }
        Ok(())
    }

    pub fn judge(&self, time_diff_ms: f64) -> Rating {
        let abs = time_diff_ms.abs();
        if abs <= self.sick_ms {
            Rating::Sick
        } else if abs <= self.good_ms {
            Rating::Good
        } else if abs <= self.bad_ms {
            Rating::Bad
        } else if abs <= self.shit_ms {
            Rating::Shit
        } else {
            Rating::Miss
        }
    }

    pub fn score_note(&self, time_diff_ms: f64) -> i64 {
        let abs = time_diff_ms.abs();
        if abs > self.shit_ms {
            return self.miss_score;
        }
        if abs < self.perfect_threshold_ms {
            return self.max_score as i64;
        }
        let factor =
            1.0 - 1.0 / (1.0 + (-self.scoring_slope * (abs - self.scoring_offset_ms)).exp());
        (self.max_score * factor + self.min_score).floor() as i64
    }

    /// Late-only check used by the passive sweep: the note has left the last
    /// window plus the grace period.
    #[inline(always)]
    pub fn is_long_miss(&self, time_diff_ms: f64) -> bool {
        time_diff_ms > self.shit_ms + self.miss_grace_ms
    }

    #[inline(always)]
    pub fn in_judge_range(&self, abs_time_diff_ms: f64) -> bool {
        abs_time_diff_ms <= self.max_judge_range_ms
    }

    pub fn judgment_for(&self, time_diff_ms: f64) -> Judgment {
        Judgment {
            rating: self.judge(time_diff_ms),
            time_diff_ms,
            score_delta: self.score_note(time_diff_ms),
        }
    }

    pub fn miss(&self, time_diff_ms: f64) -> Judgment {
        Judgment {
            rating: Rating::Miss,
            time_diff_ms,
            score_delta: self.miss_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive() {
        let w = HitWindows::default();
        assert_eq!(w.judge(45.0), Rating::Sick);
        assert_eq!(w.judge(45.01), Rating::Good);
        assert_eq!(w.judge(90.0), Rating::Good);
        assert_eq!(w.judge(135.0), Rating::Bad);
        assert_eq!(w.judge(160.0), Rating::Shit);
        assert_eq!(w.judge(160.5), Rating::Miss);
    }

    #[test]
    fn judge_is_symmetric_and_monotone() {
        let w = HitWindows::default();
        let mut previous = Rating::Sick;
        for tenth in 0..2500 {
            let delta = tenth as f64 / 10.0;
            let rating = w.judge(delta);
            assert_eq!(rating, w.judge(-delta), "asymmetric at {delta}");
            assert!(rating >= previous, "rating improved at {delta}");
            previous = rating;
        }
    }

    #[test]
    fn score_is_max_inside_perfect_threshold() {
        let w = HitWindows::default();
        assert_eq!(w.score_note(0.0), 500);
        assert_eq!(w.score_note(4.99), 500);
        assert_eq!(w.score_note(-4.99), 500);
        assert!(w.score_note(5.0) <= 500);
    }

    #[test]
    fn score_decays_without_increasing() {
        let w = HitWindows::default();
        let mut previous = w.score_note(0.0);
        for tenth in 0..1700 {
            let delta = tenth as f64 / 10.0;
            let score = w.score_note(delta);
            assert!(score <= previous, "score rose at {delta}: {score} > {previous}");
            assert_eq!(score, w.score_note(-delta));
            previous = score;
        }
    }

    #[test]
    fn score_curve_hits_expected_landmarks() {
        let w = HitWindows::default();
        // Around the curve midpoint the reward is roughly half of max.
        let mid = w.score_note(55.0);
        assert!((250..=265).contains(&mid), "midpoint score {mid}");
        assert_eq!(w.score_note(160.0), 9);
        assert_eq!(w.score_note(161.0), -100);
    }

    #[test]
    fn long_miss_is_late_only() {
        let w = HitWindows {
            shit_ms: 160.0,
            miss_grace_ms: 50.0,
            ..HitWindows::default()
        };
        assert!(!w.is_long_miss(209.0));
        assert!(!w.is_long_miss(210.0));
        assert!(w.is_long_miss(211.0));
        assert!(!w.is_long_miss(-500.0));
    }

    #[test]
    fn validate_rejects_unordered_windows() {
        let w = HitWindows {
            good_ms: 30.0,
            ..HitWindows::default()
        };
        assert!(w.validate().is_err());
        assert!(HitWindows::default().validate().is_ok());
    }

    #[test]
    fn accuracy_weights() {
        assert_eq!(Rating::Sick.accuracy_weight(), 1.0);
        assert_eq!(Rating::Good.accuracy_weight(), 0.75);
        assert_eq!(Rating::Bad.accuracy_weight(), 0.5);
        assert_eq!(Rating::Shit.accuracy_weight(), 0.0);
        assert_eq!(Rating::Miss.accuracy_weight(), 0.0);
    }
}
