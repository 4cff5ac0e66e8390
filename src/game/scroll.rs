use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollSpeedSetting {
    /// Multiplier on top of the chart's own scroll speed.
    XMod(f64),
    /// Constant speed in pixels per second, ignoring the chart speed.
    CMod(f64),
}

impl Default for ScrollSpeedSetting {
    fn default() -> Self {
        ScrollSpeedSetting::XMod(1.0)
    }
}

impl fmt::Display for ScrollSpeedSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollSpeedSetting::XMod(multiplier) => {
                if (*multiplier - multiplier.round()).abs() < f64::EPSILON {
                    write!(f, "X{}", multiplier.round() as i64)
                } else {
                    write!(f, "X{:.2}", multiplier)
                }
            }
            ScrollSpeedSetting::CMod(pps) => {
                if (*pps - pps.round()).abs() < f64::EPSILON {
                    write!(f, "C{}", pps.round() as i64)
                } else {
                    write!(f, "C{}", pps)
                }
            }
        }
    }
}

impl FromStr for ScrollSpeedSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("ScrollSpeed value is empty".to_string());
        }

        let (variant, value_str) = if let Some(rest) = trimmed.strip_prefix(['X', 'x']) {
            ('X', rest)
        } else if let Some(rest) = trimmed.strip_prefix(['C', 'c']) {
            ('C', rest)
        } else {
            return Err(format!(
                "ScrollSpeed '{}' must start with 'X' or 'C'",
                trimmed
            ));
        };

        let value: f64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("ScrollSpeed '{}' is not a valid number", trimmed))?;

        if !value.is_finite() || value <= 0.0 {
            return Err(format!(
                "ScrollSpeed '{}' must be greater than zero",
                trimmed
            ));
        }

        Ok(match variant {
            'X' => ScrollSpeedSetting::XMod(value),
            _ => ScrollSpeedSetting::CMod(value),
        })
    }
}

impl ScrollSpeedSetting {
    /// Receptor-relative travel per millisecond at chart speed 1.0, X1.
    pub const BASE_PIXELS_PER_MS: f64 = 0.45;

    pub fn pixels_per_ms(self, chart_speed: f64) -> f64 {
        let pps = match self {
            ScrollSpeedSetting::XMod(multiplier) => {
                Self::BASE_PIXELS_PER_MS * chart_speed * multiplier
            }
            ScrollSpeedSetting::CMod(pixels_per_second) => pixels_per_second / 1000.0,
        };
        if !pps.is_finite() || pps <= 0.0 { 0.0 } else { pps }
    }

    /// How long a note takes to cross `draw_distance` pixels. This is the
    /// spawn look-ahead.
    pub fn travel_time_ms(self, draw_distance: f64, chart_speed: f64) -> f64 {
        let speed = self.pixels_per_ms(chart_speed);
        if speed <= 0.0 {
            0.0
        } else {
            draw_distance / speed
        }
    }

    /// Distance from the receptor for a note `time_until_ms` away. Positive
    /// means the note has not reached the receptor yet.
    #[inline(always)]
    pub fn offset_px(self, time_until_ms: f64, chart_speed: f64) -> f64 {
        time_until_ms * self.pixels_per_ms(chart_speed)
    }
}
