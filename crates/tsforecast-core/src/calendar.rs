//! Calendar metadata attached to a `TimeSeries`: named holidays and named
//! regressors (spec §3).

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A single holiday occurrence: a whole day, or a half-open time span
/// `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    Day(DateTime<Utc>),
    Span(DateTime<Utc>, DateTime<Utc>),
}

impl Occurrence {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        match self {
            Occurrence::Day(d) => d.date_naive() == t.date_naive(),
            Occurrence::Span(start, end) => t >= *start && t < *end,
        }
    }
}

/// A named holiday: a set of occurrences.
#[derive(Debug, Clone, Default)]
pub struct Holiday {
    pub name: String,
    pub occurrences: Vec<Occurrence>,
}

impl Holiday {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.occurrences.iter().any(|o| o.contains(t))
    }
}

/// How a regressor combines with the level in exponential-smoothing-style
/// models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressorMode {
    Additive,
    Multiplicative,
}

/// Whether a regressor's values are standardized before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StandardizationPolicy {
    #[default]
    None,
    Always,
    /// Standardize only when the regressor's magnitude dwarfs the series'.
    Auto,
}

/// A named external regressor aligned to the series.
#[derive(Debug, Clone)]
pub struct Regressor {
    pub name: String,
    pub values: Vec<f64>,
    pub mode: RegressorMode,
    pub standardization: StandardizationPolicy,
}

impl Regressor {
    /// Apply the standardization policy, returning the (possibly
    /// unchanged) values to actually use in a model.
    pub fn standardized_values(&self) -> Vec<f64> {
        let apply = match self.standardization {
            StandardizationPolicy::None => false,
            StandardizationPolicy::Always => true,
            StandardizationPolicy::Auto => {
                let max_abs = self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
                max_abs > 1e6
            }
        };
        if !apply {
            return self.values.clone();
        }
        let n = self.values.len() as f64;
        if n == 0.0 {
            return self.values.clone();
        }
        let mean = self.values.iter().sum::<f64>() / n;
        let var = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if std < f64::EPSILON {
            return self.values.iter().map(|_| 0.0).collect();
        }
        self.values.iter().map(|v| (v - mean) / std).collect()
    }
}

/// Holidays and regressors attached to a series, plus the "weekends count
/// as holidays" flag used by some seasonal models to mask non-business
/// days.
#[derive(Debug, Clone, Default)]
pub struct CalendarAnnotations {
    pub holidays: HashMap<String, Holiday>,
    pub weekends_are_holidays: bool,
    pub regressors: HashMap<String, Regressor>,
}

impl CalendarAnnotations {
    pub fn is_holiday(&self, t: DateTime<Utc>) -> bool {
        if self.weekends_are_holidays {
            use chrono::Datelike;
            let wd = t.weekday();
            if wd == chrono::Weekday::Sat || wd == chrono::Weekday::Sun {
                return true;
            }
        }
        self.holidays.values().any(|h| h.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_holiday_day_occurrence() {
        let day = Utc.with_ymd_and_hms(2024, 12, 25, 0, 0, 0).unwrap();
        let holiday = Holiday {
            name: "Christmas".into(),
            occurrences: vec![Occurrence::Day(day)],
        };
        let same_day = Utc.with_ymd_and_hms(2024, 12, 25, 14, 30, 0).unwrap();
        assert!(holiday.contains(same_day));
        let other_day = Utc.with_ymd_and_hms(2024, 12, 26, 0, 0, 0).unwrap();
        assert!(!holiday.contains(other_day));
    }

    #[test]
    fn test_weekend_as_holiday() {
        let mut calendar = CalendarAnnotations::default();
        calendar.weekends_are_holidays = true;
        let saturday = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(); // a Saturday
        assert!(calendar.is_holiday(saturday));
    }

    #[test]
    fn test_regressor_auto_standardization_triggers_on_large_values() {
        let r = Regressor {
            name: "promo_spend".into(),
            values: vec![1e7, 2e7, 3e7],
            mode: RegressorMode::Additive,
            standardization: StandardizationPolicy::Auto,
        };
        let standardized = r.standardized_values();
        let mean = standardized.iter().sum::<f64>() / standardized.len() as f64;
        assert!(mean.abs() < 1e-6);
    }
}
