//! The validated time-series container (spec §3).

use crate::calendar::CalendarAnnotations;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// A named IANA-ish timezone plus its UTC offset, constrained to
/// `[-1440, 1440]` minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct Timezone {
    pub name: String,
    pub utc_offset_minutes: i32,
}

impl Timezone {
    pub fn new(name: impl Into<String>, utc_offset_minutes: i32) -> Result<Self> {
        if !(-1440..=1440).contains(&utc_offset_minutes) {
            return Err(ForecastError::invalid(
                "utc_offset_minutes",
                "timezone offset must lie within +/- 24h",
            ));
        }
        Ok(Self {
            name: name.into(),
            utc_offset_minutes,
        })
    }
}

/// How `sanitized` handles non-finite (`NaN`/`+-inf`) values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SanitizePolicy {
    /// Drop every row containing a non-finite value in any dimension.
    Drop,
    /// Replace non-finite values with a fixed value.
    FillValue(f64),
    /// Replace with the last finite value (or the first finite value for a
    /// leading run of non-finite values).
    ForwardFill,
    /// Surface `InvalidInput` if any non-finite value is present.
    Error,
}

/// The validated, ordered, possibly multi-dimensional time series (spec
/// §3). Immutable once constructed: `slice`/`sanitized`/`interpolated`
/// return new instances.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    /// `values[dim][t]`, one inner `Vec` per dimension.
    values: Vec<Vec<f64>>,
    labels: Option<Vec<String>>,
    metadata: HashMap<String, String>,
    dimension_metadata: Vec<HashMap<String, String>>,
    frequency: Option<Duration>,
    timezone: Option<Timezone>,
    calendar: Option<CalendarAnnotations>,
}

impl TimeSeries {
    /// Construct and validate a (possibly multi-dimensional) series.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<Vec<f64>>,
        labels: Option<Vec<String>>,
        metadata: HashMap<String, String>,
        dimension_metadata: Vec<HashMap<String, String>>,
        frequency: Option<Duration>,
        timezone: Option<Timezone>,
        calendar: Option<CalendarAnnotations>,
    ) -> Result<Self> {
        let n = timestamps.len();
        for (i, w) in timestamps.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(ForecastError::invalid(
                    "timestamps",
                    format!("timestamps must be strictly increasing (violated at index {})", i + 1),
                ));
            }
        }
        for dim in &values {
            if dim.len() != n {
                return Err(ForecastError::invalid(
                    "values",
                    "every dimension must have the same length as timestamps",
                ));
            }
        }
        let d = values.len();
        if let Some(labels) = &labels {
            if labels.len() != d {
                return Err(ForecastError::invalid(
                    "labels",
                    "label count must equal the number of dimensions",
                ));
            }
            let mut sorted = labels.clone();
            sorted.sort();
            sorted.dedup();
            if sorted.len() != labels.len() {
                return Err(ForecastError::invalid("labels", "labels must be unique"));
            }
        }
        if !dimension_metadata.is_empty() && dimension_metadata.len() != d {
            return Err(ForecastError::invalid(
                "dimension_metadata",
                "dimension_metadata must be empty or match the number of dimensions",
            ));
        }
        Ok(Self {
            timestamps,
            values,
            labels,
            metadata,
            dimension_metadata,
            frequency,
            timezone,
            calendar,
        })
    }

    /// Convenience constructor for a univariate series with no metadata.
    pub fn univariate(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        Self::new(
            timestamps,
            vec![values],
            None,
            HashMap::new(),
            Vec::new(),
            None,
            None,
            None,
        )
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn n_dims(&self) -> usize {
        self.values.len()
    }

    pub fn is_univariate(&self) -> bool {
        self.n_dims() == 1
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn frequency(&self) -> Option<Duration> {
        self.frequency
    }

    pub fn timezone(&self) -> Option<&Timezone> {
        self.timezone.as_ref()
    }

    pub fn calendar(&self) -> Option<&CalendarAnnotations> {
        self.calendar.as_ref()
    }

    pub fn dimension(&self, i: usize) -> &[f64] {
        &self.values[i]
    }

    /// The single dimension's values, or `InvalidInput` if the series is
    /// multivariate. Scalar forecasters call this in `fit`.
    pub fn univariate_values(&self) -> Result<&[f64]> {
        if !self.is_univariate() {
            return Err(ForecastError::invalid(
                "values",
                format!(
                    "scalar model requires a univariate series, found {} dimensions",
                    self.n_dims()
                ),
            ));
        }
        Ok(&self.values[0])
    }

    /// A new series over `range`, preserving labels/metadata/timezone/
    /// frequency/calendar.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Result<Self> {
        if range.end > self.len() || range.start > range.end {
            return Err(ForecastError::invalid("range", "slice range out of bounds"));
        }
        Ok(Self {
            timestamps: self.timestamps[range.clone()].to_vec(),
            values: self
                .values
                .iter()
                .map(|dim| dim[range.clone()].to_vec())
                .collect(),
            labels: self.labels.clone(),
            metadata: self.metadata.clone(),
            dimension_metadata: self.dimension_metadata.clone(),
            frequency: self.frequency,
            timezone: self.timezone.clone(),
            calendar: self.calendar.clone(),
        })
    }

    /// Replace non-finite values per `policy`, preserving alignment to the
    /// (possibly shortened, for `Drop`) new length.
    pub fn sanitized(&self, policy: SanitizePolicy) -> Result<Self> {
        match policy {
            SanitizePolicy::Error => {
                for dim in &self.values {
                    if !dim.iter().all(|v| v.is_finite()) {
                        return Err(ForecastError::invalid(
                            "values",
                            "non-finite value present under SanitizePolicy::Error",
                        ));
                    }
                }
                Ok(self.clone())
            }
            SanitizePolicy::FillValue(fill) => {
                let values = self
                    .values
                    .iter()
                    .map(|dim| {
                        dim.iter()
                            .map(|v| if v.is_finite() { *v } else { fill })
                            .collect()
                    })
                    .collect();
                Ok(Self {
                    values,
                    ..self.clone()
                })
            }
            SanitizePolicy::ForwardFill => {
                let values = self
                    .values
                    .iter()
                    .map(|dim| forward_fill(dim))
                    .collect();
                Ok(Self {
                    values,
                    ..self.clone()
                })
            }
            SanitizePolicy::Drop => {
                let keep: Vec<usize> = (0..self.len())
                    .filter(|&i| self.values.iter().all(|dim| dim[i].is_finite()))
                    .collect();
                let timestamps = keep.iter().map(|&i| self.timestamps[i]).collect();
                let values = self
                    .values
                    .iter()
                    .map(|dim| keep.iter().map(|&i| dim[i]).collect())
                    .collect();
                Ok(Self {
                    timestamps,
                    values,
                    ..self.clone()
                })
            }
        }
    }

    /// Linear interpolation of interior non-finite values; edges are
    /// extended with the nearest finite value.
    pub fn interpolated(&self) -> Self {
        let values = self.values.iter().map(|dim| interpolate(dim)).collect();
        Self {
            values,
            ..self.clone()
        }
    }

    /// Infer the nominal step as the modal positive delta between
    /// consecutive timestamps. With `tolerance`, deltas within +/-
    /// `tolerance` of each other collapse to one bucket; absent a
    /// tolerance the spacing must be uniquely modal.
    pub fn infer_frequency(&self, tolerance: Option<Duration>) -> Result<Duration> {
        if self.len() < 2 {
            return Err(ForecastError::insufficient("infer_frequency", 2, self.len()));
        }
        let deltas: Vec<Duration> = self
            .timestamps
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect();

        match tolerance {
            None => {
                let mut counts: HashMap<i64, usize> = HashMap::new();
                for d in &deltas {
                    *counts.entry(d.num_seconds()).or_insert(0) += 1;
                }
                let max_count = *counts.values().max().unwrap();
                let modal: Vec<i64> = counts
                    .iter()
                    .filter(|(_, &c)| c == max_count)
                    .map(|(&s, _)| s)
                    .collect();
                if modal.len() != 1 {
                    return Err(ForecastError::invalid(
                        "timestamps",
                        "spacing is not uniquely modal; supply a tolerance",
                    ));
                }
                Ok(Duration::seconds(modal[0]))
            }
            Some(tol) => {
                let tol_s = tol.num_seconds();
                let mut bucket_reps: Vec<i64> = Vec::new();
                let mut bucket_counts: Vec<usize> = Vec::new();
                for d in &deltas {
                    let s = d.num_seconds();
                    if let Some(idx) = bucket_reps.iter().position(|&r| (r - s).abs() <= tol_s) {
                        bucket_counts[idx] += 1;
                    } else {
                        bucket_reps.push(s);
                        bucket_counts.push(1);
                    }
                }
                let (best_idx, _) = bucket_counts
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, &c)| c)
                    .unwrap();
                Ok(Duration::seconds(bucket_reps[best_idx]))
            }
        }
    }
}

fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut last: Option<f64> = None;
    for &v in values {
        if v.is_finite() {
            last = Some(v);
            out.push(v);
        } else {
            out.push(last.unwrap_or(f64::NAN));
        }
    }
    out
}

fn interpolate(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let first = values.iter().position(|v| v.is_finite());
    let last = values.iter().rposition(|v| v.is_finite());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) => (f, l),
        _ => return values.to_vec(),
    };

    let mut out = values.to_vec();
    for v in out.iter_mut().take(first) {
        *v = values[first];
    }
    for v in out.iter_mut().skip(last + 1) {
        *v = values[last];
    }

    let mut prev_idx = first;
    let mut prev_val = values[first];
    for i in (first + 1)..=last {
        if values[i].is_finite() {
            let gap = i - prev_idx;
            if gap > 1 {
                let slope = (values[i] - prev_val) / gap as f64;
                for (j, out_val) in out.iter_mut().enumerate().take(i).skip(prev_idx + 1) {
                    *out_val = prev_val + slope * (j - prev_idx) as f64;
                }
            }
            prev_idx = i;
            prev_val = values[i];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect()
    }

    #[test]
    fn test_non_monotone_timestamps_rejected() {
        let mut t = ts(3);
        t.swap(0, 1);
        let err = TimeSeries::univariate(t, vec![1.0, 2.0, 3.0]);
        assert!(err.is_err());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = TimeSeries::new(
            ts(3),
            vec![vec![1.0, 2.0]],
            None,
            Default::default(),
            Vec::new(),
            None,
            None,
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let err = TimeSeries::new(
            ts(3),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
            Some(vec!["a".to_string(), "a".to_string()]),
            Default::default(),
            Vec::new(),
            None,
            None,
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_slice_preserves_alignment() {
        let series = TimeSeries::univariate(ts(5), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let sliced = series.slice(1..3).unwrap();
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced.univariate_values().unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn test_sanitize_drop() {
        let series = TimeSeries::univariate(ts(4), vec![1.0, f64::NAN, 3.0, 4.0]).unwrap();
        let clean = series.sanitized(SanitizePolicy::Drop).unwrap();
        assert_eq!(clean.len(), 3);
        assert_eq!(clean.univariate_values().unwrap(), &[1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sanitize_forward_fill() {
        let series = TimeSeries::univariate(ts(4), vec![1.0, f64::NAN, f64::NAN, 4.0]).unwrap();
        let clean = series.sanitized(SanitizePolicy::ForwardFill).unwrap();
        assert_eq!(clean.univariate_values().unwrap(), &[1.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_sanitize_error_policy_surfaces_invalid_input() {
        let series = TimeSeries::univariate(ts(3), vec![1.0, f64::NAN, 3.0]).unwrap();
        assert!(series.sanitized(SanitizePolicy::Error).is_err());
    }

    #[test]
    fn test_interpolated_fills_interior_gap() {
        let series = TimeSeries::univariate(ts(4), vec![1.0, f64::NAN, f64::NAN, 4.0]).unwrap();
        let filled = series.interpolated();
        let v = filled.univariate_values().unwrap();
        assert!((v[1] - 2.0).abs() < 1e-9);
        assert!((v[2] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_infer_frequency_uniform() {
        let series = TimeSeries::univariate(ts(6), vec![1.0; 6]).unwrap();
        let freq = series.infer_frequency(None).unwrap();
        assert_eq!(freq, Duration::hours(1));
    }

    #[test]
    fn test_multivariate_rejected_by_univariate_accessor() {
        let series = TimeSeries::new(
            ts(3),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
            None,
            Default::default(),
            Vec::new(),
            None,
            None,
            None,
        )
        .unwrap();
        assert!(series.univariate_values().is_err());
    }
}
