//! Day analysis
//!
//! Derives whole-day aggregate statistics from a normalized series:
//! - Mean, sample standard deviation and coefficient of variation
//! - Time in the target range
//! - A composite 0-100 score blending mean, variability and range sub-scores
//! - Peak, start-to-end delta and recovery to the day's first reading

use crate::config::AnalyticsConfig;
use crate::error::ComputeError;
use crate::normalizer::NormalizedSeries;
use crate::types::{DayScore, GlucosePoint, RangeBreakdown, UnitSystem};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Lower edge of the linear branch of the mean sub-score (mmol/L)
const AVG_SCORE_LOW_MMOL: f64 = 4.0;

/// Upper edge of the linear branch of the mean sub-score (mmol/L)
const AVG_SCORE_HIGH_MMOL: f64 = 6.1;

/// Computes day scores with a fixed set of thresholds
#[derive(Debug, Clone)]
pub struct DayAnalyzer {
    range_low_mmol: f64,
    range_high_mmol: f64,
    min_samples: usize,
}

impl Default for DayAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl DayAnalyzer {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            range_low_mmol: config.range_low_mmol,
            range_high_mmol: config.range_high_mmol,
            min_samples: config.min_day_samples,
        }
    }

    /// Analyze one day's worth of readings.
    ///
    /// Fails with `InsufficientData` below the configured minimum sample count
    /// (never fewer than two, since the standard deviation needs them).
    pub fn analyze_day(&self, normalized: &NormalizedSeries) -> Result<DayScore, ComputeError> {
        let points = normalized.series.points();
        let unit = normalized.unit;

        if points.len() < self.min_samples.max(2) {
            return Err(ComputeError::InsufficientData(format!(
                "day score needs at least {} readings, got {}",
                self.min_samples.max(2),
                points.len()
            )));
        }

        let n = points.len() as f64;
        let average = points.iter().map(|p| p.value).sum::<f64>() / n;
        let standard_deviation = sample_std_dev(points, average);
        let variability_pct = standard_deviation / average * 100.0;

        let range = self.range_breakdown(points, unit);
        let percent_in_range = range.percent_in_range();

        let avg_score = avg_score(unit.to_mmol(average));
        let composite_score = (avg_score + (100.0 - variability_pct) + percent_in_range) / 3.0;

        // points is non-empty past the length check
        let peak_idx = peak_index(points).unwrap_or(0);
        let first = points[0];
        let last = points[points.len() - 1];

        let time_to_baseline_minutes = first_at_or_below(points, peak_idx, first.value)
            .map(|i| minutes_between(first.timestamp, points[i].timestamp));

        let score = DayScore {
            average,
            standard_deviation,
            variability_pct,
            percent_in_range,
            range,
            avg_score,
            composite_score,
            peak: points[peak_idx].value,
            delta: last.value - first.value,
            time_to_baseline_minutes,
            sample_count: points.len(),
        };

        debug!(
            average = score.average,
            variability_pct = score.variability_pct,
            percent_in_range = score.percent_in_range,
            composite = score.composite_score,
            samples = score.sample_count,
            "Computed day score"
        );

        Ok(score)
    }

    /// Count readings below, inside and above the inclusive target range
    pub fn range_breakdown(&self, points: &[GlucosePoint], unit: UnitSystem) -> RangeBreakdown {
        let low = unit.scale(self.range_low_mmol);
        let high = unit.scale(self.range_high_mmol);

        points
            .iter()
            .fold(RangeBreakdown::default(), |mut acc, point| {
                if point.value < low {
                    acc.below += 1;
                } else if point.value > high {
                    acc.above += 1;
                } else {
                    acc.in_range += 1;
                }
                acc.total += 1;
                acc
            })
    }
}

/// Analyze a day with default thresholds
pub fn analyze_day(normalized: &NormalizedSeries) -> Result<DayScore, ComputeError> {
    DayAnalyzer::default().analyze_day(normalized)
}

/// Mean sub-score for a mean expressed in mmol/L.
///
/// Piecewise calibration:
/// - `[4.0, 6.1]`: `120 - 6.56 * x`
/// - above 6.1: `0.9 * (90/16 * x^2 - 450/4 * x + 1125/2)`
/// - below 4.0: `100/16 * x^2`
///
/// The upper branch bottoms out at x = 10 and rises again beyond it.
pub fn avg_score(avg_mmol: f64) -> f64 {
    let x = avg_mmol;
    if (AVG_SCORE_LOW_MMOL..=AVG_SCORE_HIGH_MMOL).contains(&x) {
        120.0 - 6.56 * x
    } else if x > AVG_SCORE_HIGH_MMOL {
        0.9 * (90.0 / 16.0 * x * x - 450.0 / 4.0 * x + 1125.0 / 2.0)
    } else {
        100.0 / 16.0 * x * x
    }
}

/// Sample (n - 1) standard deviation
fn sample_std_dev(points: &[GlucosePoint], mean: f64) -> f64 {
    let sum_sq: f64 = points.iter().map(|p| (p.value - mean).powi(2)).sum();
    (sum_sq / (points.len() as f64 - 1.0)).sqrt()
}

/// Index of the highest value; ties go to the earliest reading
pub(crate) fn peak_index(points: &[GlucosePoint]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, point) in points.iter().enumerate() {
        match best {
            Some(b) if point.value <= points[b].value => {}
            _ => best = Some(i),
        }
    }
    best
}

/// First index at or after `from` whose value is at or below `threshold`
pub(crate) fn first_at_or_below(points: &[GlucosePoint], from: usize, threshold: f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, p)| p.value <= threshold)
        .map(|(i, _)| i)
}

pub(crate) fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 60.0
}
