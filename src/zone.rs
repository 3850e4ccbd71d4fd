//! Event zone analysis
//!
//! Measures the glucose response to a single meal or insulin event inside a
//! bounded window around it: the baseline reading, the local peak, the rise,
//! and how long the series takes to come back down to baseline.

use crate::config::AnalyticsConfig;
use crate::day::{first_at_or_below, minutes_between, peak_index};
use crate::error::ComputeError;
use crate::normalizer::NormalizedSeries;
use crate::types::{Event, EventScore};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Sub-score used when the underlying metric is undefined
const UNDEFINED_SUB_SCORE: f64 = 50.0;

/// Sub-score for a peak or rise above its cutoff
const PENALIZED_SUB_SCORE: f64 = 50.0;

/// Computes per-event response scores
#[derive(Debug, Clone)]
pub struct ZoneAnalyzer {
    pre_event: Duration,
    post_event: Duration,
    peak_cutoff_mmol: f64,
    delta_cutoff_mmol: f64,
    recovery_minutes_per_point: f64,
}

impl Default for ZoneAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl ZoneAnalyzer {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            pre_event: config.pre_event(),
            post_event: config.post_event(),
            peak_cutoff_mmol: config.peak_cutoff_mmol,
            delta_cutoff_mmol: config.delta_cutoff_mmol,
            recovery_minutes_per_point: config.recovery_minutes_per_point,
        }
    }

    /// Window bounds around an event time, both inclusive.
    ///
    /// Fails with `InvalidConfig` when the window reaches outside the
    /// representable time range.
    pub fn window_bounds(
        &self,
        event_time: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ComputeError> {
        event_time
            .checked_sub_signed(self.pre_event)
            .zip(event_time.checked_add_signed(self.post_event))
            .ok_or_else(|| {
                ComputeError::InvalidConfig(format!(
                    "event window around {} overflows",
                    event_time.to_rfc3339()
                ))
            })
    }

    /// Score the response to `event`.
    ///
    /// Fails with `InsufficientData` when the window holds no readings or no
    /// reading at or after the event to serve as baseline.
    pub fn analyze_event(
        &self,
        normalized: &NormalizedSeries,
        event: &Event,
    ) -> Result<EventScore, ComputeError> {
        let event_time = event.timestamp;
        let (start, end) = self.window_bounds(event_time)?;
        let window = normalized.series.window(start, end);

        if window.is_empty() {
            return Err(ComputeError::InsufficientData(format!(
                "no readings between {} and {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }

        let baseline_idx = window
            .iter()
            .position(|p| p.timestamp >= event_time)
            .ok_or_else(|| {
                ComputeError::InsufficientData(format!(
                    "no reading at or after event at {}",
                    event_time.to_rfc3339()
                ))
            })?;
        let baseline = window[baseline_idx];

        // window is non-empty, so a peak always exists
        let peak_idx = peak_index(window).unwrap_or(baseline_idx);
        let peak = window[peak_idx];
        let delta = peak.value - baseline.value;

        // recovery is only looked for after both the peak and the event itself
        let scan_from = peak_idx.max(baseline_idx);
        let time_to_baseline_minutes = first_at_or_below(window, scan_from, baseline.value)
            .map(|i| minutes_between(event_time, window[i].timestamp));

        let unit = normalized.unit;
        let time_score = time_to_baseline_minutes
            .map(|minutes| 100.0 - minutes / self.recovery_minutes_per_point)
            .unwrap_or(UNDEFINED_SUB_SCORE);
        let peak_score = if peak.value <= unit.scale(self.peak_cutoff_mmol) {
            100.0
        } else {
            PENALIZED_SUB_SCORE
        };
        let delta_score = if delta <= unit.scale(self.delta_cutoff_mmol) {
            100.0
        } else {
            PENALIZED_SUB_SCORE
        };
        let composite_score = (time_score + peak_score + delta_score) / 3.0;

        debug!(
            label = %event.label,
            kind = event.kind.as_str(),
            baseline = baseline.value,
            peak = peak.value,
            delta,
            time_to_baseline = ?time_to_baseline_minutes,
            composite = composite_score,
            "Computed event score"
        );

        Ok(EventScore {
            event_timestamp: event_time,
            label: event.label.clone(),
            kind: event.kind,
            baseline_value: baseline.value,
            peak_value: peak.value,
            peak_timestamp: Some(peak.timestamp),
            delta,
            time_to_baseline_minutes,
            time_score,
            peak_score,
            delta_score,
            composite_score,
        })
    }
}

/// Score an event with default thresholds
pub fn analyze_event(
    normalized: &NormalizedSeries,
    event: &Event,
) -> Result<EventScore, ComputeError> {
    ZoneAnalyzer::default().analyze_event(normalized, event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::UnitNormalizer;
    use crate::types::{GlucosePoint, GlucoseSeries};
    use chrono::TimeZone;

    fn event_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn normalized(readings: &[(i64, f64)]) -> NormalizedSeries {
        let series = GlucoseSeries::new(
            readings
                .iter()
                .map(|(m, v)| GlucosePoint::new(*v, event_time() + Duration::minutes(*m)))
                .collect(),
        )
        .unwrap();
        UnitNormalizer::default().detect_and_normalize(series).unwrap()
    }

    fn lunch() -> Event {
        Event::meal(event_time(), "pasta")
    }

    #[test]
    fn test_recovery_after_peak() {
        let input = normalized(&[(0, 5.0), (30, 9.0), (90, 5.0)]);
        let score = analyze_event(&input, &lunch()).unwrap();

        assert_eq!(score.baseline_value, 5.0);
        assert_eq!(score.peak_value, 9.0);
        assert_eq!(score.peak_timestamp, Some(event_time() + Duration::minutes(30)));
        assert_eq!(score.delta, 4.0);
        assert_eq!(score.time_to_baseline_minutes, Some(90.0));
        assert!((score.time_score - 98.5).abs() < 1e-9);
        assert_eq!(score.peak_score, 50.0);
        assert_eq!(score.delta_score, 50.0);
        assert!((score.composite_score - (98.5 + 50.0 + 50.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_rise() {
        let input = normalized(&[(0, 5.5), (30, 5.2), (60, 5.0)]);
        let score = analyze_event(&input, &lunch()).unwrap();

        assert_eq!(score.delta, 0.0);
        assert_eq!(score.peak_score, 100.0);
        assert_eq!(score.delta_score, 100.0);
        assert_eq!(score.time_to_baseline_minutes, Some(0.0));
        assert_eq!(score.composite_score, 100.0);
    }

    #[test]
    fn test_never_recovers() {
        let input = normalized(&[(0, 5.0), (60, 7.5), (180, 6.0)]);
        let score = analyze_event(&input, &lunch()).unwrap();

        assert_eq!(score.time_to_baseline_minutes, None);
        assert_eq!(score.time_score, 50.0);
        // peak 7.5 exceeds 6.1 and the 2.5 rise exceeds 2.0
        assert_eq!(score.peak_score, 50.0);
        assert_eq!(score.delta_score, 50.0);
    }

    #[test]
    fn test_baseline_is_first_reading_after_event() {
        let input = normalized(&[(-20, 6.0), (5, 5.0), (40, 6.5), (120, 4.9)]);
        let score = analyze_event(&input, &lunch()).unwrap();

        assert_eq!(score.baseline_value, 5.0);
        assert!((score.delta - 1.5).abs() < 1e-9);
        assert_eq!(score.delta_score, 100.0);
        assert_eq!(score.peak_score, 50.0);
        assert_eq!(score.time_to_baseline_minutes, Some(120.0));
    }

    #[test]
    fn test_pre_event_peak_does_not_go_negative() {
        // highest reading happens before the meal
        let input = normalized(&[(-25, 8.0), (-10, 4.0), (0, 6.0), (45, 5.8)]);
        let score = analyze_event(&input, &lunch()).unwrap();

        assert_eq!(score.peak_value, 8.0);
        assert_eq!(score.time_to_baseline_minutes, Some(0.0));
    }

    #[test]
    fn test_window_excludes_outside_readings() {
        let input = normalized(&[(-45, 15.0), (0, 5.0), (60, 6.0), (211, 20.0)]);
        let score = analyze_event(&input, &lunch()).unwrap();

        assert_eq!(score.peak_value, 6.0);
    }

    #[test]
    fn test_window_end_is_inclusive() {
        let input = normalized(&[(0, 5.0), (210, 6.5)]);
        let score = analyze_event(&input, &lunch()).unwrap();
        assert_eq!(score.peak_value, 6.5);
    }

    #[test]
    fn test_empty_window() {
        let input = normalized(&[(300, 5.0), (330, 5.5)]);
        let result = analyze_event(&input, &lunch());
        assert!(matches!(result, Err(ComputeError::InsufficientData(_))));
    }

    #[test]
    fn test_only_pre_event_readings() {
        let input = normalized(&[(-20, 5.0), (-10, 5.5)]);
        let result = analyze_event(&input, &lunch());
        assert!(matches!(result, Err(ComputeError::InsufficientData(_))));
    }

    #[test]
    fn test_overflowing_window_is_an_error() {
        // built without validation, so nothing capped the window
        let analyzer = ZoneAnalyzer::from_config(&AnalyticsConfig {
            zone_length_hours: 1e12,
            ..Default::default()
        });
        let input = normalized(&[(0, 5.0), (30, 6.0)]);

        assert!(matches!(
            analyzer.analyze_event(&input, &lunch()),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cutoffs_scale_with_mgdl() {
        // 100 mg/dL baseline, 130 peak: rise of 30 mg/dL < 36, peak > 109.8
        let input = normalized(&[(0, 100.0), (30, 130.0), (60, 100.0)]);
        let score = analyze_event(&input, &lunch()).unwrap();

        assert_eq!(score.delta_score, 100.0);
        assert_eq!(score.peak_score, 50.0);
        assert_eq!(score.time_to_baseline_minutes, Some(60.0));
    }
}
