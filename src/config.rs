//! Analytics configuration
//!
//! All thresholds are defined in mmol/L and scaled to the detected unit system
//! at analysis time. Defaults reproduce the reference calibration.

use crate::error::ComputeError;
use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};

/// Default target range low bound (mmol/L)
pub const DEFAULT_RANGE_LOW_MMOL: f64 = 4.0;

/// Default target range high bound (mmol/L)
pub const DEFAULT_RANGE_HIGH_MMOL: f64 = 6.1;

/// Mean below which a series is classified as mmol/L
pub const DEFAULT_UNIT_BOUNDARY: f64 = 30.0;

/// Default zone length after an event, in hours
pub const DEFAULT_ZONE_LENGTH_HOURS: f64 = 3.0;

/// Longest span allowed on either side of an event (hours)
pub const MAX_WINDOW_HOURS: f64 = 48.0;

/// Tunable thresholds for the day and zone analyzers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Inclusive low bound of the target range (mmol/L)
    pub range_low_mmol: f64,
    /// Inclusive high bound of the target range (mmol/L)
    pub range_high_mmol: f64,
    /// Series mean below this is classified as mmol/L
    pub unit_boundary: f64,
    /// When set, a mean within this distance of the boundary is rejected as ambiguous
    pub ambiguity_margin: Option<f64>,
    /// Hours after an event covered by its zone
    pub zone_length_hours: f64,
    /// Extra hours appended to the zone
    pub zone_padding_hours: f64,
    /// Minutes before an event included in its window
    pub pre_event_minutes: f64,
    /// Peaks at or below this score full marks (mmol/L)
    pub peak_cutoff_mmol: f64,
    /// Rises at or below this score full marks (mmol/L)
    pub delta_cutoff_mmol: f64,
    /// Minutes of recovery that cost one point of time score
    pub recovery_minutes_per_point: f64,
    /// Minimum readings for a day score
    pub min_day_samples: usize,
    /// Offset used to decide calendar days, in minutes east of UTC
    pub utc_offset_minutes: i32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            range_low_mmol: DEFAULT_RANGE_LOW_MMOL,
            range_high_mmol: DEFAULT_RANGE_HIGH_MMOL,
            unit_boundary: DEFAULT_UNIT_BOUNDARY,
            ambiguity_margin: None,
            zone_length_hours: DEFAULT_ZONE_LENGTH_HOURS,
            zone_padding_hours: 0.5,
            pre_event_minutes: 30.0,
            peak_cutoff_mmol: 6.1,
            delta_cutoff_mmol: 2.0,
            recovery_minutes_per_point: 60.0,
            min_day_samples: 2,
            utc_offset_minutes: 0,
        }
    }
}

impl AnalyticsConfig {
    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.range_low_mmol > 0.0 && self.range_low_mmol < self.range_high_mmol) {
            return Err(ComputeError::InvalidConfig(format!(
                "target range [{}, {}] must be positive and ordered",
                self.range_low_mmol, self.range_high_mmol
            )));
        }
        if self.unit_boundary <= 0.0 {
            return Err(ComputeError::InvalidConfig(
                "unit_boundary must be positive".to_string(),
            ));
        }
        if let Some(margin) = self.ambiguity_margin {
            if margin < 0.0 {
                return Err(ComputeError::InvalidConfig(
                    "ambiguity_margin must not be negative".to_string(),
                ));
            }
        }
        let lengths = [
            self.zone_length_hours,
            self.zone_padding_hours,
            self.pre_event_minutes,
        ];
        if lengths.iter().any(|v| !v.is_finite())
            || self.zone_length_hours <= 0.0
            || self.zone_padding_hours < 0.0
            || self.pre_event_minutes < 0.0
        {
            return Err(ComputeError::InvalidConfig(
                "zone window lengths must be finite and not negative".to_string(),
            ));
        }
        if self.zone_length_hours + self.zone_padding_hours > MAX_WINDOW_HOURS
            || self.pre_event_minutes > MAX_WINDOW_HOURS * 60.0
        {
            return Err(ComputeError::InvalidConfig(format!(
                "zone window may span at most {} hours on either side of an event",
                MAX_WINDOW_HOURS
            )));
        }
        if self.recovery_minutes_per_point <= 0.0 {
            return Err(ComputeError::InvalidConfig(
                "recovery_minutes_per_point must be positive".to_string(),
            ));
        }
        // sample standard deviation needs two readings
        if self.min_day_samples < 2 {
            return Err(ComputeError::InvalidConfig(
                "min_day_samples must be at least 2".to_string(),
            ));
        }
        self.offset()?;
        Ok(())
    }

    /// Offset used for calendar-day boundaries
    pub fn offset(&self) -> Result<FixedOffset, ComputeError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ComputeError::InvalidConfig(format!(
                "utc_offset_minutes {} out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// Time before an event covered by its window
    pub fn pre_event(&self) -> Duration {
        minutes(self.pre_event_minutes)
    }

    /// Time after an event covered by its window
    pub fn post_event(&self) -> Duration {
        minutes((self.zone_length_hours + self.zone_padding_hours) * 60.0)
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// saturates instead of panicking; `validate` rejects such values anyway
fn minutes(value: f64) -> Duration {
    let millis = (value * 60_000.0).round() as i64;
    Duration::milliseconds(millis.max(-i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.pre_event(), Duration::minutes(30));
        assert_eq!(config.post_event(), Duration::minutes(210));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AnalyticsConfig::from_json(r#"{"utc_offset_minutes": 60}"#).unwrap();
        assert_eq!(config.utc_offset_minutes, 60);
        assert_eq!(config.range_high_mmol, DEFAULT_RANGE_HIGH_MMOL);
        assert_eq!(config.offset().unwrap().local_minus_utc(), 3600);
    }

    #[test]
    fn test_rejects_inverted_range() {
        let result = AnalyticsConfig::from_json(r#"{"range_low_mmol": 7.0}"#);
        assert!(matches!(result, Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_oversized_windows() {
        for json in [
            r#"{"zone_length_hours": 1e12}"#,
            r#"{"zone_length_hours": 47.0, "zone_padding_hours": 2.0}"#,
            r#"{"pre_event_minutes": 2881}"#,
        ] {
            let result = AnalyticsConfig::from_json(json);
            assert!(matches!(result, Err(ComputeError::InvalidConfig(_))), "{json}");
        }

        let widest = AnalyticsConfig {
            zone_length_hours: 47.5,
            zone_padding_hours: 0.5,
            pre_event_minutes: 2880.0,
            ..Default::default()
        };
        assert!(widest.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_finite_windows() {
        let config = AnalyticsConfig {
            zone_padding_hours: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_single_sample_days() {
        let config = AnalyticsConfig {
            min_day_samples: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
