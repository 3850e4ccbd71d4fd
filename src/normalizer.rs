//! Unit normalization
//!
//! Decides whether a glucose series is expressed in mmol/L or mg/dL. Values are
//! never rewritten; downstream analyzers scale their mmol/L thresholds by the
//! detected unit's factor instead.
//!
//! Detection is a mean-value heuristic: plausible mmol/L readings (about 2-25)
//! and mg/dL readings (about 40-450) sit on either side of 30. Pathological
//! series can be misclassified, which is why the host may pass an explicit
//! unit or enable the ambiguity margin.

use crate::config::{AnalyticsConfig, DEFAULT_UNIT_BOUNDARY};
use crate::error::ComputeError;
use crate::types::{GlucoseSeries, UnitSystem};
use serde::Serialize;
use tracing::{debug, warn};

/// A series paired with the unit system it was classified into
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub unit: UnitSystem,
    /// Mean of the series in its own unit
    pub mean: f64,
    /// Whether the unit came from the caller instead of detection
    pub explicit_unit: bool,
    pub series: GlucoseSeries,
}

impl NormalizedSeries {
    /// Pair a sub-series (one day, say) with the unit already settled for the
    /// whole input. The unit is not re-detected.
    pub fn restrict_to(&self, series: GlucoseSeries) -> Result<NormalizedSeries, ComputeError> {
        let mean = series.mean().ok_or_else(|| {
            ComputeError::InsufficientData("cannot restrict to an empty series".to_string())
        })?;
        Ok(NormalizedSeries {
            unit: self.unit,
            mean,
            explicit_unit: self.explicit_unit,
            series,
        })
    }
}

/// Classifies series into unit systems
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitNormalizer {
    boundary: f64,
    ambiguity_margin: Option<f64>,
}

impl Default for UnitNormalizer {
    fn default() -> Self {
        Self {
            boundary: DEFAULT_UNIT_BOUNDARY,
            ambiguity_margin: None,
        }
    }
}

impl UnitNormalizer {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            boundary: config.unit_boundary,
            ambiguity_margin: config.ambiguity_margin,
        }
    }

    /// Classify a mean value: strictly below the boundary is mmol/L
    pub fn classify(&self, mean: f64) -> UnitSystem {
        if mean < self.boundary {
            UnitSystem::Mmol
        } else {
            UnitSystem::Mgdl
        }
    }

    /// Detect the unit system of a series and pair it with the series.
    ///
    /// Fails with `InsufficientData` for an empty series, and with
    /// `AmbiguousUnits` when a margin is configured and the mean falls inside it.
    pub fn detect_and_normalize(
        &self,
        series: GlucoseSeries,
    ) -> Result<NormalizedSeries, ComputeError> {
        let mean = series.mean().ok_or_else(|| {
            ComputeError::InsufficientData("cannot detect units of an empty series".to_string())
        })?;

        if let Some(margin) = self.ambiguity_margin {
            if (mean - self.boundary).abs() <= margin {
                warn!(
                    mean,
                    boundary = self.boundary,
                    margin,
                    "Series mean too close to the unit boundary"
                );
                return Err(ComputeError::AmbiguousUnits {
                    mean,
                    boundary: self.boundary,
                    margin,
                });
            }
        }

        let unit = self.classify(mean);
        debug!(mean, unit = unit.label(), samples = series.len(), "Detected glucose unit");

        Ok(NormalizedSeries {
            unit,
            mean,
            explicit_unit: false,
            series,
        })
    }

    /// Pair a series with a unit supplied by the caller, skipping detection
    pub fn with_unit(
        &self,
        series: GlucoseSeries,
        unit: UnitSystem,
    ) -> Result<NormalizedSeries, ComputeError> {
        let mean = series.mean().ok_or_else(|| {
            ComputeError::InsufficientData("cannot normalize an empty series".to_string())
        })?;

        let detected = self.classify(mean);
        if detected != unit {
            warn!(
                mean,
                explicit = unit.label(),
                detected = detected.label(),
                "Explicit unit disagrees with detection"
            );
        }

        Ok(NormalizedSeries {
            unit,
            mean,
            explicit_unit: true,
            series,
        })
    }
}
