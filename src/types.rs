//! Core types for the Glucose Flux engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: readings and ordered series, meal/insulin events, detected units,
//! per-day and per-event scores, and the encoded report payload.

use crate::error::ComputeError;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// mg/dL per mmol/L for blood glucose
pub const MGDL_PER_MMOL: f64 = 18.0;

/// A single glucose reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucosePoint {
    /// Reading in the series' unit system
    pub value: f64,
    /// When the reading was taken (UTC)
    pub timestamp: DateTime<Utc>,
}

impl GlucosePoint {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Glucose readings in ascending time order.
///
/// Every analyzer takes a `GlucoseSeries`, so ordering is checked once at
/// construction and never assumed afterwards. Values must be finite and
/// strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GlucosePoint>", into = "Vec<GlucosePoint>")]
pub struct GlucoseSeries {
    points: Vec<GlucosePoint>,
}

impl GlucoseSeries {
    /// Build a series from readings in any order; they are sorted ascending.
    ///
    /// Readings sharing a timestamp keep their input order.
    pub fn new(mut points: Vec<GlucosePoint>) -> Result<Self, ComputeError> {
        validate_values(&points)?;
        points.sort_by_key(|p| p.timestamp);
        Ok(Self { points })
    }

    /// Build a series from readings the caller claims are already ascending.
    ///
    /// Fails with `UnorderedSeries` at the first reading older than its predecessor.
    pub fn from_ordered(points: Vec<GlucosePoint>) -> Result<Self, ComputeError> {
        validate_values(&points)?;
        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(ComputeError::UnorderedSeries(index + 1));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GlucosePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&GlucosePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&GlucosePoint> {
        self.points.last()
    }

    /// Iterate over reading values in time order
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Arithmetic mean of all values, `None` for an empty series
    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.values().sum::<f64>() / self.points.len() as f64)
    }

    /// Readings with `start <= timestamp <= end`
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[GlucosePoint] {
        let lo = self.points.partition_point(|p| p.timestamp < start);
        let hi = self.points.partition_point(|p| p.timestamp <= end);
        if lo >= hi {
            return &[];
        }
        &self.points[lo..hi]
    }

    /// Partition into calendar days as seen from `offset`.
    ///
    /// Days come back in ascending order and each sub-series stays sorted.
    pub fn split_by_day(&self, offset: FixedOffset) -> Vec<(NaiveDate, GlucoseSeries)> {
        let mut by_day: BTreeMap<NaiveDate, Vec<GlucosePoint>> = BTreeMap::new();
        for point in &self.points {
            by_day
                .entry(local_date(point.timestamp, offset))
                .or_default()
                .push(*point);
        }
        by_day
            .into_iter()
            .map(|(date, points)| (date, GlucoseSeries { points }))
            .collect()
    }
}

impl TryFrom<Vec<GlucosePoint>> for GlucoseSeries {
    type Error = ComputeError;

    fn try_from(points: Vec<GlucosePoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<GlucoseSeries> for Vec<GlucosePoint> {
    fn from(series: GlucoseSeries) -> Self {
        series.points
    }
}

fn validate_values(points: &[GlucosePoint]) -> Result<(), ComputeError> {
    for (index, point) in points.iter().enumerate() {
        if !point.value.is_finite() || point.value <= 0.0 {
            return Err(ComputeError::InvalidReading(format!(
                "value {} at index {} ({})",
                point.value,
                index,
                point.timestamp.to_rfc3339()
            )));
        }
    }
    Ok(())
}

/// Calendar date of an instant in a fixed UTC offset
pub fn local_date(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

/// Kind of tracked event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Meal,
    Insulin,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Meal => "meal",
            EventKind::Insulin => "insulin",
        }
    }
}

/// A point-in-time meal or insulin event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub kind: EventKind,
}

impl Event {
    pub fn meal(timestamp: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            timestamp,
            label: label.into(),
            kind: EventKind::Meal,
        }
    }

    pub fn insulin(timestamp: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            timestamp,
            label: label.into(),
            kind: EventKind::Insulin,
        }
    }
}

/// Unit system a series is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Mmol,
    Mgdl,
}

impl UnitSystem {
    /// Multiplier from mmol/L to this unit system
    pub fn factor(&self) -> f64 {
        match self {
            UnitSystem::Mmol => 1.0,
            UnitSystem::Mgdl => MGDL_PER_MMOL,
        }
    }

    /// Express a threshold defined in mmol/L in this unit system
    pub fn scale(&self, mmol: f64) -> f64 {
        mmol * self.factor()
    }

    /// Convert a value in this unit system to mmol/L
    pub fn to_mmol(&self, value: f64) -> f64 {
        value / self.factor()
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitSystem::Mmol => "mmol/L",
            UnitSystem::Mgdl => "mg/dL",
        }
    }
}

/// How a day's readings fall relative to the target range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBreakdown {
    /// Readings strictly below the low bound
    pub below: usize,
    /// Readings within the inclusive target range
    pub in_range: usize,
    /// Readings strictly above the high bound
    pub above: usize,
    pub total: usize,
}

impl RangeBreakdown {
    /// Percentage of readings in range (0-100), 0 for an empty breakdown
    pub fn percent_in_range(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.in_range as f64 / self.total as f64
    }
}

/// Whole-day aggregate statistics and composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayScore {
    /// Mean of all readings (series unit)
    pub average: f64,
    /// Sample standard deviation (series unit)
    pub standard_deviation: f64,
    /// Coefficient of variation (%)
    pub variability_pct: f64,
    /// Percentage of readings within the target range (0-100)
    pub percent_in_range: f64,
    pub range: RangeBreakdown,
    /// Mean-based sub-score
    pub avg_score: f64,
    /// Blend of mean, variability and range sub-scores; not clamped
    pub composite_score: f64,
    /// Highest reading of the day
    pub peak: f64,
    /// Last reading minus first reading
    pub delta: f64,
    /// Minutes from the first reading until the series returns to it after the peak
    pub time_to_baseline_minutes: Option<f64>,
    pub sample_count: usize,
}

/// Glucose response to a single event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventScore {
    pub event_timestamp: DateTime<Utc>,
    pub label: String,
    pub kind: EventKind,
    /// First reading at or after the event
    pub baseline_value: f64,
    /// Highest reading in the window
    pub peak_value: f64,
    pub peak_timestamp: Option<DateTime<Utc>>,
    /// Peak minus baseline
    pub delta: f64,
    /// Minutes from the event until the first post-peak reading at or below baseline
    pub time_to_baseline_minutes: Option<f64>,
    pub time_score: f64,
    pub peak_score: f64,
    pub delta_score: f64,
    /// Mean of the three sub-scores (0-100)
    pub composite_score: f64,
}

/// An event that could not be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEvent {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub reason: String,
}

/// Result of handing a day score to a score store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// A new score was appended
    Written,
    /// The day already has a score; nothing was written
    AlreadyRecorded,
    /// The day has not fully elapsed yet; nothing was written
    DayOpen,
}

/// Analysis of one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub unit: UnitSystem,
    /// Absent when the day had too few readings to score
    pub day: Option<DayScore>,
    /// Why `day` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_skipped_reason: Option<String>,
    pub events: Vec<EventScore>,
    pub skipped_events: Vec<SkippedEvent>,
    /// Persistence outcome, when the report went through a score store
    pub persisted: Option<WriteOutcome>,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report provenance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    pub subject_id: String,
    pub utc_offset_minutes: i32,
    pub computed_at_utc: String,
}

/// Complete encoded report for one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub date: String,
    pub unit: UnitSystem,
    pub unit_label: String,
    pub day: Option<DayScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_skipped_reason: Option<String>,
    pub events: Vec<EventScore>,
    pub skipped_events: Vec<SkippedEvent>,
    pub persisted: Option<WriteOutcome>,
}
