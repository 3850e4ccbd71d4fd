//! Pipeline orchestration
//!
//! This module provides the public API for Glucose Flux.
//! It takes raw glucose.raw_event.v1 records through unit normalization, day
//! and event scoring, optional persistence, and report encoding.

use crate::config::AnalyticsConfig;
use crate::day::DayAnalyzer;
use crate::encoder::ReportEncoder;
use crate::error::ComputeError;
use crate::events::events_on;
use crate::normalizer::{NormalizedSeries, UnitNormalizer};
use crate::schema::{GlucoseInput, RawEvent, RawEventAdapter};
use crate::types::{local_date, DailyReport, GlucoseSeries, ReportPayload, SkippedEvent};
use crate::writer::{DailyScoreWriter, ScoreLedger};
use crate::zone::ZoneAnalyzer;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Convert a JSON array of glucose.raw_event.v1 records to daily report payloads.
///
/// Nothing is persisted; every payload has `persisted: null`.
///
/// # Arguments
/// * `raw_json` - JSON array of raw records
/// * `utc_offset_minutes` - Offset of the subject's local day from UTC
/// * `subject_id` - Subject identifier used when the records carry none
///
/// # Returns
/// Vector of report JSON payloads (one per calendar day with readings or events)
///
/// # Example
/// ```ignore
/// let reports = glucose_to_daily_reports(
///     records_json,
///     60,
///     "subject-123".to_string()
/// )?;
/// ```
pub fn glucose_to_daily_reports(
    raw_json: String,
    utc_offset_minutes: i32,
    subject_id: String,
) -> Result<Vec<String>, ComputeError> {
    let config = AnalyticsConfig {
        utc_offset_minutes,
        ..Default::default()
    };
    let processor = GlucoseProcessor::with_config(config)?;

    let events = RawEventAdapter::parse_array(&raw_json)?;
    let input = RawEventAdapter::to_input(&events)?;
    let reports = processor.report(&input)?;

    let subject = input.subject_id.as_deref().unwrap_or(&subject_id);
    processor.encode_reports(&reports, subject)
}

/// Stateful processor holding configuration and a score ledger.
///
/// Use this when day scores must be persisted at most once across calls.
pub struct GlucoseProcessor {
    config: AnalyticsConfig,
    offset: FixedOffset,
    normalizer: UnitNormalizer,
    day_analyzer: DayAnalyzer,
    zone_analyzer: ZoneAnalyzer,
    ledger: ScoreLedger,
    encoder: ReportEncoder,
}

impl Default for GlucoseProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GlucoseProcessor {
    /// Create a new processor with default settings (UTC days)
    pub fn new() -> Self {
        let config = AnalyticsConfig::default();
        Self {
            offset: Utc.fix(),
            normalizer: UnitNormalizer::from_config(&config),
            day_analyzer: DayAnalyzer::from_config(&config),
            zone_analyzer: ZoneAnalyzer::from_config(&config),
            ledger: ScoreLedger::new(),
            encoder: ReportEncoder::new(),
            config,
        }
    }

    /// Create a processor with validated custom settings
    pub fn with_config(config: AnalyticsConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            offset: config.offset()?,
            normalizer: UnitNormalizer::from_config(&config),
            day_analyzer: DayAnalyzer::from_config(&config),
            zone_analyzer: ZoneAnalyzer::from_config(&config),
            ledger: ScoreLedger::new(),
            encoder: ReportEncoder::new(),
            config,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Load ledger state from JSON
    pub fn load_ledger(&mut self, json: &str) -> Result<(), ComputeError> {
        self.ledger =
            ScoreLedger::from_json(json).map_err(|e| ComputeError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save ledger state to JSON
    pub fn save_ledger(&self) -> Result<String, ComputeError> {
        self.ledger
            .to_json()
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Settle the unit system for the whole input.
    ///
    /// A unit declared by the records wins; otherwise it is detected once over
    /// every reading, so a single unusual day cannot flip it.
    pub fn normalize(&self, input: &GlucoseInput) -> Result<NormalizedSeries, ComputeError> {
        match input.unit {
            Some(unit) => self.normalizer.with_unit(input.series.clone(), unit),
            None => self.normalizer.detect_and_normalize(input.series.clone()),
        }
    }

    /// Score every calendar day of `input` without persisting anything.
    ///
    /// Days with too few readings get a report with no `day` score; their
    /// events are still scored. Events whose window cannot be scored are
    /// listed in `skipped_events`.
    pub fn report(&self, input: &GlucoseInput) -> Result<Vec<DailyReport>, ComputeError> {
        Ok(self
            .score_days(input)?
            .into_iter()
            .map(|(_, report)| report)
            .collect())
    }

    /// Score every calendar day of `input` and persist the closed ones.
    ///
    /// Days without a score are reported but never persisted.
    pub fn analyze(
        &mut self,
        input: &GlucoseInput,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyReport>, ComputeError> {
        let writer = DailyScoreWriter::new(self.offset);
        let mut reports = Vec::new();

        for (earliest, mut report) in self.score_days(input)? {
            if let (Some(earliest), Some(day)) = (earliest, &report.day) {
                let outcome = writer.persist(&mut self.ledger, earliest, day, now)?;
                report.persisted = Some(outcome);
            }
            reports.push(report);
        }

        Ok(reports)
    }

    /// Process a JSON array of raw records, persisting closed days
    pub fn process_json(
        &mut self,
        raw_json: &str,
        subject_id: &str,
    ) -> Result<Vec<String>, ComputeError> {
        let events = RawEventAdapter::parse_array(raw_json)?;
        self.process_events(&events, subject_id, Utc::now())
    }

    /// Process already-parsed raw records as of `now`
    pub fn process_events(
        &mut self,
        events: &[RawEvent],
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ComputeError> {
        let input = RawEventAdapter::to_input(events)?;
        let reports = self.analyze(&input, now)?;
        let subject = input.subject_id.as_deref().unwrap_or(subject_id);
        self.encode_reports(&reports, subject)
    }

    /// Stamp reports with producer and provenance for this processor's offset
    pub fn payloads(&self, reports: &[DailyReport], subject_id: &str) -> Vec<ReportPayload> {
        reports
            .iter()
            .map(|report| {
                self.encoder
                    .encode(report, subject_id, self.config.utc_offset_minutes)
            })
            .collect()
    }

    /// Encode reports to JSON payloads stamped with this processor's offset
    pub fn encode_reports(
        &self,
        reports: &[DailyReport],
        subject_id: &str,
    ) -> Result<Vec<String>, ComputeError> {
        self.payloads(reports, subject_id)
            .iter()
            .map(|payload| {
                serde_json::to_string(payload)
                    .map_err(|e| ComputeError::EncodingError(e.to_string()))
            })
            .collect()
    }

    /// Reports for every local day with readings or events, each paired with
    /// the day's earliest reading when the day could be scored
    fn score_days(
        &self,
        input: &GlucoseInput,
    ) -> Result<Vec<(Option<DateTime<Utc>>, DailyReport)>, ComputeError> {
        if input.series.is_empty() {
            if !input.events.is_empty() {
                warn!(events = input.events.len(), "Events without any readings");
            }
            return Ok(Vec::new());
        }

        let normalized = self.normalize(input)?;

        let mut days: BTreeMap<NaiveDate, Option<GlucoseSeries>> = normalized
            .series
            .split_by_day(self.offset)
            .into_iter()
            .map(|(date, series)| (date, Some(series)))
            .collect();
        for event in &input.events {
            days.entry(local_date(event.timestamp, self.offset))
                .or_insert(None);
        }

        let mut reports = Vec::with_capacity(days.len());

        for (date, day_series) in days {
            let earliest = day_series
                .as_ref()
                .and_then(|series| series.first())
                .map(|p| p.timestamp);

            let scored = match day_series {
                Some(series) => {
                    let day_normalized = normalized.restrict_to(series)?;
                    match self.day_analyzer.analyze_day(&day_normalized) {
                        Ok(day) => Ok(day),
                        Err(ComputeError::InsufficientData(reason)) => Err(reason),
                        Err(e) => return Err(e),
                    }
                }
                None => Err("no readings on this day".to_string()),
            };

            let (day, day_skipped_reason) = match scored {
                Ok(day) => (Some(day), None),
                Err(reason) => {
                    warn!(%date, %reason, "Day has no score");
                    (None, Some(reason))
                }
            };

            let mut events = Vec::new();
            let mut skipped_events = Vec::new();

            // event windows may run past midnight, so score against the full series
            for event in events_on(&input.events, date, self.offset) {
                match self.zone_analyzer.analyze_event(&normalized, &event) {
                    Ok(score) => events.push(score),
                    Err(ComputeError::InsufficientData(reason)) => {
                        warn!(
                            label = %event.label,
                            timestamp = %event.timestamp,
                            %reason,
                            "Skipping event"
                        );
                        skipped_events.push(SkippedEvent {
                            timestamp: event.timestamp,
                            label: event.label.clone(),
                            reason,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            debug!(
                %date,
                composite = day.as_ref().map(|d| d.composite_score),
                events = events.len(),
                skipped = skipped_events.len(),
                "Built daily report"
            );

            reports.push((
                earliest.filter(|_| day.is_some()),
                DailyReport {
                    date,
                    unit: normalized.unit,
                    day,
                    day_skipped_reason,
                    events,
                    skipped_events,
                    persisted: None,
                },
            ));
        }

        info!(
            days = reports.len(),
            unit = normalized.unit.label(),
            "Analyzed glucose input"
        );

        Ok(reports)
    }
}
