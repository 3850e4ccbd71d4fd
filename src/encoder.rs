//! Report encoding
//!
//! This module encodes daily reports into JSON payloads for the host's display
//! and storage layers, stamping producer and provenance metadata.

use crate::error::ComputeError;
use crate::types::{DailyReport, ReportPayload, ReportProducer, ReportProvenance};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder for producing report payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a daily report into a payload
    pub fn encode(
        &self,
        report: &DailyReport,
        subject_id: &str,
        utc_offset_minutes: i32,
    ) -> ReportPayload {
        ReportPayload {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: ReportProvenance {
                subject_id: subject_id.to_string(),
                utc_offset_minutes,
                computed_at_utc: Utc::now().to_rfc3339(),
            },
            date: report.date.format("%Y-%m-%d").to_string(),
            unit: report.unit,
            unit_label: report.unit.label().to_string(),
            day: report.day.clone(),
            day_skipped_reason: report.day_skipped_reason.clone(),
            events: report.events.clone(),
            skipped_events: report.skipped_events.clone(),
            persisted: report.persisted,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        report: &DailyReport,
        subject_id: &str,
        utc_offset_minutes: i32,
    ) -> Result<String, ComputeError> {
        let payload = self.encode(report, subject_id, utc_offset_minutes);
        serde_json::to_string(&payload).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayScore, RangeBreakdown, UnitSystem, WriteOutcome};
    use chrono::NaiveDate;

    fn report() -> DailyReport {
        DailyReport {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            unit: UnitSystem::Mgdl,
            day: Some(DayScore {
                average: 104.0,
                standard_deviation: 12.0,
                variability_pct: 11.5,
                percent_in_range: 80.0,
                range: RangeBreakdown {
                    below: 1,
                    in_range: 8,
                    above: 1,
                    total: 10,
                },
                avg_score: 81.9,
                composite_score: 83.5,
                peak: 142.0,
                delta: -4.0,
                time_to_baseline_minutes: Some(75.0),
                sample_count: 10,
            }),
            day_skipped_reason: None,
            events: vec![],
            skipped_events: vec![],
            persisted: Some(WriteOutcome::Written),
        }
    }

    #[test]
    fn test_encode_payload() {
        let encoder = ReportEncoder::with_instance_id("instance-1".to_string());
        let json = encoder.encode_to_json(&report(), "subject-1", 60).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["report_version"], "1.0.0");
        assert_eq!(payload["producer"]["name"], PRODUCER_NAME);
        assert_eq!(payload["producer"]["instance_id"], "instance-1");
        assert_eq!(payload["provenance"]["subject_id"], "subject-1");
        assert_eq!(payload["provenance"]["utc_offset_minutes"], 60);
        assert_eq!(payload["date"], "2024-01-15");
        assert_eq!(payload["unit"], "mgdl");
        assert_eq!(payload["unit_label"], "mg/dL");
        assert_eq!(payload["day"]["range"]["in_range"], 8);
        assert_eq!(payload["persisted"], "written");
        assert!(payload.get("day_skipped_reason").is_none());
    }

    #[test]
    fn test_encode_unscored_day() {
        let mut unscored = report();
        unscored.day = None;
        unscored.day_skipped_reason = Some("one reading".to_string());
        unscored.persisted = None;

        let payload = ReportEncoder::new().encode(&unscored, "subject-1", 0);
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value["day"].is_null());
        assert_eq!(value["day_skipped_reason"], "one reading");
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(ReportEncoder::new().instance_id(), ReportEncoder::new().instance_id());
    }
}
