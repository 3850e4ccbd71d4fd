//! Adapter for converting glucose.raw_event.v1 records into analysis input
//!
//! Readings become one ordered `GlucoseSeries`, meal and insulin records become
//! `Event`s. A unit declared on the readings is carried along as a hint so the
//! normalizer can skip detection.

use crate::error::ComputeError;
use crate::events::prepare_events;
use crate::schema::raw_event::*;
use crate::types::{Event, EventKind, GlucosePoint, GlucoseSeries, UnitSystem};

/// Readings and events extracted from raw records
#[derive(Debug, Clone, PartialEq)]
pub struct GlucoseInput {
    pub series: GlucoseSeries,
    pub events: Vec<Event>,
    /// Unit declared by every reading that declares one
    pub unit: Option<UnitSystem>,
    /// First subject id seen in the records
    pub subject_id: Option<String>,
}

/// Adapter for converting raw events to analysis input
pub struct RawEventAdapter;

impl RawEventAdapter {
    /// Parse a JSON string containing an array of RawEvents
    pub fn parse_array(json: &str) -> Result<Vec<RawEvent>, ComputeError> {
        let events: Vec<RawEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing RawEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawEvent>, ComputeError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Convert raw events to a series plus event list.
    ///
    /// Every record is validated first. Readings declaring conflicting units
    /// are rejected.
    pub fn to_input(events: &[RawEvent]) -> Result<GlucoseInput, ComputeError> {
        let mut points = Vec::new();
        let mut logged = Vec::new();
        let mut unit: Option<UnitSystem> = None;
        let mut subject_id: Option<String> = None;

        for event in events {
            if let Err(e) = event.validate() {
                return Err(ComputeError::ParseError(format!(
                    "Invalid event {}: {}",
                    event.event_id.as_deref().unwrap_or("unknown"),
                    e
                )));
            }

            if subject_id.is_none() {
                subject_id = event.subject_id.clone();
            }

            match event.record_type {
                RecordType::Reading => {
                    let value = event.value.ok_or_else(|| {
                        ComputeError::ParseError("reading without value".to_string())
                    })?;
                    if let Some(declared) = event.unit {
                        match unit {
                            Some(existing) if existing != declared => {
                                return Err(ComputeError::ParseError(format!(
                                    "readings mix {} and {}",
                                    existing.label(),
                                    declared.label()
                                )));
                            }
                            _ => unit = Some(declared),
                        }
                    }
                    points.push(GlucosePoint::new(value, event.timestamp));
                }
                RecordType::Meal | RecordType::Insulin => {
                    let kind = if event.record_type == RecordType::Meal {
                        EventKind::Meal
                    } else {
                        EventKind::Insulin
                    };
                    logged.push(Event {
                        timestamp: event.timestamp,
                        label: event.label.clone().unwrap_or_default(),
                        kind,
                    });
                }
            }
        }

        Ok(GlucoseInput {
            series: GlucoseSeries::new(points)?,
            events: prepare_events(logged),
            unit,
            subject_id,
        })
    }

    /// Validate events and return validation results for the invalid ones
    pub fn validate_events(events: &[RawEvent]) -> Vec<ValidationResult> {
        events
            .iter()
            .enumerate()
            .map(|(idx, event)| ValidationResult {
                index: idx,
                event_id: event.event_id.clone(),
                result: event.validate().err(),
            })
            .filter(|r| r.result.is_some())
            .collect()
    }
}

/// Result of event validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub event_id: Option<String>,
    pub result: Option<ValidationError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_events() -> Vec<RawEvent> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        // descending, the way the health store hands them over
        vec![
            RawEvent::reading(start + Duration::minutes(60), 6.2, Some(UnitSystem::Mmol)),
            RawEvent::reading(start + Duration::minutes(30), 7.8, Some(UnitSystem::Mmol)),
            RawEvent::meal(start, "  Pasta ").with_subject("subject-1"),
            RawEvent::reading(start, 5.1, None),
            RawEvent::insulin(start - Duration::minutes(10), "Rapid"),
        ]
    }

    #[test]
    fn test_to_input() {
        let input = RawEventAdapter::to_input(&create_test_events()).unwrap();

        let values: Vec<f64> = input.series.values().collect();
        assert_eq!(values, vec![5.1, 7.8, 6.2]);

        assert_eq!(input.events.len(), 2);
        assert_eq!(input.events[0].kind, EventKind::Insulin);
        assert_eq!(input.events[0].label, "rapid");
        assert_eq!(input.events[1].label, "pasta");

        assert_eq!(input.unit, Some(UnitSystem::Mmol));
        assert_eq!(input.subject_id.as_deref(), Some("subject-1"));
    }

    #[test]
    fn test_mixed_units_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let events = vec![
            RawEvent::reading(start, 5.1, Some(UnitSystem::Mmol)),
            RawEvent::reading(start + Duration::minutes(5), 92.0, Some(UnitSystem::Mgdl)),
        ];
        let result = RawEventAdapter::to_input(&events);
        assert!(matches!(result, Err(ComputeError::ParseError(_))));
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"
{"schema_version":"glucose.raw_event.v1","timestamp":"2024-01-15T08:00:00Z","record_type":"reading","value":5.4}

{"schema_version":"glucose.raw_event.v1","timestamp":"2024-01-15T08:05:00Z","record_type":"meal","label":"oatmeal"}
"#;
        let events = RawEventAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].record_type, RecordType::Meal);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"schema_version\":\"glucose.raw_event.v1\",\"timestamp\":\"2024-01-15T08:00:00Z\",\"record_type\":\"reading\",\"value\":5.4}\nnot json\n";
        let err = RawEventAdapter::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_validate_events() {
        let mut events = create_test_events();
        assert!(RawEventAdapter::validate_events(&events).is_empty());

        events[2].label = None;
        let results = RawEventAdapter::validate_events(&events);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 2);
    }
}
