//! glucose.raw_event.v1 schema definition
//!
//! A flat, host-agnostic record format covering:
//! - Glucose readings (value plus optional unit)
//! - Meal log entries (label, e.g. the food name)
//! - Insulin log entries (label, e.g. the insulin product)

use crate::types::UnitSystem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "glucose.raw_event.v1";

/// Type of record contained in the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// Point-in-time glucose reading
    Reading,
    /// Meal or food log entry
    Meal,
    /// Insulin dose log entry
    Insulin,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Reading => "reading",
            RecordType::Meal => "meal",
            RecordType::Insulin => "insulin",
        }
    }
}

/// Data source information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Exporting application or sensor vendor
    pub provider: String,
    /// Unique device identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// A single raw input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Schema version (must be "glucose.raw_event.v1")
    pub schema_version: String,
    /// Optional unique record identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// When the reading was taken or the event happened
    pub timestamp: DateTime<Utc>,
    /// Subject the record belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub record_type: RecordType,
    /// Glucose value (readings only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Unit of `value`, when the exporter knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitSystem>,
    /// Event label (meal and insulin records)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl RawEvent {
    fn base(timestamp: DateTime<Utc>, record_type: RecordType) -> Self {
        RawEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: Some(uuid::Uuid::new_v4().to_string()),
            timestamp,
            subject_id: None,
            record_type,
            value: None,
            unit: None,
            label: None,
            source: None,
        }
    }

    /// Create a new glucose reading record
    pub fn reading(timestamp: DateTime<Utc>, value: f64, unit: Option<UnitSystem>) -> Self {
        RawEvent {
            value: Some(value),
            unit,
            ..Self::base(timestamp, RecordType::Reading)
        }
    }

    /// Create a new meal record
    pub fn meal(timestamp: DateTime<Utc>, label: impl Into<String>) -> Self {
        RawEvent {
            label: Some(label.into()),
            ..Self::base(timestamp, RecordType::Meal)
        }
    }

    /// Create a new insulin record
    pub fn insulin(timestamp: DateTime<Utc>, label: impl Into<String>) -> Self {
        RawEvent {
            label: Some(label.into()),
            ..Self::base(timestamp, RecordType::Insulin)
        }
    }

    /// Attach a subject identifier
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Attach source information
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Validate the record
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        match self.record_type {
            RecordType::Reading => match self.value {
                None => Err(ValidationError::MissingValue),
                Some(v) if !v.is_finite() || v <= 0.0 => Err(ValidationError::InvalidValue(v)),
                Some(_) => Ok(()),
            },
            RecordType::Meal | RecordType::Insulin => {
                let has_label = self
                    .label
                    .as_deref()
                    .map(|l| !l.trim().is_empty())
                    .unwrap_or(false);
                if has_label {
                    Ok(())
                } else {
                    Err(ValidationError::MissingLabel {
                        record_type: self.record_type.as_str().to_string(),
                    })
                }
            }
        }
    }
}

/// Validation errors for raw events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Reading record has no value")]
    MissingValue,

    #[error("Reading value {0} is not a positive finite number")]
    InvalidValue(f64),

    #[error("{record_type} record has no label")]
    MissingLabel { record_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_reading() {
        let event = RawEvent::reading(Utc::now(), 5.6, Some(UnitSystem::Mmol));
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("glucose.raw_event.v1"));
        assert!(json.contains("\"record_type\":\"reading\""));
        assert!(json.contains("\"unit\":\"mmol\""));
        assert!(!json.contains("label"));
    }

    #[test]
    fn test_deserialize_meal() {
        let json = r#"{
            "schema_version": "glucose.raw_event.v1",
            "timestamp": "2024-01-15T12:00:00Z",
            "record_type": "meal",
            "label": "Pasta",
            "source": { "provider": "healthkit" }
        }"#;

        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.record_type, RecordType::Meal);
        assert_eq!(event.label.as_deref(), Some("Pasta"));
        assert_eq!(event.source.unwrap().provider, "healthkit");
        assert!(event.event_id.is_none());
    }

    #[test]
    fn test_validation() {
        let reading = RawEvent::reading(Utc::now(), 110.0, None);
        assert!(reading.validate().is_ok());

        let mut missing = reading.clone();
        missing.value = None;
        assert_eq!(missing.validate(), Err(ValidationError::MissingValue));

        let negative = RawEvent::reading(Utc::now(), -1.0, None);
        assert!(matches!(negative.validate(), Err(ValidationError::InvalidValue(_))));

        let blank = RawEvent::meal(Utc::now(), "  ");
        assert!(matches!(blank.validate(), Err(ValidationError::MissingLabel { .. })));

        let mut wrong_version = RawEvent::insulin(Utc::now(), "rapid");
        wrong_version.schema_version = "wear.raw_event.v1".to_string();
        assert!(matches!(
            wrong_version.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }
}
