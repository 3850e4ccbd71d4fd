//! Glucose Flux - On-device analytics engine for glucose response scoring
//!
//! Flux turns continuous glucose readings plus meal and insulin logs into
//! per-day and per-event scores through a deterministic pipeline: record
//! adaptation → unit normalization → day and zone analysis → score
//! persistence → report encoding.
//!
//! ## Modules
//!
//! - **Analysis**: `normalizer`, `day`, `zone`
//! - **Input**: `schema` (glucose.raw_event.v1 records), `events`
//! - **Output**: `writer` (at-most-once daily score persistence), `encoder`

pub mod config;
pub mod day;
pub mod encoder;
pub mod error;
pub mod events;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod types;
pub mod writer;
pub mod zone;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::AnalyticsConfig;
pub use day::{analyze_day, DayAnalyzer};
pub use error::ComputeError;
pub use normalizer::{NormalizedSeries, UnitNormalizer};
pub use pipeline::{glucose_to_daily_reports, GlucoseProcessor};
pub use types::{
    DailyReport, DayScore, Event, EventKind, EventScore, GlucosePoint, GlucoseSeries,
    UnitSystem, WriteOutcome,
};
pub use writer::{DailyScoreWriter, ScoreLedger, ScoreStore};
pub use zone::{analyze_event, ZoneAnalyzer};

// Schema exports
pub use schema::{GlucoseInput, RawEvent, RawEventAdapter, SCHEMA_VERSION};

/// Engine version embedded in all report payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report payloads
pub const PRODUCER_NAME: &str = "glucose-flux";
