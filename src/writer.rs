//! Day score persistence
//!
//! A finished day score is written to a store at most once per calendar day,
//! and only after that day has fully elapsed. The store itself belongs to the
//! host; `ScoreStore` is the seam, and `ScoreLedger` is a serializable
//! in-memory store for hosts that keep the state themselves.
//!
//! Callers sharing a store across threads must serialize writes per
//! (subject, date) key; the check-then-append in `DailyScoreWriter::persist`
//! is not atomic on its own.

use crate::error::ComputeError;
use crate::types::{local_date, DayScore, WriteOutcome};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Metric name under which day scores are stored
pub const SCORE_METRIC: &str = "score";

/// A persisted score value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub date: NaiveDate,
    pub metric: String,
    /// Composite score scaled to 0-1
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Storage for per-day metric values
pub trait ScoreStore {
    /// Whether a value is already stored for `(date, metric)`
    fn contains(&self, date: NaiveDate, metric: &str) -> Result<bool, ComputeError>;

    /// Append a value
    fn append(&mut self, record: ScoreRecord) -> Result<(), ComputeError>;
}

/// Whether the day starting with `earliest` has fully elapsed at `now`
pub fn is_day_closed(earliest: DateTime<Utc>, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    local_date(earliest, offset) < local_date(now, offset)
}

/// Scale a 0-100 composite to the 0-1 stored value
pub fn stored_value(composite_score: f64) -> f64 {
    (composite_score / 100.0).clamp(0.0, 1.0)
}

/// Writes day scores with at-most-once-per-day semantics
#[derive(Debug, Clone, Copy)]
pub struct DailyScoreWriter {
    offset: FixedOffset,
}

impl DailyScoreWriter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Persist `score` for the day whose earliest reading is `earliest`.
    ///
    /// Nothing is written while that day is still open or when the store
    /// already holds a score for it.
    pub fn persist(
        &self,
        store: &mut dyn ScoreStore,
        earliest: DateTime<Utc>,
        score: &DayScore,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, ComputeError> {
        let date = local_date(earliest, self.offset);

        if !is_day_closed(earliest, now, self.offset) {
            debug!(%date, "Day still open, score not persisted");
            return Ok(WriteOutcome::DayOpen);
        }

        if store.contains(date, SCORE_METRIC)? {
            debug!(%date, "Score already recorded");
            return Ok(WriteOutcome::AlreadyRecorded);
        }

        let value = stored_value(score.composite_score);
        store.append(ScoreRecord {
            date,
            metric: SCORE_METRIC.to_string(),
            value,
            recorded_at: now,
        })?;
        info!(%date, value, "Persisted day score");

        Ok(WriteOutcome::Written)
    }
}

/// In-memory score store keyed by date and metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreLedger {
    records: BTreeMap<NaiveDate, Vec<ScoreRecord>>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value for `(date, metric)`
    pub fn get(&self, date: NaiveDate, metric: &str) -> Option<&ScoreRecord> {
        self.records
            .get(&date)
            .and_then(|records| records.iter().find(|r| r.metric == metric))
    }

    /// All records in date order
    pub fn records(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.records.values().flatten()
    }

    /// Number of days holding at least one record
    pub fn days(&self) -> usize {
        self.records.len()
    }

    /// Load a ledger from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the ledger to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ScoreStore for ScoreLedger {
    fn contains(&self, date: NaiveDate, metric: &str) -> Result<bool, ComputeError> {
        Ok(self.get(date, metric).is_some())
    }

    fn append(&mut self, record: ScoreRecord) -> Result<(), ComputeError> {
        if self.get(record.date, &record.metric).is_some() {
            return Err(ComputeError::StoreError(format!(
                "{} already recorded for {}",
                record.metric, record.date
            )));
        }
        self.records.entry(record.date).or_default().push(record);
        Ok(())
    }
}
