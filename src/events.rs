//! Meal and insulin event log helpers
//!
//! Events arrive from nutrition and medication logs with free-form labels.
//! These helpers clean labels, list distinct foods, and pick out the events
//! belonging to a calendar day.

use crate::types::{local_date, Event, EventKind};
use chrono::{FixedOffset, NaiveDate};
use std::collections::BTreeSet;

/// Trim surrounding whitespace and lowercase a label
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Normalize every label and sort events ascending by time
pub fn prepare_events(events: Vec<Event>) -> Vec<Event> {
    let mut prepared: Vec<Event> = events
        .into_iter()
        .map(|mut event| {
            event.label = normalize_label(&event.label);
            event
        })
        .filter(|event| !event.label.is_empty())
        .collect();
    prepared.sort_by_key(|e| e.timestamp);
    prepared
}

/// Distinct normalized labels of one kind, in descending order
pub fn unique_labels(events: &[Event], kind: EventKind) -> Vec<String> {
    let labels: BTreeSet<String> = events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| normalize_label(&e.label))
        .filter(|l| !l.is_empty())
        .collect();
    labels.into_iter().rev().collect()
}

/// Events whose timestamp falls on `date` as seen from `offset`
pub fn events_on(events: &[Event], date: NaiveDate, offset: FixedOffset) -> Vec<Event> {
    events
        .iter()
        .filter(|e| local_date(e.timestamp, offset) == date)
        .cloned()
        .collect()
}
