use chrono::{DateTime, Duration, TimeZone, Utc};
use glucose_flux::events::unique_labels;
use glucose_flux::schema::{RawEvent, RawEventAdapter};
use glucose_flux::types::{EventKind, UnitSystem, WriteOutcome};
use glucose_flux::writer::SCORE_METRIC;
use glucose_flux::{AnalyticsConfig, ComputeError, GlucoseProcessor};
use pretty_assertions::assert_eq;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
}

/// A week-night CGM export: 15-minute readings from 07:00 to 22:45, newest first
fn cgm_export(day: u32, values_mgdl: impl Fn(i64) -> f64) -> Vec<RawEvent> {
    let mut records: Vec<RawEvent> = (0..64)
        .map(|i| {
            RawEvent::reading(
                at(day, 7, 0) + Duration::minutes(15 * i),
                values_mgdl(i),
                None,
            )
        })
        .collect();
    records.reverse();
    records
}

fn flat(_: i64) -> f64 {
    100.0
}

#[test]
fn flat_mgdl_day_scores_like_flat_mmol_day() {
    let mgdl = RawEventAdapter::to_input(&cgm_export(4, |_| 90.0)).unwrap();
    let mmol_records: Vec<RawEvent> = (0..64)
        .map(|i| RawEvent::reading(at(4, 7, 0) + Duration::minutes(15 * i), 5.0, None))
        .collect();
    let mmol = RawEventAdapter::to_input(&mmol_records).unwrap();

    let processor = GlucoseProcessor::new();
    let mgdl_reports = processor.report(&mgdl).unwrap();
    let mmol_reports = processor.report(&mmol).unwrap();
    assert_eq!(mgdl_reports[0].unit, UnitSystem::Mgdl);
    assert_eq!(mmol_reports[0].unit, UnitSystem::Mmol);

    let mgdl_day = mgdl_reports[0].day.as_ref().unwrap();
    let mmol_day = mmol_reports[0].day.as_ref().unwrap();
    assert!((mgdl_day.composite_score - mmol_day.composite_score).abs() < 1e-9);
    assert!((mmol_day.composite_score - 95.7333).abs() < 1e-3);
    assert_eq!(mmol_day.range.in_range, 64);
}

#[test]
fn meal_response_is_scored_from_a_descending_export() {
    // rise after breakfast at 08:00, peak 170 at 09:00, back to 100 by 10:00
    let mut records = cgm_export(4, |i| match i {
        4 => 100.0,
        5 => 130.0,
        6 => 155.0,
        7 => 165.0,
        8 => 170.0,
        9 => 150.0,
        10 => 125.0,
        11 => 110.0,
        _ => 100.0,
    });
    records.push(RawEvent::meal(at(4, 8, 0), " Porridge "));
    records.push(RawEvent::meal(at(4, 19, 0), "pasta"));

    let input = RawEventAdapter::to_input(&records).unwrap();
    assert_eq!(unique_labels(&input.events, EventKind::Meal), vec!["porridge", "pasta"]);

    let reports = GlucoseProcessor::new().report(&input).unwrap();
    let report = &reports[0];
    assert_eq!(report.events.len(), 2);

    let breakfast = &report.events[0];
    assert_eq!(breakfast.label, "porridge");
    assert_eq!(breakfast.baseline_value, 100.0);
    assert_eq!(breakfast.peak_value, 170.0);
    assert_eq!(breakfast.peak_timestamp, Some(at(4, 9, 0)));
    assert_eq!(breakfast.delta, 70.0);
    assert_eq!(breakfast.time_to_baseline_minutes, Some(120.0));
    // peak 170 > 6.1 * 18 and rise 70 > 2.0 * 18
    assert_eq!(breakfast.peak_score, 50.0);
    assert_eq!(breakfast.delta_score, 50.0);
    assert!((breakfast.time_score - 98.0).abs() < 1e-9);

    let dinner = &report.events[1];
    assert_eq!(dinner.delta, 0.0);
    assert_eq!(dinner.peak_score, 100.0);
    assert_eq!(dinner.delta_score, 100.0);
}

#[test]
fn scores_persist_once_per_closed_day_across_sessions() {
    let mut records = cgm_export(4, flat);
    records.extend(cgm_export(5, flat));
    let now = at(5, 12, 0);

    let mut morning = GlucoseProcessor::new();
    let first = morning
        .analyze(&RawEventAdapter::to_input(&records).unwrap(), now)
        .unwrap();
    let outcomes: Vec<_> = first.iter().map(|r| r.persisted).collect();
    assert_eq!(
        outcomes,
        vec![Some(WriteOutcome::Written), Some(WriteOutcome::DayOpen)]
    );

    let saved = morning.save_ledger().unwrap();
    let mut evening = GlucoseProcessor::new();
    evening.load_ledger(&saved).unwrap();
    let second = evening
        .analyze(&RawEventAdapter::to_input(&records).unwrap(), at(6, 0, 30))
        .unwrap();
    let outcomes: Vec<_> = second.iter().map(|r| r.persisted).collect();
    assert_eq!(
        outcomes,
        vec![Some(WriteOutcome::AlreadyRecorded), Some(WriteOutcome::Written)]
    );

    let stored: Vec<_> = evening
        .ledger()
        .records()
        .map(|r| (r.date.to_string(), r.metric.clone()))
        .collect();
    assert_eq!(
        stored,
        vec![
            ("2024-03-04".to_string(), SCORE_METRIC.to_string()),
            ("2024-03-05".to_string(), SCORE_METRIC.to_string()),
        ]
    );
}

#[test]
fn ambiguous_series_is_rejected_when_margin_is_set() {
    let records: Vec<RawEvent> = (0..8)
        .map(|i| RawEvent::reading(at(4, 8, 0) + Duration::minutes(30 * i), 29.0, None))
        .collect();
    let config = AnalyticsConfig {
        ambiguity_margin: Some(3.0),
        ..Default::default()
    };
    let processor = GlucoseProcessor::with_config(config).unwrap();
    let result = processor.report(&RawEventAdapter::to_input(&records).unwrap());

    assert!(matches!(result, Err(ComputeError::AmbiguousUnits { .. })));
}

#[test]
fn encoded_payloads_round_through_json() {
    let mut records = cgm_export(4, flat);
    records.push(RawEvent::insulin(at(3, 23, 0), "rapid"));
    let json = serde_json::to_string(&records).unwrap();

    let payloads =
        glucose_flux::glucose_to_daily_reports(json, 0, "subject-9".to_string()).unwrap();
    assert_eq!(payloads.len(), 2);

    // the insulin dose belongs to the 3rd, which has no readings
    let dose_day: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
    assert_eq!(dose_day["date"], "2024-03-03");
    assert!(dose_day["day"].is_null());
    assert_eq!(dose_day["events"].as_array().unwrap().len(), 0);
    assert_eq!(dose_day["skipped_events"][0]["label"], "rapid");

    let payload: serde_json::Value = serde_json::from_str(&payloads[1]).unwrap();
    assert_eq!(payload["provenance"]["subject_id"], "subject-9");
    assert_eq!(payload["date"], "2024-03-04");
    assert_eq!(payload["unit_label"], "mg/dL");
    assert_eq!(payload["day"]["range"]["total"], 64);
}

#[test]
fn evening_meal_before_a_sparse_midnight_is_still_scored() {
    // one reading late on the 3rd, the meal, then the overnight export
    let mut records = vec![
        RawEvent::reading(at(3, 23, 0), 105.0, None),
        RawEvent::meal(at(3, 23, 20), "Curry"),
    ];
    records.extend((0..8).map(|i| {
        RawEvent::reading(
            at(4, 0, 0) + Duration::minutes(30 * i),
            [100.0, 130.0, 160.0, 150.0, 120.0, 100.0, 95.0, 100.0][i as usize],
            None,
        )
    }));

    let input = RawEventAdapter::to_input(&records).unwrap();
    let reports = GlucoseProcessor::new().report(&input).unwrap();

    let scored: usize = reports.iter().map(|r| r.events.len()).sum();
    let skipped: usize = reports.iter().map(|r| r.skipped_events.len()).sum();
    assert_eq!(scored + skipped, 1);
    assert_eq!(scored, 1);

    assert_eq!(reports[0].date.to_string(), "2024-03-03");
    assert!(reports[0].day.is_none());
    assert_eq!(reports[0].events[0].label, "curry");
    assert_eq!(reports[0].events[0].peak_value, 160.0);
}
