//! Generate a daily report for validation testing

fn main() {
    let json = r#"[
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T07:00:00Z", "record_type": "reading", "value": 5.1, "subject_id": "validation-test" },
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T07:30:00Z", "record_type": "meal", "label": "Oatmeal" },
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T07:30:00Z", "record_type": "reading", "value": 5.3 },
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T08:30:00Z", "record_type": "reading", "value": 8.4 },
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T09:30:00Z", "record_type": "reading", "value": 6.6 },
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T10:30:00Z", "record_type": "reading", "value": 5.2 },
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T12:00:00Z", "record_type": "insulin", "label": "Rapid" },
        { "schema_version": "glucose.raw_event.v1", "timestamp": "2024-01-15T12:15:00Z", "record_type": "reading", "value": 5.9 }
    ]"#;

    match glucose_flux::glucose_to_daily_reports(json.to_string(), 0, "device-456".to_string()) {
        Ok(reports) => {
            for report in reports {
                println!("{report}");
            }
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
