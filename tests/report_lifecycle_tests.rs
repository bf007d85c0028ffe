//! Report lifecycle integration tests: submission with enrichment fallback,
//! the active-to-deactivated move, dual-mode identifier resolution and the
//! listing filters.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use airwarden::geocode::NullGeocoder;
use airwarden::reports::{self, Identifier, ReportFilter, SubmitReport};
use airwarden::storage::{Location, Report, ReportStatus, SharedStore};

fn submit_input(comments: &str) -> SubmitReport {
    SubmitReport {
        name: "Reporter".into(),
        email: "reporter@example.com".into(),
        latitude: 51.5,
        longitude: -0.12,
        comments: comments.into(),
        location: None,
    }
}

fn located(city: &str, postcode: &str) -> Location {
    Location { city: city.into(), postcode: postcode.into(), ..Default::default() }
}

/// Insert a report directly with a chosen timestamp, bypassing submission.
fn seed_report(store: &SharedStore, city: &str, postcode: &str, timestamp: &str) -> Report {
    let report = Report {
        id: Uuid::new_v4(),
        name: "Seeded".into(),
        email: "seed@example.com".into(),
        latitude: 0.0,
        longitude: 0.0,
        comments: "seeded".into(),
        location: located(city, postcode),
        timestamp: DateTime::parse_from_rfc3339(timestamp).unwrap().with_timezone(&Utc),
        status: ReportStatus::Active,
        deactivated_at: None,
        deactivated_by: None,
    };
    store.0.write().active_reports.insert(report.id, report.clone());
    report
}

#[tokio::test]
async fn geocode_failure_degrades_to_placeholder_not_error() -> Result<()> {
    let store = SharedStore::new();
    let report = reports::submit(&store, &NullGeocoder, submit_input("strong smell")).await?;
    assert!(report.location.error.is_some());
    assert_eq!(report.status, ReportStatus::Active);
    Ok(())
}

#[tokio::test]
async fn caller_supplied_location_skips_geocoding() -> Result<()> {
    let store = SharedStore::new();
    let mut input = submit_input("supplied location");
    input.location = Some(located("Leeds", "LS1"));
    let report = reports::submit(&store, &NullGeocoder, input).await?;
    assert_eq!(report.location.city, "Leeds");
    assert!(report.location.error.is_none());
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_rejected() -> Result<()> {
    let store = SharedStore::new();
    let err = reports::submit(&store, &NullGeocoder, submit_input("")).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    Ok(())
}

#[tokio::test]
async fn deactivate_moves_the_record_once() -> Result<()> {
    let store = SharedStore::new();
    let report = reports::submit(&store, &NullGeocoder, submit_input("to deactivate")).await?;

    let moved = reports::deactivate(&store, Identifier::ById(report.id), "worker@example.com")?;
    assert_eq!(moved.id, report.id);
    assert_eq!(moved.status, ReportStatus::Deactivated);
    assert_eq!(moved.deactivated_by.as_deref(), Some("worker@example.com"));
    assert!(moved.deactivated_at.is_some());

    let active = reports::list_active(&store, &ReportFilter::default())?;
    let deactivated = reports::list_deactivated(&store, &ReportFilter::default())?;
    assert!(active.iter().all(|r| r.id != report.id));
    assert_eq!(deactivated.iter().filter(|r| r.id == report.id).count(), 1);

    // Double-move: the same identifier now resolves to nothing active.
    let err = reports::deactivate(&store, Identifier::ById(report.id), "worker@example.com").unwrap_err();
    assert_eq!(err.http_status(), 404);
    Ok(())
}

#[test]
fn delete_by_exact_timestamp_fallback() -> Result<()> {
    let store = SharedStore::new();
    let kept = seed_report(&store, "Leeds", "LS1", "2024-03-10T08:00:00Z");
    let target = seed_report(&store, "Leeds", "LS1", "2024-03-10T09:15:30.250Z");

    // Not a uuid, parses as a timestamp, matches exactly one record.
    let ident = Identifier::parse("2024-03-10T09:15:30.250Z")?;
    let removed = reports::delete(&store, ident)?;
    assert_eq!(removed.id, target.id);

    // A near-miss timestamp matches nothing.
    let near = Identifier::parse("2024-03-10T09:15:30Z")?;
    assert_eq!(reports::delete(&store, near).unwrap_err().http_status(), 404);

    let active = reports::list_active(&store, &ReportFilter::default())?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, kept.id);
    Ok(())
}

#[test]
fn invalid_identifier_is_a_validation_error() {
    let err = Identifier::parse("not-an-id").unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[test]
fn date_range_filter_is_inclusive_over_the_whole_day() -> Result<()> {
    let store = SharedStore::new();
    seed_report(&store, "Leeds", "LS1", "2023-12-31T23:59:59.999999Z");
    let start = seed_report(&store, "Leeds", "LS1", "2024-01-01T00:00:00Z");
    let end = seed_report(&store, "Leeds", "LS1", "2024-01-01T23:59:59.999999Z");
    seed_report(&store, "Leeds", "LS1", "2024-01-02T00:00:00Z");

    let filter = ReportFilter {
        date_from: Some("2024-01-01".into()),
        date_to: Some("2024-01-01".into()),
        ..Default::default()
    };
    let found = reports::list_active(&store, &filter)?;
    let ids: Vec<Uuid> = found.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&start.id));
    assert!(ids.contains(&end.id));
    // Newest-first ordering.
    assert_eq!(found[0].id, end.id);
    Ok(())
}

#[test]
fn city_and_postcode_filters_are_exact() -> Result<()> {
    let store = SharedStore::new();
    let leeds = seed_report(&store, "Leeds", "LS1 4AP", "2024-05-01T10:00:00Z");
    seed_report(&store, "London", "E1 6AN", "2024-05-01T11:00:00Z");

    let filter = ReportFilter { city: Some("Leeds".into()), ..Default::default() };
    let found = reports::list_active(&store, &filter)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, leeds.id);

    // Prefix is not a match.
    let filter = ReportFilter { postcode: Some("LS1".into()), ..Default::default() };
    assert!(reports::list_active(&store, &filter)?.is_empty());
    Ok(())
}

#[test]
fn malformed_filter_dates_are_rejected() {
    let store = SharedStore::new();
    let filter = ReportFilter { date_from: Some("01-01-2024".into()), ..Default::default() };
    let err = reports::list_active(&store, &filter).unwrap_err();
    assert_eq!(err.http_status(), 400);
}
