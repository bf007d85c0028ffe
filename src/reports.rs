//! Report lifecycle: submission with best-effort location enrichment,
//! dual-mode identifier resolution, permanent deletion, and the
//! active-to-deactivated move. Deactivated is terminal; no reactivation
//! path is exposed.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::geocode::Geocoder;
use crate::storage::{Location, Report, ReportStatus, SharedStore};

/// How a caller names a report: by stable id, or by the exact ingestion
/// timestamp when the identifier does not parse as an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier {
    ById(Uuid),
    ByTimestamp(DateTime<Utc>),
}

impl Identifier {
    /// Two-variant parse attempt: uuid first, ISO-8601 timestamp second.
    pub fn parse(raw: &str) -> AppResult<Identifier> {
        if let Ok(id) = Uuid::parse_str(raw) {
            return Ok(Identifier::ById(id));
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Identifier::ByTimestamp(ts.with_timezone(&Utc)));
        }
        // Accept a zoneless ISO timestamp as UTC.
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(Identifier::ByTimestamp(naive.and_utc()));
        }
        Err(AppError::user("invalid_report_id", "invalid report id"))
    }

    fn matches(&self, report: &Report) -> bool {
        match self {
            Identifier::ById(id) => report.id == *id,
            Identifier::ByTimestamp(ts) => report.timestamp == *ts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub name: String,
    pub email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub comments: String,
    pub location: Option<Location>,
}

/// Create an active report. A caller-supplied structured location wins;
/// otherwise reverse geocoding is attempted and its failure degrades to the
/// unresolved placeholder. Ingestion never fails because enrichment failed.
pub async fn submit(store: &SharedStore, geocoder: &dyn Geocoder, input: SubmitReport) -> AppResult<Report> {
    if input.name.is_empty() || input.email.is_empty() || input.comments.is_empty() {
        return Err(AppError::user("missing_fields", "missing required fields"));
    }

    let location = match input.location {
        Some(loc) => loc,
        None => match geocoder.reverse(input.latitude, input.longitude).await {
            Ok(loc) => loc,
            Err(e) => {
                warn!("reverse geocoding failed: {e:#}");
                Location::unresolved()
            }
        },
    };

    let report = Report {
        id: Uuid::new_v4(),
        name: input.name,
        email: input.email,
        latitude: input.latitude,
        longitude: input.longitude,
        comments: input.comments,
        location,
        timestamp: Utc::now(),
        status: ReportStatus::Active,
        deactivated_at: None,
        deactivated_by: None,
    };
    store.0.write().active_reports.insert(report.id, report.clone());
    Ok(report)
}

fn find_active(store: &crate::storage::Store, ident: Identifier) -> Option<Uuid> {
    match ident {
        Identifier::ById(id) => store.active_reports.contains_key(&id).then_some(id),
        Identifier::ByTimestamp(_) => {
            store.active_reports.values().find(|r| ident.matches(r)).map(|r| r.id)
        }
    }
}

/// Permanently remove an active report. Irreversible.
pub fn delete(store: &SharedStore, ident: Identifier) -> AppResult<Report> {
    let mut guard = store.0.write();
    let Some(id) = find_active(&guard, ident) else {
        return Err(AppError::not_found("report_not_found", "report not found"));
    };
    guard
        .active_reports
        .remove(&id)
        .ok_or_else(|| AppError::not_found("report_not_found", "report not found"))
}

/// Move a report from the active to the deactivated collection, preserving
/// its id. Both writes happen under one store write lock, so the record is
/// never observable in neither or both collections.
pub fn deactivate(store: &SharedStore, ident: Identifier, actor: &str) -> AppResult<Report> {
    let mut guard = store.0.write();
    let Some(id) = find_active(&guard, ident) else {
        return Err(AppError::not_found("report_not_found", "report not found"));
    };
    let Some(mut report) = guard.active_reports.get(&id).cloned() else {
        return Err(AppError::not_found("report_not_found", "report not found"));
    };
    report.status = ReportStatus::Deactivated;
    report.deactivated_at = Some(Utc::now());
    report.deactivated_by = Some(actor.to_string());
    // Insert-or-replace first, then remove; both under the one write lock.
    guard.deactivated_reports.insert(report.id, report.clone());
    guard.active_reports.remove(&id);
    Ok(report)
}

/// Listing filters: exact city, exact postcode, inclusive UTC date range.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

struct ResolvedFilter {
    city: Option<String>,
    postcode: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

fn parse_day(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::user("invalid_date", "dates must be YYYY-MM-DD"))
}

impl ReportFilter {
    fn resolve(&self) -> AppResult<ResolvedFilter> {
        let from = match &self.date_from {
            Some(raw) => Some(parse_day(raw)?.and_time(NaiveTime::MIN).and_utc()),
            None => None,
        };
        // Inclusive end of day: start of the next day minus one microsecond.
        let to = match &self.date_to {
            Some(raw) => Some(
                parse_day(raw)?.and_time(NaiveTime::MIN).and_utc()
                    + Duration::days(1)
                    - Duration::microseconds(1),
            ),
            None => None,
        };
        Ok(ResolvedFilter {
            city: self.city.clone(),
            postcode: self.postcode.clone(),
            from,
            to,
        })
    }
}

impl ResolvedFilter {
    fn accepts(&self, report: &Report) -> bool {
        if let Some(city) = &self.city {
            if &report.location.city != city {
                return false;
            }
        }
        if let Some(postcode) = &self.postcode {
            if &report.location.postcode != postcode {
                return false;
            }
        }
        if let Some(from) = self.from {
            if report.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if report.timestamp > to {
                return false;
            }
        }
        true
    }
}

fn list(reports: impl Iterator<Item = Report>, filter: &ReportFilter) -> AppResult<Vec<Report>> {
    let resolved = filter.resolve()?;
    let mut out: Vec<Report> = reports.filter(|r| resolved.accepts(r)).collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(out)
}

/// Active reports matching the filter, newest-first.
pub fn list_active(store: &SharedStore, filter: &ReportFilter) -> AppResult<Vec<Report>> {
    let guard = store.0.read();
    list(guard.active_reports.values().cloned(), filter)
}

/// Deactivated reports matching the filter, newest-first.
pub fn list_deactivated(store: &SharedStore, filter: &ReportFilter) -> AppResult<Vec<Report>> {
    let guard = store.0.read();
    list(guard.deactivated_reports.values().cloned(), filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_prefers_uuid_then_timestamp() {
        let id = Uuid::new_v4();
        assert_eq!(Identifier::parse(&id.to_string()).unwrap(), Identifier::ById(id));

        let ident = Identifier::parse("2024-01-05T12:30:00Z").unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-01-05T12:30:00+00:00").unwrap().with_timezone(&Utc);
        assert_eq!(ident, Identifier::ByTimestamp(expected));

        assert!(Identifier::parse("neither-id-nor-time").is_err());
    }

    #[test]
    fn zoneless_timestamps_are_taken_as_utc() {
        let a = Identifier::parse("2024-01-05T12:30:00").unwrap();
        let b = Identifier::parse("2024-01-05T12:30:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn timestamp_match_is_exact_after_utc_normalization() {
        let ts = DateTime::parse_from_rfc3339("2024-01-05T14:30:00+02:00").unwrap().with_timezone(&Utc);
        let ident = Identifier::parse("2024-01-05T12:30:00Z").unwrap();
        match ident {
            Identifier::ByTimestamp(parsed) => assert_eq!(parsed, ts),
            _ => panic!("expected timestamp identifier"),
        }
    }
}
