//!
//! airwarden storage module
//! ------------------------
//! In-memory record collections behind a single shared handle. The service
//! treats persistence as a set of named collections with plain CRUD and
//! filter/sort/limit primitives: three account maps keyed by email (admin,
//! worker, user), two report maps keyed by id (active, deactivated), an
//! ephemeral telemetry ring with a short TTL, and an append-only audit list.
//!
//! Key responsibilities:
//! - Cross-store email uniqueness for accounts.
//! - Report membership (a report id lives in exactly one of the two maps).
//! - Telemetry retention: readings older than the TTL are purged on insert
//!   and on read, the buffer is a signal window, not an archive.
//!
//! The public API centers around the `Store` type, wrapped in a thread-safe
//! `SharedStore` (`Arc<RwLock<Store>>`) elsewhere in the codebase.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Role;

/// Readings older than this are dropped from the telemetry buffer.
pub const READING_TTL_SECS: i64 = 120;

/// A stored account. Role is not a field: it is derived from which of the
/// three maps holds the email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Argon2 PHC string. Never serialized onto the API.
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Structured address attached to a report. Populated by the caller or by
/// reverse geocoding; the `error` form marks a failed enrichment attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub road: String,
    #[serde(default)]
    pub suburb: String,
    #[serde(default)]
    pub neighbourhood: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Location {
    pub fn unresolved() -> Self {
        Location { error: Some("Could not fetch location details".into()), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Active,
    Deactivated,
}

/// A citizen hazard report. Lives in exactly one of the two report maps;
/// deactivation moves it, preserving `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub comments: String,
    pub location: Location,
    pub timestamp: DateTime<Utc>,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_by: Option<String>,
}

/// One telemetry sample. Fields are optional because the sensor may omit any
/// of them; a missing ammonia value counts as a non-violating reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub ammonia_ppm: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit record. No update or delete path exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub event_type: String,
    pub actor: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// All named collections of the service.
#[derive(Default)]
pub struct Store {
    admins: HashMap<String, Account>,
    workers: HashMap<String, Account>,
    users: HashMap<String, Account>,
    pub active_reports: HashMap<Uuid, Report>,
    pub deactivated_reports: HashMap<Uuid, Report>,
    readings: VecDeque<SensorReading>,
    audit: Vec<AuditEntry>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// The account map backing a given role.
    pub fn accounts(&self, role: Role) -> &HashMap<String, Account> {
        match role {
            Role::Admin => &self.admins,
            Role::Worker => &self.workers,
            Role::User => &self.users,
        }
    }

    fn accounts_mut(&mut self, role: Role) -> &mut HashMap<String, Account> {
        match role {
            Role::Admin => &mut self.admins,
            Role::Worker => &mut self.workers,
            Role::User => &mut self.users,
        }
    }

    pub fn find_account(&self, role: Role, email: &str) -> Option<&Account> {
        self.accounts(role).get(email)
    }

    /// True if the email is present in any of the three account stores.
    pub fn email_exists(&self, email: &str) -> bool {
        self.admins.contains_key(email)
            || self.workers.contains_key(email)
            || self.users.contains_key(email)
    }

    pub fn insert_account(&mut self, role: Role, account: Account) {
        self.accounts_mut(role).insert(account.email.clone(), account);
    }

    pub fn list_accounts(&self, role: Role) -> Vec<Account> {
        let mut out: Vec<Account> = self.accounts(role).values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    pub fn account_by_id(&self, role: Role, id: Uuid) -> Option<&Account> {
        self.accounts(role).values().find(|a| a.id == id)
    }

    /// Replace an account in a role store, re-keying when the email changed.
    pub fn replace_account(&mut self, role: Role, old_email: &str, account: Account) {
        let map = self.accounts_mut(role);
        map.remove(old_email);
        map.insert(account.email.clone(), account);
    }

    pub fn remove_account_by_id(&mut self, role: Role, id: Uuid) -> Option<Account> {
        let email = self.accounts(role).values().find(|a| a.id == id).map(|a| a.email.clone())?;
        self.accounts_mut(role).remove(&email)
    }

    pub fn push_reading(&mut self, reading: SensorReading) {
        self.readings.push_back(reading);
        self.purge_expired_readings(Utc::now());
    }

    /// Most recent readings inside the TTL window, oldest-first, capped at `limit`.
    pub fn recent_readings(&mut self, limit: usize) -> Vec<SensorReading> {
        self.purge_expired_readings(Utc::now());
        let skip = self.readings.len().saturating_sub(limit);
        self.readings.iter().skip(skip).cloned().collect()
    }

    fn purge_expired_readings(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(READING_TTL_SECS);
        while let Some(front) = self.readings.front() {
            if front.timestamp < cutoff {
                self.readings.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn push_audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    /// Most recent audit entries, newest-first.
    pub fn recent_audit(&self, limit: usize) -> Vec<AuditEntry> {
        let mut out: Vec<AuditEntry> = self.audit.iter().cloned().collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        out
    }
}

/// Clone-able shared handle over the store. Writers take the single write
/// lock, which also serializes report moves so a record can never be in
/// neither or both report maps.
#[derive(Clone)]
pub struct SharedStore(pub Arc<RwLock<Store>>);

impl SharedStore {
    pub fn new() -> Self {
        SharedStore(Arc::new(RwLock::new(Store::new())))
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}
