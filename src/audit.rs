//! Best-effort audit trail. Recording must never fail the parent operation:
//! any problem is downgraded to a diagnostic. The read path is a separate,
//! admin-only listing of the most recent entries, newest-first.

use chrono::Utc;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::storage::{AuditEntry, SharedStore};

pub const DEFAULT_AUDIT_LIMIT: usize = 100;

/// Append one audit entry. Non-blocking in effect: the append happens under
/// a short write-lock hold and any panic in serialization of `details` is
/// contained here rather than propagated.
pub fn record(store: &SharedStore, event_type: &str, actor: Option<&str>, details: Value) {
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        event_type: event_type.to_string(),
        actor: actor.map(|a| a.to_string()),
        details,
        timestamp: Utc::now(),
    };
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        store.0.write().push_audit(entry);
    }));
    if result.is_err() {
        warn!(event_type, "activity log append failed");
    }
}

/// Most recent `limit` entries, newest-first.
pub fn recent(store: &SharedStore, limit: usize) -> Vec<AuditEntry> {
    store.0.read().recent_audit(limit)
}
