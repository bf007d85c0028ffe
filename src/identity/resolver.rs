//! Identity resolution: turn verified token claims into the authoritative
//! account and role. The claimed role is a fast-path hint; the true role is
//! always derived from which store holds the email, so a token minted before
//! a demotion or promotion resolves to the account's current placement.

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::storage::Store;

use super::authorizer::Role;
use super::principal::Principal;

/// Fallback search precedence when the claimed-role store misses.
/// Order matters: it defines which store wins when data is inconsistent.
const FALLBACK_ORDER: [Role; 3] = [Role::Admin, Role::Worker, Role::User];

/// Resolve `{email, claimed_role}` from a verified token against the account
/// stores. Fails with `unknown_identity` when no store contains the email.
pub fn resolve(store: &Store, email: &str, claimed_role: &str) -> AppResult<Principal> {
    let claimed = Role::from_claim(claimed_role);

    // Trusted fast path: the account is where the claim says it is.
    if let Some(account) = store.find_account(claimed, email) {
        return Ok(Principal { email: account.email.clone(), name: account.name.clone(), role: claimed });
    }

    // The claim is stale or inconsistent; infer the role from placement.
    for role in FALLBACK_ORDER {
        if let Some(account) = store.find_account(role, email) {
            debug!(email, claimed = claimed_role, resolved = role.as_str(), "role claim corrected from store placement");
            return Ok(Principal { email: account.email.clone(), name: account.name.clone(), role });
        }
    }

    Err(AppError::auth("unknown_identity", "invalid token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Account;
    use chrono::Utc;
    use uuid::Uuid;

    fn account(email: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            email: email.into(),
            name: "Test".into(),
            password_hash: "phc".into(),
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fast_path_returns_claimed_role() {
        let mut store = Store::new();
        store.insert_account(Role::Worker, account("w@example.com"));
        let p = resolve(&store, "w@example.com", "worker").unwrap();
        assert_eq!(p.role, Role::Worker);
    }

    #[test]
    fn fallback_precedence_corrects_stale_claim() {
        let mut store = Store::new();
        store.insert_account(Role::Worker, account("demoted@example.com"));
        // Claimed admin, present only in the worker store: resolves to worker.
        let p = resolve(&store, "demoted@example.com", "admin").unwrap();
        assert_eq!(p.role, Role::Worker);
    }

    #[test]
    fn fallback_prefers_admin_over_worker() {
        let mut store = Store::new();
        store.insert_account(Role::Admin, account("both@example.com"));
        store.insert_account(Role::Worker, account("both@example.com"));
        // Claim misses the user store, fallback scans admin first.
        let p = resolve(&store, "both@example.com", "user").unwrap();
        assert_eq!(p.role, Role::Admin);
    }

    #[test]
    fn unknown_identity_regardless_of_claim() {
        let store = Store::new();
        for claim in ["admin", "worker", "user", "bogus"] {
            let err = resolve(&store, "ghost@example.com", claim).unwrap_err();
            assert_eq!(err.code_str(), "unknown_identity");
            assert_eq!(err.http_status(), 401);
        }
    }

    #[test]
    fn unrecognized_claim_falls_back_through_user_store() {
        let mut store = Store::new();
        store.insert_account(Role::User, account("u@example.com"));
        let p = resolve(&store, "u@example.com", "something-else").unwrap();
        assert_eq!(p.role, Role::User);
    }
}
