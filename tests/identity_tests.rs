//! Identity integration tests: signup/login over the three account stores,
//! token verification, role resolution and the access-control gate.

use anyhow::Result;

use airwarden::identity::{require_role, resolve, Role, TokenService};
use airwarden::security;
use airwarden::storage::SharedStore;

fn seeded_store() -> Result<SharedStore> {
    let store = SharedStore::new();
    security::create_admin(&store, "Admin", "admin@example.com", "admin-pw")?;
    security::create_worker(&store, "admin@example.com", "Worker", "worker@example.com", "worker-pw")?;
    security::signup(&store, "User", "user@example.com", "user-pw")?;
    Ok(store)
}

#[test]
fn login_checks_stores_in_admin_worker_user_order() -> Result<()> {
    let store = seeded_store()?;

    let (_, role) = security::authenticate(&store, "admin@example.com", "admin-pw")?;
    assert_eq!(role, Role::Admin);
    let (_, role) = security::authenticate(&store, "worker@example.com", "worker-pw")?;
    assert_eq!(role, Role::Worker);
    let (_, role) = security::authenticate(&store, "user@example.com", "user-pw")?;
    assert_eq!(role, Role::User);

    let err = security::authenticate(&store, "worker@example.com", "admin-pw").unwrap_err();
    assert_eq!(err.http_status(), 401);
    Ok(())
}

#[test]
fn token_round_trip_resolves_to_claimed_store() -> Result<()> {
    let store = seeded_store()?;
    let tokens = TokenService::new("test-secret");

    let (account, role) = security::authenticate(&store, "worker@example.com", "worker-pw")?;
    let token = tokens.issue(&account.email, role)?;
    let claims = tokens.verify(&token)?;

    let principal = resolve(&store.0.read(), &claims.email, &claims.role)?;
    assert_eq!(principal.role, Role::Worker);
    assert_eq!(principal.email, "worker@example.com");
    Ok(())
}

#[test]
fn stale_admin_claim_resolves_to_current_store_placement() -> Result<()> {
    // An admin demoted to worker keeps a token claiming "admin"; resolution
    // must return the role derived from where the account now lives.
    let store = SharedStore::new();
    security::create_admin(&store, "Demoted", "demoted@example.com", "pw")?;
    let tokens = TokenService::new("test-secret");
    let token = tokens.issue("demoted@example.com", Role::Admin)?;

    {
        let mut guard = store.0.write();
        let id = guard.find_account(Role::Admin, "demoted@example.com").unwrap().id;
        let account = guard.remove_account_by_id(Role::Admin, id).unwrap();
        guard.insert_account(Role::Worker, account);
    }

    let claims = tokens.verify(&token)?;
    assert_eq!(claims.role, "admin");
    let principal = resolve(&store.0.read(), &claims.email, &claims.role)?;
    assert_eq!(principal.role, Role::Worker);
    Ok(())
}

#[test]
fn unknown_identity_fails_resolution_even_with_valid_token() -> Result<()> {
    let store = SharedStore::new();
    let tokens = TokenService::new("test-secret");
    let token = tokens.issue("ghost@example.com", Role::Admin)?;
    let claims = tokens.verify(&token)?;
    let err = resolve(&store.0.read(), &claims.email, &claims.role).unwrap_err();
    assert_eq!(err.code_str(), "unknown_identity");
    Ok(())
}

#[test]
fn user_role_is_forbidden_on_staff_and_admin_operations() -> Result<()> {
    // Report listing/deletion/deactivation allow-list
    assert_eq!(require_role(Role::User, &[Role::Admin, Role::Worker]).unwrap_err().http_status(), 403);
    // Worker/user management allow-list
    assert_eq!(require_role(Role::User, &[Role::Admin]).unwrap_err().http_status(), 403);
    assert_eq!(require_role(Role::Worker, &[Role::Admin]).unwrap_err().http_status(), 403);
    Ok(())
}
