//! Password hashing and account management over the three role stores.
//! Hashing follows the Argon2/PHC scheme; account operations enforce the
//! invariant that an email appears in at most one store at a time.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use password_hash::{PasswordHash, SaltString};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::Role;
use crate::storage::{Account, SharedStore};

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Create a user-store account. Conflicts when the email exists in any store.
pub fn signup(store: &SharedStore, name: &str, email: &str, password: &str) -> AppResult<Account> {
    // Hash outside the lock; Argon2 is deliberately slow.
    let phc = hash_password(password).map_err(AppError::from)?;
    let mut guard = store.0.write();
    if guard.email_exists(email) {
        return Err(AppError::conflict("email_exists", "email already exists"));
    }
    let account = Account {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: name.to_string(),
        password_hash: phc,
        created_by: None,
        created_at: Utc::now(),
    };
    guard.insert_account(Role::User, account.clone());
    Ok(account)
}

/// Credential check in fixed admin, worker, user order. The first store
/// whose record verifies the password wins; a matching email with a wrong
/// password falls through to the next store, as the login order specifies.
pub fn authenticate(store: &SharedStore, email: &str, password: &str) -> AppResult<(Account, Role)> {
    let candidates: Vec<(Account, Role)> = {
        let guard = store.0.read();
        [Role::Admin, Role::Worker, Role::User]
            .into_iter()
            .filter_map(|role| guard.find_account(role, email).map(|a| (a.clone(), role)))
            .collect()
    };
    for (account, role) in candidates {
        if verify_password(&account.password_hash, password) {
            return Ok((account, role));
        }
    }
    Err(AppError::auth("invalid_credentials", "invalid credentials"))
}

/// Admin-initiated worker creation; stamps `created_by`.
pub fn create_worker(store: &SharedStore, actor: &str, name: &str, email: &str, password: &str) -> AppResult<Account> {
    let phc = hash_password(password).map_err(AppError::from)?;
    let mut guard = store.0.write();
    if guard.email_exists(email) {
        return Err(AppError::conflict("email_exists", "email already exists"));
    }
    let account = Account {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: name.to_string(),
        password_hash: phc,
        created_by: Some(actor.to_string()),
        created_at: Utc::now(),
    };
    guard.insert_account(Role::Worker, account.clone());
    Ok(account)
}

/// Partial worker update. Empty password strings are ignored, matching the
/// API contract; an email change re-checks uniqueness across all stores,
/// excluding the worker being updated.
pub struct WorkerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn update_worker(store: &SharedStore, worker_id: Uuid, update: WorkerUpdate) -> AppResult<Vec<&'static str>> {
    let password = update.password.filter(|p| !p.is_empty());
    if update.name.is_none() && update.email.is_none() && password.is_none() {
        return Err(AppError::user("no_updates", "no updates provided"));
    }
    let new_hash = match password {
        Some(ref pw) => Some(hash_password(pw).map_err(AppError::from)?),
        None => None,
    };

    let mut guard = store.0.write();
    let Some(existing) = guard.account_by_id(Role::Worker, worker_id).cloned() else {
        return Err(AppError::not_found("worker_not_found", "worker not found"));
    };

    if let Some(ref new_email) = update.email {
        let taken = guard.find_account(Role::User, new_email).is_some()
            || guard.find_account(Role::Admin, new_email).is_some()
            || guard.find_account(Role::Worker, new_email).map(|a| a.id != worker_id).unwrap_or(false);
        if taken {
            return Err(AppError::conflict("email_exists", "email already in use"));
        }
    }

    let mut changed: Vec<&'static str> = Vec::new();
    let mut updated = existing.clone();
    if let Some(name) = update.name {
        updated.name = name;
        changed.push("name");
    }
    if let Some(email) = update.email {
        updated.email = email;
        changed.push("email");
    }
    if let Some(hash) = new_hash {
        updated.password_hash = hash;
        changed.push("password");
    }
    guard.replace_account(Role::Worker, &existing.email, updated);
    Ok(changed)
}

pub fn delete_worker(store: &SharedStore, worker_id: Uuid) -> AppResult<()> {
    let mut guard = store.0.write();
    match guard.remove_account_by_id(Role::Worker, worker_id) {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("worker_not_found", "worker not found")),
    }
}

/// Seed an admin account directly; used by startup provisioning and tests.
pub fn create_admin(store: &SharedStore, name: &str, email: &str, password: &str) -> AppResult<Account> {
    let phc = hash_password(password).map_err(AppError::from)?;
    let mut guard = store.0.write();
    if guard.email_exists(email) {
        return Err(AppError::conflict("email_exists", "email already exists"));
    }
    let account = Account {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: name.to_string(),
        password_hash: phc,
        created_by: None,
        created_at: Utc::now(),
    };
    guard.insert_account(Role::Admin, account.clone());
    Ok(account)
}
