use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Tenant class of a caller. Derived from which account store holds the
/// email, never from a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Worker,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Worker => "worker",
            Role::User => "user",
        }
    }

    /// Parse a claimed role string. Anything unrecognized maps to `User`,
    /// matching how claims are treated as hints rather than trust anchors.
    pub fn from_claim(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "worker" => Role::Worker,
            _ => Role::User,
        }
    }
}

/// Pure membership gate: no hierarchy, no wildcard. Every operation states
/// its own allow-list; admin is not implicitly worker.
pub fn require_role(resolved: Role, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&resolved) {
        Ok(())
    } else {
        Err(AppError::forbidden("forbidden", "insufficient permissions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_implicit_hierarchy() {
        assert!(require_role(Role::Admin, &[Role::Admin, Role::Worker]).is_ok());
        assert!(require_role(Role::Worker, &[Role::Admin, Role::Worker]).is_ok());
        assert!(require_role(Role::User, &[Role::Admin, Role::Worker]).is_err());
        // Admin is not implicitly allowed where only worker is listed.
        assert!(require_role(Role::Admin, &[Role::Worker]).is_err());
    }

    #[test]
    fn unknown_claims_map_to_user() {
        assert_eq!(Role::from_claim("admin"), Role::Admin);
        assert_eq!(Role::from_claim("worker"), Role::Worker);
        assert_eq!(Role::from_claim("superuser"), Role::User);
        assert_eq!(Role::from_claim(""), Role::User);
    }
}
