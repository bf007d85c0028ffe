use serde::{Deserialize, Serialize};

use super::authorizer::Role;

/// The resolved caller of a protected operation: the authoritative account
/// fields plus the role derived from store placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub name: String,
    pub role: Role,
}
