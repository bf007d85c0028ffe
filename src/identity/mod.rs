//! Central identity handling: bearer tokens, role resolution and the
//! access-control gate. Keep the public surface thin and split
//! implementation across sub-modules.

mod authorizer;
mod principal;
mod resolver;
mod token;

pub use authorizer::{require_role, Role};
pub use principal::Principal;
pub use resolver::resolve;
pub use token::{Claims, TokenService, TOKEN_LIFETIME_HOURS};
