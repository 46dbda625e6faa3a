//! `ami-auth`: actor identity, role policy and the user account lifecycle.
//!
//! This crate is intentionally decoupled from HTTP and storage: callers hand it
//! an already-authenticated [`Actor`] and it answers visibility questions.

pub mod actor;
pub mod authorize;
pub mod roles;
pub mod token;
pub mod user;

pub use actor::Actor;
pub use authorize::{AccessScope, AuthzError, access_scope, require_owner, require_user_manager};
pub use roles::Role;
pub use token::{CredentialHash, Token};
pub use user::{User, password_reset_ttl};
