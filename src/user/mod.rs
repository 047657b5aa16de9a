//! # User Validation
//!
//! Credential checks applied to every routed command, status report and
//! heartbeat. Real verification lives outside this crate and plugs in through
//! [`UserValidator`]; the built-in validators only cover the closed default
//! and a permissive mock for development.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Caller identity attached to an inbound event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub user_id: String,
    pub token: String,
}

impl UserCredentials {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

/// Pluggable credential check. May block; it runs on the router worker.
pub trait UserValidator: Send + Sync {
    fn validate_user(&self, credentials: &UserCredentials) -> bool;
}

/// Rejects every user, unless built with the `auth-mock` feature
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultUserValidator;

impl UserValidator for DefaultUserValidator {
    fn validate_user(&self, credentials: &UserCredentials) -> bool {
        let accepted = cfg!(feature = "auth-mock");
        debug!(
            user_id = %credentials.user_id,
            accepted = accepted,
            "Default user validation"
        );
        accepted
    }
}

/// Accepts every user
#[derive(Debug, Default, Clone, Copy)]
pub struct MockUserValidator;

impl UserValidator for MockUserValidator {
    fn validate_user(&self, _credentials: &UserCredentials) -> bool {
        true
    }
}
