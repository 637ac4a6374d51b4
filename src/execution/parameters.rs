//! Reserved identity token substitution
//!
//! The only point where generated SQL text receives a caller-supplied value.

use crate::db::quote_literal;
use crate::error::{OttoError, Result};
use regex::{NoExpand, Regex};
use std::fmt;

/// Placeholder standing for the authenticated caller's identifier.
pub const CURRENT_USER_TOKEN: &str = ":currentUserId";

lazy_static::lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r":currentUserId\b").expect("valid token regex");
}

/// Resolved identity of the caller, bound once per orchestrator.
#[derive(Clone, PartialEq, Eq)]
pub struct UserIdentity {
    user_id: String,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(OttoError::Config("user id must not be empty".to_string()));
        }
        Ok(Self { user_id })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Escaped, single-quoted SQL literal of the identifier.
    pub fn sql_literal(&self) -> String {
        quote_literal(&self.user_id)
    }
}

// Keep identifiers out of logs.
impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity").field("user_id", &"<redacted>").finish()
    }
}

/// Replace every reserved token in `sql` with the caller's quoted literal.
pub fn substitute(sql: &str, identity: &UserIdentity) -> String {
    TOKEN_RE
        .replace_all(sql, NoExpand(&identity.sql_literal()))
        .into_owned()
}

pub fn contains_token(sql: &str) -> bool {
    TOKEN_RE.is_match(sql)
}
