//! Audit stamping for persisted documents.
//!
//! Every write made through a [`Collection`](super::Collection) records who
//! made it and when:
//! - `_userId`: acting user's id, or `null`
//! - `_userDetails`: acting user's details, or `null`
//! - `_updated`: milliseconds since the Unix epoch
//!
//! Stamps contain only identifiers already carried by the caller's identity.

use chrono::Utc;
use serde_json::Value;

use super::Document;
use crate::request::AuthenticatedUser;

/// Field holding the acting user's id.
pub const USER_ID_FIELD: &str = "_userId";

/// Field holding the acting user's details.
pub const USER_DETAILS_FIELD: &str = "_userDetails";

/// Field holding the modification time in epoch milliseconds.
pub const UPDATED_FIELD: &str = "_updated";

/// Who modified a document and when.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditStamp {
    user_id: Option<String>,
    user_details: Option<Value>,
    updated: i64,
}

impl AuditStamp {
    /// Creates a stamp for `user` at the current time.
    pub fn now(user: Option<&AuthenticatedUser>) -> Self {
        Self::at(user, Utc::now().timestamp_millis())
    }

    /// Creates a stamp for `user` at `updated` epoch milliseconds.
    pub fn at(user: Option<&AuthenticatedUser>, updated: i64) -> Self {
        Self {
            user_id: user.and_then(|u| u.user_id.clone()),
            user_details: user.and_then(|u| u.user_details.clone()),
            updated,
        }
    }

    /// Returns the acting user's id.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the modification time in epoch milliseconds.
    pub fn updated(&self) -> i64 {
        self.updated
    }

    /// Writes the audit fields into `doc`, overwriting previous values.
    pub fn apply(&self, doc: &mut Document) {
        doc.insert(
            USER_ID_FIELD.to_string(),
            self.user_id.clone().map_or(Value::Null, Value::String),
        );
        doc.insert(
            USER_DETAILS_FIELD.to_string(),
            self.user_details.clone().unwrap_or(Value::Null),
        );
        doc.insert(UPDATED_FIELD.to_string(), Value::from(self.updated));
    }
}
