//! Login sessions for the web front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cookie-bound login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSession {
    pub token: String,
    pub account_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
}

impl WebSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
