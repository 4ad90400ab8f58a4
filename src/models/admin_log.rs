use chrono::{DateTime, Utc};
use serde::Serialize;

/// One append-only audit trail entry for an administrative action.
#[derive(Debug, Clone, Serialize)]
pub struct AdminLog {
    pub id: i64,
    pub username: String,
    pub action: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}
