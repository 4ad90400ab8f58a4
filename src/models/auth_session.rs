use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logged-in admin session backed by the `auth_sessions` table.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub id: i64,
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}
