//! Auth session database operations

use chrono::{Duration, Utc};
use rusqlite::{params, Result as SqliteResult};
use uuid::Uuid;

use super::super::sqlite::parse_timestamp;
use super::super::Database;
use crate::models::AuthSession;

const SESSION_TTL_HOURS: i64 = 24;

impl Database {
    /// Create a new auth session for web login
    pub fn create_auth_session(&self, username: &str) -> SqliteResult<AuthSession> {
        let conn = self.conn.lock().unwrap();
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + Duration::hours(SESSION_TTL_HOURS);

        conn.execute(
            "INSERT INTO auth_sessions (token, username, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token,
                username,
                created_at.to_rfc3339(),
                expires_at.to_rfc3339()
            ],
        )?;

        Ok(AuthSession {
            id: conn.last_insert_rowid(),
            token,
            username: username.to_string(),
            created_at,
            expires_at,
        })
    }

    /// Validate a session token and extend its expiry if valid
    pub fn validate_auth_session(&self, token: &str) -> SqliteResult<Option<AuthSession>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT id, token, username, created_at, expires_at
             FROM auth_sessions WHERE token = ?1 AND expires_at > ?2",
        )?;

        let session = stmt
            .query_row(params![token, now_str], |row| {
                let created_at: String = row.get(3)?;
                let expires_at: String = row.get(4)?;

                Ok(AuthSession {
                    id: row.get(0)?,
                    token: row.get(1)?,
                    username: row.get(2)?,
                    created_at: parse_timestamp(&created_at),
                    expires_at: parse_timestamp(&expires_at),
                })
            })
            .ok();

        // Extend session expiry on successful validation (keep active sessions alive)
        if session.is_some() {
            let new_expires = (now + Duration::hours(SESSION_TTL_HOURS)).to_rfc3339();
            let _ = conn.execute(
                "UPDATE auth_sessions SET expires_at = ?1 WHERE token = ?2",
                params![new_expires, token],
            );
        }

        Ok(session)
    }

    /// Delete a session (logout)
    pub fn delete_auth_session(&self, token: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE token = ?1",
            params![token],
        )?;
        Ok(rows > 0)
    }
}
