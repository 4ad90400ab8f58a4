//! Admin activity log database operations

use chrono::Utc;
use rusqlite::{params, Result as SqliteResult};

use super::super::sqlite::parse_timestamp;
use super::super::Database;
use crate::models::AdminLog;

impl Database {
    /// Append an audit entry. Entries are never mutated or deleted.
    pub fn insert_admin_log(
        &self,
        username: &str,
        action: &str,
        details: Option<&str>,
        ip_address: Option<&str>,
    ) -> SqliteResult<AdminLog> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO admin_logs (username, action, details, ip_address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, action, details, ip_address, now.to_rfc3339()],
        )?;

        Ok(AdminLog {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            action: action.to_string(),
            details: details.map(str::to_string),
            ip_address: ip_address.map(str::to_string),
            created_at: now,
        })
    }

    /// Most recent entries first.
    pub fn list_admin_logs(&self, limit: i64) -> SqliteResult<Vec<AdminLog>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, username, action, details, ip_address, created_at
             FROM admin_logs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            let created_at: String = row.get(5)?;
            Ok(AdminLog {
                id: row.get(0)?,
                username: row.get(1)?,
                action: row.get(2)?,
                details: row.get(3)?,
                ip_address: row.get(4)?,
                created_at: parse_timestamp(&created_at),
            })
        })?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_insert_and_list_newest_first() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db").to_str().unwrap()).unwrap();

        db.insert_admin_log("admin", "login", Some("Admin logged in"), Some("127.0.0.1"))
            .unwrap();
        db.insert_admin_log("admin", "add_bot", Some("Added new bot: echo"), None)
            .unwrap();
        db.insert_admin_log("admin", "start_bot", Some("Started bot: echo"), None)
            .unwrap();

        let logs = db.list_admin_logs(10).unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].action, "start_bot");
        assert_eq!(logs[2].action, "login");
        assert_eq!(logs[2].ip_address.as_deref(), Some("127.0.0.1"));

        let limited = db.list_admin_logs(2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].action, "start_bot");
    }
}
