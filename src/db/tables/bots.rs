//! Bot definition database operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

use super::super::sqlite::parse_timestamp;
use super::super::Database;
use crate::models::{Bot, BotStatus};

const BOT_COLUMNS: &str =
    "id, name, token, description, is_active, status, webhook_url, created_at, updated_at, started_at";

fn bot_from_row(row: &Row) -> SqliteResult<Bot> {
    let status_str: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    let started_at: Option<String> = row.get(9)?;

    Ok(Bot {
        id: row.get(0)?,
        name: row.get(1)?,
        token: row.get(2)?,
        description: row.get(3)?,
        is_active: row.get(4)?,
        status: BotStatus::from_str(&status_str).unwrap_or_default(),
        webhook_url: row.get(6)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        started_at: started_at.as_deref().map(parse_timestamp),
    })
}

impl Database {
    /// Insert a new bot definition. Name and token must be unique.
    pub fn create_bot(
        &self,
        name: &str,
        token: &str,
        description: Option<&str>,
    ) -> SqliteResult<Bot> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO bots (name, token, description, is_active, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, 'stopped', ?4, ?5)",
            params![name, token, description, now_str, now_str],
        )?;

        Ok(Bot {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            token: token.to_string(),
            description: description.map(str::to_string),
            is_active: false,
            status: BotStatus::Stopped,
            webhook_url: None,
            created_at: now,
            updated_at: now,
            started_at: None,
        })
    }

    pub fn get_bot(&self, bot_id: i64) -> SqliteResult<Option<Bot>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM bots WHERE id = ?1", BOT_COLUMNS),
            params![bot_id],
            bot_from_row,
        )
        .optional()
    }

    pub fn get_bot_by_name(&self, name: &str) -> SqliteResult<Option<Bot>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM bots WHERE name = ?1", BOT_COLUMNS),
            params![name],
            bot_from_row,
        )
        .optional()
    }

    pub fn list_bots(&self) -> SqliteResult<Vec<Bot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM bots ORDER BY id", BOT_COLUMNS))?;
        let rows = stmt.query_map([], bot_from_row)?;
        rows.collect()
    }

    /// Update the editable fields of a bot definition. Fields left as None
    /// are untouched. Returns the refreshed record.
    pub fn update_bot(
        &self,
        bot_id: i64,
        name: Option<&str>,
        token: Option<&str>,
        description: Option<&str>,
        webhook_url: Option<&str>,
    ) -> SqliteResult<Option<Bot>> {
        {
            let conn = self.conn.lock().unwrap();
            let now = Utc::now().to_rfc3339();

            if let Some(name) = name {
                conn.execute(
                    "UPDATE bots SET name = ?1 WHERE id = ?2",
                    params![name, bot_id],
                )?;
            }
            if let Some(token) = token {
                conn.execute(
                    "UPDATE bots SET token = ?1 WHERE id = ?2",
                    params![token, bot_id],
                )?;
            }
            if let Some(description) = description {
                conn.execute(
                    "UPDATE bots SET description = ?1 WHERE id = ?2",
                    params![description, bot_id],
                )?;
            }
            if let Some(webhook_url) = webhook_url {
                conn.execute(
                    "UPDATE bots SET webhook_url = ?1 WHERE id = ?2",
                    params![webhook_url, bot_id],
                )?;
            }

            conn.execute(
                "UPDATE bots SET updated_at = ?1 WHERE id = ?2",
                params![now, bot_id],
            )?;
        }

        self.get_bot(bot_id)
    }

    pub fn delete_bot(&self, bot_id: i64) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM bots WHERE id = ?1", params![bot_id])?;
        Ok(rows > 0)
    }

    /// Runtime-status writer used by the lifecycle registry on a successful start.
    pub fn mark_bot_started(&self, bot_id: i64) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE bots SET status = 'running', is_active = 1, started_at = ?1, updated_at = ?2
             WHERE id = ?3",
            params![now, now, bot_id],
        )?;
        Ok(rows > 0)
    }

    /// Runtime-status writer used by the lifecycle registry on stop.
    pub fn mark_bot_stopped(&self, bot_id: i64) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE bots SET status = 'stopped', is_active = 0, started_at = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now, bot_id],
        )?;
        Ok(rows > 0)
    }

    /// Runtime-status writer used when a worker fails to build or dies in flight.
    pub fn mark_bot_errored(&self, bot_id: i64) -> SqliteResult<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE bots SET status = 'error', is_active = 0, updated_at = ?1 WHERE id = ?2",
            params![now, bot_id],
        )?;
        Ok(rows > 0)
    }

    pub fn count_bots_with_status(&self, status: BotStatus) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM bots WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db").to_str().unwrap()).unwrap();
        (db, dir)
    }

    #[test]
    fn test_create_and_get_bot() {
        let (db, _dir) = test_db();

        let bot = db
            .create_bot("echo-bot", "123:token-a", Some("an echo bot"))
            .unwrap();
        assert_eq!(bot.status, BotStatus::Stopped);
        assert!(!bot.is_active);
        assert!(bot.started_at.is_none());

        let fetched = db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(fetched.name, "echo-bot");
        assert_eq!(fetched.token, "123:token-a");
        assert_eq!(fetched.description.as_deref(), Some("an echo bot"));

        let by_name = db.get_bot_by_name("echo-bot").unwrap().unwrap();
        assert_eq!(by_name.id, bot.id);

        assert!(db.get_bot(999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let (db, _dir) = test_db();

        db.create_bot("dup", "123:token-a", None).unwrap();
        assert!(db.create_bot("dup", "456:token-b", None).is_err());
        // Token uniqueness too
        assert!(db.create_bot("other", "123:token-a", None).is_err());
    }

    #[test]
    fn test_update_bot_partial() {
        let (db, _dir) = test_db();

        let bot = db.create_bot("before", "123:token-a", None).unwrap();
        let updated = db
            .update_bot(bot.id, Some("after"), None, Some("now described"), None)
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "after");
        assert_eq!(updated.token, "123:token-a");
        assert_eq!(updated.description.as_deref(), Some("now described"));
        assert!(updated.updated_at >= bot.updated_at);
    }

    #[test]
    fn test_delete_bot() {
        let (db, _dir) = test_db();

        let bot = db.create_bot("gone", "123:token-a", None).unwrap();
        assert!(db.delete_bot(bot.id).unwrap());
        assert!(db.get_bot(bot.id).unwrap().is_none());
        assert!(!db.delete_bot(bot.id).unwrap());
    }

    #[test]
    fn test_status_writers() {
        let (db, _dir) = test_db();

        let bot = db.create_bot("statey", "123:token-a", None).unwrap();

        assert!(db.mark_bot_started(bot.id).unwrap());
        let running = db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(running.status, BotStatus::Running);
        assert!(running.is_active);
        assert!(running.started_at.is_some());

        assert!(db.mark_bot_stopped(bot.id).unwrap());
        let stopped = db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(stopped.status, BotStatus::Stopped);
        assert!(!stopped.is_active);
        assert!(stopped.started_at.is_none());

        assert!(db.mark_bot_errored(bot.id).unwrap());
        let errored = db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(errored.status, BotStatus::Error);
        assert!(!errored.is_active);

        assert!(!db.mark_bot_started(999).unwrap());
    }

    #[test]
    fn test_count_bots_with_status() {
        let (db, _dir) = test_db();

        let a = db.create_bot("a", "1:t", None).unwrap();
        db.create_bot("b", "2:t", None).unwrap();
        db.mark_bot_errored(a.id).unwrap();

        assert_eq!(db.count_bots_with_status(BotStatus::Error).unwrap(), 1);
        assert_eq!(db.count_bots_with_status(BotStatus::Stopped).unwrap(), 1);
        assert_eq!(db.count_bots_with_status(BotStatus::Running).unwrap(), 0);
    }
}
