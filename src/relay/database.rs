//! Persistent SQLite store for users and relayed messages.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Which side of an exchange a logged message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// SQLite store behind a connection mutex.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at the given path and make sure the
    /// schema exists.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn: Mutex::new(conn) };
        db.ensure_schema()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory database");
        let db = Self { conn: Mutex::new(conn) };
        db.ensure_schema().expect("schema creation");
        db
    }

    /// Create the two tables if absent. Safe to run on every startup.
    pub fn ensure_schema(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();

        if !table_exists(&conn, "messages")? {
            info!("Creating messages table");
            conn.execute(
                "CREATE TABLE messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    direction TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    text TEXT NOT NULL,
                    timestamp REAL NOT NULL,
                    profile_pic_path TEXT
                )",
                [],
            )?;
        }

        if !table_exists(&conn, "users")? {
            info!("Creating users table");
            conn.execute(
                "CREATE TABLE users (
                    user_id TEXT PRIMARY KEY,
                    blocked BOOLEAN NOT NULL DEFAULT 0
                )",
                [],
            )?;
        }

        Ok(())
    }

    /// Whether this user has been blocked. Unknown users are not blocked.
    pub fn is_blocked(&self, user_id: &str) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let blocked: Option<bool> = conn
            .query_row(
                "SELECT blocked FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blocked.unwrap_or(false))
    }

    /// Register the user if unseen. Must never touch an existing row, so a
    /// block flag set out-of-band survives.
    pub fn upsert_user(&self, user_id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO users (user_id, blocked) VALUES (?1, 0)",
            params![user_id],
        )?;
        Ok(())
    }

    /// Append one side of an exchange, stamped with the current wall clock.
    /// Store errors are logged and swallowed; relaying must not stall on a
    /// logging failure.
    pub fn append_message(
        &self,
        direction: Direction,
        user_id: &str,
        text: &str,
        profile_pic_path: Option<&str>,
    ) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (direction, user_id, text, timestamp, profile_pic_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![direction.as_str(), user_id, text, timestamp, profile_pic_path],
        )
        .unwrap_or_else(|e| {
            warn!("Failed to log {} message for {user_id}: {e}", direction.as_str());
            0
        });
    }

    /// Administrative toggle; the relay pipeline itself never writes this.
    #[cfg(test)]
    pub fn set_blocked(&self, user_id: &str, blocked: bool) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (user_id, blocked) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET blocked = ?2",
            params![user_id, blocked],
        )
        .expect("set blocked flag");
    }

    #[cfg(test)]
    pub fn messages(&self) -> Vec<MessageRow> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT direction, user_id, text, timestamp, profile_pic_path
                 FROM messages ORDER BY id",
            )
            .unwrap();
        let rows = stmt
            .query_map([], |row| {
                Ok(MessageRow {
                    direction: row.get(0)?,
                    user_id: row.get(1)?,
                    text: row.get(2)?,
                    timestamp: row.get(3)?,
                    profile_pic_path: row.get(4)?,
                })
            })
            .unwrap();
        rows.filter_map(Result::ok).collect()
    }
}

#[cfg(test)]
#[derive(Debug)]
pub struct MessageRow {
    pub direction: String,
    pub user_id: String,
    pub text: String,
    pub timestamp: f64,
    pub profile_pic_path: Option<String>,
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
