pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Result, anyhow, bail};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

const MAX_IDENTIFIER_LEN: usize = 64;

/// Names of the two tables this layer touches. They are spliced into SQL
/// text, so construction validates them as plain identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    users: String,
    messages: String,
}

impl TableNames {
    pub fn new(users: impl Into<String>, messages: impl Into<String>) -> Result<Self> {
        let users = users.into();
        let messages = messages.into();
        validate_identifier(&users)?;
        validate_identifier(&messages)?;
        // SQLite identifiers are case-insensitive
        if users.eq_ignore_ascii_case(&messages) {
            bail!("Users and messages tables must differ (both are '{}')", users);
        }
        Ok(Self { users, messages })
    }

    pub fn users(&self) -> &str {
        &self.users
    }

    pub fn messages(&self) -> &str {
        &self.messages
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            users: "users".to_string(),
            messages: "messages".to_string(),
        }
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || name.len() > MAX_IDENTIFIER_LEN {
        bail!("Invalid table name: '{}'", name);
    }
    Ok(())
}

pub struct Database {
    conn: Mutex<Connection>,
    tables: TableNames,
}

impl Database {
    pub fn open(path: &Path, tables: TableNames) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from the host application
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn, &tables)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            tables,
        })
    }

    pub fn open_in_memory(tables: TableNames) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn, &tables)?;

        Ok(Self {
            conn: Mutex::new(conn),
            tables,
        })
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}
