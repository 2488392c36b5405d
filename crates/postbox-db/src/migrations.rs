use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::TableNames;

/// Create the message table (and a minimal user table when the host has none).
/// Safe to run on every open.
pub fn run(conn: &Connection, tables: &TableNames) -> Result<()> {
    let users = tables.users();
    let messages = tables.messages();

    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {users} (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name  TEXT NOT NULL DEFAULT '',
            last_name   TEXT NOT NULL DEFAULT '',
            email       TEXT NOT NULL DEFAULT ''
        );

        -- AUTOINCREMENT keeps ids strictly increasing even after purges
        CREATE TABLE IF NOT EXISTS {messages} (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            user_to          INTEGER NOT NULL,
            user_from        INTEGER NOT NULL,
            subject          TEXT NOT NULL,
            message          TEXT NOT NULL,
            respond          INTEGER NOT NULL DEFAULT 0,
            opened           INTEGER NOT NULL DEFAULT 0,
            sender_delete    TEXT NOT NULL DEFAULT 'n' CHECK (sender_delete IN ('y', 'n')),
            receiver_delete  TEXT NOT NULL DEFAULT 'n' CHECK (receiver_delete IN ('y', 'n')),
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_{messages}_inbox
            ON {messages}(user_to, respond, opened);

        CREATE INDEX IF NOT EXISTS idx_{messages}_outbox
            ON {messages}(user_from, respond);

        CREATE INDEX IF NOT EXISTS idx_{messages}_thread
            ON {messages}(respond, created_at);
        ",
    ))?;

    info!("Database migrations complete ({}, {})", users, messages);
    Ok(())
}
