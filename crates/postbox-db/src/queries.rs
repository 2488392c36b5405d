use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::debug;

use postbox_types::models::{DeleteOutcome, DeleteState, Role, UserContact};
use postbox_types::{MessageId, UserId};

use crate::Database;
use crate::models::{MessageRow, NewMessage, UserRow, delete_column, format_timestamp, is_flag_set};

/// `?2` is the viewing user. A row is visible to them while the flag for
/// whichever side they are on is still 'n'.
const VISIBLE_TO_USER: &str = "((m.user_from = ?2 AND m.sender_delete = 'n')
      OR (m.user_to = ?2 AND m.receiver_delete = 'n'))";

impl Database {
    // -- Users --

    pub fn create_user(&self, first_name: &str, last_name: &str, email: &str) -> Result<UserId> {
        let sql = format!(
            "INSERT INTO {} (first_name, last_name, email) VALUES (?1, ?2, ?3)",
            self.tables().users()
        );
        self.with_conn(|conn| {
            conn.execute(&sql, (first_name, last_name, email))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn user_exists(&self, id: UserId) -> Result<bool> {
        let users = self.tables().users();
        self.with_conn(|conn| user_exists(conn, users, id))
    }

    pub fn get_user_contact(&self, id: UserId) -> Result<Option<UserContact>> {
        let sql = format!(
            "SELECT id, first_name, last_name, email FROM {} WHERE id = ?1",
            self.tables().users()
        );
        self.with_conn(|conn| {
            let row = conn
                .query_row(&sql, [id], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                        email: row.get(3)?,
                    })
                })
                .optional()?;
            Ok(row.map(UserContact::from))
        })
    }

    // -- Messages --

    /// Insert a message if its recipient exists. The existence check and the
    /// insert share one transaction. Returns `None` when the recipient is missing.
    pub fn insert_message(&self, new: &NewMessage<'_>) -> Result<Option<MessageId>> {
        let users = self.tables().users();
        let sql = format!(
            "INSERT INTO {} (user_to, user_from, subject, message, respond, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            self.tables().messages()
        );

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            if !user_exists(&tx, users, new.user_to)? {
                return Ok(None);
            }

            tx.execute(
                &sql,
                rusqlite::params![
                    new.user_to,
                    new.user_from,
                    new.subject,
                    new.body,
                    new.respond,
                    format_timestamp(new.created_at),
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(Some(id))
        })
    }

    /// Unread conversation roots addressed to `user`. Unread replies are not counted.
    pub fn count_unread(&self, user: UserId) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}
             WHERE user_to = ?1 AND opened = 0 AND receiver_delete = 'n' AND respond = 0",
            self.tables().messages()
        );
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(&sql, [user], |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    /// Conversation roots `user` sent or received and has not deleted, newest first.
    pub fn list_conversations(&self, user: UserId, limit: u32, offset: u64) -> Result<Vec<MessageRow>> {
        let sql = format!(
            "{select}
             WHERE (m.user_to = ?2 OR m.user_from = ?2)
               AND m.respond = 0
               AND {VISIBLE_TO_USER}
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ?3 OFFSET ?4",
            select = self.select_with_names(true),
        );
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            // ?1 is unused here; keeps the visibility clause's numbering shared
            let rows = stmt
                .query_map(rusqlite::params![0, user, i64::from(limit), offset], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// A single message, if `user` is a party to it and has not deleted it.
    pub fn get_visible_message(&self, id: MessageId, user: UserId) -> Result<Option<MessageRow>> {
        let sql = format!(
            "{select}
             WHERE m.id = ?1
               AND (m.user_to = ?2 OR m.user_from = ?2)
               AND {VISIBLE_TO_USER}",
            select = self.select_with_names(true),
        );
        self.with_conn(|conn| {
            let row = conn
                .query_row(&sql, rusqlite::params![id, user], map_message_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Replies to `root` still visible to `user`, oldest first. Only the
    /// sender's name is joined.
    pub fn get_visible_replies(&self, root: MessageId, user: UserId) -> Result<Vec<MessageRow>> {
        let sql = format!(
            "{select}
             WHERE m.respond = ?1
               AND {VISIBLE_TO_USER}
             ORDER BY m.created_at ASC, m.id ASC",
            select = self.select_with_names(false),
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![root, user], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip `opened` on, only where `user` is the recipient. Returns whether a row matched.
    pub fn mark_read(&self, id: MessageId, user: UserId) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET opened = 1 WHERE id = ?1 AND user_to = ?2",
            self.tables().messages()
        );
        self.with_conn(|conn| Ok(conn.execute(&sql, [id, user])? > 0))
    }

    /// Set `user`'s delete flag(s) on a message, then purge the row if both
    /// parties have now deleted it. Lookup, update and purge share one transaction.
    pub fn soft_delete(&self, id: MessageId, user: UserId) -> Result<DeleteOutcome> {
        let messages = self.tables().messages();
        let lookup = format!(
            "SELECT user_from, user_to, sender_delete, receiver_delete FROM {messages} WHERE id = ?1"
        );

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let found = tx
                .query_row(&lookup, [id], |row| {
                    Ok((
                        row.get::<_, UserId>(0)?,
                        row.get::<_, UserId>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .optional()?;

            let Some((user_from, user_to, sender_delete, receiver_delete)) = found else {
                return Ok(DeleteOutcome::NotFound);
            };

            let roles = Role::roles_of(user, user_from, user_to);
            if roles.is_empty() {
                return Ok(DeleteOutcome::NotParticipant);
            }

            let mut state =
                DeleteState::from_flags(is_flag_set(&sender_delete), is_flag_set(&receiver_delete));
            // Only write flags for sides the caller can still see
            let before = state;
            for &role in roles.iter().filter(move |&&role| before.is_visible_to(role)) {
                tx.execute(
                    &format!("UPDATE {messages} SET {} = 'y' WHERE id = ?1", delete_column(role)),
                    [id],
                )?;
                state = state.after_delete_by(role);
            }

            let purged = state.is_purgeable() && purge_fully_deleted(&tx, messages, Some(id))? > 0;
            tx.commit()?;

            Ok(DeleteOutcome::Deleted { state, purged })
        })
    }

    /// Ids of a conversation root and every direct reply to it.
    pub fn conversation_message_ids(&self, root: MessageId) -> Result<Vec<MessageId>> {
        let sql = format!(
            "SELECT id FROM {} WHERE id = ?1 OR respond = ?1 ORDER BY id",
            self.tables().messages()
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map([root], |row| row.get::<_, MessageId>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Remove every row both parties have deleted, across the whole table.
    pub fn purge_fully_deleted(&self) -> Result<usize> {
        let messages = self.tables().messages();
        self.with_conn(|conn| purge_fully_deleted(conn, messages, None))
    }

    fn select_with_names(&self, with_receiver: bool) -> String {
        let messages = self.tables().messages();
        let users = self.tables().users();
        let (receiver_cols, receiver_join) = if with_receiver {
            (
                "u_to.first_name, u_to.last_name",
                format!("LEFT JOIN {users} u_to ON m.user_to = u_to.id"),
            )
        } else {
            ("NULL, NULL", String::new())
        };

        format!(
            "SELECT m.id, m.user_from, m.user_to, m.subject, m.message, m.respond, m.opened,
                    m.sender_delete, m.receiver_delete, m.created_at,
                    u_from.first_name, u_from.last_name, {receiver_cols}
             FROM {messages} m
             LEFT JOIN {users} u_from ON m.user_from = u_from.id
             {receiver_join}"
        )
    }
}

fn user_exists(conn: &Connection, users: &str, id: UserId) -> Result<bool> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {users} WHERE id = ?1"),
        [id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn purge_fully_deleted(conn: &Connection, messages: &str, only: Option<MessageId>) -> Result<usize> {
    let removed = match only {
        Some(id) => conn.execute(
            &format!(
                "DELETE FROM {messages} WHERE id = ?1 AND sender_delete = 'y' AND receiver_delete = 'y'"
            ),
            [id],
        )?,
        None => conn.execute(
            &format!("DELETE FROM {messages} WHERE sender_delete = 'y' AND receiver_delete = 'y'"),
            [],
        )?,
    };

    if removed > 0 {
        debug!("Purged {} fully deleted message(s)", removed);
    }
    Ok(removed)
}

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_from: row.get(1)?,
        user_to: row.get(2)?,
        subject: row.get(3)?,
        message: row.get(4)?,
        respond: row.get(5)?,
        opened: row.get(6)?,
        sender_delete: row.get(7)?,
        receiver_delete: row.get(8)?,
        created_at: row.get(9)?,
        sender_first_name: row.get(10)?,
        sender_last_name: row.get(11)?,
        receiver_first_name: row.get(12)?,
        receiver_last_name: row.get(13)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
