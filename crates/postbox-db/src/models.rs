//! Database row types. These map directly to SQLite rows and are converted
//! into `postbox-types` models at the edge of this crate.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use postbox_types::models::{DeleteState, Message, PersonName, Role, UserContact};
use postbox_types::{MessageId, UserId};

/// Storage format for `created_at`. Fixed width, so text order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub struct UserRow {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<UserRow> for UserContact {
    fn from(row: UserRow) -> Self {
        UserContact {
            id: row.id,
            name: PersonName {
                first_name: row.first_name,
                last_name: row.last_name,
            },
            email: row.email,
        }
    }
}

/// A message to insert. Subject and body must already be sanitized.
pub struct NewMessage<'a> {
    pub user_from: UserId,
    pub user_to: UserId,
    pub subject: &'a str,
    pub body: &'a str,
    pub respond: MessageId,
    pub created_at: DateTime<Utc>,
}

pub struct MessageRow {
    pub id: MessageId,
    pub user_from: UserId,
    pub user_to: UserId,
    pub subject: String,
    pub message: String,
    pub respond: MessageId,
    pub opened: bool,
    pub sender_delete: String,
    pub receiver_delete: String,
    pub created_at: String,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub receiver_first_name: Option<String>,
    pub receiver_last_name: Option<String>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        let created_at = parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on message {}", row.created_at, row.id);
            DateTime::default()
        });

        Message {
            id: row.id,
            user_from: row.user_from,
            user_to: row.user_to,
            subject: row.subject,
            body: row.message,
            respond: row.respond,
            opened: row.opened,
            delete_state: DeleteState::from_flags(
                is_flag_set(&row.sender_delete),
                is_flag_set(&row.receiver_delete),
            ),
            created_at,
            sender: person_name(row.sender_first_name, row.sender_last_name),
            receiver: person_name(row.receiver_first_name, row.receiver_last_name),
        }
    }
}

/// LEFT JOIN misses come back as NULL on both columns.
fn person_name(first: Option<String>, last: Option<String>) -> Option<PersonName> {
    if first.is_none() && last.is_none() {
        return None;
    }
    Some(PersonName {
        first_name: first.unwrap_or_default(),
        last_name: last.unwrap_or_default(),
    })
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts our own format plus SQLite's `datetime('now')` and RFC 3339,
/// since rows may also be written by the host application.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
        return Some(ts);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map(|ndt| ndt.and_utc())
        .ok()
}

pub fn is_flag_set(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("y")
}

/// Column holding `role`'s soft-delete flag.
pub fn delete_column(role: Role) -> &'static str {
    match role {
        Role::Sender => "sender_delete",
        Role::Receiver => "receiver_delete",
    }
}
