use std::path::PathBuf;

use anyhow::{Context, Result};

use postbox_db::TableNames;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub tables: TableNames,
    /// Sender address on notification emails.
    pub website_email: String,
    /// Notifications are off unless explicitly enabled.
    pub notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("postbox.db"),
            tables: TableNames::default(),
            website_email: "noreply@example.com".to_string(),
            notifications: false,
        }
    }
}

impl Config {
    /// Read `POSTBOX_*` variables, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let db_path = get("POSTBOX_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path);
        let users = get("POSTBOX_USERS_TABLE").unwrap_or_else(|| defaults.tables.users().to_string());
        let messages =
            get("POSTBOX_MESSAGES_TABLE").unwrap_or_else(|| defaults.tables.messages().to_string());
        let tables = TableNames::new(users, messages).context("Invalid table configuration")?;
        let website_email = get("POSTBOX_WEBSITE_EMAIL").unwrap_or(defaults.website_email);
        let notifications = match get("POSTBOX_NOTIFICATIONS") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("POSTBOX_NOTIFICATIONS must be a boolean, got '{}'", raw))?,
            None => defaults.notifications,
        };

        Ok(Self {
            db_path,
            tables,
            website_email,
            notifications,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
