//! Private messaging between users of a host application: send, list,
//! read threads, mark read, and two-sided soft delete.

pub mod config;
pub mod error;
pub mod identity;
pub mod notify;
pub mod sanitize;
pub mod service;

pub use config::Config;
pub use error::MessagingError;
pub use identity::{IdentityProvider, Session};
pub use notify::{Notification, Notifier};
pub use service::MessagingService;
