use thiserror::Error;

use postbox_types::UserId;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("no authenticated user")]
    NotAuthenticated,

    /// A required field was empty. The store was not touched.
    #[error("{0} must not be empty")]
    ValidationFailed(&'static str),

    #[error("recipient {0} does not exist")]
    RecipientNotFound(UserId),

    /// Already logged by the service when returned.
    #[error("persistence failed: {0:#}")]
    PersistenceFailed(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
