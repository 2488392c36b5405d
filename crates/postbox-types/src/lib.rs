pub mod api;
pub mod models;

/// Row id of a user in the host application's user table.
pub type UserId = i64;

/// Row id of a message. `0` is reserved: it marks a message as a conversation root.
pub type MessageId = i64;
