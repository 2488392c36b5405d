use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, UserId};

/// Which side of a message a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// Roles `user` holds on a message from `user_from` to `user_to`.
    /// A self-addressed message makes the user both parties.
    pub fn roles_of(user: UserId, user_from: UserId, user_to: UserId) -> &'static [Role] {
        match (user == user_from, user == user_to) {
            (true, true) => &[Role::Sender, Role::Receiver],
            (true, false) => &[Role::Sender],
            (false, true) => &[Role::Receiver],
            (false, false) => &[],
        }
    }
}

/// Soft-delete state of a message, folded from the two per-party flags.
///
/// Each party can only ever hide the message from themselves. Once both have,
/// the row is `Purgeable` and the next sweep removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteState {
    Visible,
    HiddenFromSender,
    HiddenFromReceiver,
    Purgeable,
}

impl DeleteState {
    pub fn from_flags(sender_deleted: bool, receiver_deleted: bool) -> Self {
        match (sender_deleted, receiver_deleted) {
            (false, false) => Self::Visible,
            (true, false) => Self::HiddenFromSender,
            (false, true) => Self::HiddenFromReceiver,
            (true, true) => Self::Purgeable,
        }
    }

    pub fn sender_deleted(self) -> bool {
        matches!(self, Self::HiddenFromSender | Self::Purgeable)
    }

    pub fn receiver_deleted(self) -> bool {
        matches!(self, Self::HiddenFromReceiver | Self::Purgeable)
    }

    /// State after `role` deletes the message. Flags only ever flip one way.
    pub fn after_delete_by(self, role: Role) -> Self {
        match role {
            Role::Sender => Self::from_flags(true, self.receiver_deleted()),
            Role::Receiver => Self::from_flags(self.sender_deleted(), true),
        }
    }

    pub fn is_visible_to(self, role: Role) -> bool {
        match role {
            Role::Sender => !self.sender_deleted(),
            Role::Receiver => !self.receiver_deleted(),
        }
    }

    pub fn is_purgeable(self) -> bool {
        self == Self::Purgeable
    }
}

/// Result of a single soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// No message with that id.
    NotFound,
    /// The caller is neither sender nor recipient; nothing changed.
    NotParticipant,
    /// The caller's flag(s) were set. `purged` means the row is gone for good.
    Deleted { state: DeleteState, purged: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first_name: String,
    pub last_name: String,
}

impl PersonName {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// The slice of the host's user record this layer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub id: UserId,
    pub name: PersonName,
    pub email: String,
}

/// A stored message with the display names of its parties.
///
/// Subject and body are already HTML-escaped. `receiver` is only populated on
/// conversation roots; replies carry the sender's name alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub user_from: UserId,
    pub user_to: UserId,
    pub subject: String,
    pub body: String,
    /// `0` for a conversation root, otherwise the id this message replies to.
    pub respond: MessageId,
    pub opened: bool,
    pub delete_state: DeleteState,
    pub created_at: DateTime<Utc>,
    pub sender: Option<PersonName>,
    pub receiver: Option<PersonName>,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.respond == 0
    }
}

/// A conversation root plus its visible replies, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub message: Message,
    pub replies: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_transitions_follow_the_four_state_table() {
        use DeleteState::*;

        assert_eq!(Visible.after_delete_by(Role::Sender), HiddenFromSender);
        assert_eq!(Visible.after_delete_by(Role::Receiver), HiddenFromReceiver);
        assert_eq!(HiddenFromSender.after_delete_by(Role::Receiver), Purgeable);
        assert_eq!(HiddenFromReceiver.after_delete_by(Role::Sender), Purgeable);

        // Repeating a delete is a no-op
        assert_eq!(HiddenFromSender.after_delete_by(Role::Sender), HiddenFromSender);
        assert_eq!(Purgeable.after_delete_by(Role::Receiver), Purgeable);
    }

    #[test]
    fn visibility_is_per_party() {
        let state = DeleteState::HiddenFromSender;
        assert!(!state.is_visible_to(Role::Sender));
        assert!(state.is_visible_to(Role::Receiver));
        assert!(!state.is_purgeable());
        assert!(DeleteState::Purgeable.is_purgeable());
    }

    #[test]
    fn flags_roundtrip_through_state() {
        for sender in [false, true] {
            for receiver in [false, true] {
                let state = DeleteState::from_flags(sender, receiver);
                assert_eq!(state.sender_deleted(), sender);
                assert_eq!(state.receiver_deleted(), receiver);
            }
        }
    }

    #[test]
    fn roles_of_distinguishes_outsiders() {
        assert_eq!(Role::roles_of(1, 1, 2), &[Role::Sender]);
        assert_eq!(Role::roles_of(2, 1, 2), &[Role::Receiver]);
        assert!(Role::roles_of(3, 1, 2).is_empty());
        assert_eq!(Role::roles_of(1, 1, 1), &[Role::Sender, Role::Receiver]);
    }

    #[test]
    fn full_name_skips_missing_parts() {
        let name = PersonName {
            first_name: "Ada".into(),
            last_name: String::new(),
        };
        assert_eq!(name.full_name(), "Ada");
    }

    #[test]
    fn delete_outcome_serializes_tagged() {
        let json = serde_json::to_value(DeleteOutcome::Deleted {
            state: DeleteState::HiddenFromReceiver,
            purged: false,
        })
        .unwrap();
        assert_eq!(json["outcome"], "deleted");
        assert_eq!(json["state"], "hidden_from_receiver");
    }
}
