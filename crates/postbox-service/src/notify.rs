use anyhow::Result;

use postbox_types::models::UserContact;

/// An outgoing "you have a new message" notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Compose the notice for `receiver`. `subject` is the stored, already
    /// escaped subject of the new message.
    pub fn new_message(from: &str, receiver: &UserContact, sender: &UserContact, subject: &str) -> Self {
        let body = format!(
            "Dear {receiver},\n\n\
             You have a new message.\n\n\
             From: {sender}\n\
             Subject: {subject}\n\n\
             Sign in to read it.\n",
            receiver = receiver.name.full_name(),
            sender = sender.name.full_name(),
        );

        Self {
            from: from.to_string(),
            to: receiver.email.clone(),
            subject: format!("New message: {subject}"),
            body,
        }
    }
}

/// Delivers notifications. Failures never affect the send that triggered them.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbox_types::models::PersonName;

    fn contact(id: i64, first: &str, last: &str, email: &str) -> UserContact {
        UserContact {
            id,
            name: PersonName {
                first_name: first.into(),
                last_name: last.into(),
            },
            email: email.into(),
        }
    }

    #[test]
    fn new_message_notice_names_both_parties() {
        let receiver = contact(2, "Bob", "Baker", "bob@example.com");
        let sender = contact(1, "Alice", "Archer", "alice@example.com");

        let n = Notification::new_message("noreply@example.com", &receiver, &sender, "Lunch?");
        assert_eq!(n.to, "bob@example.com");
        assert_eq!(n.from, "noreply@example.com");
        assert_eq!(n.subject, "New message: Lunch?");
        assert!(n.body.starts_with("Dear Bob Baker,"));
        assert!(n.body.contains("From: Alice Archer"));
        assert!(n.body.contains("Subject: Lunch?"));
    }
}
