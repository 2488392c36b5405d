use chrono::Utc;
use tracing::{debug, error, info, warn};

use postbox_db::Database;
use postbox_db::models::NewMessage;
use postbox_types::api::{PageRequest, SendMessageRequest};
use postbox_types::models::{Conversation, DeleteOutcome, Message};
use postbox_types::{MessageId, UserId};

use crate::config::Config;
use crate::error::{MessagingError, Result};
use crate::identity::IdentityProvider;
use crate::notify::{Notification, Notifier};
use crate::sanitize::{sanitize_body, sanitize_subject, trim_input};

/// Private messages between users of the host application.
///
/// Every operation takes the caller's identity explicitly and fails with
/// `NotAuthenticated` when there is none. Store failures are logged here and
/// surfaced as `PersistenceFailed`.
pub struct MessagingService {
    db: Database,
    website_email: String,
    notifications: bool,
    notifier: Option<Box<dyn Notifier>>,
}

impl MessagingService {
    pub fn new(db: Database) -> Self {
        let defaults = Config::default();
        Self {
            db,
            website_email: defaults.website_email,
            notifications: defaults.notifications,
            notifier: None,
        }
    }

    /// Open the configured database. Failing to connect or migrate is fatal.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let db = Database::open(&config.db_path, config.tables.clone())?;
        Ok(Self::new(db)
            .with_website_email(&config.website_email)
            .with_notifications(config.notifications))
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications = enabled;
        self
    }

    pub fn with_website_email(mut self, email: &str) -> Self {
        self.website_email = email.to_string();
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // -- Sending --

    /// Send a message, or a reply when `reply_to` names a conversation root.
    /// Returns the new message id.
    pub fn send_message(
        &self,
        caller: &impl IdentityProvider,
        to: UserId,
        body: &str,
        subject: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId> {
        let from = require_user(caller)?;

        if to <= 0 {
            return Err(MessagingError::ValidationFailed("recipient"));
        }
        if trim_input(body).is_empty() {
            return Err(MessagingError::ValidationFailed("body"));
        }
        if trim_input(subject).is_empty() {
            return Err(MessagingError::ValidationFailed("subject"));
        }
        let respond = reply_to.unwrap_or(0);
        if respond < 0 {
            return Err(MessagingError::ValidationFailed("reply_to"));
        }

        let body = sanitize_body(body);
        let subject = sanitize_subject(subject);

        let id = self
            .db
            .insert_message(&NewMessage {
                user_from: from,
                user_to: to,
                subject: &subject,
                body: &body,
                respond,
                created_at: Utc::now(),
            })
            .map_err(persistence_failed("send_message", from))?
            .ok_or(MessagingError::RecipientNotFound(to))?;

        info!("Message {} sent from user {} to user {}", id, from, to);

        self.notify_recipient(id, from, to, &subject);
        Ok(id)
    }

    pub fn send(&self, caller: &impl IdentityProvider, req: &SendMessageRequest) -> Result<MessageId> {
        self.send_message(caller, req.to, &req.body, &req.subject, req.reply_to)
    }

    // -- Reading --

    /// Unread conversation roots addressed to the caller.
    pub fn unread_count(&self, caller: &impl IdentityProvider) -> Result<u64> {
        let user = require_user(caller)?;
        self.db
            .count_unread(user)
            .map_err(persistence_failed("unread_count", user))
    }

    /// The caller's inbox and outbox roots, newest first.
    pub fn list_messages(&self, caller: &impl IdentityProvider, page: PageRequest) -> Result<Vec<Message>> {
        let user = require_user(caller)?;
        let rows = self
            .db
            .list_conversations(user, page.limit(), page.offset())
            .map_err(persistence_failed("list_messages", user))?;

        debug!(
            "Listed {} conversation(s) for user {} (page {}, {} per page)",
            rows.len(),
            user,
            page.page,
            page.limit()
        );
        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// A message and its replies as the caller sees them. Opening an unread
    /// message as its recipient marks it read.
    pub fn get_message(&self, caller: &impl IdentityProvider, id: MessageId) -> Result<Option<Conversation>> {
        let user = require_user(caller)?;

        let Some(row) = self
            .db
            .get_visible_message(id, user)
            .map_err(persistence_failed("get_message", user))?
        else {
            return Ok(None);
        };
        let mut message = Message::from(row);

        if message.user_to == user && !message.opened && self.mark_as_read(caller, id)? {
            message.opened = true;
        }

        let replies = self
            .db
            .get_visible_replies(id, user)
            .map_err(persistence_failed("get_message", user))?
            .into_iter()
            .map(Message::from)
            .collect();

        Ok(Some(Conversation { message, replies }))
    }

    /// Mark a message read. Only its recipient can; returns whether it matched.
    pub fn mark_as_read(&self, caller: &impl IdentityProvider, id: MessageId) -> Result<bool> {
        let user = require_user(caller)?;
        self.db
            .mark_read(id, user)
            .map_err(persistence_failed("mark_as_read", user))
    }

    // -- Deleting --

    /// Hide a message from the caller. The row is removed once both parties
    /// have deleted it.
    pub fn delete_message(&self, caller: &impl IdentityProvider, id: MessageId) -> Result<DeleteOutcome> {
        let user = require_user(caller)?;
        let outcome = self
            .db
            .soft_delete(id, user)
            .map_err(persistence_failed("delete_message", user))?;

        match outcome {
            DeleteOutcome::NotParticipant => {
                warn!("User {} tried to delete message {} they are not party to", user, id);
            }
            DeleteOutcome::Deleted { purged: true, .. } => {
                info!("Message {} permanently deleted", id);
            }
            DeleteOutcome::Deleted { state, .. } => {
                debug!("Message {} now {:?}", id, state);
            }
            DeleteOutcome::NotFound => {}
        }
        Ok(outcome)
    }

    /// Delete a conversation root and each of its replies for the caller.
    /// Messages are handled one at a time; a failure on one is logged and the
    /// rest still proceed. Returns how many had the caller's flag set.
    pub fn delete_conversation(&self, caller: &impl IdentityProvider, root: MessageId) -> Result<usize> {
        let user = require_user(caller)?;
        let ids = self
            .db
            .conversation_message_ids(root)
            .map_err(persistence_failed("delete_conversation", user))?;

        let mut deleted = 0;
        for id in ids {
            match self.delete_message(caller, id) {
                Ok(DeleteOutcome::Deleted { .. }) => deleted += 1,
                Ok(_) => {}
                Err(e) => warn!("Skipping message {} in conversation {}: {}", id, root, e),
            }
        }

        info!("User {} deleted {} message(s) in conversation {}", user, deleted, root);
        Ok(deleted)
    }

    /// Sweep every row both parties have deleted. Deletes already sweep the
    /// rows they touch; this catches rows flagged by other writers.
    pub fn purge_deleted(&self) -> Result<usize> {
        self.db.purge_fully_deleted().map_err(|e| {
            error!("purge_deleted failed: {:#}", e);
            MessagingError::PersistenceFailed(e)
        })
    }

    fn notify_recipient(&self, id: MessageId, from: UserId, to: UserId, subject: &str) {
        if !self.notifications {
            return;
        }
        let Some(notifier) = &self.notifier else {
            debug!("Notifications enabled but no notifier installed");
            return;
        };

        let contacts = self
            .db
            .get_user_contact(to)
            .and_then(|receiver| Ok((receiver, self.db.get_user_contact(from)?)));

        match contacts {
            Ok((Some(receiver), Some(sender))) => {
                let notification = Notification::new_message(&self.website_email, &receiver, &sender, subject);
                if let Err(e) = notifier.send(&notification) {
                    warn!("Notification for message {} failed: {:#}", id, e);
                }
            }
            Ok(_) => debug!("Skipping notification for message {}: contact missing", id),
            Err(e) => warn!("Notification lookup for message {} failed: {:#}", id, e),
        }
    }
}

fn require_user(caller: &impl IdentityProvider) -> Result<UserId> {
    caller.current_user_id().ok_or(MessagingError::NotAuthenticated)
}

fn persistence_failed(operation: &'static str, user: UserId) -> impl FnOnce(anyhow::Error) -> MessagingError {
    move |e| {
        error!(operation, user_id = user, "Persistence failure: {:#}", e);
        MessagingError::PersistenceFailed(e)
    }
}
