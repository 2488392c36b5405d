use postbox_types::UserId;

/// Supplies the calling user's id. `None` means the caller is not authenticated.
///
/// The host resolves identity however it likes (session cookie, JWT claims)
/// and passes the result into every service call.
pub trait IdentityProvider {
    fn current_user_id(&self) -> Option<UserId>;
}

/// Identity already resolved by the host for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    user_id: Option<UserId>,
}

impl Session {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl IdentityProvider for Session {
    fn current_user_id(&self) -> Option<UserId> {
        self.user_id
    }
}

impl IdentityProvider for Option<UserId> {
    fn current_user_id(&self) -> Option<UserId> {
        *self
    }
}
