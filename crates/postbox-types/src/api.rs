use serde::Deserialize;

use crate::{MessageId, UserId};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

// -- Messages --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub to: UserId,
    pub subject: String,
    pub body: String,
    /// Root message this replies to. Absent or `0` starts a new conversation.
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

// -- Pagination --

/// 1-based page request for the inbox/outbox listing.
///
/// Out-of-range input is clamped rather than rejected: page 0 reads as page 1
/// and `per_page` is held to `1..=MAX_PER_PAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn limit(&self) -> u32 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1).saturating_mul(u64::from(self.limit()))
    }
}
