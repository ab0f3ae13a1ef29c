use async_trait::async_trait;

use crate::{
    domain::{CanonicalId, Chat, ContactCard, GroupSummary},
    Result,
};

/// Hexagonal port for chat access on the authenticated account.
///
/// Implementations should return `Error::NotFound` for unknown ids and
/// `Error::External` for transport failures; both end up as a per-group error.
#[async_trait]
pub trait ChatSource: Send + Sync {
    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat>;

    /// List the group chats visible to the account (used to fill the session cache).
    async fn list_groups(&self) -> Result<Vec<GroupSummary>>;
}

/// Hexagonal port for contact resolution.
///
/// Each call is independent; a failure only affects the id it was made for.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn lookup(&self, id: &CanonicalId) -> Result<ContactCard>;
}
