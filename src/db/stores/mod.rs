use async_trait::async_trait;

use super::StoreError;
use super::models::MessageLink;

/// Durable table of Telegram<->Discord message identity records. All
/// operations complete before the calling handler proceeds; there are no
/// list or delete operations.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Route a Discord thread reply back to its Telegram post. Links whose
    /// thread is not yet created are never returned.
    async fn find_by_thread(&self, thread_id: u64) -> Result<Option<MessageLink>, StoreError>;

    /// Route a Telegram edit or a linked-chat reply back to the mirror.
    async fn find_by_telegram_message_id(
        &self,
        telegram_message_id: i32,
    ) -> Result<Option<MessageLink>, StoreError>;

    /// Resolve a message arriving in the linked discussion chat that carries
    /// a forward-origin reference to the original channel post.
    async fn find_by_forwarded_id(
        &self,
        original_message_id: i32,
    ) -> Result<Option<MessageLink>, StoreError>;

    /// Insert a new row, returning it with its assigned id. Fails with
    /// [`StoreError::DuplicateLink`] when `telegram_message_id` is already
    /// present.
    async fn create(&self, link: &MessageLink) -> Result<MessageLink, StoreError>;

    /// Persist a mutation of an existing row by primary key. Fails with
    /// [`StoreError::NotFound`] when the row no longer exists.
    async fn update(&self, link: &MessageLink) -> Result<(), StoreError>;
}
