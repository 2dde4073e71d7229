use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row per original Telegram channel post, correlating the post with its
/// Discord mirror, the mirror's discussion thread and the copy of the post in
/// the channel's linked discussion chat. Rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLink {
    pub id: i64,
    pub telegram_message_id: i32,
    pub telegram_channel_id: i64,
    pub discord_message_id: u64,
    pub discord_channel_id: u64,
    /// Set once when the discussion thread is opened; a link without it is
    /// still in progress and must not be matched by thread-keyed lookups.
    pub discord_thread_id: Option<u64>,
    /// Identity of the auto-forwarded copy in the linked discussion chat.
    /// Absent until the bridge first observes that copy.
    pub chat_message_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageLink {
    pub fn new(
        telegram_message_id: i32,
        telegram_channel_id: i64,
        discord_message_id: u64,
        discord_channel_id: u64,
        discord_thread_id: Option<u64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            telegram_message_id,
            telegram_channel_id,
            discord_message_id,
            discord_channel_id,
            discord_thread_id,
            chat_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
