pub mod common;
pub mod discord_parser;
pub mod telegram_parser;

pub use common::{
    AttachmentKind, ChannelPost, ChatAuthor, ChatFile, ChatMessage, DiscordAttachment,
    DiscordPayload, Entity, ForwardOrigin, LinkButton, PendingFile, PendingFileKind, PostKind,
    ReplyEmbed, ReplyRef, StickerKind, TelegramFile, TelegramPayload, ThreadMessage,
};
pub use discord_parser::{fallback_filename, resolved_filename, thread_message_to_telegram};
pub use telegram_parser::{channel_edit_to_discord, channel_post_to_discord, chat_reply_to_discord};
