use serde::{Deserialize, Serialize};

/// Message kinds are decided once at ingestion; translation code matches on
/// these closed unions instead of probing optional SDK fields per rule.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    TextLink { url: String },
    Other,
}

impl Entity {
    pub fn text_link(&self) -> Option<&str> {
        match self {
            Entity::TextLink { url } => Some(url),
            Entity::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramFile {
    pub file_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StickerKind {
    Static,
    Animated,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PostKind {
    Text {
        text: String,
        entities: Vec<Entity>,
    },
    Photo {
        file: TelegramFile,
        caption: Option<String>,
        entities: Vec<Entity>,
    },
    Video {
        file: TelegramFile,
        caption: Option<String>,
        entities: Vec<Entity>,
    },
    Poll {
        options: Vec<String>,
    },
    Sticker {
        file: TelegramFile,
        kind: StickerKind,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardOrigin {
    pub chat_id: i64,
    pub chat_title: String,
    pub chat_username: Option<String>,
    pub message_id: i32,
}

/// A post authored in the bridged broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPost {
    pub message_id: i32,
    pub chat_id: i64,
    pub kind: PostKind,
    pub author_signature: Option<String>,
    pub forward: Option<ForwardOrigin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAuthor {
    pub first_name: String,
    pub username: Option<String>,
}

/// Reference carried by a reply in the linked discussion chat. When the
/// replied-to message is the auto-forwarded copy of a channel post,
/// `forwarded_message_id` names that post's id in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub message_id: i32,
    pub forwarded_message_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentKind {
    Photo,
    Video,
    Voice,
    Audio,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFile {
    pub file: TelegramFile,
    pub kind: AttachmentKind,
}

/// Any message arriving in the channel's linked discussion chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i32,
    pub chat_id: i64,
    pub author: ChatAuthor,
    /// Text or caption, whichever the message carries.
    pub text: Option<String>,
    pub files: Vec<ChatFile>,
    pub reply_to: Option<ReplyRef>,
    /// Set when this message is itself a forwarded copy of a channel post.
    pub forwarded_message_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordAttachment {
    pub url: String,
    pub filename: Option<String>,
    pub kind: AttachmentKind,
}

/// A human message inside a Discord discussion thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub thread_id: u64,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub attachments: Vec<DiscordAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    pub url: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingFileKind {
    Photo,
    Video,
    Voice,
    Audio,
    Sticker(StickerKind),
}

/// An attachment the Media Relay still has to pull from Telegram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFile {
    pub file: TelegramFile,
    pub kind: PendingFileKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEmbed {
    pub author_name: String,
    pub author_url: Option<String>,
    pub description: Option<String>,
}

/// What gets sent to Discord for one inbound Telegram event, before the
/// Media Relay resolves pending downloads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscordPayload {
    pub body: String,
    pub pending: Vec<PendingFile>,
    pub buttons: Vec<LinkButton>,
    pub embed: Option<ReplyEmbed>,
}

/// What gets sent to Telegram for one inbound Discord thread message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramPayload {
    pub body: String,
    pub attachments: Vec<DiscordAttachment>,
}
