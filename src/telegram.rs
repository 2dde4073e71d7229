use std::io::Cursor;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::dptree;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ChatKind, InputFile, MessageEntity, MessageEntityKind, PublicChatKind, StickerFormat,
};
use tracing::{debug, error, info};

use crate::bridge::{BridgeCore, TelegramGateway};
use crate::media::{self, MediaPayload};
use crate::parsers::{
    AttachmentKind, ChannelPost, ChatAuthor, ChatFile, ChatMessage, Entity, ForwardOrigin,
    PostKind, ReplyRef, StickerKind, TelegramFile,
};

#[derive(Clone)]
pub struct TelegramRelay {
    bot: Bot,
}

impl TelegramRelay {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }

    /// Long-polling loop feeding channel posts, edits and discussion-chat
    /// messages into the engine. Handler errors are logged, never fatal.
    pub async fn run(&self, bridge: Arc<BridgeCore>) {
        info!("starting telegram long polling");

        let handler = dptree::entry()
            .branch(Update::filter_channel_post().endpoint(on_channel_post))
            .branch(Update::filter_edited_channel_post().endpoint(on_edited_channel_post))
            .branch(Update::filter_message().endpoint(on_chat_message));

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![bridge])
            .build()
            .dispatch()
            .await;
    }
}

async fn on_channel_post(msg: Message, bridge: Arc<BridgeCore>) -> ResponseResult<()> {
    let Some(post) = ingest_channel_post(&msg) else {
        debug!(
            "telegram channel post ignored message_id={} reason=unsupported_kind",
            msg.id.0
        );
        return Ok(());
    };
    if let Err(err) = bridge.handle_channel_post(&post).await {
        error!("failed to handle channel post {}: {err}", msg.id.0);
    }
    Ok(())
}

async fn on_edited_channel_post(msg: Message, bridge: Arc<BridgeCore>) -> ResponseResult<()> {
    let Some(post) = ingest_channel_post(&msg) else {
        return Ok(());
    };
    if let Err(err) = bridge.handle_edited_channel_post(&post).await {
        error!("failed to handle edited channel post {}: {err}", msg.id.0);
    }
    Ok(())
}

async fn on_chat_message(msg: Message, bridge: Arc<BridgeCore>) -> ResponseResult<()> {
    let Some(chat_message) = ingest_chat_message(&msg) else {
        return Ok(());
    };
    if let Err(err) = bridge.handle_chat_message(&chat_message).await {
        error!("failed to handle chat message {}: {err}", msg.id.0);
    }
    Ok(())
}

fn ingest_channel_post(msg: &Message) -> Option<ChannelPost> {
    let kind = if let Some(text) = msg.text() {
        PostKind::Text {
            text: text.to_string(),
            entities: convert_entities(msg.entities()),
        }
    } else if let Some(sizes) = msg.photo() {
        let largest = sizes.last()?;
        PostKind::Photo {
            file: TelegramFile {
                file_id: largest.file.id.clone(),
            },
            caption: msg.caption().map(str::to_string),
            entities: convert_entities(msg.caption_entities()),
        }
    } else if let Some(video) = msg.video() {
        PostKind::Video {
            file: TelegramFile {
                file_id: video.file.id.clone(),
            },
            caption: msg.caption().map(str::to_string),
            entities: convert_entities(msg.caption_entities()),
        }
    } else if let Some(poll) = msg.poll() {
        PostKind::Poll {
            options: poll.options.iter().map(|o| o.text.clone()).collect(),
        }
    } else if let Some(sticker) = msg.sticker() {
        PostKind::Sticker {
            file: TelegramFile {
                file_id: sticker.file.id.clone(),
            },
            kind: match sticker.format {
                StickerFormat::Raster => StickerKind::Static,
                StickerFormat::Animated => StickerKind::Animated,
                StickerFormat::Video => StickerKind::Video,
            },
        }
    } else {
        return None;
    };

    let forward = msg.forward_from_chat().and_then(|chat| {
        Some(ForwardOrigin {
            chat_id: chat.id.0,
            chat_title: chat.title().unwrap_or_default().to_string(),
            chat_username: chat.username().map(str::to_string),
            message_id: msg.forward_from_message_id()?,
        })
    });

    Some(ChannelPost {
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        kind,
        author_signature: msg.author_signature().map(str::to_string),
        forward,
    })
}

fn ingest_chat_message(msg: &Message) -> Option<ChatMessage> {
    let author = msg
        .from()
        .map(|user| ChatAuthor {
            first_name: user.first_name.clone(),
            username: user.username.clone(),
        })
        .unwrap_or_else(|| ChatAuthor {
            first_name: msg.chat.title().unwrap_or_default().to_string(),
            username: None,
        });

    let mut files = Vec::new();
    if let Some(sizes) = msg.photo() {
        if let Some(largest) = sizes.last() {
            files.push(ChatFile {
                file: TelegramFile {
                    file_id: largest.file.id.clone(),
                },
                kind: AttachmentKind::Photo,
            });
        }
    }
    if let Some(video) = msg.video() {
        files.push(ChatFile {
            file: TelegramFile {
                file_id: video.file.id.clone(),
            },
            kind: AttachmentKind::Video,
        });
    }
    if let Some(voice) = msg.voice() {
        files.push(ChatFile {
            file: TelegramFile {
                file_id: voice.file.id.clone(),
            },
            kind: AttachmentKind::Voice,
        });
    }
    if let Some(audio) = msg.audio() {
        files.push(ChatFile {
            file: TelegramFile {
                file_id: audio.file.id.clone(),
            },
            kind: AttachmentKind::Audio,
        });
    }

    let reply_to = msg.reply_to_message().map(|replied| ReplyRef {
        message_id: replied.id.0,
        forwarded_message_id: replied.forward_from_message_id(),
    });

    Some(ChatMessage {
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        author,
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        files,
        reply_to,
        forwarded_message_id: msg.forward_from_message_id(),
    })
}

fn convert_entities(entities: Option<&[MessageEntity]>) -> Vec<Entity> {
    entities
        .unwrap_or_default()
        .iter()
        .map(|entity| match &entity.kind {
            MessageEntityKind::TextLink { url } => Entity::TextLink {
                url: url.to_string(),
            },
            _ => Entity::Other,
        })
        .collect()
}

/// How an attachment should be sent to Telegram, judged by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutgoingKind {
    Photo,
    Video,
    Audio,
    Document,
}

fn outgoing_kind(filename: &str) -> OutgoingKind {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "png" | "jpg" | "jpeg" | "webp" | "gif" => OutgoingKind::Photo,
        "mp4" | "mov" | "webm" => OutgoingKind::Video,
        "mp3" | "ogg" | "wav" | "flac" => OutgoingKind::Audio,
        _ => OutgoingKind::Document,
    }
}

#[async_trait]
impl TelegramGateway for TelegramRelay {
    async fn linked_discussion_chat(&self, channel_id: i64) -> Result<Option<i64>> {
        let chat = self
            .bot
            .get_chat(ChatId(channel_id))
            .await
            .map_err(|e| anyhow!("failed to fetch chat {}: {}", channel_id, e))?;

        let linked = match &chat.kind {
            ChatKind::Public(public) => match &public.kind {
                PublicChatKind::Channel(channel) => channel.linked_chat_id,
                _ => None,
            },
            _ => None,
        };
        Ok(linked)
    }

    async fn send_reply(&self, chat_id: i64, reply_to: Option<i32>, text: &str) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(message_id) = reply_to {
            request = request.reply_to_message_id(teloxide::types::MessageId(message_id));
        }
        request
            .await
            .map_err(|e| anyhow!("failed to send telegram message: {}", e))?;
        Ok(())
    }

    async fn send_attachment(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        payload: MediaPayload,
    ) -> Result<()> {
        let kind = outgoing_kind(&payload.filename);
        let input = InputFile::memory(payload.data).file_name(payload.filename.clone());
        let chat = ChatId(chat_id);
        let reply_to = reply_to.map(teloxide::types::MessageId);

        match kind {
            OutgoingKind::Photo => {
                let mut request = self.bot.send_photo(chat, input);
                if let Some(message_id) = reply_to {
                    request = request.reply_to_message_id(message_id);
                }
                request
                    .await
                    .map_err(|e| anyhow!("failed to send telegram photo: {}", e))?;
            }
            OutgoingKind::Video => {
                let mut request = self.bot.send_video(chat, input);
                if let Some(message_id) = reply_to {
                    request = request.reply_to_message_id(message_id);
                }
                request
                    .await
                    .map_err(|e| anyhow!("failed to send telegram video: {}", e))?;
            }
            OutgoingKind::Audio => {
                let mut request = self.bot.send_audio(chat, input);
                if let Some(message_id) = reply_to {
                    request = request.reply_to_message_id(message_id);
                }
                request
                    .await
                    .map_err(|e| anyhow!("failed to send telegram audio: {}", e))?;
            }
            OutgoingKind::Document => {
                let mut request = self.bot.send_document(chat, input);
                if let Some(message_id) = reply_to {
                    request = request.reply_to_message_id(message_id);
                }
                request
                    .await
                    .map_err(|e| anyhow!("failed to send telegram document: {}", e))?;
            }
        }
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<MediaPayload> {
        let file = self
            .bot
            .get_file(file_id.to_string())
            .await
            .map_err(|e| anyhow!("failed to resolve telegram file {}: {}", file_id, e))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut Cursor::new(&mut data))
            .await
            .map_err(|e| anyhow!("failed to download telegram file {}: {}", file_id, e))?;

        let size = data.len();
        debug!("downloaded telegram file {} ({} bytes)", file_id, size);
        Ok(MediaPayload {
            filename: media::filename_from_path(&file.path),
            data,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{convert_entities, outgoing_kind, OutgoingKind};
    use crate::parsers::Entity;
    use teloxide::types::{MessageEntity, MessageEntityKind};

    #[test_case("photo.png", OutgoingKind::Photo)]
    #[test_case("Clip.MP4", OutgoingKind::Video)]
    #[test_case("audio.mp3", OutgoingKind::Audio)]
    #[test_case("notes.txt", OutgoingKind::Document)]
    #[test_case("no_extension", OutgoingKind::Document)]
    fn outgoing_kind_is_judged_by_extension(filename: &str, expected: OutgoingKind) {
        assert_eq!(outgoing_kind(filename), expected);
    }

    #[test]
    fn text_link_entities_carry_their_url() {
        let entities = vec![
            MessageEntity {
                kind: MessageEntityKind::Bold,
                offset: 0,
                length: 5,
            },
            MessageEntity {
                kind: MessageEntityKind::TextLink {
                    url: "http://example.org/a".parse().unwrap(),
                },
                offset: 6,
                length: 4,
            },
        ];

        let converted = convert_entities(Some(&entities));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0], Entity::Other);
        assert_eq!(
            converted[1],
            Entity::TextLink {
                url: "http://example.org/a".to_string()
            }
        );
    }

    #[test]
    fn missing_entities_become_empty() {
        assert!(convert_entities(None).is_empty());
    }
}
