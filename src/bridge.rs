use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::db::{LinkStore, MessageLink};
use crate::media::{self, MediaHandler, MediaPayload};
use crate::parsers::{
    channel_edit_to_discord, channel_post_to_discord, chat_reply_to_discord, resolved_filename,
    thread_message_to_telegram, ChannelPost, ChatMessage, LinkButton, PendingFile,
    PendingFileKind, ReplyEmbed, ThreadMessage,
};

/// Calls the engine makes back into Telegram.
#[async_trait]
pub trait TelegramGateway: Send + Sync {
    /// Discussion group linked to a channel, if the channel has one.
    async fn linked_discussion_chat(&self, channel_id: i64) -> Result<Option<i64>>;
    async fn send_reply(&self, chat_id: i64, reply_to: Option<i32>, text: &str) -> Result<()>;
    async fn send_attachment(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        payload: MediaPayload,
    ) -> Result<()>;
    async fn fetch_file(&self, file_id: &str) -> Result<MediaPayload>;
}

/// Calls the engine makes back into Discord.
#[async_trait]
pub trait DiscordGateway: Send + Sync {
    async fn send_post(
        &self,
        channel_id: u64,
        body: &str,
        files: Vec<MediaPayload>,
        buttons: &[LinkButton],
    ) -> Result<u64>;
    async fn edit_post(&self, channel_id: u64, message_id: u64, body: &str) -> Result<()>;
    async fn create_thread(&self, channel_id: u64, message_id: u64) -> Result<u64>;
    async fn send_thread_reply(
        &self,
        thread_id: u64,
        embed: &ReplyEmbed,
        files: Vec<MediaPayload>,
    ) -> Result<()>;
    async fn fetch_attachment(&self, url: &str) -> Result<MediaPayload>;
}

#[derive(Clone)]
pub struct BridgeCore {
    link_store: Arc<dyn LinkStore>,
    telegram: Arc<dyn TelegramGateway>,
    discord: Arc<dyn DiscordGateway>,
    post_channel_id: u64,
}

impl BridgeCore {
    pub fn new(
        link_store: Arc<dyn LinkStore>,
        telegram: Arc<dyn TelegramGateway>,
        discord: Arc<dyn DiscordGateway>,
        post_channel_id: u64,
    ) -> Self {
        Self {
            link_store,
            telegram,
            discord,
            post_channel_id,
        }
    }

    /// Mirror a new channel post to Discord, open its discussion thread and
    /// record the link row.
    pub async fn handle_channel_post(&self, post: &ChannelPost) -> Result<()> {
        let payload = channel_post_to_discord(post);
        debug!(
            "telegram channel post message_id={} chat_id={} buttons={} pending={} body_preview={}",
            post.message_id,
            post.chat_id,
            payload.buttons.len(),
            payload.pending.len(),
            preview_text(&payload.body)
        );

        let files = self.fetch_pending(&payload.pending).await;
        if payload.body.is_empty() && files.is_empty() {
            debug!(
                "channel post dropped message_id={} reason=empty_payload",
                post.message_id
            );
            return Ok(());
        }

        let discord_message_id = self
            .discord
            .send_post(self.post_channel_id, &payload.body, files, &payload.buttons)
            .await?;

        // An unusable thread must not block the link row; replies crossing
        // back from the discussion chat only need the mirror message itself.
        let thread_id = match self
            .discord
            .create_thread(self.post_channel_id, discord_message_id)
            .await
        {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(
                    "failed to create discussion thread for message {}: {}",
                    discord_message_id, err
                );
                None
            }
        };

        let link = MessageLink::new(
            post.message_id,
            post.chat_id,
            discord_message_id,
            self.post_channel_id,
            thread_id,
        );
        self.link_store.create(&link).await?;

        debug!(
            "channel post mirrored message_id={} discord_message_id={} thread_id={:?}",
            post.message_id, discord_message_id, thread_id
        );
        Ok(())
    }

    /// Propagate a channel post edit onto its Discord mirror. Attachments are
    /// left alone; only the message content is rewritten.
    pub async fn handle_edited_channel_post(&self, post: &ChannelPost) -> Result<()> {
        let Some(link) = self
            .link_store
            .find_by_telegram_message_id(post.message_id)
            .await?
        else {
            debug!(
                "channel edit dropped message_id={} reason=no_link",
                post.message_id
            );
            return Ok(());
        };

        let body = channel_edit_to_discord(post);
        if body.is_empty() {
            debug!(
                "channel edit dropped message_id={} reason=empty_body",
                post.message_id
            );
            return Ok(());
        }

        self.discord
            .edit_post(link.discord_channel_id, link.discord_message_id, &body)
            .await?;
        debug!(
            "channel edit applied message_id={} discord_message_id={}",
            post.message_id, link.discord_message_id
        );
        Ok(())
    }

    /// Messages in the channel's discussion chat. Two cases matter: the
    /// automatic forward of a channel post (which reveals the post's id inside
    /// the chat), and a human reply to such a forward (which crosses over to
    /// the Discord thread).
    pub async fn handle_chat_message(&self, msg: &ChatMessage) -> Result<()> {
        if let Some(forwarded_id) = msg.forwarded_message_id {
            return self.record_forwarded_copy(forwarded_id, msg.message_id).await;
        }

        let Some(reply) = &msg.reply_to else {
            debug!(
                "chat message dropped message_id={} reason=not_a_channel_reply",
                msg.message_id
            );
            return Ok(());
        };
        let Some(original_id) = reply.forwarded_message_id else {
            debug!(
                "chat message dropped message_id={} reason=reply_target_not_forwarded",
                msg.message_id
            );
            return Ok(());
        };

        let Some(mut link) = self
            .link_store
            .find_by_telegram_message_id(original_id)
            .await?
        else {
            debug!(
                "chat reply dropped message_id={} reason=no_link original_id={}",
                msg.message_id, original_id
            );
            return Ok(());
        };

        // The reply target is the forwarded copy of the post, so it carries
        // the in-chat id we otherwise only learn from the forward itself.
        if link.chat_message_id.is_none() {
            link.chat_message_id = Some(reply.message_id);
            self.link_store.update(&link).await?;
        }

        let Some(thread_id) = link.discord_thread_id else {
            debug!(
                "chat reply dropped message_id={} reason=no_thread original_id={}",
                msg.message_id, original_id
            );
            return Ok(());
        };

        let payload = chat_reply_to_discord(msg);
        let files = self.fetch_pending(&payload.pending).await;
        let Some(embed) = payload.embed else {
            return Ok(());
        };

        self.discord
            .send_thread_reply(thread_id, &embed, files)
            .await?;
        debug!(
            "chat reply bridged message_id={} thread_id={}",
            msg.message_id, thread_id
        );
        Ok(())
    }

    /// A message posted inside one of our Discord discussion threads, relayed
    /// back into the Telegram discussion chat.
    pub async fn handle_discord_thread_message(&self, msg: &ThreadMessage) -> Result<()> {
        if msg.author_is_bot {
            debug!(
                "discord thread message dropped thread_id={} reason=bot_author",
                msg.thread_id
            );
            return Ok(());
        }

        let Some(link) = self.link_store.find_by_thread(msg.thread_id).await? else {
            debug!(
                "discord thread message dropped thread_id={} reason=no_link",
                msg.thread_id
            );
            return Ok(());
        };

        let Some(chat_id) = self
            .telegram
            .linked_discussion_chat(link.telegram_channel_id)
            .await?
        else {
            debug!(
                "discord thread message dropped thread_id={} reason=no_linked_chat channel_id={}",
                msg.thread_id, link.telegram_channel_id
            );
            return Ok(());
        };

        let payload = thread_message_to_telegram(msg);
        debug!(
            "discord->telegram reply thread_id={} chat_id={} reply_to={:?} attachments={} body_preview={}",
            msg.thread_id,
            chat_id,
            link.chat_message_id,
            payload.attachments.len(),
            preview_text(&payload.body)
        );

        self.telegram
            .send_reply(chat_id, link.chat_message_id, &payload.body)
            .await?;

        for attachment in &payload.attachments {
            let mut media = match self.discord.fetch_attachment(&attachment.url).await {
                Ok(media) => media,
                Err(err) => {
                    warn!("skipping discord attachment {}: {}", attachment.url, err);
                    continue;
                }
            };
            media.filename = resolved_filename(attachment);
            self.telegram
                .send_attachment(chat_id, link.chat_message_id, media)
                .await?;
        }
        Ok(())
    }

    /// The automatic forward of a channel post into the discussion chat. Pure
    /// bookkeeping: it tells us which in-chat message future replies must
    /// address.
    async fn record_forwarded_copy(&self, forwarded_id: i32, chat_message_id: i32) -> Result<()> {
        let Some(mut link) = self.link_store.find_by_forwarded_id(forwarded_id).await? else {
            debug!(
                "forwarded copy dropped forwarded_id={} reason=no_link",
                forwarded_id
            );
            return Ok(());
        };

        if link.chat_message_id.is_some() {
            debug!(
                "forwarded copy ignored forwarded_id={} reason=already_recorded",
                forwarded_id
            );
            return Ok(());
        }

        link.chat_message_id = Some(chat_message_id);
        self.link_store.update(&link).await?;
        debug!(
            "forwarded copy recorded forwarded_id={} chat_message_id={}",
            forwarded_id, chat_message_id
        );
        Ok(())
    }

    /// Download pending Telegram files, converting stickers along the way.
    /// Undownloadable or oversized files are skipped, never fatal.
    async fn fetch_pending(&self, pending: &[PendingFile]) -> Vec<MediaPayload> {
        let mut files = Vec::new();
        for item in pending {
            let payload = match self.telegram.fetch_file(&item.file.file_id).await {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("skipping telegram file {}: {}", item.file.file_id, err);
                    continue;
                }
            };

            let payload = match item.kind {
                PendingFileKind::Sticker(kind) => {
                    match media::flatten_sticker(&payload.data, kind) {
                        Ok(converted) => converted,
                        Err(err) => {
                            warn!("skipping sticker {}: {}", item.file.file_id, err);
                            continue;
                        }
                    }
                }
                _ => payload,
            };

            if let Err(err) = MediaHandler::check_discord_file_size(payload.size) {
                warn!("skipping telegram file {}: {}", item.file.file_id, err);
                continue;
            }
            files.push(payload);
        }
        files
    }
}

fn preview_text(value: &str) -> String {
    const MAX_PREVIEW_CHARS: usize = 120;
    let mut chars = value.chars();
    let preview: String = chars.by_ref().take(MAX_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{preview}…")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;

    use super::*;
    use crate::db::StoreError;
    use crate::parsers::{
        AttachmentKind, ChatAuthor, ChatFile, DiscordAttachment, Entity, PostKind, ReplyRef,
        TelegramFile,
    };

    #[derive(Default)]
    struct MemoryLinkStore {
        rows: Mutex<Vec<MessageLink>>,
    }

    impl MemoryLinkStore {
        fn with(links: Vec<MessageLink>) -> Self {
            Self {
                rows: Mutex::new(links),
            }
        }

        fn snapshot(&self) -> Vec<MessageLink> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LinkStore for MemoryLinkStore {
        async fn find_by_thread(&self, thread_id: u64) -> Result<Option<MessageLink>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.discord_thread_id == Some(thread_id))
                .cloned())
        }

        async fn find_by_telegram_message_id(
            &self,
            telegram_message_id: i32,
        ) -> Result<Option<MessageLink>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.telegram_message_id == telegram_message_id)
                .cloned())
        }

        async fn find_by_forwarded_id(
            &self,
            telegram_message_id: i32,
        ) -> Result<Option<MessageLink>, StoreError> {
            self.find_by_telegram_message_id(telegram_message_id).await
        }

        async fn create(&self, link: &MessageLink) -> Result<MessageLink, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            if rows
                .iter()
                .any(|l| l.telegram_message_id == link.telegram_message_id)
            {
                return Err(StoreError::DuplicateLink(link.telegram_message_id));
            }
            let mut stored = link.clone();
            stored.id = rows.len() as i64 + 1;
            rows.push(stored.clone());
            Ok(stored)
        }

        async fn update(&self, link: &MessageLink) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.iter_mut().find(|l| l.id == link.id) else {
                return Err(StoreError::NotFound(link.id));
            };
            *row = link.clone();
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTelegram {
        linked_chat: Option<i64>,
        replies: Mutex<Vec<(i64, Option<i32>, String)>>,
        attachments: Mutex<Vec<(i64, Option<i32>, String)>>,
        files: Mutex<Vec<(String, Vec<u8>)>>,
        fail_fetch: bool,
    }

    #[async_trait]
    impl TelegramGateway for FakeTelegram {
        async fn linked_discussion_chat(&self, _channel_id: i64) -> Result<Option<i64>> {
            Ok(self.linked_chat)
        }

        async fn send_reply(
            &self,
            chat_id: i64,
            reply_to: Option<i32>,
            text: &str,
        ) -> Result<()> {
            self.replies
                .lock()
                .unwrap()
                .push((chat_id, reply_to, text.to_string()));
            Ok(())
        }

        async fn send_attachment(
            &self,
            chat_id: i64,
            reply_to: Option<i32>,
            payload: MediaPayload,
        ) -> Result<()> {
            self.attachments
                .lock()
                .unwrap()
                .push((chat_id, reply_to, payload.filename));
            Ok(())
        }

        async fn fetch_file(&self, file_id: &str) -> Result<MediaPayload> {
            if self.fail_fetch {
                return Err(anyhow!("file gone"));
            }
            let data = self
                .files
                .lock()
                .unwrap()
                .iter()
                .find(|(id, _)| id == file_id)
                .map(|(_, data)| data.clone())
                .ok_or_else(|| anyhow!("unknown file"))?;
            let size = data.len();
            Ok(MediaPayload {
                data,
                filename: format!("{file_id}.bin"),
                size,
            })
        }
    }

    #[derive(Default)]
    struct FakeDiscord {
        posts: Mutex<Vec<(u64, String, usize, Vec<LinkButton>)>>,
        edits: Mutex<Vec<(u64, u64, String)>>,
        thread_replies: Mutex<Vec<(u64, ReplyEmbed, usize)>>,
        next_message_id: u64,
        next_thread_id: u64,
        fail_thread: bool,
    }

    impl FakeDiscord {
        fn new() -> Self {
            Self {
                next_message_id: 900,
                next_thread_id: 7000,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DiscordGateway for FakeDiscord {
        async fn send_post(
            &self,
            channel_id: u64,
            body: &str,
            files: Vec<MediaPayload>,
            buttons: &[LinkButton],
        ) -> Result<u64> {
            self.posts.lock().unwrap().push((
                channel_id,
                body.to_string(),
                files.len(),
                buttons.to_vec(),
            ));
            Ok(self.next_message_id)
        }

        async fn edit_post(&self, channel_id: u64, message_id: u64, body: &str) -> Result<()> {
            self.edits
                .lock()
                .unwrap()
                .push((channel_id, message_id, body.to_string()));
            Ok(())
        }

        async fn create_thread(&self, _channel_id: u64, _message_id: u64) -> Result<u64> {
            if self.fail_thread {
                return Err(anyhow!("missing permission"));
            }
            Ok(self.next_thread_id)
        }

        async fn send_thread_reply(
            &self,
            thread_id: u64,
            embed: &ReplyEmbed,
            files: Vec<MediaPayload>,
        ) -> Result<()> {
            self.thread_replies
                .lock()
                .unwrap()
                .push((thread_id, embed.clone(), files.len()));
            Ok(())
        }

        async fn fetch_attachment(&self, url: &str) -> Result<MediaPayload> {
            Ok(MediaPayload {
                data: vec![1, 2, 3],
                filename: url.rsplit('/').next().unwrap_or("file").to_string(),
                size: 3,
            })
        }
    }

    const CHANNEL_ID: i64 = -1001000;
    const POST_CHANNEL: u64 = 42;

    fn core(
        store: Arc<MemoryLinkStore>,
        telegram: Arc<FakeTelegram>,
        discord: Arc<FakeDiscord>,
    ) -> BridgeCore {
        BridgeCore::new(store, telegram, discord, POST_CHANNEL)
    }

    fn text_post(message_id: i32, text: &str) -> ChannelPost {
        ChannelPost {
            message_id,
            chat_id: CHANNEL_ID,
            kind: PostKind::Text {
                text: text.to_string(),
                entities: vec![],
            },
            author_signature: None,
            forward: None,
        }
    }

    fn stored_link(telegram_message_id: i32, thread_id: Option<u64>) -> MessageLink {
        let mut link = MessageLink::new(telegram_message_id, CHANNEL_ID, 900, POST_CHANNEL, thread_id);
        link.id = 1;
        link
    }

    #[tokio::test]
    async fn channel_post_is_mirrored_with_thread_and_link() {
        let store = Arc::new(MemoryLinkStore::default());
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store.clone(), telegram, discord.clone());

        core.handle_channel_post(&text_post(10, "hello")).await.unwrap();

        let posts = discord.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1, "hello");

        let links = store.snapshot();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].telegram_message_id, 10);
        assert_eq!(links[0].discord_message_id, 900);
        assert_eq!(links[0].discord_thread_id, Some(7000));
        assert_eq!(links[0].chat_message_id, None);
    }

    #[tokio::test]
    async fn thread_failure_still_records_link() {
        let store = Arc::new(MemoryLinkStore::default());
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord {
            fail_thread: true,
            ..FakeDiscord::new()
        });
        let core = core(store.clone(), telegram, discord);

        core.handle_channel_post(&text_post(11, "no thread")).await.unwrap();

        let links = store.snapshot();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].discord_thread_id, None);
    }

    #[tokio::test]
    async fn duplicate_post_surfaces_store_error() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(12, None)]));
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram, discord);

        let err = core
            .handle_channel_post(&text_post(12, "again"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn undownloadable_file_drops_attachment_only_post() {
        let store = Arc::new(MemoryLinkStore::default());
        let telegram = Arc::new(FakeTelegram {
            fail_fetch: true,
            ..FakeTelegram::default()
        });
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store.clone(), telegram, discord.clone());

        let post = ChannelPost {
            message_id: 13,
            chat_id: CHANNEL_ID,
            kind: PostKind::Photo {
                file: TelegramFile {
                    file_id: "gone".to_string(),
                },
                caption: None,
                entities: vec![],
            },
            author_signature: None,
            forward: None,
        };
        core.handle_channel_post(&post).await.unwrap();

        assert!(discord.posts.lock().unwrap().is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn edit_of_unknown_post_is_ignored() {
        let store = Arc::new(MemoryLinkStore::default());
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram, discord.clone());

        core.handle_edited_channel_post(&text_post(99, "edited")).await.unwrap();
        assert!(discord.edits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_rewrites_mirror_body() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(20, Some(7000))]));
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram, discord.clone());

        let mut post = text_post(20, "fixed");
        post.kind = PostKind::Text {
            text: "fixed".to_string(),
            entities: vec![Entity::TextLink {
                url: "http://x".to_string(),
            }],
        };
        core.handle_edited_channel_post(&post).await.unwrap();

        let edits = discord.edits.lock().unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0], (POST_CHANNEL, 900, "fixed\nURL: http://x".to_string()));
    }

    #[tokio::test]
    async fn forwarded_copy_populates_chat_message_id_once() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(30, Some(7000))]));
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store.clone(), telegram, discord);

        let forward = ChatMessage {
            message_id: 501,
            chat_id: -2000,
            author: ChatAuthor {
                first_name: "Telegram".to_string(),
                username: None,
            },
            text: None,
            files: vec![],
            reply_to: None,
            forwarded_message_id: Some(30),
        };
        core.handle_chat_message(&forward).await.unwrap();
        assert_eq!(store.snapshot()[0].chat_message_id, Some(501));

        // A later duplicate forward must not clobber the recorded id.
        let mut again = forward.clone();
        again.message_id = 777;
        core.handle_chat_message(&again).await.unwrap();
        assert_eq!(store.snapshot()[0].chat_message_id, Some(501));
    }

    #[tokio::test]
    async fn chat_reply_lands_in_thread_and_backfills_chat_id() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(40, Some(7000))]));
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store.clone(), telegram, discord.clone());

        let reply = ChatMessage {
            message_id: 601,
            chat_id: -2000,
            author: ChatAuthor {
                first_name: "Ann".to_string(),
                username: Some("ann".to_string()),
            },
            text: Some("great".to_string()),
            files: vec![],
            reply_to: Some(ReplyRef {
                message_id: 600,
                forwarded_message_id: Some(40),
            }),
            forwarded_message_id: None,
        };
        core.handle_chat_message(&reply).await.unwrap();

        let replies = discord.thread_replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, 7000);
        assert_eq!(replies[0].1.author_name, "Ann");
        assert_eq!(replies[0].1.description.as_deref(), Some("great"));

        // The replied-to forwarded copy, not the reply itself, is recorded.
        assert_eq!(store.snapshot()[0].chat_message_id, Some(600));
    }

    #[tokio::test]
    async fn chat_reply_without_thread_is_dropped() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(41, None)]));
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram, discord.clone());

        let reply = ChatMessage {
            message_id: 602,
            chat_id: -2000,
            author: ChatAuthor {
                first_name: "Bob".to_string(),
                username: None,
            },
            text: Some("hi".to_string()),
            files: vec![],
            reply_to: Some(ReplyRef {
                message_id: 599,
                forwarded_message_id: Some(41),
            }),
            forwarded_message_id: None,
        };
        core.handle_chat_message(&reply).await.unwrap();
        assert!(discord.thread_replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_reply_with_photo_crosses_with_download() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(42, Some(7000))]));
        let telegram = Arc::new(FakeTelegram {
            files: Mutex::new(vec![("ph1".to_string(), vec![0u8; 16])]),
            ..FakeTelegram::default()
        });
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram, discord.clone());

        let reply = ChatMessage {
            message_id: 603,
            chat_id: -2000,
            author: ChatAuthor {
                first_name: "Cam".to_string(),
                username: None,
            },
            text: None,
            files: vec![ChatFile {
                file: TelegramFile {
                    file_id: "ph1".to_string(),
                },
                kind: AttachmentKind::Photo,
            }],
            reply_to: Some(ReplyRef {
                message_id: 598,
                forwarded_message_id: Some(42),
            }),
            forwarded_message_id: None,
        };
        core.handle_chat_message(&reply).await.unwrap();

        let replies = discord.thread_replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].2, 1);
    }

    #[tokio::test]
    async fn bot_thread_message_is_ignored() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(50, Some(7000))]));
        let telegram = Arc::new(FakeTelegram {
            linked_chat: Some(-2000),
            ..FakeTelegram::default()
        });
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram.clone(), discord);

        let msg = ThreadMessage {
            thread_id: 7000,
            author_name: "bridge".to_string(),
            author_is_bot: true,
            content: "echo".to_string(),
            attachments: vec![],
        };
        core.handle_discord_thread_message(&msg).await.unwrap();
        assert!(telegram.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn thread_message_is_relayed_to_linked_chat() {
        let mut link = stored_link(51, Some(7000));
        link.chat_message_id = Some(600);
        let store = Arc::new(MemoryLinkStore::with(vec![link]));
        let telegram = Arc::new(FakeTelegram {
            linked_chat: Some(-2000),
            ..FakeTelegram::default()
        });
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram.clone(), discord);

        let msg = ThreadMessage {
            thread_id: 7000,
            author_name: "carol".to_string(),
            author_is_bot: false,
            content: "what a take".to_string(),
            attachments: vec![DiscordAttachment {
                url: "https://cdn.example/a/b.png".to_string(),
                filename: Some("b.png".to_string()),
                kind: AttachmentKind::Photo,
            }],
        };
        core.handle_discord_thread_message(&msg).await.unwrap();

        let replies = telegram.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0],
            (-2000, Some(600), "[Discord] carol\n\nwhat a take".to_string())
        );

        let attachments = telegram.attachments.lock().unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0], (-2000, Some(600), "b.png".to_string()));
    }

    #[tokio::test]
    async fn thread_message_without_chat_id_is_sent_unaddressed() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(52, Some(7000))]));
        let telegram = Arc::new(FakeTelegram {
            linked_chat: Some(-2000),
            ..FakeTelegram::default()
        });
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram.clone(), discord);

        let msg = ThreadMessage {
            thread_id: 7000,
            author_name: "dave".to_string(),
            author_is_bot: false,
            content: "hi".to_string(),
            attachments: vec![],
        };
        core.handle_discord_thread_message(&msg).await.unwrap();

        let replies = telegram.replies.lock().unwrap();
        assert_eq!(replies[0].1, None);
    }

    #[tokio::test]
    async fn thread_message_without_linked_chat_is_dropped() {
        let store = Arc::new(MemoryLinkStore::with(vec![stored_link(53, Some(7000))]));
        let telegram = Arc::new(FakeTelegram::default());
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram.clone(), discord);

        let msg = ThreadMessage {
            thread_id: 7000,
            author_name: "erin".to_string(),
            author_is_bot: false,
            content: "hello?".to_string(),
            attachments: vec![],
        };
        core.handle_discord_thread_message(&msg).await.unwrap();
        assert!(telegram.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unrelated_thread_message_is_dropped() {
        let store = Arc::new(MemoryLinkStore::default());
        let telegram = Arc::new(FakeTelegram {
            linked_chat: Some(-2000),
            ..FakeTelegram::default()
        });
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store, telegram.clone(), discord);

        let msg = ThreadMessage {
            thread_id: 1234,
            author_name: "mallory".to_string(),
            author_is_bot: false,
            content: "lost".to_string(),
            attachments: vec![],
        };
        core.handle_discord_thread_message(&msg).await.unwrap();
        assert!(telegram.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_file_is_skipped_but_post_survives() {
        let store = Arc::new(MemoryLinkStore::default());
        let telegram = Arc::new(FakeTelegram {
            files: Mutex::new(vec![("big".to_string(), vec![0u8; 9 * 1024 * 1024])]),
            ..FakeTelegram::default()
        });
        let discord = Arc::new(FakeDiscord::new());
        let core = core(store.clone(), telegram, discord.clone());

        let post = ChannelPost {
            message_id: 60,
            chat_id: CHANNEL_ID,
            kind: PostKind::Video {
                file: TelegramFile {
                    file_id: "big".to_string(),
                },
                caption: Some("huge clip".to_string()),
                entities: vec![],
            },
            author_signature: None,
            forward: None,
        };
        core.handle_channel_post(&post).await.unwrap();

        let posts = discord.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].2, 0);
        assert_eq!(store.snapshot().len(), 1);
    }
}
