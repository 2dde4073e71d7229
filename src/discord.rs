use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use serenity::all::{
    AutoArchiveDuration, ChannelId, ChannelType, Client as SerenityClient,
    Context as SerenityContext, CreateActionRow, CreateAttachment, CreateButton, CreateEmbed,
    CreateEmbedAuthor, CreateMessage, CreateThread, EditMessage, EventHandler as SerenityEventHandler,
    GatewayIntents, Http, Message as SerenityMessage, MessageId, Ready,
};
use tokio::sync::{oneshot, RwLock};

use crate::bridge::{BridgeCore, DiscordGateway};
use crate::media::{MediaHandler, MediaPayload};
use crate::parsers::{AttachmentKind, DiscordAttachment, LinkButton, ReplyEmbed, ThreadMessage};

const INITIAL_LOGIN_RETRY_SECONDS: u64 = 2;
const MAX_LOGIN_RETRY_SECONDS: u64 = 300;
const THREAD_NAME: &str = "Discussion";
const EMBED_COLOR_AQUAMARINE: u32 = 0x7FFFD4;

#[derive(Clone)]
pub struct DiscordRelay {
    send_lock: Arc<tokio::sync::Mutex<()>>,
    login_state: Arc<tokio::sync::Mutex<DiscordLoginState>>,
    bridge: Arc<RwLock<Option<Arc<BridgeCore>>>>,
    http: Arc<RwLock<Option<Arc<Http>>>>,
    media: Arc<MediaHandler>,
    bot_token: String,
}

#[derive(Default)]
struct DiscordLoginState {
    is_logged_in: bool,
    gateway_task: Option<tokio::task::JoinHandle<()>>,
}

struct ReadySignalHandler {
    ready_sender: Arc<tokio::sync::Mutex<Option<oneshot::Sender<()>>>>,
    http_sender: Arc<tokio::sync::Mutex<Option<oneshot::Sender<Arc<Http>>>>>,
    bridge: Arc<RwLock<Option<Arc<BridgeCore>>>>,
}

#[serenity::async_trait]
impl SerenityEventHandler for ReadySignalHandler {
    async fn ready(&self, ctx: SerenityContext, ready: Ready) {
        info!(
            "discord gateway ready as {} ({})",
            ready.user.name, ready.user.id
        );
        if let Some(sender) = self.ready_sender.lock().await.take() {
            let _ = sender.send(());
        }
        if let Some(sender) = self.http_sender.lock().await.take() {
            let _ = sender.send(ctx.http);
        }
    }

    async fn message(&self, ctx: SerenityContext, msg: SerenityMessage) {
        if !is_thread_channel(&ctx, &msg).await {
            return;
        }

        let bridge = self.bridge.read().await.clone();
        let Some(bridge) = bridge else {
            debug!("ignoring discord message before bridge binding");
            return;
        };

        let attachments = msg
            .attachments
            .iter()
            .map(|a| DiscordAttachment {
                url: a.url.clone(),
                filename: Some(a.filename.clone()),
                kind: attachment_kind(a.content_type.as_deref()),
            })
            .collect();

        let thread_message = ThreadMessage {
            thread_id: msg.channel_id.get(),
            author_name: msg.author.name.clone(),
            author_is_bot: msg.author.bot,
            content: msg.content.clone(),
            attachments,
        };

        if let Err(err) = bridge.handle_discord_thread_message(&thread_message).await {
            error!("failed to handle discord thread message: {err}");
        }
    }
}

async fn is_thread_channel(ctx: &SerenityContext, msg: &SerenityMessage) -> bool {
    match msg.channel(ctx).await {
        Ok(channel) => channel.guild().is_some_and(|c| {
            matches!(
                c.kind,
                ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
            )
        }),
        Err(err) => {
            warn!("failed to resolve channel {}: {err}", msg.channel_id);
            false
        }
    }
}

fn attachment_kind(content_type: Option<&str>) -> AttachmentKind {
    match content_type {
        Some(ct) if ct.starts_with("image/") => AttachmentKind::Photo,
        Some(ct) if ct.starts_with("video/") => AttachmentKind::Video,
        Some(ct) if ct.starts_with("audio/") => AttachmentKind::Audio,
        _ => AttachmentKind::Other,
    }
}

impl DiscordRelay {
    pub fn new(bot_token: &str) -> Self {
        Self {
            send_lock: Arc::new(tokio::sync::Mutex::new(())),
            login_state: Arc::new(tokio::sync::Mutex::new(DiscordLoginState::default())),
            bridge: Arc::new(RwLock::new(None)),
            http: Arc::new(RwLock::new(None)),
            media: Arc::new(MediaHandler::new()),
            bot_token: bot_token.to_string(),
        }
    }

    pub async fn set_bridge(&self, bridge: Arc<BridgeCore>) {
        *self.bridge.write().await = Some(bridge);
    }

    async fn login(&self) -> Result<()> {
        let mut state = self.login_state.lock().await;
        if state.is_logged_in {
            return Ok(());
        }

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (http_tx, http_rx) = oneshot::channel();
        let event_handler = ReadySignalHandler {
            ready_sender: Arc::new(tokio::sync::Mutex::new(Some(ready_tx))),
            http_sender: Arc::new(tokio::sync::Mutex::new(Some(http_tx))),
            bridge: self.bridge.clone(),
        };

        let mut gateway_client = SerenityClient::builder(&self.bot_token, intents)
            .event_handler(event_handler)
            .await
            .map_err(|err| anyhow!("failed to build discord gateway client: {err}"))?;

        let gateway_task = tokio::spawn(async move {
            if let Err(err) = gateway_client.start_autosharded().await {
                error!("discord gateway stopped: {err}");
            }
        });

        match tokio::time::timeout(std::time::Duration::from_secs(30), ready_rx).await {
            Ok(Ok(())) => {
                state.is_logged_in = true;
                state.gateway_task = Some(gateway_task);

                if let Ok(Ok(http)) =
                    tokio::time::timeout(std::time::Duration::from_secs(5), http_rx).await
                {
                    *self.http.write().await = Some(http);
                }

                info!("discord bot login succeeded and gateway is connected");
                Ok(())
            }
            Ok(Err(_)) => {
                gateway_task.abort();
                Err(anyhow!(
                    "discord gateway exited before receiving Ready event"
                ))
            }
            Err(_) => {
                gateway_task.abort();
                Err(anyhow!("timed out waiting for discord Ready event"))
            }
        }
    }

    pub async fn start(&self) -> Result<()> {
        let mut retry_seconds = INITIAL_LOGIN_RETRY_SECONDS;

        loop {
            match self.login().await {
                Ok(()) => {
                    info!("discord relay is ready");
                    return Ok(());
                }
                Err(err) => {
                    error!(
                        "failed to start discord relay: {err}. retrying in {} seconds",
                        retry_seconds
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(retry_seconds)).await;
                    retry_seconds = (retry_seconds * 2).min(MAX_LOGIN_RETRY_SECONDS);
                }
            }
        }
    }

    pub async fn stop(&self) -> Result<()> {
        let mut state = self.login_state.lock().await;
        if !state.is_logged_in {
            return Ok(());
        }

        if let Some(gateway_task) = state.gateway_task.take() {
            gateway_task.abort();
            match gateway_task.await {
                Ok(()) => info!("discord gateway task exited"),
                Err(join_err) if join_err.is_cancelled() => {
                    info!("discord gateway task aborted")
                }
                Err(join_err) => {
                    error!("discord gateway task join error: {join_err}");
                }
            }
        }

        state.is_logged_in = false;
        info!("discord relay stopped");
        Ok(())
    }

    async fn http(&self) -> Result<Arc<Http>> {
        self.http
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("discord http client not available"))
    }
}

fn button_rows(buttons: &[LinkButton]) -> Vec<CreateActionRow> {
    if buttons.is_empty() {
        return Vec::new();
    }
    let row = buttons
        .iter()
        .map(|b| CreateButton::new_link(&b.url).label(&b.label))
        .collect();
    vec![CreateActionRow::Buttons(row)]
}

fn build_reply_embed(embed: &ReplyEmbed) -> CreateEmbed {
    let mut author = CreateEmbedAuthor::new(&embed.author_name);
    if let Some(url) = &embed.author_url {
        author = author.url(url);
    }

    let mut builder = CreateEmbed::new()
        .author(author)
        .color(EMBED_COLOR_AQUAMARINE);
    if let Some(description) = &embed.description {
        builder = builder.description(description);
    }
    builder
}

#[async_trait]
impl DiscordGateway for DiscordRelay {
    async fn send_post(
        &self,
        channel_id: u64,
        body: &str,
        files: Vec<MediaPayload>,
        buttons: &[LinkButton],
    ) -> Result<u64> {
        let _guard = self.send_lock.lock().await;
        let http = self.http().await?;

        debug!(
            "discord send channel_id={} files={} buttons={} body_len={}",
            channel_id,
            files.len(),
            buttons.len(),
            body.len()
        );

        let mut builder = CreateMessage::new();
        if !body.is_empty() {
            builder = builder.content(body);
        }
        for file in files {
            builder = builder.add_file(CreateAttachment::bytes(file.data, file.filename));
        }
        let rows = button_rows(buttons);
        if !rows.is_empty() {
            builder = builder.components(rows);
        }

        let message = ChannelId::new(channel_id)
            .send_message(&http, builder)
            .await
            .map_err(|e| anyhow!("failed to send message to discord: {}", e))?;

        info!("sent message to channel {}, message_id={}", channel_id, message.id);
        Ok(message.id.get())
    }

    async fn edit_post(&self, channel_id: u64, message_id: u64, body: &str) -> Result<()> {
        let _guard = self.send_lock.lock().await;
        let http = self.http().await?;

        ChannelId::new(channel_id)
            .edit_message(&http, MessageId::new(message_id), EditMessage::new().content(body))
            .await
            .map_err(|e| anyhow!("failed to edit discord message {}: {}", message_id, e))?;

        info!("edited message {} in channel {}", message_id, channel_id);
        Ok(())
    }

    async fn create_thread(&self, channel_id: u64, message_id: u64) -> Result<u64> {
        let http = self.http().await?;

        let thread = ChannelId::new(channel_id)
            .create_thread_from_message(
                &http,
                MessageId::new(message_id),
                CreateThread::new(THREAD_NAME)
                    .auto_archive_duration(AutoArchiveDuration::OneHour),
            )
            .await
            .map_err(|e| anyhow!("failed to create thread on message {}: {}", message_id, e))?;

        info!("created thread {} on message {}", thread.id, message_id);
        Ok(thread.id.get())
    }

    async fn send_thread_reply(
        &self,
        thread_id: u64,
        embed: &ReplyEmbed,
        files: Vec<MediaPayload>,
    ) -> Result<()> {
        let _guard = self.send_lock.lock().await;
        let http = self.http().await?;

        let mut builder = CreateMessage::new().embed(build_reply_embed(embed));
        for file in files {
            builder = builder.add_file(CreateAttachment::bytes(file.data, file.filename));
        }

        let message = ChannelId::new(thread_id)
            .send_message(&http, builder)
            .await
            .map_err(|e| anyhow!("failed to send embed to thread {}: {}", thread_id, e))?;

        info!("sent reply embed to thread {}, message_id={}", thread_id, message.id);
        Ok(())
    }

    async fn fetch_attachment(&self, url: &str) -> Result<MediaPayload> {
        self.media.download_from_url(url).await
    }
}
