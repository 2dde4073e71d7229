use super::common::{
    ChannelPost, ChatMessage, DiscordPayload, Entity, ForwardOrigin, LinkButton, PendingFile,
    PendingFileKind, PostKind, ReplyEmbed,
};

const VOTE_LABEL: &str = "Vote";
const SOURCE_LABEL: &str = "Source";
const SOURCE_PRIVATE_LABEL: &str = "Source (private)";

/// Turn a channel post into its Discord mirror: body text, link buttons and
/// attachments still pending download.
pub fn channel_post_to_discord(post: &ChannelPost) -> DiscordPayload {
    let mut payload = DiscordPayload::default();

    match &post.kind {
        PostKind::Text { text, entities } => {
            payload.body = text.clone();
            append_first_text_link(&mut payload.body, entities);
        }
        PostKind::Photo {
            file,
            caption,
            entities,
        } => {
            payload.pending.push(PendingFile {
                file: file.clone(),
                kind: PendingFileKind::Photo,
            });
            if let Some(caption) = caption {
                payload.body = caption.clone();
            }
            append_first_text_link(&mut payload.body, entities);
        }
        PostKind::Video {
            file,
            caption,
            entities,
        } => {
            payload.pending.push(PendingFile {
                file: file.clone(),
                kind: PendingFileKind::Video,
            });
            if let Some(caption) = caption {
                payload.body = caption.clone();
            }
            // The video path appends a line per text-link entity, unlike the
            // single append everywhere else. Intentional parity with the
            // bridge's historical per-media-type behavior.
            append_all_text_links(&mut payload.body, entities);
        }
        PostKind::Poll { options } => {
            payload.body = format!("Poll:\n{}", options.join("\n"));
            payload.buttons.push(LinkButton {
                url: format!(
                    "https://t.me/c/{}/{}",
                    private_chat_slug(post.chat_id),
                    post.message_id
                ),
                label: VOTE_LABEL.to_string(),
            });
        }
        PostKind::Sticker { .. } => {
            if let PostKind::Sticker { file, kind } = &post.kind {
                payload.pending.push(PendingFile {
                    file: file.clone(),
                    kind: PendingFileKind::Sticker(*kind),
                });
            }
        }
    }

    if let Some(signature) = &post.author_signature {
        append_signature(&mut payload.body, signature);
    }

    if let Some(forward) = &post.forward {
        apply_forward_origin(&mut payload, forward);
    }

    payload
}

/// Replacement body for an edited channel post. Attachments are never
/// re-sent on edit; only the text content of the mirror is refreshed.
pub fn channel_edit_to_discord(post: &ChannelPost) -> String {
    let mut body = String::new();

    match &post.kind {
        PostKind::Text { text, entities } => {
            body = text.clone();
            append_first_text_link(&mut body, entities);
        }
        PostKind::Photo {
            caption, entities, ..
        }
        | PostKind::Video {
            caption, entities, ..
        } => {
            if let Some(caption) = caption {
                body = caption.clone();
            }
            append_first_text_link(&mut body, entities);
        }
        PostKind::Poll { options } => {
            body = format!("Poll:\n{}", options.join("\n"));
        }
        PostKind::Sticker { .. } => {}
    }

    if let Some(signature) = &post.author_signature {
        append_signature(&mut body, signature);
    }

    body
}

/// Turn a discussion-chat reply into the embed posted inside the mirror's
/// Discord thread, plus any files still pending download.
pub fn chat_reply_to_discord(msg: &ChatMessage) -> DiscordPayload {
    let pending = msg
        .files
        .iter()
        .map(|f| PendingFile {
            file: f.file.clone(),
            kind: match f.kind {
                super::common::AttachmentKind::Photo => PendingFileKind::Photo,
                super::common::AttachmentKind::Video => PendingFileKind::Video,
                super::common::AttachmentKind::Voice => PendingFileKind::Voice,
                _ => PendingFileKind::Audio,
            },
        })
        .collect();

    DiscordPayload {
        body: String::new(),
        pending,
        buttons: Vec::new(),
        embed: Some(ReplyEmbed {
            author_name: msg.author.first_name.clone(),
            author_url: msg
                .author
                .username
                .as_ref()
                .map(|u| format!("https://t.me/{u}")),
            description: msg.text.clone(),
        }),
    }
}

fn append_first_text_link(body: &mut String, entities: &[Entity]) {
    if let Some(url) = entities.iter().find_map(Entity::text_link) {
        body.push_str(&format!("\nURL: {url}"));
    }
}

fn append_all_text_links(body: &mut String, entities: &[Entity]) {
    for url in entities.iter().filter_map(Entity::text_link) {
        body.push_str(&format!("\nURL: {url}"));
    }
}

fn append_signature(body: &mut String, signature: &str) {
    if body.is_empty() {
        body.push_str(&format!("Post from **{signature}**"));
    } else {
        body.push_str(&format!("\n\nPost from **{signature}**"));
    }
}

fn apply_forward_origin(payload: &mut DiscordPayload, forward: &ForwardOrigin) {
    let prefix = format!("Forwarded from {}", forward.chat_title);
    payload.body = if payload.body.is_empty() {
        prefix
    } else {
        format!("{}\n{}", prefix, payload.body)
    };

    let button = match &forward.chat_username {
        Some(username) => LinkButton {
            url: format!("https://t.me/{}/{}", username, forward.message_id),
            label: SOURCE_LABEL.to_string(),
        },
        None => LinkButton {
            url: format!(
                "https://t.me/c/{}/{}",
                private_chat_slug(forward.chat_id),
                forward.message_id
            ),
            label: SOURCE_PRIVATE_LABEL.to_string(),
        },
    };
    payload.buttons.push(button);
}

/// t.me/c/ deep links use the channel's internal id, which is the bot-api
/// chat id with its `-100` marker stripped.
fn private_chat_slug(chat_id: i64) -> String {
    let id = chat_id.to_string();
    id.strip_prefix("-100")
        .map(str::to_string)
        .unwrap_or_else(|| chat_id.unsigned_abs().to_string())
}
