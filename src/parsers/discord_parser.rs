use super::common::{AttachmentKind, DiscordAttachment, TelegramPayload, ThreadMessage};

/// Render a Discord thread reply as the text fed back into the channel's
/// discussion chat, with its attachments carried alongside.
pub fn thread_message_to_telegram(msg: &ThreadMessage) -> TelegramPayload {
    TelegramPayload {
        body: format!("[Discord] {}\n\n{}", msg.author_name, msg.content),
        attachments: msg.attachments.clone(),
    }
}

/// Filename to send an attachment under when Discord did not give us one.
pub fn fallback_filename(kind: AttachmentKind) -> &'static str {
    match kind {
        AttachmentKind::Photo => "photo.png",
        AttachmentKind::Video => "video.mp4",
        AttachmentKind::Voice | AttachmentKind::Audio => "audio.mp3",
        AttachmentKind::Other => "file.bin",
    }
}

/// The name an attachment is relayed under: Discord's filename when present,
/// otherwise a type-derived default.
pub fn resolved_filename(attachment: &DiscordAttachment) -> String {
    attachment
        .filename
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback_filename(attachment.kind).to_string())
}
