use std::io::Cursor;

use anyhow::{anyhow, Result};
use reqwest::Client;
use tracing::{debug, warn};

use crate::parsers::StickerKind;

const MAX_DISCORD_FILE_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub filename: String,
    pub size: usize,
}

pub struct MediaHandler {
    client: Client,
}

impl MediaHandler {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub async fn download_from_url(&self, url: &str) -> Result<MediaPayload> {
        debug!("downloading media from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("failed to download from {}: {}", url, e))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "failed to download from {}: status {}",
                url,
                response.status()
            ));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| anyhow!("failed to read response body: {}", e))?
            .to_vec();

        let size = data.len();
        let filename = filename_from_path(url);

        debug!("downloaded {} bytes from {}", size, url);

        Ok(MediaPayload {
            data,
            filename,
            size,
        })
    }

    pub fn check_discord_file_size(size: usize) -> Result<()> {
        if size > MAX_DISCORD_FILE_SIZE {
            warn!(
                "file too large for Discord: {} bytes (max {})",
                size, MAX_DISCORD_FILE_SIZE
            );
            Err(anyhow!(
                "file too large for Discord: {} bytes (max {})",
                size,
                MAX_DISCORD_FILE_SIZE
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for MediaHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Trailing path segment, with any query string stripped.
pub fn filename_from_path(path: &str) -> String {
    path.rsplit('/')
        .next()
        .unwrap_or("attachment")
        .split('?')
        .next()
        .unwrap_or("attachment")
        .to_string()
}

/// Re-encode a static WebP sticker as PNG so Discord renders it inline.
/// Animated and video stickers have no raster frames we can decode here.
pub fn flatten_sticker(data: &[u8], kind: StickerKind) -> Result<MediaPayload> {
    match kind {
        StickerKind::Static => {}
        StickerKind::Animated | StickerKind::Video => {
            return Err(anyhow!("cannot convert non-static sticker to an image"));
        }
    }

    let img = image::load_from_memory(data)
        .map_err(|e| anyhow!("failed to decode sticker image: {}", e))?;

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|e| anyhow!("failed to encode sticker as PNG: {}", e))?;

    let size = png.len();
    Ok(MediaPayload {
        data: png,
        filename: "sticker.png".to_string(),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_keeps_trailing_segment() {
        assert_eq!(
            filename_from_path("documents/file_12.mp4"),
            "file_12.mp4".to_string()
        );
    }

    #[test]
    fn filename_strips_query_string() {
        assert_eq!(
            filename_from_path("https://cdn.example/att/a.png?ex=1&is=2"),
            "a.png".to_string()
        );
    }

    #[test]
    fn size_check_rejects_oversized_file() {
        assert!(MediaHandler::check_discord_file_size(MAX_DISCORD_FILE_SIZE + 1).is_err());
        assert!(MediaHandler::check_discord_file_size(MAX_DISCORD_FILE_SIZE).is_ok());
    }

    #[test]
    fn static_sticker_becomes_png() {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let mut raw = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut raw), image::ImageOutputFormat::Bmp)
            .unwrap();

        let payload = flatten_sticker(&raw, StickerKind::Static).unwrap();
        assert_eq!(payload.filename, "sticker.png");
        assert!(image::load_from_memory(&payload.data).is_ok());
    }

    #[test]
    fn animated_sticker_is_refused() {
        assert!(flatten_sticker(&[0u8; 4], StickerKind::Animated).is_err());
    }
}
