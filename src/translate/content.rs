//! Multimodal content normalization shared by every backend.
//!
//! Converts `OpenAI` message content into native content blocks, validates
//! base64 data URLs, and extracts or rewrites image parts for template backends.

use super::anthropic_types::ContentBlock;
use super::openai_types::{ChatContent, ChatMessage, ContentPart, KnownContentPart};
use crate::error::{BridgeError, Result};

/// The pieces of a `data:<media-type>;base64,<payload>` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub media_type: &'a str,
    pub data: &'a str,
}

/// Split a base64 data URL into media type and payload.
///
/// # Errors
/// Returns a validation error for remote URLs and for data URLs whose header
/// has no media type or is not base64-encoded.
pub fn parse_data_url(url: &str) -> Result<DataUrl<'_>> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Err(BridgeError::validation(
            "Only base64 encoded images are supported",
        ));
    };

    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| BridgeError::validation("Invalid data URL format: missing payload"))?;

    let mut params = header.split(';');
    let media_type = params.next().unwrap_or_default();
    if media_type.is_empty() {
        return Err(BridgeError::validation(
            "Invalid data URL format: missing media type",
        ));
    }
    if !params.any(|p| p == "base64") {
        return Err(BridgeError::validation(
            "Invalid data URL format: payload is not base64",
        ));
    }

    Ok(DataUrl { media_type, data })
}

/// Convert message content into native blocks.
///
/// A bare string becomes one text block. Text parts pass through, `image_url`
/// parts become base64 image blocks, and every other part is forwarded as-is.
pub fn to_native_blocks(content: &ChatContent) -> Result<Vec<ContentBlock>> {
    match content {
        ChatContent::Text(text) => Ok(vec![ContentBlock::text(text.clone())]),
        ChatContent::Parts(parts) => parts.iter().map(part_to_native_block).collect(),
    }
}

fn part_to_native_block(part: &ContentPart) -> Result<ContentBlock> {
    match part {
        ContentPart::Known(KnownContentPart::Text { text }) => Ok(ContentBlock::text(text.clone())),
        ContentPart::Known(KnownContentPart::ImageUrl { image_url }) => {
            let DataUrl { media_type, data } = parse_data_url(&image_url.url)?;
            Ok(ContentBlock::base64_image(media_type, data))
        }
        ContentPart::Known(known @ KnownContentPart::Image { .. }) => {
            Ok(ContentBlock::Unknown(serde_json::to_value(known)?))
        }
        ContentPart::Unknown(raw) if part.is_image() => Err(malformed_image(raw)),
        ContentPart::Unknown(raw) => Ok(ContentBlock::Unknown(raw.clone())),
    }
}

fn malformed_image(raw: &serde_json::Value) -> BridgeError {
    BridgeError::validation(format!("Invalid image content part: {raw}"))
}

/// Collect image payloads across all messages, in message-then-part order.
///
/// Data-URL parts yield the base64 payload; inline image parts yield their
/// payload unchanged. An image-tagged part with an unreadable body is a
/// validation error, never skipped.
pub fn extract_image_payloads(messages: &[ChatMessage]) -> Result<Vec<String>> {
    let mut images = Vec::new();

    for message in messages {
        let Some(ChatContent::Parts(parts)) = &message.content else {
            continue;
        };
        for part in parts {
            match part {
                ContentPart::Known(KnownContentPart::ImageUrl { image_url }) => {
                    images.push(parse_data_url(&image_url.url)?.data.to_string());
                }
                ContentPart::Known(KnownContentPart::Image { image }) => {
                    images.push(image.clone());
                }
                ContentPart::Unknown(raw) if part.is_image() => return Err(malformed_image(raw)),
                ContentPart::Known(KnownContentPart::Text { .. }) | ContentPart::Unknown(_) => {}
            }
        }
    }

    Ok(images)
}

/// Remove every image-bearing part from a message. Returns how many were removed.
pub fn strip_images(message: &mut ChatMessage) -> usize {
    let Some(ChatContent::Parts(parts)) = &mut message.content else {
        return 0;
    };
    let before = parts.len();
    parts.retain(|p| !p.is_image());
    before - parts.len()
}

/// Turn every `image_url` part into an inline `image` part carrying the URL.
pub fn rewrite_image_urls_inline(message: &mut ChatMessage) -> usize {
    let Some(ChatContent::Parts(parts)) = &mut message.content else {
        return 0;
    };
    let mut rewritten = 0;
    for part in parts.iter_mut() {
        if let ContentPart::Known(KnownContentPart::ImageUrl { image_url }) = part {
            *part = ContentPart::image(std::mem::take(&mut image_url.url));
            rewritten += 1;
        }
    }
    rewritten
}
