//! The chat-template capability used by template-driven backends.
//!
//! Rendering a conversation into a prompt is model specific and usually backed
//! by a tokenizer, so the bridge only defines the seam. [`ChatMlTemplate`] is a
//! plain-text renderer for tools and tests that have no tokenizer at hand.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::translate::openai_types::{ChatContent, ChatMessage, ContentPart, KnownContentPart, Role};

/// Whatever the template produced. The bridge forwards it without looking inside.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PromptRepresentation {
    Text(String),
    TokenIds(Vec<i64>),
    TokenBatch(Vec<Vec<i64>>),
    Encoding(TokenEncoding),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenEncoding {
    pub input_ids: serde_json::Value,
    pub attention_mask: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type_ids: Option<serde_json::Value>,
}

/// Renders a message list into a prompt for the given model template.
#[async_trait]
pub trait ChatTemplate: Send + Sync {
    async fn apply(&self, model_id: &str, messages: &[ChatMessage]) -> Result<PromptRepresentation>;
}

/// ChatML rendering with a trailing assistant generation prompt.
#[derive(Debug, Clone)]
pub struct ChatMlTemplate {
    pub image_marker: String,
}

impl Default for ChatMlTemplate {
    fn default() -> Self {
        Self {
            image_marker: "<image>".to_string(),
        }
    }
}

impl ChatMlTemplate {
    pub fn render(&self, messages: &[ChatMessage]) -> String {
        let mut out = String::new();
        for message in messages {
            out.push_str("<|im_start|>");
            out.push_str(role_name(message.role));
            out.push('\n');
            if let Some(ref content) = message.content {
                out.push_str(&self.render_content(content));
            }
            out.push_str("<|im_end|>\n");
        }
        out.push_str("<|im_start|>assistant\n");
        out
    }

    fn render_content(&self, content: &ChatContent) -> String {
        match content {
            ChatContent::Text(t) => t.clone(),
            ChatContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Known(KnownContentPart::Text { text }) => Some(text.as_str()),
                    ContentPart::Known(
                        KnownContentPart::Image { .. } | KnownContentPart::ImageUrl { .. },
                    ) => Some(self.image_marker.as_str()),
                    ContentPart::Unknown(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[async_trait]
impl ChatTemplate for ChatMlTemplate {
    async fn apply(&self, model_id: &str, messages: &[ChatMessage]) -> Result<PromptRepresentation> {
        tracing::debug!(model_id, messages = messages.len(), "Rendering ChatML prompt");
        Ok(PromptRepresentation::Text(self.render(messages)))
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}
