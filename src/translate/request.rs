//! The request-translation interface and the preprocessing every backend shares.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::anthropic_types::MessagesRequest;
use super::openai_types::{ChatCompletionRequest, ChatContent, ChatMessage, Role};
use crate::error::{BridgeError, Result};
use crate::template::PromptRepresentation;

/// `max_tokens` sent to a backend when the client leaves it out.
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

/// Per-call settings that are not part of the `OpenAI` request itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationParams {
    /// Operator-provided instruction merged in front of the client's system prompt.
    #[serde(default)]
    pub system_instruction: Option<String>,
    /// Identifier of the chat template (for example a Hugging Face model id).
    #[serde(default)]
    pub model_template_id: Option<String>,
}

/// Backend-native request produced by a translator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ProviderRequest {
    Messages(MessagesRequest),
    Template(TemplateRequest),
}

/// Request body for template-driven local backends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateRequest {
    pub prompt: PromptRepresentation,
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    pub images: Vec<String>,
}

/// Translates `OpenAI` chat requests into one backend's native request.
#[async_trait]
pub trait RequestTranslator: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    /// Fails with a validation error when the request cannot be expressed
    /// for this backend.
    async fn translate_request(
        &self,
        request: ChatCompletionRequest,
        params: &TranslationParams,
    ) -> Result<ProviderRequest>;

    /// Convert a non-streaming backend response. No backend supports this yet.
    fn translate_response(&self, _response: &serde_json::Value) -> Result<serde_json::Value> {
        Err(BridgeError::not_implemented("translate_response"))
    }
}

/// Take the message list out of the request, rejecting a missing or empty one.
pub fn take_messages(request: &mut ChatCompletionRequest) -> Result<Vec<ChatMessage>> {
    match request.messages.take() {
        Some(messages) if !messages.is_empty() => Ok(messages),
        _ => Err(BridgeError::validation("Request message is empty")),
    }
}

/// Merge the default system instruction with the last system message.
///
/// When the merged text is non-empty the last system message is overwritten
/// with it (or a new system message is inserted at the front), and any
/// earlier system messages are removed. Returns the merged text, or `None`
/// when there is nothing to send.
///
/// A new system message is inserted at the front rather than appended, so the
/// client's final message stays last for hooks that key on it.
pub fn merge_system_message(
    messages: &mut Vec<ChatMessage>,
    system_instruction: Option<&str>,
) -> Option<String> {
    let last_system = messages.iter().rposition(|m| m.role == Role::System);

    let request_system = last_system
        .and_then(|i| messages[i].content.as_ref())
        .map(ChatContent::as_text);

    let merged = match (system_instruction.filter(|s| !s.is_empty()), request_system) {
        (Some(default), Some(own)) => format!("{default}\n{own}"),
        (Some(default), None) => default.to_string(),
        (None, Some(own)) => own,
        (None, None) => String::new(),
    };

    if merged.is_empty() {
        return None;
    }

    match last_system {
        Some(keep) => {
            messages[keep].content = Some(ChatContent::Text(merged.clone()));
            let mut i = 0;
            messages.retain(|m| {
                let retained = m.role != Role::System || i == keep;
                i += 1;
                retained
            });
        }
        None => messages.insert(0, ChatMessage::system(merged.clone())),
    }

    Some(merged)
}
