//! Translate `OpenAI` requests for local backends that render prompts with a chat template.
//!
//! The base flow is the same for every template backend: merge the system
//! prompt, pull image payloads out of the conversation, render the prompt with
//! the injected [`ChatTemplate`], and forward sampling parameters. Backends
//! that need the conversation adjusted first do so through a [`TemplateHook`].

use std::sync::Arc;

use async_trait::async_trait;

use super::content::{extract_image_payloads, rewrite_image_urls_inline, strip_images};
use super::openai_types::{ChatCompletionRequest, ChatMessage};
use super::request::{
    merge_system_message, take_messages, ProviderRequest, RequestTranslator, TemplateRequest,
    TranslationParams, DEFAULT_MAX_TOKENS,
};
use super::streaming::ChunkDecoder;
use crate::error::{BridgeError, Result};
use crate::template::ChatTemplate;

/// Backend-specific adjustment applied at a fixed point of the template flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateHook {
    /// Runs after image extraction, right before rendering.
    ///
    /// Post: no message contains an `image_url` part; each one became an
    /// inline `image` part carrying the original URL, which is the marker
    /// the template looks for.
    NativeImageMarkers,
    /// Runs before image extraction and again on its result.
    ///
    /// Post: only the last message may hold image parts, and at most one
    /// image payload (the last one found) is forwarded.
    SingleTrailingImage,
}

pub struct TemplateTranslator {
    name: &'static str,
    hook: Option<TemplateHook>,
    template: Arc<dyn ChatTemplate>,
}

impl TemplateTranslator {
    pub fn new(name: &'static str, hook: Option<TemplateHook>, template: Arc<dyn ChatTemplate>) -> Self {
        Self {
            name,
            hook,
            template,
        }
    }
}

impl std::fmt::Debug for TemplateTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateTranslator")
            .field("name", &self.name)
            .field("hook", &self.hook)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestTranslator for TemplateTranslator {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn translate_request(
        &self,
        mut req: ChatCompletionRequest,
        params: &TranslationParams,
    ) -> Result<ProviderRequest> {
        let model_id = params
            .model_template_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BridgeError::validation("Please provide a model template id"))?;

        let mut messages = take_messages(&mut req)?;
        merge_system_message(&mut messages, params.system_instruction.as_deref());

        if self.hook == Some(TemplateHook::SingleTrailingImage) {
            let stripped = strip_all_but_last(&mut messages);
            if stripped > 0 {
                tracing::debug!(backend = self.name, stripped, "Dropped images outside the last message");
            }
        }

        let mut images = extract_image_payloads(&messages)?;

        match self.hook {
            Some(TemplateHook::SingleTrailingImage) => keep_last_image(&mut images),
            Some(TemplateHook::NativeImageMarkers) => {
                for message in &mut messages {
                    rewrite_image_urls_inline(message);
                }
            }
            None => {}
        }

        let prompt = self.template.apply(model_id, &messages).await?;

        tracing::debug!(
            backend = self.name,
            model_id,
            messages = messages.len(),
            images = images.len(),
            "Translated request for chat template backend"
        );

        Ok(ProviderRequest::Template(TemplateRequest {
            prompt,
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: req.temperature,
            top_p: req.top_p,
            images,
        }))
    }
}

impl ChunkDecoder for TemplateTranslator {}

fn strip_all_but_last(messages: &mut [ChatMessage]) -> usize {
    let Some((_, earlier)) = messages.split_last_mut() else {
        return 0;
    };
    earlier.iter_mut().map(strip_images).sum()
}

fn keep_last_image(images: &mut Vec<String>) {
    if images.len() > 1 {
        images.drain(..images.len() - 1);
    }
}
