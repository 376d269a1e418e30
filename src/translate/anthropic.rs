//! Translate `OpenAI` Chat Completions requests into Bedrock Anthropic Messages requests.
//!
//! System prompts move to the top-level `system` field, tool messages become
//! `tool_result` blocks inside user turns, assistant tool calls become
//! `tool_use` blocks, and images must arrive as base64 data URLs.

use async_trait::async_trait;

use super::anthropic_types::{
    ContentBlock, FunctionTool, KnownContentBlock, Message, MessagesRequest, Role, Tool,
    ToolChoice, ToolResultContent, BEDROCK_ANTHROPIC_VERSION,
};
use super::content::to_native_blocks;
use super::openai_types::{
    ChatCompletionRequest, ChatContent, ChatMessage, ChatTool, ChatToolCall, ChatToolChoice,
    Role as ChatRole,
};
use super::request::{
    merge_system_message, take_messages, ProviderRequest, RequestTranslator, TranslationParams,
    DEFAULT_MAX_TOKENS,
};
use super::streaming::ChunkDecoder;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicTranslator;

#[async_trait]
impl RequestTranslator for AnthropicTranslator {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn translate_request(
        &self,
        request: ChatCompletionRequest,
        params: &TranslationParams,
    ) -> Result<ProviderRequest> {
        openai_to_bedrock(request, params).map(ProviderRequest::Messages)
    }
}

impl ChunkDecoder for AnthropicTranslator {}

/// Translate an `OpenAI` request into a Bedrock Anthropic Messages request.
pub fn openai_to_bedrock(
    mut req: ChatCompletionRequest,
    params: &TranslationParams,
) -> Result<MessagesRequest> {
    let mut messages = take_messages(&mut req)?;

    let system = merge_system_message(&mut messages, params.system_instruction.as_deref());

    let native_messages = messages
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .map(translate_message)
        .collect::<Result<Vec<_>>>()?;

    let (tools, tool_choice) = translate_tools(req.tools.as_deref(), req.tool_choice.as_ref());

    tracing::debug!(
        model = %req.model,
        messages = native_messages.len(),
        tools = tools.as_ref().map_or(0, Vec::len),
        has_system = system.is_some(),
        "Translated request for Bedrock Anthropic"
    );

    Ok(MessagesRequest {
        anthropic_version: BEDROCK_ANTHROPIC_VERSION.to_string(),
        messages: native_messages,
        max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: req.temperature.filter(|t| *t > 0.0),
        top_p: req.top_p.filter(|p| *p < 1.0),
        system,
        tools,
        tool_choice,
    })
}

fn translate_message(msg: &ChatMessage) -> Result<Message> {
    match msg.role {
        ChatRole::Tool => translate_tool_message(msg),
        ChatRole::Assistant => match msg.tool_calls.as_deref() {
            Some(calls) => translate_assistant_tool_calls(msg.content.as_ref(), calls),
            None => Ok(Message {
                role: Role::Assistant,
                content: content_blocks(msg.content.as_ref())?,
            }),
        },
        ChatRole::User | ChatRole::System => Ok(Message {
            role: Role::User,
            content: content_blocks(msg.content.as_ref())?,
        }),
    }
}

fn content_blocks(content: Option<&ChatContent>) -> Result<Vec<ContentBlock>> {
    content.map_or_else(|| Ok(Vec::new()), to_native_blocks)
}

fn translate_tool_message(msg: &ChatMessage) -> Result<Message> {
    let content = match msg.content.as_ref() {
        Some(ChatContent::Text(body)) => Some(tool_result_content(body)),
        Some(parts @ ChatContent::Parts(_)) => Some(ToolResultContent::Blocks(to_native_blocks(parts)?)),
        None => None,
    };

    Ok(Message {
        role: Role::User,
        content: vec![ContentBlock::Known(KnownContentBlock::ToolResult {
            tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
            content,
        })],
    })
}

/// A tool body that is a JSON object with a `content` array is forwarded as
/// blocks (multimodal tool output); anything else is sent as the raw string.
fn tool_result_content(body: &str) -> ToolResultContent {
    let parsed = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => v,
        Err(_) => return ToolResultContent::Text(body.to_string()),
    };

    match parsed.get("content").and_then(serde_json::Value::as_array) {
        Some(items) => ToolResultContent::Blocks(items.iter().map(tool_result_item).collect()),
        None => ToolResultContent::Text(body.to_string()),
    }
}

fn tool_result_item(item: &serde_json::Value) -> ContentBlock {
    if item.get("type").and_then(serde_json::Value::as_str) == Some("image") {
        let field = |name: &str| {
            item.get(name)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        return ContentBlock::base64_image(field("mimeType"), field("data"));
    }
    ContentBlock::Unknown(item.clone())
}

fn translate_assistant_tool_calls(
    content: Option<&ChatContent>,
    calls: &[ChatToolCall],
) -> Result<Message> {
    let mut blocks = Vec::new();

    match content {
        Some(ChatContent::Text(text)) if !text.is_empty() => {
            blocks.push(ContentBlock::text(text.clone()));
        }
        Some(parts @ ChatContent::Parts(_)) if !parts.is_empty() => {
            blocks.extend(to_native_blocks(parts)?);
        }
        _ => {}
    }

    for call in calls.iter().filter(|c| c.call_type == "function") {
        blocks.push(tool_use_block(call)?);
    }

    Ok(Message {
        role: Role::Assistant,
        content: blocks,
    })
}

fn tool_use_block(call: &ChatToolCall) -> Result<ContentBlock> {
    let arguments = call
        .function
        .arguments
        .as_deref()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            BridgeError::validation(format!("Tool call '{}' has no arguments", call.id))
        })?;

    let input = match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(tool_call_id = %call.id, error = %e, "Unparseable tool arguments, using {{}}");
            serde_json::Value::Object(serde_json::Map::new())
        }
    };

    Ok(ContentBlock::Known(KnownContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.function.name.clone(),
        input,
    }))
}

fn translate_tools(
    tools: Option<&[ChatTool]>,
    tool_choice: Option<&ChatToolChoice>,
) -> (Option<Vec<Tool>>, Option<ToolChoice>) {
    let converted: Vec<Tool> = tools
        .unwrap_or_default()
        .iter()
        .filter_map(|t| match t {
            ChatTool::Function(f) => Some(Tool::Function(FunctionTool {
                name: f.function.name.clone(),
                description: f.function.description.clone(),
                input_schema: f.function.parameters.clone(),
            })),
            ChatTool::Other(serde_json::Value::Null) => None,
            ChatTool::Other(raw) => Some(Tool::Other(raw.clone())),
        })
        .collect();

    if converted.is_empty() {
        return (None, None);
    }

    (Some(converted), tool_choice.and_then(translate_tool_choice))
}

fn translate_tool_choice(tc: &ChatToolChoice) -> Option<ToolChoice> {
    match tc {
        ChatToolChoice::Mode(mode) => match mode.as_str() {
            "auto" => Some(ToolChoice::Auto),
            "none" => Some(ToolChoice::None),
            _ => None,
        },
        ChatToolChoice::Function(choice) => Some(ToolChoice::Tool {
            name: choice.function.name.clone(),
        }),
        ChatToolChoice::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> ChatCompletionRequest {
        serde_json::from_value(value).unwrap()
    }

    fn translate(value: serde_json::Value) -> Result<serde_json::Value> {
        let out = openai_to_bedrock(request(value), &TranslationParams::default())?;
        Ok(serde_json::to_value(out).unwrap())
    }

    #[test]
    fn test_minimal_request() {
        let out = translate(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();

        assert_eq!(
            out,
            json!({
                "anthropic_version": "bedrock-2023-05-31",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}],
                "max_tokens": 4096
            })
        );
    }

    #[test]
    fn test_system_moves_to_top_level() {
        let params = TranslationParams {
            system_instruction: Some("default".to_string()),
            model_template_id: None,
        };
        let out = openai_to_bedrock(
            request(json!({
                "model": "m",
                "messages": [
                    {"role": "system", "content": "be kind"},
                    {"role": "user", "content": "hi"}
                ]
            })),
            &params,
        )
        .unwrap();

        assert_eq!(out.system.as_deref(), Some("default\nbe kind"));
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].role, Role::User);
    }

    #[test]
    fn test_sampling_thresholds() {
        for (temperature, expected) in [(-1.0, None), (0.0, None), (0.3, Some(0.3)), (1.5, Some(1.5))] {
            let out = openai_to_bedrock(
                request(json!({
                    "model": "m",
                    "messages": [{"role": "user", "content": "hi"}],
                    "temperature": temperature
                })),
                &TranslationParams::default(),
            )
            .unwrap();
            assert_eq!(out.temperature, expected, "temperature {temperature}");
        }

        for (top_p, expected) in [(1.0, None), (1.2, None), (0.9, Some(0.9)), (0.0, Some(0.0))] {
            let out = openai_to_bedrock(
                request(json!({
                    "model": "m",
                    "messages": [{"role": "user", "content": "hi"}],
                    "top_p": top_p
                })),
                &TranslationParams::default(),
            )
            .unwrap();
            assert_eq!(out.top_p, expected, "top_p {top_p}");
        }
    }

    #[test]
    fn test_explicit_max_tokens_kept() {
        let out = translate(json!({
            "model": "m",
            "max_tokens": 12,
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        assert_eq!(out["max_tokens"], 12);
    }

    #[test]
    fn test_tool_message_with_multimodal_body() {
        let out = translate(json!({
            "model": "m",
            "messages": [{
                "role": "tool",
                "tool_call_id": "call_1",
                "content": "{\"content\":[{\"type\":\"image\",\"mimeType\":\"image/png\",\"data\":\"AAA=\"}]}"
            }]
        }))
        .unwrap();

        assert_eq!(
            out["messages"][0],
            json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": "call_1",
                    "content": [{
                        "type": "image",
                        "source": {"type": "base64", "media_type": "image/png", "data": "AAA="}
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_tool_message_mixed_items_pass_through() {
        let out = translate(json!({
            "model": "m",
            "messages": [{
                "role": "tool",
                "tool_call_id": "call_1",
                "content": "{\"content\":[{\"type\":\"text\",\"text\":\"done\"}]}"
            }]
        }))
        .unwrap();
        assert_eq!(
            out["messages"][0]["content"][0]["content"],
            json!([{"type": "text", "text": "done"}])
        );
    }

    #[test]
    fn test_tool_message_plain_body_kept_verbatim() {
        for body in ["sunny, 21C", "{\"temp\": 21}", "[1, 2]"] {
            let out = translate(json!({
                "model": "m",
                "messages": [{"role": "tool", "tool_call_id": "call_1", "content": body}]
            }))
            .unwrap();
            assert_eq!(out["messages"][0]["content"][0]["content"], json!(body));
        }
    }

    #[test]
    fn test_assistant_tool_calls() {
        let out = translate(json!({
            "model": "m",
            "messages": [{
                "role": "assistant",
                "content": "Checking.",
                "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Paris\"}"}},
                    {"id": "call_2", "type": "function", "function": {"name": "clock", "arguments": "not json"}}
                ]
            }]
        }))
        .unwrap();

        assert_eq!(
            out["messages"][0],
            json!({
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "Checking."},
                    {"type": "tool_use", "id": "call_1", "name": "weather", "input": {"city": "Paris"}},
                    {"type": "tool_use", "id": "call_2", "name": "clock", "input": {}}
                ]
            })
        );
    }

    #[test]
    fn test_assistant_empty_text_has_no_leading_block() {
        let out = translate(json!({
            "model": "m",
            "messages": [{
                "role": "assistant",
                "content": "",
                "tool_calls": [{"id": "c", "type": "function", "function": {"name": "f", "arguments": "{}"}}]
            }]
        }))
        .unwrap();
        let content = out["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "tool_use");
    }

    #[test]
    fn test_tool_call_without_arguments_rejected() {
        let err = translate(json!({
            "model": "m",
            "messages": [{
                "role": "assistant",
                "tool_calls": [{"id": "c", "type": "function", "function": {"name": "f"}}]
            }]
        }))
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_remote_image_rejected() {
        let err = translate(json!({
            "model": "m",
            "messages": [{
                "role": "user",
                "content": [{"type": "image_url", "image_url": {"url": "https://example.com/x.png"}}]
            }]
        }))
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_image_parts_validated_by_type_tag() {
        for part in [
            json!({"type": "image_url", "image_url": "https://example.com/x.png"}),
            json!({"type": "image_url", "image_url": {"url": 7}}),
            json!({"type": "image_url"}),
        ] {
            for role in ["user", "assistant", "tool"] {
                let err = translate(json!({
                    "model": "m",
                    "messages": [{"role": role, "tool_call_id": "c", "content": [part.clone()]}]
                }))
                .unwrap_err();
                assert!(err.is_validation(), "{role}: {part}");
            }
        }
    }

    #[test]
    fn test_string_form_data_url_accepted() {
        let out = translate(json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "image_url", "image_url": "data:image/png;base64,AAA="}
            ]}]
        }))
        .unwrap();
        assert_eq!(
            out["messages"][0]["content"][0],
            json!({"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAA="}})
        );
    }

    #[test]
    fn test_tools_and_choice() {
        let out = translate(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [
                {"type": "function", "function": {"name": "f", "description": "does f", "parameters": {"type": "object"}}},
                {"type": "computer_20241022", "name": "computer", "display_width_px": 1024}
            ],
            "tool_choice": {"type": "function", "function": {"name": "f"}}
        }))
        .unwrap();

        assert_eq!(
            out["tools"],
            json!([
                {"name": "f", "description": "does f", "input_schema": {"type": "object"}},
                {"type": "computer_20241022", "name": "computer", "display_width_px": 1024}
            ])
        );
        assert_eq!(out["tool_choice"], json!({"type": "tool", "name": "f"}));
    }

    #[test]
    fn test_tool_choice_table() {
        for (choice, expected) in [
            (json!("auto"), Some(json!({"type": "auto"}))),
            (json!("none"), Some(json!({"type": "none"}))),
            (json!("required"), None),
            (json!({"type": "allowed_tools"}), None),
        ] {
            let out = translate(json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}],
                "tools": [{"type": "function", "function": {"name": "f", "parameters": {}}}],
                "tool_choice": choice
            }))
            .unwrap();
            assert_eq!(out.get("tool_choice").cloned(), expected);
        }
    }

    #[test]
    fn test_empty_tools_emit_nothing() {
        let out = translate(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [],
            "tool_choice": "auto"
        }))
        .unwrap();
        assert!(out.get("tools").is_none());
        assert!(out.get("tool_choice").is_none());
    }

    #[test]
    fn test_translate_response_not_implemented() {
        let err = AnthropicTranslator
            .translate_response(&json!({"content": []}))
            .unwrap_err();
        assert!(err.is_not_implemented());
        assert!(!err.is_validation());
    }
}
