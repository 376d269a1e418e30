//! Type definitions for the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//!
//! These types represent the request format clients send to the bridge and the
//! streaming chunk format the bridge sends back. Field names follow the wire
//! format exactly.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Request types (what the client sends TO us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ChatToolChoice>,
    // stop, n, user, penalties, logit_bias ...
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A content part. Unknown part types are kept as raw JSON so they can be
/// forwarded untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContentPart {
    Known(KnownContentPart),
    Unknown(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum KnownContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl {
        #[serde(deserialize_with = "deserialize_image_url")]
        image_url: ImageUrlDetail,
    },
    /// Inline image payload, as used by local chat templates.
    #[serde(rename = "image")]
    Image { image: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrlDetail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Clients send `image_url` either as a bare URL string or as `{url, detail}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImageUrlForm {
    Bare(String),
    Detailed {
        url: String,
        #[serde(default)]
        detail: Option<String>,
    },
}

fn deserialize_image_url<'de, D>(deserializer: D) -> Result<ImageUrlDetail, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ImageUrlForm::deserialize(deserializer)? {
        ImageUrlForm::Bare(url) => ImageUrlDetail { url, detail: None },
        ImageUrlForm::Detailed { url, detail } => ImageUrlDetail { url, detail },
    })
}

/// Marker for the only tool type the bridge understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Function,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChatTool {
    Function(FunctionTool),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub tool_type: FunctionKind,
    pub function: ChatFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChatToolChoice {
    Mode(String), // "auto", "none", "required"
    Function(ChatToolChoiceFunctionSpec),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatToolChoiceFunctionSpec {
    #[serde(rename = "type")]
    pub choice_type: FunctionKind,
    pub function: ChatToolChoiceFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatToolChoiceFunction {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: ChatToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatToolCallFunction {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

fn default_call_type() -> String {
    "function".to_string()
}

// ---------------------------------------------------------------------------
// Streaming chunk types (what we send BACK to the client)
// ---------------------------------------------------------------------------

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    #[serde(default)]
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    pub index: u64,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkToolCall {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<ChunkToolCallFunction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkToolCallFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(ChatContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl ChatContent {
    /// Text view of the content; text parts are newline-joined, other parts ignored.
    pub fn as_text(&self) -> String {
        match self {
            ChatContent::Text(t) => t.clone(),
            ChatContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Known(KnownContentPart::Text { text }) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChatContent::Text(t) => t.is_empty(),
            ChatContent::Parts(parts) => parts.is_empty(),
        }
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Known(KnownContentPart::Text { text: text.into() })
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Known(KnownContentPart::ImageUrl {
            image_url: ImageUrlDetail {
                url: url.into(),
                detail: None,
            },
        })
    }

    pub fn image(payload: impl Into<String>) -> Self {
        Self::Known(KnownContentPart::Image {
            image: payload.into(),
        })
    }

    /// The part's `type` tag, also for parts whose body did not match a known shape.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ContentPart::Known(KnownContentPart::Text { .. }) => Some("text"),
            ContentPart::Known(KnownContentPart::ImageUrl { .. }) => Some("image_url"),
            ContentPart::Known(KnownContentPart::Image { .. }) => Some("image"),
            ContentPart::Unknown(raw) => raw.get("type").and_then(serde_json::Value::as_str),
        }
    }

    /// True for every part tagged as an image, well-formed or not.
    pub fn is_image(&self) -> bool {
        matches!(self.kind(), Some("image_url" | "image"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_part_is_preserved() {
        let raw = json!({"type": "input_audio", "input_audio": {"data": "AAA", "format": "wav"}});
        let part: ContentPart = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(part, ContentPart::Unknown(_)));
        assert_eq!(serde_json::to_value(&part).unwrap(), raw);
    }

    #[test]
    fn test_non_function_tool_falls_back() {
        let tools: Vec<ChatTool> = serde_json::from_value(json!([
            {"type": "function", "function": {"name": "f", "parameters": {"type": "object"}}},
            {"type": "web_search"}
        ]))
        .unwrap();
        assert!(matches!(tools[0], ChatTool::Function(_)));
        assert!(matches!(tools[1], ChatTool::Other(_)));
    }

    #[test]
    fn test_tool_choice_shapes() {
        let auto: ChatToolChoice = serde_json::from_value(json!("auto")).unwrap();
        assert_eq!(auto, ChatToolChoice::Mode("auto".to_string()));

        let forced: ChatToolChoice =
            serde_json::from_value(json!({"type": "function", "function": {"name": "f"}})).unwrap();
        assert!(matches!(forced, ChatToolChoice::Function(_)));

        let other: ChatToolChoice = serde_json::from_value(json!({"type": "allowed_tools"})).unwrap();
        assert!(matches!(other, ChatToolChoice::Other(_)));
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "stop": ["\n"],
            "user": "u-1"
        }))
        .unwrap();
        assert_eq!(req.extra.get("user"), Some(&json!("u-1")));
        assert_eq!(req.messages.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_image_url_accepts_string_and_object_forms() {
        let parts: Vec<ContentPart> = serde_json::from_value(json!([
            {"type": "image_url", "image_url": "data:image/png;base64,AAA="},
            {"type": "image_url", "image_url": {"url": "data:image/png;base64,BBB=", "detail": "low"}}
        ]))
        .unwrap();

        assert_eq!(parts[0], ContentPart::image_url("data:image/png;base64,AAA="));
        assert_eq!(
            parts[1],
            ContentPart::Known(KnownContentPart::ImageUrl {
                image_url: ImageUrlDetail {
                    url: "data:image/png;base64,BBB=".to_string(),
                    detail: Some("low".to_string()),
                }
            })
        );
    }

    #[test]
    fn test_malformed_image_parts_still_count_as_images() {
        let parts: Vec<ContentPart> = serde_json::from_value(json!([
            {"type": "image_url", "image_url": {"url": 42}},
            {"type": "image_url"},
            {"type": "image", "image": null},
            {"type": "document", "id": 1}
        ]))
        .unwrap();

        assert!(parts[..3]
            .iter()
            .all(|p| matches!(p, ContentPart::Unknown(_)) && p.is_image()));
        assert_eq!(parts[3].kind(), Some("document"));
        assert!(!parts[3].is_image());
    }

    #[test]
    fn test_parts_as_text_skips_images() {
        let content = ChatContent::Parts(vec![
            ContentPart::text("a"),
            ContentPart::image_url("data:image/png;base64,AAA="),
            ContentPart::text("b"),
        ]);
        assert_eq!(content.as_text(), "a\nb");
    }
}
