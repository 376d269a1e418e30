//! Type definitions for the Bedrock-hosted Anthropic Messages API.
//!
//! Request types are what the bridge produces for the backend; stream types are
//! the per-frame events the backend sends back while generating.

use serde::{Deserialize, Serialize};

pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

// ---------------------------------------------------------------------------
// Request types (what we send TO the backend)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagesRequest {
    pub anthropic_version: String,
    pub messages: Vec<Message>,
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Content block of a native message. Blocks the bridge does not recognise
/// are forwarded as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContentBlock {
    Known(KnownContentBlock),
    Unknown(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum KnownContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Tool {
    Function(FunctionTool),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Tool { name: String },
}

// ---------------------------------------------------------------------------
// Streaming event types (one JSON object per backend frame)
// ---------------------------------------------------------------------------

/// A decoded backend stream event.
///
/// Frames without a `type` field are legacy text-completion fragments; frames
/// with an unrecognised `type` decode to [`StreamEvent::Other`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Completion(CompletionFragment),
    ContentBlockStart {
        index: u64,
        content_block: StartBlock,
    },
    ContentBlockDelta {
        index: u64,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u64,
    },
    MessageStop,
    Other(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionFragment {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StartBlock {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BlockDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct IndexedFrame<T> {
    #[serde(default)]
    index: u64,
    #[serde(flatten)]
    body: T,
}

#[derive(Deserialize)]
struct StartBody {
    content_block: StartBlock,
}

#[derive(Deserialize)]
struct DeltaBody {
    delta: BlockDelta,
}

impl StreamEvent {
    /// Decode one frame of UTF-8 JSON.
    ///
    /// # Errors
    /// Returns `BridgeError::Json` when the bytes are not a JSON value and
    /// `BridgeError::Decode` when a known event kind is missing its payload.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        if !value.is_object() {
            return Err(crate::BridgeError::decode(format!(
                "expected a JSON object, got {value}"
            )));
        }

        let kind = match value.get("type") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(crate::BridgeError::decode(format!(
                    "event type must be a string, got {other}"
                )))
            }
        };

        let event = match kind.as_deref() {
            None => StreamEvent::Completion(parse_frame(value, "completion")?),
            Some("content_block_start") => {
                let frame: IndexedFrame<StartBody> = parse_frame(value, "content_block_start")?;
                StreamEvent::ContentBlockStart {
                    index: frame.index,
                    content_block: frame.body.content_block,
                }
            }
            Some("content_block_delta") => {
                let frame: IndexedFrame<DeltaBody> = parse_frame(value, "content_block_delta")?;
                StreamEvent::ContentBlockDelta {
                    index: frame.index,
                    delta: frame.body.delta,
                }
            }
            Some("content_block_stop") => {
                let frame: IndexedFrame<serde_json::Value> =
                    parse_frame(value, "content_block_stop")?;
                StreamEvent::ContentBlockStop { index: frame.index }
            }
            Some("message_stop") => StreamEvent::MessageStop,
            Some(other) => StreamEvent::Other(other.to_string()),
        };

        Ok(event)
    }

    pub fn event_name(&self) -> &str {
        match self {
            StreamEvent::Completion(_) => "completion",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Other(name) => name,
        }
    }
}

fn parse_frame<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    kind: &str,
) -> crate::Result<T> {
    serde_json::from_value(value)
        .map_err(|e| crate::BridgeError::decode(format!("malformed {kind} event: {e}")))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Known(KnownContentBlock::Text { text: text.into() })
    }

    pub fn base64_image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Known(KnownContentBlock::Image {
            source: ImageSource {
                source_type: "base64".to_string(),
                media_type: media_type.into(),
                data: data.into(),
            },
        })
    }
}
