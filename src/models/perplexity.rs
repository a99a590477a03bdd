use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Perplexity Chat Completion Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,
    /// Always false, the assistant needs the complete JSON document
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    /// Structured output request
    pub response_format: ResponseFormat,
    /// Turns off Perplexity's web search for this request
    pub disable_search: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response format for structured outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaSpec },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaSpec {
    pub schema: Value,
}

impl ResponseFormat {
    /// The schema every assistant reply must follow
    pub fn assistant_reply() -> Self {
        ResponseFormat::JsonSchema {
            json_schema: JsonSchemaSpec {
                schema: assistant_reply_schema(),
            },
        }
    }
}

/// JSON schema of [`AssistantReply`]
pub fn assistant_reply_schema() -> Value {
    json!({
        "title": "PerplexityAgentResponse",
        "type": "object",
        "properties": {
            "content": {"title": "Content", "type": "string"},
            "actions": {
                "title": "Actions",
                "anyOf": [
                    {"type": "array", "items": {"$ref": "#/$defs/PerplexityAgentAction"}},
                    {"type": "null"}
                ]
            }
        },
        "required": ["content", "actions"],
        "$defs": {
            "PerplexityAgentAction": {
                "title": "PerplexityAgentAction",
                "type": "object",
                "properties": {
                    "domain": {"title": "Domain", "type": "string"},
                    "service": {"title": "Service", "type": "string"},
                    "target": {"title": "Target", "type": "string"},
                    "parameters": {
                        "title": "Parameters",
                        "anyOf": [{"type": "object"}, {"type": "null"}]
                    }
                },
                "required": ["domain", "service", "target", "parameters"]
            }
        }
    })
}

/// Perplexity Chat Completion Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default)]
    pub cost: Option<UsageCost>,
}

/// Billing figures reported by Perplexity, in USD
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageCost {
    #[serde(default)]
    pub total_cost: Option<f64>,
}

impl ChatCompletionResponse {
    /// Total cost of the call, zero when the API did not report it
    pub fn total_cost(&self) -> f64 {
        self.usage
            .as_ref()
            .and_then(|u| u.cost.as_ref())
            .and_then(|c| c.total_cost)
            .unwrap_or(0.0)
    }

    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Structured reply embedded in `choices[0].message.content`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub content: String,
    #[serde(default)]
    pub actions: Option<Vec<SuggestedAction>>,
}

/// A host command suggested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub domain: String,
    pub service: String,
    pub target: String,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
}

impl SuggestedAction {
    pub fn is_speak(&self) -> bool {
        self.domain == "tts" && self.service == "speak"
    }

    /// String parameter lookup, empty strings count as missing
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameters = match &self.parameters {
            Some(p) if !p.is_empty() => Value::Object(p.clone()).to_string(),
            _ => "{}".to_string(),
        };
        write!(
            f,
            "ACTION: {}.{} > {} > {}",
            self.domain, self.service, self.target, parameters
        )
    }
}
