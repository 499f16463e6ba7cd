//! Text generation provider abstraction.
//!
//! Conversations use a provider-neutral message format; each provider
//! translates it to its own wire format.

pub mod gemini;

use serde::{Deserialize, Serialize};

use crate::AiError;

/// Model used when neither the agent nor `AI_MODEL` names one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "user" or "assistant".
    pub role: String,
    /// Message content.
    pub content: MessageContent,
}

impl Message {
    /// A plain-text user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Content of a message: either simple text or structured blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content.
    Text(String),
    /// Structured content blocks (for tool calls and results).
    Blocks(Vec<ContentBlock>),
}

/// A structured content block within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
    /// A tool use request from the assistant.
    ToolUse {
        /// Unique ID for this tool use.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input parameters.
        input: serde_json::Value,
    },
    /// A tool result being sent back.
    ToolResult {
        /// The `tool_use` ID this result corresponds to.
        tool_use_id: String,
        /// The result content.
        content: String,
    },
}

/// Response from the LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Content blocks in the response.
    pub content: Vec<ContentBlock>,
    /// Whether the model wants to use tools (vs. providing a final answer).
    pub stop_reason: StopReason,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Model finished its response naturally.
    EndTurn,
    /// Model wants to call one or more tools.
    ToolUse,
    /// Maximum tokens reached.
    MaxTokens,
}

/// Sampling options for single-shot generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap.
    pub max_output_tokens: u32,
    /// Ask the model for `application/json` output.
    pub json: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 4000,
            json: false,
        }
    }
}

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Send a chat request with tool definitions.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError>;

    /// Generate text for a single prompt without tools.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or the model returns no
    /// text.
    async fn generate(&self, prompt: &str, options: &GenerationOptions)
    -> Result<String, AiError>;
}

/// Creates an LLM provider based on environment variables.
///
/// `AI_PROVIDER` selects the provider (only `gemini` is supported and it
/// is the default). `AI_MODEL` overrides `model`.
///
/// # Errors
///
/// Returns [`AiError::Config`] if the API key is missing or the provider
/// is unknown.
pub fn create_provider_from_env(model: &str) -> Result<Box<dyn LlmProvider>, AiError> {
    let provider = std::env::var("AI_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
    let model = std::env::var("AI_MODEL").unwrap_or_else(|_| model.to_string());

    match provider.to_lowercase().as_str() {
        "gemini" | "google" => {
            let api_key = google_api_key()?;
            let mut provider = gemini::GeminiProvider::new(api_key, model);
            if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
                provider = provider.with_base_url(base_url);
            }
            Ok(Box::new(provider))
        }
        other => Err(AiError::Config {
            message: format!("Unknown AI provider: {other}. Use 'gemini'."),
        }),
    }
}

/// Reads `GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`.
///
/// # Errors
///
/// Returns [`AiError::Config`] if neither is set.
pub fn google_api_key() -> Result<String, AiError> {
    std::env::var("GOOGLE_API_KEY")
        .or_else(|_| std::env::var("GEMINI_API_KEY"))
        .map_err(|_| AiError::Config {
            message: "GOOGLE_API_KEY (or GEMINI_API_KEY) environment variable not set"
                .to_string(),
        })
}

/// Joins the text blocks of a response.
#[must_use]
pub fn extract_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| {
            if let ContentBlock::Text { text } = b {
                Some(text.as_str())
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
