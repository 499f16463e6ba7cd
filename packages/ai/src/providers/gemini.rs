//! Google Gemini provider (`generateContent` with function calling).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    ContentBlock, GenerationOptions, LlmProvider, LlmResponse, Message, MessageContent,
    StopReason, extract_text,
};
use crate::AiError;

/// Default Generative Language API host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Output token cap for tool-use turns.
const CHAT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Gemini API provider.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a new Gemini provider.
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Points the provider at a different API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn generate_content(&self, request: &GeminiRequest) -> Result<GeminiResponse, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiError>(&body)
                .map_or_else(|_| format!("HTTP {status}: {body}"), |e| e.error.message);
            return Err(AiError::Provider { message });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn text_part(text: String) -> GeminiPart {
    GeminiPart {
        text: Some(text),
        ..GeminiPart::default()
    }
}

/// Converts the neutral history to Gemini `contents`.
///
/// Gemini function responses are matched by function name, so tool result
/// IDs are mapped back to the name of the call that produced them.
fn to_contents(messages: &[Message]) -> Vec<GeminiContent> {
    let mut call_names: BTreeMap<&str, &str> = BTreeMap::new();
    let mut contents = Vec::with_capacity(messages.len());

    for msg in messages {
        let role = if msg.role == "assistant" { "model" } else { "user" };
        let parts = match &msg.content {
            MessageContent::Text(text) => vec![text_part(text.clone())],
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => text_part(text.clone()),
                    ContentBlock::ToolUse { id, name, input } => {
                        call_names.insert(id.as_str(), name.as_str());
                        GeminiPart {
                            function_call: Some(FunctionCall {
                                id: None,
                                name: name.clone(),
                                args: input.clone(),
                            }),
                            ..GeminiPart::default()
                        }
                    }
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } => {
                        let name = call_names
                            .get(tool_use_id.as_str())
                            .copied()
                            .unwrap_or("unknown_tool");
                        let result = serde_json::from_str(content)
                            .unwrap_or_else(|_| serde_json::Value::String(content.clone()));
                        GeminiPart {
                            function_response: Some(FunctionResponse {
                                id: None,
                                name: name.to_string(),
                                response: serde_json::json!({ "name": name, "content": result }),
                            }),
                            ..GeminiPart::default()
                        }
                    }
                })
                .collect(),
        };

        contents.push(GeminiContent {
            role: Some(role.to_string()),
            parts,
        });
    }

    contents
}

/// Converts the first candidate into neutral content blocks.
fn to_llm_response(response: GeminiResponse) -> Result<LlmResponse, AiError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AiError::Provider {
            message: "No candidates in Gemini response".to_string(),
        })?;

    let mut content_blocks = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text
            && !text.is_empty()
        {
            content_blocks.push(ContentBlock::Text { text });
        }
        if let Some(call) = part.function_call {
            let id = call
                .id
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            let input = if call.args.is_null() {
                serde_json::json!({})
            } else {
                call.args
            };
            content_blocks.push(ContentBlock::ToolUse {
                id,
                name: call.name,
                input,
            });
        }
    }

    let has_tool_use = content_blocks
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

    let stop_reason = if has_tool_use {
        StopReason::ToolUse
    } else if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        StopReason::MaxTokens
    } else {
        StopReason::EndTurn
    };

    Ok(LlmResponse {
        content: content_blocks,
        stop_reason,
    })
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError> {
        let request = GeminiRequest {
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![text_part(system_prompt.to_string())],
            }),
            contents: to_contents(messages),
            tools: if tools.is_empty() {
                Vec::new()
            } else {
                vec![GeminiTools {
                    function_declarations: tools.to_vec(),
                }]
            },
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: CHAT_MAX_OUTPUT_TOKENS,
                response_mime_type: None,
            },
        };

        to_llm_response(self.generate_content(&request).await?)
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, AiError> {
        let request = GeminiRequest {
            system_instruction: None,
            contents: to_contents(&[Message::user(prompt)]),
            tools: Vec::new(),
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                response_mime_type: options.json.then_some("application/json"),
            },
        };

        let response = to_llm_response(self.generate_content(&request).await?)?;
        let text = extract_text(&response.content);
        if text.trim().is_empty() {
            return Err(AiError::Provider {
                message: format!("{} returned no text", self.model),
            });
        }
        Ok(text)
    }
}
