//! Structured JSON generation.

use crate::AiError;
use crate::providers::{GenerationOptions, LlmProvider};

/// Removes a surrounding Markdown code fence (```` ```json ```` or
/// ```` ``` ````) if present.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parses model output as a JSON object, tolerating code fences.
///
/// # Errors
///
/// Returns [`AiError::Json`] if the text is not JSON, or
/// [`AiError::Provider`] if it is JSON but not an object.
pub fn parse_json_object(text: &str) -> Result<serde_json::Value, AiError> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fences(text))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(AiError::Provider {
            message: "expected a JSON object in model output".to_string(),
        })
    }
}

/// Prompts the model for a JSON object and parses the reply.
///
/// # Errors
///
/// Returns [`AiError`] if generation fails or the reply is not a JSON
/// object.
pub async fn generate_json(
    provider: &dyn LlmProvider,
    prompt: &str,
    options: &GenerationOptions,
) -> Result<serde_json::Value, AiError> {
    let options = GenerationOptions {
        json: true,
        ..options.clone()
    };
    let text = provider.generate(prompt, &options).await?;
    parse_json_object(&text).inspect_err(|e| {
        let preview: String = text.chars().take(300).collect();
        log::error!("Could not parse JSON from {}: {e}\n  output: {preview}", provider.model());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"b\":2}  "), "{\"b\":2}");
    }

    #[test]
    fn parses_fenced_object() {
        let value = parse_json_object("```json\n{\"short_copy\": \"Vote!\"}\n```").unwrap();
        assert_eq!(value["short_copy"], "Vote!");
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(matches!(
            parse_json_object("[1, 2]"),
            Err(AiError::Provider { .. })
        ));
        assert!(matches!(
            parse_json_object("not json"),
            Err(AiError::Json(_))
        ));
    }
}
