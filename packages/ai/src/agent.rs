//! Agent loop orchestration.
//!
//! Implements the tool-use loop: user message -> model decides tools ->
//! execute tools -> feed results back -> repeat until a final answer.

use tokio::sync::mpsc;

use crate::providers::{
    ContentBlock, LlmProvider, Message, MessageContent, StopReason, extract_text,
};
use crate::{AgentEvent, AgentOutcome, AiError};

/// Maximum number of agent loop iterations to prevent infinite loops.
pub const MAX_ITERATIONS: u32 = 10;

/// Maximum size of a tool result JSON string before truncation.
const MAX_TOOL_RESULT_BYTES: usize = 8000;

/// Executes the tools an agent may call.
#[async_trait::async_trait]
pub trait ToolExecutor: Send {
    /// Runs `name` with `input`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the tool fails. The error is reported back to
    /// the model as the tool's result; it does not stop the loop.
    async fn execute(
        &mut self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, AiError>;

    /// Brief human-readable summary of a tool result.
    fn summarize(&self, name: &str, result: &serde_json::Value) -> String {
        let _ = (name, result);
        "Result received".to_string()
    }
}

/// Runs the agent loop for one user message.
///
/// `history` holds earlier turns of the same conversation. Sends
/// [`AgentEvent`]s through `tx` as the agent works; the last event is
/// either `Answer` or `Error`.
pub async fn run_agent(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    tools: &[serde_json::Value],
    executor: &mut dyn ToolExecutor,
    history: Vec<Message>,
    question: &str,
    tx: &mpsc::Sender<AgentEvent>,
) -> AgentOutcome {
    let mut messages = history;
    messages.push(Message::user(question));

    let result = agent_loop(provider, system_prompt, tools, executor, &mut messages, tx).await;
    if let Err(e) = &result {
        log::error!("Agent run failed: {e}");
        let _ = tx
            .send(AgentEvent::Error {
                message: e.to_string(),
            })
            .await;
    }

    AgentOutcome { messages, result }
}

async fn agent_loop(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    tools: &[serde_json::Value],
    executor: &mut dyn ToolExecutor,
    messages: &mut Vec<Message>,
    tx: &mpsc::Sender<AgentEvent>,
) -> Result<(), AiError> {
    for iteration in 0..MAX_ITERATIONS {
        log::info!("Agent iteration {iteration} ({})", provider.model());

        let _ = tx
            .send(AgentEvent::Thinking {
                message: if iteration == 0 {
                    "Reviewing your request...".to_string()
                } else {
                    "Processing results and thinking...".to_string()
                },
            })
            .await;

        let response = provider.chat(system_prompt, messages, tools).await?;

        let has_tool_use = response
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

        if response.stop_reason != StopReason::ToolUse || !has_tool_use {
            let text = extract_text(&response.content);
            messages.push(Message {
                role: "assistant".to_string(),
                content: MessageContent::Text(text.clone()),
            });
            let _ = tx.send(AgentEvent::Answer { text }).await;
            return Ok(());
        }

        messages.push(Message {
            role: "assistant".to_string(),
            content: MessageContent::Blocks(response.content.clone()),
        });

        let mut tool_results = Vec::new();

        for block in &response.content {
            if let ContentBlock::ToolUse { id, name, input } = block {
                let _ = tx
                    .send(AgentEvent::ToolCall {
                        tool: name.clone(),
                        params: input.clone(),
                    })
                    .await;

                let (summary, content) = match executor.execute(name, input).await {
                    Ok(json) => {
                        let summary = executor.summarize(name, &json);
                        (summary.clone(), truncate_result(&json.to_string(), &summary))
                    }
                    Err(e) => {
                        log::warn!("Tool {name} failed: {e}");
                        let msg = format!("Tool error: {e}");
                        (msg.clone(), msg)
                    }
                };

                let _ = tx
                    .send(AgentEvent::ToolResult {
                        tool: name.clone(),
                        summary,
                    })
                    .await;

                tool_results.push(ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content,
                });
            }
        }

        messages.push(Message {
            role: "user".to_string(),
            content: MessageContent::Blocks(tool_results),
        });
    }

    Err(AiError::MaxIterations {
        max_iterations: MAX_ITERATIONS,
    })
}

/// Cuts `raw` to [`MAX_TOOL_RESULT_BYTES`] on a character boundary.
fn truncate_result(raw: &str, summary: &str) -> String {
    if raw.len() <= MAX_TOOL_RESULT_BYTES {
        return raw.to_string();
    }
    let mut cut = MAX_TOOL_RESULT_BYTES;
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated, {summary})", &raw[..cut])
}
