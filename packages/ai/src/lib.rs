#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Generative model access and the tool-use agent loop.
//!
//! Text generation goes through the [`providers::LlmProvider`] trait
//! (Gemini is the shipped implementation) and image generation through
//! [`image::ImageGenerator`] (Imagen). The [`agent`] loop lets a model
//! call tools supplied by a [`agent::ToolExecutor`] until it produces a
//! final answer, streaming [`AgentEvent`]s as it goes.

pub mod agent;
pub mod image;
pub mod json;
pub mod providers;

use thiserror::Error;

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to a model provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generated image payload was not valid base64.
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] base64::DecodeError),

    /// A tool failed.
    #[error("Tool execution error: {message}")]
    ToolExecution {
        /// Description of what went wrong.
        message: String,
    },

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Agent loop exceeded maximum iterations.
    #[error("Agent loop exceeded maximum of {max_iterations} iterations")]
    MaxIterations {
        /// The configured maximum.
        max_iterations: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// The result of an agent run, always containing the accumulated messages
/// regardless of whether the agent succeeded or failed.
pub struct AgentOutcome {
    /// The full message history, including the new question and any tool
    /// calls and results accumulated before completion or failure.
    pub messages: Vec<providers::Message>,

    /// `Ok(())` if the agent produced a final answer, or the error that
    /// stopped it.
    pub result: Result<(), AiError>,
}

/// Events emitted by the agent during execution.
///
/// These are streamed to clients via SSE.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentEvent {
    /// The session ID for this conversation.
    ///
    /// Sent first so the client can reuse it for follow-ups.
    SessionId {
        /// The session identifier.
        id: String,
    },
    /// Agent is thinking / planning.
    Thinking {
        /// Brief description of what the agent is considering.
        message: String,
    },
    /// Agent is invoking a tool.
    ToolCall {
        /// Tool name.
        tool: String,
        /// Tool parameters (JSON).
        params: serde_json::Value,
    },
    /// Tool execution completed.
    ToolResult {
        /// Tool name.
        tool: String,
        /// Brief summary of the result.
        summary: String,
    },
    /// Agent has produced a final answer.
    Answer {
        /// The markdown-formatted answer.
        text: String,
    },
    /// An error occurred.
    Error {
        /// Error message.
        message: String,
    },
}
