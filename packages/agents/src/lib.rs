#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Campaign agents.
//!
//! Agents are declared in embedded TOML files (see [`registry`]). Each one
//! runs the [`resonance_ai::agent`] loop against a [`session::CampaignSession`]
//! using the tools in [`tools`], which call Qloo, Gemini and Imagen and
//! write their outputs to the [`artifacts::ArtifactStore`].

pub mod artifacts;
pub mod registry;
pub mod session;
pub mod tools;

use std::path::PathBuf;

use resonance_agents_models::{AgentDefinition, tool_definitions_for};
use resonance_ai::agent::run_agent;
use resonance_ai::image::{ImageGenerator, create_image_generator_from_env};
use resonance_ai::providers::{DEFAULT_MODEL, LlmProvider, create_provider_from_env};
use resonance_ai::{AgentEvent, AiError};
use resonance_campaign::CampaignError;
use resonance_qloo::{QlooClient, QlooError};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::artifacts::ArtifactStore;
use crate::session::CampaignSession;
use crate::tools::CampaignTools;

/// Errors that can occur while running agent tools.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Campaign data operation failed.
    #[error(transparent)]
    Campaign(#[from] CampaignError),

    /// Qloo request failed.
    #[error(transparent)]
    Qloo(#[from] QlooError),

    /// Generative model request failed.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Reading or writing an artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON conversion failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No agent with this ID is registered.
    #[error("Unknown agent: {id}")]
    UnknownAgent {
        /// Requested ID.
        id: String,
    },

    /// The agent does not have this tool.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// Requested tool.
        name: String,
    },

    /// A previous step has not been run.
    #[error("{message}")]
    MissingState {
        /// What is missing and how to produce it.
        message: String,
    },

    /// A tool parameter is unusable.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what went wrong.
        message: String,
    },

    /// An external service has no credentials.
    #[error("{service} is not configured: {message}")]
    NotConfigured {
        /// Service name.
        service: &'static str,
        /// Why it is unavailable.
        message: String,
    },
}

impl From<AgentError> for AiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Ai(inner) => inner,
            other => Self::ToolExecution {
                message: other.to_string(),
            },
        }
    }
}

/// External services and storage shared by every session.
pub struct Services {
    /// Qloo client.
    pub qloo: Option<QlooClient>,
    /// Text model for single-shot generation.
    pub llm: Option<Box<dyn LlmProvider>>,
    /// Image model.
    pub images: Option<Box<dyn ImageGenerator>>,
    /// Where generated files are written.
    pub artifacts: ArtifactStore,
    /// CSV used when `load_campaign_data` is called without a path.
    pub default_data_path: Option<PathBuf>,
    /// Configuration errors for services that could not be created.
    unavailable: Vec<(&'static str, String)>,
}

impl Services {
    /// Creates services with no external clients.
    #[must_use]
    pub const fn new(artifacts: ArtifactStore) -> Self {
        Self {
            qloo: None,
            llm: None,
            images: None,
            artifacts,
            default_data_path: None,
            unavailable: Vec::new(),
        }
    }

    /// Creates every service from environment variables.
    ///
    /// Services whose credentials are missing are left unset and reported
    /// when a tool needs them.
    #[must_use]
    pub fn from_env() -> Self {
        let mut services = Self::new(ArtifactStore::from_env());

        match QlooClient::from_env() {
            Ok(client) => services.qloo = Some(client),
            Err(e) => services.mark_unavailable("Qloo", e.to_string()),
        }
        match create_provider_from_env(DEFAULT_MODEL) {
            Ok(provider) => services.llm = Some(provider),
            Err(e) => services.mark_unavailable("Text generation", e.to_string()),
        }
        match create_image_generator_from_env() {
            Ok(generator) => services.images = Some(generator),
            Err(e) => services.mark_unavailable("Image generation", e.to_string()),
        }

        services.default_data_path = std::env::var("CAMPAIGN_DATA_PATH").ok().map(PathBuf::from);

        if let Ok(project) = std::env::var("GOOGLE_CLOUD_PROJECT") {
            let location =
                std::env::var("GOOGLE_CLOUD_LOCATION").unwrap_or_else(|_| "us-central1".to_string());
            log::info!("Google Cloud project {project} ({location})");
        }
        if std::env::var("DATABASE_URL").is_ok() {
            log::info!("DATABASE_URL is set; sessions are kept in memory");
        }

        services
    }

    fn mark_unavailable(&mut self, service: &'static str, message: String) {
        log::warn!("{service} unavailable: {message}");
        self.unavailable.push((service, message));
    }

    fn not_configured(&self, service: &'static str) -> AgentError {
        let message = self
            .unavailable
            .iter()
            .find(|(s, _)| *s == service)
            .map_or_else(|| "no client configured".to_string(), |(_, m)| m.clone());
        AgentError::NotConfigured { service, message }
    }

    /// Returns the Qloo client.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotConfigured`] if `QLOO_API_KEY` was unset.
    pub fn qloo(&self) -> Result<&QlooClient, AgentError> {
        self.qloo.as_ref().ok_or_else(|| self.not_configured("Qloo"))
    }

    /// Returns the text model.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotConfigured`] if no provider could be created.
    pub fn llm(&self) -> Result<&dyn LlmProvider, AgentError> {
        self.llm
            .as_deref()
            .ok_or_else(|| self.not_configured("Text generation"))
    }

    /// Returns the image model.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotConfigured`] if no generator could be created.
    pub fn images(&self) -> Result<&dyn ImageGenerator, AgentError> {
        self.images
            .as_deref()
            .ok_or_else(|| self.not_configured("Image generation"))
    }
}

/// Asks `agent` a question within `session`, streaming events through
/// `tx`. The conversation history is kept on the session.
///
/// # Errors
///
/// Returns [`AgentError`] if the chat provider cannot be created or the
/// agent loop fails.
pub async fn ask_agent(
    services: &Services,
    agent: &AgentDefinition,
    session: &mut CampaignSession,
    question: &str,
    tx: &mpsc::Sender<AgentEvent>,
) -> Result<(), AgentError> {
    let provider = create_provider_from_env(&agent.model)?;
    ask_agent_with(services, provider.as_ref(), agent, session, question, tx).await
}

/// Same as [`ask_agent`] with an explicit chat provider.
///
/// # Errors
///
/// Returns [`AgentError`] if the agent loop fails.
pub async fn ask_agent_with(
    services: &Services,
    provider: &dyn LlmProvider,
    agent: &AgentDefinition,
    session: &mut CampaignSession,
    question: &str,
    tx: &mpsc::Sender<AgentEvent>,
) -> Result<(), AgentError> {
    log::info!("[{}] {question}", agent.id);

    let tools = tool_definitions_for(&agent.tools);
    let history = std::mem::take(&mut session.messages);

    let outcome = {
        let mut executor = CampaignTools::new(services, session, &agent.tools);
        run_agent(
            provider,
            &agent.instruction,
            &tools,
            &mut executor,
            history,
            question,
            tx,
        )
        .await
    };

    session.messages = outcome.messages;
    session.trim_messages();
    Ok(outcome.result?)
}

#[cfg(test)]
mod tests {
    use resonance_ai::providers::{
        ContentBlock, GenerationOptions, LlmResponse, Message, StopReason,
    };

    use super::*;
    use crate::session::MAX_CONVERSATION_TURNS;

    struct AnsweringLlm;

    #[async_trait::async_trait]
    impl LlmProvider for AnsweringLlm {
        fn model(&self) -> &str {
            "answering"
        }

        async fn chat(
            &self,
            _: &str,
            _: &[Message],
            _: &[serde_json::Value],
        ) -> Result<LlmResponse, AiError> {
            Ok(LlmResponse {
                content: vec![ContentBlock::Text {
                    text: "Noted.".to_string(),
                }],
                stop_reason: StopReason::EndTurn,
            })
        }

        async fn generate(&self, _: &str, _: &GenerationOptions) -> Result<String, AiError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn long_conversations_are_trimmed_after_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let services = Services::new(ArtifactStore::new(dir.path()));
        let agent = registry::find_agent("political").unwrap();
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());
        let (tx, mut rx) = mpsc::channel(8);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        for i in 0..MAX_CONVERSATION_TURNS + 3 {
            ask_agent_with(
                &services,
                &AnsweringLlm,
                &agent,
                &mut session,
                &format!("question {i}"),
                &tx,
            )
            .await
            .unwrap();
        }
        drop(tx);
        drain.await.unwrap();

        assert_eq!(session.messages.len(), MAX_CONVERSATION_TURNS * 2);
        assert!(matches!(
            &session.messages[0].content,
            resonance_ai::providers::MessageContent::Text(t) if t == "question 3"
        ));
    }

    #[test]
    fn tool_failures_reach_the_model_as_tool_errors() {
        let err: AiError = AgentError::MissingState {
            message: "No analysis loaded".to_string(),
        }
        .into();
        assert!(matches!(err, AiError::ToolExecution { ref message } if message == "No analysis loaded"));
    }

    #[test]
    fn missing_clients_report_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let services = Services::new(ArtifactStore::new(dir.path()));
        assert!(matches!(
            services.qloo(),
            Err(AgentError::NotConfigured { service: "Qloo", .. })
        ));
        assert!(services.llm().is_err());
        assert!(services.images().is_err());
    }
}
