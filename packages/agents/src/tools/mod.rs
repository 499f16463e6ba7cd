//! Tool execution for the campaign agents.
//!
//! [`CampaignTools`] binds the shared [`Services`] to one session and
//! dispatches tool calls by name. Each tool returns a JSON value that is
//! fed back to the model.

pub mod content;
pub mod merchandise;
pub mod political;

use chrono::Utc;
use resonance_agents_models::{ArtifactInfo, GeneratedImageRef};
use resonance_ai::AiError;
use resonance_ai::agent::ToolExecutor;
use resonance_ai::image::generate_with_retry;
use resonance_campaign_models::LocationGroup;
use serde::de::DeserializeOwned;

use crate::session::CampaignSession;
use crate::{AgentError, Services};

/// Coordinates included in tool results as a preview.
pub const SAMPLE_COORDINATES: usize = 3;

/// Tool executor bound to one session.
pub struct CampaignTools<'a> {
    services: &'a Services,
    session: &'a mut CampaignSession,
    allowed: &'a [String],
}

impl<'a> CampaignTools<'a> {
    /// Creates an executor that only runs the tools in `allowed`.
    pub fn new(
        services: &'a Services,
        session: &'a mut CampaignSession,
        allowed: &'a [String],
    ) -> Self {
        Self {
            services,
            session,
            allowed,
        }
    }

    /// Executes a single tool by name with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the tool is unknown, not allowed for this
    /// agent, or fails.
    pub async fn call(
        &mut self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, AgentError> {
        if !self.allowed.iter().any(|t| t == name) {
            return Err(AgentError::UnknownTool {
                name: name.to_string(),
            });
        }

        let services = self.services;
        let session = &mut *self.session;

        match name {
            "load_campaign_data" => political::load_campaign_data(services, session, params(input)?),
            "create_candidate_analysis" => {
                political::create_candidate_analysis(services, session, params(input)?).await
            }
            "check_analysis_data_structure" => political::check_analysis_data_structure(session),
            "filter_campaign_locations" => {
                political::filter_campaign_locations(session, params(input)?)
            }
            "filter_strategic_locations" => {
                political::filter_strategic_locations(session, params(input)?)
            }
            "get_identified_locations" => Ok(political::get_identified_locations(session)),
            "list_location_history" => Ok(political::list_location_history(session)),
            "identify_rally_segments" => political::identify_rally_segments(session),
            "identify_hidden_goldmine_segments" => {
                political::identify_hidden_goldmine_segments(session)
            }
            "generate_campaign_report" => political::generate_campaign_report(services, session),
            "generate_content_insights" => {
                content::generate_content_insights(services, session, params(input)?).await
            }
            "collect_campaign_inputs" => {
                content::collect_campaign_inputs(services, session, params(input)?)
            }
            "generate_campaign_content" => {
                content::generate_campaign_content(services, session).await
            }
            "generate_campaign_image" => {
                content::generate_campaign_image(services, session, params(input)?).await
            }
            "create_campaign_package" => content::create_campaign_package(services, session),
            "debug_campaign_state" => content::debug_campaign_state(services, session),
            "generate_merchandise_concepts" => {
                merchandise::generate_merchandise_concepts(services, session, params(input)?)
                    .await
            }
            "generate_merchandise_image" => {
                merchandise::generate_merchandise_image(services, session, params(input)?).await
            }
            other => Err(AgentError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl ToolExecutor for CampaignTools<'_> {
    async fn execute(
        &mut self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, AiError> {
        Ok(self.call(name, input).await?)
    }

    fn summarize(&self, name: &str, result: &serde_json::Value) -> String {
        summarize_tool_result(name, result)
    }
}

/// Parses tool parameters. A missing or `null` input is treated as `{}`.
fn params<T: DeserializeOwned>(input: &serde_json::Value) -> Result<T, AgentError> {
    let input = if input.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        input.clone()
    };
    serde_json::from_value(input).map_err(|e| AgentError::InvalidInput {
        message: e.to_string(),
    })
}

/// First [`SAMPLE_COORDINATES`] coordinates of a group.
fn sample_coordinates(group: &LocationGroup) -> Vec<[f64; 2]> {
    group
        .coordinates
        .iter()
        .take(SAMPLE_COORDINATES)
        .copied()
        .collect()
}

/// Trims and drops empty strings.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// First eight hex digits of a fresh UUID.
fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Lowercases and replaces spaces with `_`.
fn snake_name(value: &str) -> String {
    value.trim().to_lowercase().replace(' ', "_")
}

/// Generates an image and saves it as `{stem}_{short_id}.{ext}`.
async fn render_image(
    services: &Services,
    stem: &str,
    prompt: &str,
    aspect_ratio: &str,
) -> Result<(ArtifactInfo, GeneratedImageRef), AgentError> {
    let image = generate_with_retry(services.images()?, prompt, aspect_ratio).await?;
    let extension = match image.mime_type.as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    };
    let artifact = services
        .artifacts
        .save(&format!("{stem}_{}.{extension}", short_id()), &image.bytes)?;
    let reference = GeneratedImageRef {
        filename: artifact.filename.clone(),
        prompt: prompt.to_string(),
        aspect_ratio: aspect_ratio.to_string(),
        created_at: Utc::now(),
    };
    Ok((artifact, reference))
}

/// Creates a brief human-readable summary of a tool result.
fn summarize_tool_result(tool_name: &str, result: &serde_json::Value) -> String {
    if result["status"] == "warning" {
        return result["message"]
            .as_str()
            .unwrap_or("No results")
            .to_string();
    }
    match tool_name {
        "load_campaign_data" | "create_candidate_analysis" => {
            let total = result["totalLocations"].as_u64().unwrap_or(0);
            format!("{total} locations analysed")
        }
        "check_analysis_data_structure" => {
            let rows = result["totalRows"].as_u64().unwrap_or(0);
            let cols = result["totalColumns"].as_u64().unwrap_or(0);
            format!("{rows} rows, {cols} columns")
        }
        "filter_campaign_locations" | "filter_strategic_locations" | "get_identified_locations" => {
            let total = result["totalLocations"].as_u64().unwrap_or(0);
            let tag = result["tag"].as_str().unwrap_or("locations");
            format!("{total} locations in '{tag}'")
        }
        "list_location_history" => {
            let count = result["history"].as_array().map_or(0, Vec::len);
            format!("{count} location groups")
        }
        "identify_rally_segments" => {
            let total = result["totalTargetableLocations"].as_u64().unwrap_or(0);
            format!("{total} targetable rally locations")
        }
        "identify_hidden_goldmine_segments" => {
            let gap = result["lessPopularThanParty"].as_u64().unwrap_or(0);
            let total = result["totalGoldmineLocations"].as_u64().unwrap_or(0);
            format!("{gap} locations less popular than party, {total} hidden goldmine")
        }
        "generate_content_insights" => {
            let total = result["totalInsights"].as_u64().unwrap_or(0);
            format!("{total} cultural insights")
        }
        "generate_merchandise_concepts" => {
            let count = result["concepts"].as_array().map_or(0, Vec::len);
            format!("{count} merchandise concepts")
        }
        _ => result["artifact"]["filename"].as_str().map_or_else(
            || "Result received".to_string(),
            |filename| format!("Saved {filename}"),
        ),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use resonance_agents_models::CampaignContent;
    use resonance_ai::image::{GeneratedImage, ImageGenerator};
    use resonance_ai::providers::{GenerationOptions, LlmProvider, LlmResponse, Message};
    use resonance_campaign::ingest::load_records;
    use resonance_campaign_models::{AnalysisMetadata, CampaignAnalysis};
    use std::sync::{Arc, Mutex};

    use crate::AiError;
    use crate::artifacts::ArtifactStore;
    use crate::session::CampaignSession;
    use crate::Services;

    pub const CSV: &str = "\
latitude,longitude,affinity,popularity,strategy,segment,popularity_status,base_popularity_status,issue_economy_popularity_status,tag_economy
40.71,-74.00,0.82,0.75,Rally the Base,HA-HP,Trailing Opponent,Less Popular than Party,Candidate Less Popular with this Issue,0.41
40.72,-74.01,0.77,0.68,Rally the Base,HA-HP,Leading Opponent,More Popular than Party,Similar Popularity,0.55
40.73,-74.02,0.91,0.64,Rally the Base,HA-HP,Trailing Opponent,Less Popular than Party,Candidate More Popular with this Issue,0.62
40.74,-73.99,0.71,0.32,Hidden Goldmine,HA-LP,Similar Popularity,Less Popular than Party,Unknown,
40.75,-73.98,0.30,0.70,Bring Them Over,LA-HP,Leading Opponent,Similar Popularity to Party,Unknown,
40.76,-73.97,0.20,0.25,Deep Conversion,LA-LP,Trailing Opponent,Less Popular than Party,Unknown,
";

    pub fn analysis() -> CampaignAnalysis {
        CampaignAnalysis {
            metadata: AnalysisMetadata {
                candidate_name: Some("Jane Doe".to_string()),
                opponent_name: Some("John Roe".to_string()),
                candidate_base: Some("progressive".to_string()),
                location: Some("New York, NY".to_string()),
                source: "test".to_string(),
                ..AnalysisMetadata::default()
            },
            records: load_records(CSV.as_bytes()).unwrap(),
        }
    }

    pub fn session_with_analysis() -> CampaignSession {
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());
        session.set_analysis(analysis());
        session
    }

    pub fn content() -> CampaignContent {
        CampaignContent {
            short_copy: "Jane shows up.".to_string(),
            medium_copy: "From the bodega to the ballot box, Jane shows up.".to_string(),
            long_copy: "Jane has spent a decade showing up for this neighborhood.".to_string(),
            image_concept: "Neighbors at a summer block party".to_string(),
            cultural_connections: vec!["Block parties".to_string()],
            platform_optimization: "Square crop, caption under 125 characters".to_string(),
            legal_disclaimer: "Paid for by Jane Doe for Council".to_string(),
        }
    }

    /// Returns a fixed reply to every prompt and records the prompts.
    pub struct FixedLlm {
        pub reply: String,
        pub prompts: Arc<Mutex<Vec<String>>>,
    }

    impl FixedLlm {
        pub fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for FixedLlm {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn chat(
            &self,
            _: &str,
            _: &[Message],
            _: &[serde_json::Value],
        ) -> Result<LlmResponse, AiError> {
            Err(AiError::Provider {
                message: "chat not scripted".to_string(),
            })
        }

        async fn generate(&self, prompt: &str, _: &GenerationOptions) -> Result<String, AiError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    /// Returns a tiny PNG header.
    pub struct FixedImages;

    #[async_trait::async_trait]
    impl ImageGenerator for FixedImages {
        async fn generate_image(&self, _: &str, _: &str) -> Result<GeneratedImage, AiError> {
            Ok(GeneratedImage {
                bytes: vec![0x89, b'P', b'N', b'G'],
                mime_type: "image/png".to_string(),
            })
        }
    }

    pub fn services(dir: &std::path::Path) -> Services {
        Services::new(ArtifactStore::new(dir))
    }
}
