#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tool parameter types and tool definitions for the campaign agents.
//!
//! Defines the input types for each tool an agent can invoke, the JSON
//! Schema descriptions handed to the model, and the values a campaign
//! session accumulates between tool calls.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use resonance_campaign_models::{
    AnalysisMetadata, BasePopularityStatus, FilterCriteria, LocationGroup, LocationHistoryEntry,
    PopularityStatus, Strategy,
};
use resonance_qloo_models::{InsightCategory, InsightItem};
use serde::{Deserialize, Serialize};

/// An agent declared in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    /// Unique identifier used in URLs (`political`, `content`, ...).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Model the agent runs on.
    pub model: String,
    /// One-line description.
    pub description: String,
    /// System prompt.
    pub instruction: String,
    /// Names of the tools the agent may call.
    pub tools: Vec<String>,
}

// ── Tool parameters ─────────────────────────────────────────────────

/// Parameters for loading a campaign CSV into the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCampaignDataParams {
    /// CSV path. Falls back to the server's preloaded file.
    pub path: Option<String>,
    /// Candidate name.
    pub candidate_name: Option<String>,
    /// Opponent name.
    pub opponent_name: Option<String>,
    /// Political base.
    pub candidate_base: Option<String>,
    /// Location label.
    pub location: Option<String>,
}

/// Parameters for running a candidate analysis against Qloo heatmaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAnalysisParams {
    /// Candidate name, resolved to a Qloo entity.
    pub candidate_name: String,
    /// Opponent name, resolved to a Qloo entity.
    pub opponent_name: String,
    /// Location query, e.g. `"New York, NY"`.
    pub location: String,
    /// Political base (`progressive`, `conservative`, `center`).
    pub candidate_base: Option<String>,
    /// Age bracket.
    pub age: Option<String>,
    /// `male` or `female`.
    pub gender: Option<String>,
    /// Issue tags to analyse.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parameters for the criteria location filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterLocationsParams {
    /// Short label for the resulting location group.
    pub tag: String,
    /// Column name to accepted value(s) or numeric threshold.
    #[serde(default)]
    pub criteria: FilterCriteria,
}

/// Parameters for the exact-match strategic filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStrategicParams {
    /// Strategy label.
    pub strategy: Strategy,
    /// Popularity status label.
    pub popularity_status: PopularityStatus,
    /// Base popularity status label.
    pub base_popularity_status: BasePopularityStatus,
    /// Label for the resulting location group.
    pub tag: Option<String>,
}

/// Parameters for cultural insight generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInsightsParams {
    /// Categories to query. Defaults to all.
    #[serde(default)]
    pub categories: Vec<InsightCategory>,
    /// Age bracket. Defaults to the analysis age.
    pub age: Option<String>,
    /// `male` or `female`. Defaults to the analysis gender.
    pub gender: Option<String>,
}

/// Parameters for collecting campaign creative inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInputsParams {
    /// What the campaign should achieve.
    pub campaign_goal: Option<String>,
    /// Action the audience is asked to take.
    pub call_to_action: Option<String>,
    /// Emotional tone of the copy.
    pub emotional_tone: Option<String>,
    /// Delivery platform (`social media`, `email`, ...).
    pub platform_type: Option<String>,
    /// Optional key message.
    pub key_message: Option<String>,
    /// Candidate name, if no analysis is loaded.
    pub candidate_name: Option<String>,
    /// Political base, if no analysis is loaded.
    pub candidate_base: Option<String>,
}

/// Parameters for campaign image generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignImageParams {
    /// Overrides the image concept from the generated content.
    pub image_concept: Option<String>,
}

/// Parameters for merchandise concept generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchandiseConceptsParams {
    /// Product kinds to consider (t-shirt, tote bag, ...).
    #[serde(default)]
    pub product_types: Vec<String>,
    /// Number of concepts. Defaults to [`DEFAULT_MERCHANDISE_CONCEPTS`].
    pub count: Option<u32>,
}

/// Parameters for a merchandise mock-up image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchandiseImageParams {
    /// 1-based index into the generated concepts.
    pub concept_number: usize,
}

/// Default number of merchandise concepts.
pub const DEFAULT_MERCHANDISE_CONCEPTS: u32 = 3;

// ── Session values ──────────────────────────────────────────────────

/// Creative brief collected from the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInputs {
    /// What the campaign should achieve.
    pub campaign_goal: String,
    /// Action the audience is asked to take.
    pub call_to_action: String,
    /// Emotional tone.
    pub emotional_tone: String,
    /// Delivery platform.
    pub platform_type: String,
    /// Optional key message.
    pub key_message: Option<String>,
    /// Candidate name.
    pub candidate_name: String,
    /// Political base.
    pub candidate_base: String,
}

/// Copy generated for a campaign, as returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignContent {
    /// Headline-length copy.
    pub short_copy: String,
    /// Post-length copy.
    pub medium_copy: String,
    /// Long-form copy.
    pub long_copy: String,
    /// Description of the accompanying image.
    pub image_concept: String,
    /// Cultural references used and why.
    #[serde(default)]
    pub cultural_connections: Vec<String>,
    /// Notes on adapting the copy to the platform.
    #[serde(default)]
    pub platform_optimization: String,
    /// Paid-for-by disclaimer.
    #[serde(default)]
    pub legal_disclaimer: String,
}

/// A merchandise idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchandiseConcept {
    /// Concept name.
    pub name: String,
    /// Product kind.
    pub product_type: String,
    /// What the product looks like.
    pub description: String,
    /// Visual design elements.
    #[serde(default)]
    pub design_elements: Vec<String>,
    /// Cultural references the design draws on.
    #[serde(default)]
    pub cultural_connections: Vec<String>,
    /// Who the product is for.
    #[serde(default)]
    pub target_audience: String,
}

/// A generated image saved as an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageRef {
    /// Artifact file name.
    pub filename: String,
    /// Prompt sent to the image model.
    pub prompt: String,
    /// Aspect ratio used.
    pub aspect_ratio: String,
    /// When the image was generated.
    pub created_at: DateTime<Utc>,
}

/// Cultural insights gathered for a location group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalInsights {
    /// Tag of the location group the insights describe.
    pub location_tag: String,
    /// WKT polygon sent as the location signal.
    pub location_wkt: String,
    /// Results per category.
    pub categories: BTreeMap<InsightCategory, Vec<InsightItem>>,
    /// Artifact holding the Markdown report.
    pub report_artifact: Option<String>,
    /// When the insights were gathered.
    pub created_at: DateTime<Utc>,
}

impl CulturalInsights {
    /// Names of the results in `category`.
    #[must_use]
    pub fn names(&self, category: InsightCategory) -> Vec<&str> {
        self.categories
            .get(&category)
            .map(|items| items.iter().map(|i| i.name.as_str()).collect())
            .unwrap_or_default()
    }
}

/// A file in the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    /// Versioned file name on disk.
    pub filename: String,
    /// Name the artifact was saved under.
    pub name: String,
    /// Version number, starting at 1.
    pub version: u32,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Summary of a campaign session's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session ID.
    pub session_id: String,
    /// Metadata of the loaded analysis.
    pub analysis: Option<AnalysisMetadata>,
    /// Number of records in the loaded analysis.
    pub record_count: usize,
    /// Current location group.
    pub identified_locations: Option<LocationGroup>,
    /// Recent location groups, oldest first.
    pub location_history: Vec<LocationHistoryEntry>,
    /// Number of insights gathered per category.
    pub insight_counts: BTreeMap<InsightCategory, usize>,
    /// Collected creative brief.
    pub campaign_inputs: Option<CampaignInputs>,
    /// Whether campaign copy has been generated.
    pub has_campaign_content: bool,
    /// Generated campaign image.
    pub campaign_image: Option<GeneratedImageRef>,
    /// Number of merchandise concepts.
    pub merchandise_concepts: usize,
    /// Number of messages in the conversation.
    pub message_count: usize,
}

// ── Tool definitions ────────────────────────────────────────────────

/// Returns the tool definitions in a provider-neutral JSON format.
///
/// Each tool has a name, description, and JSON Schema for its parameters.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn tool_definitions() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "name": "load_campaign_data",
            "description": "Load a campaign location CSV into the session as the current analysis. Every row is validated; data quality problems are reported instead of being dropped.",
            "parameters": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to the CSV file. Omit to use the server's preloaded campaign data." },
                    "candidateName": { "type": "string", "description": "Candidate the data describes" },
                    "opponentName": { "type": "string", "description": "Opponent the data compares against" },
                    "candidateBase": { "type": "string", "description": "Political base: progressive, conservative or center" },
                    "location": { "type": "string", "description": "Location the data covers" }
                },
                "required": []
            }
        }),
        serde_json::json!({
            "name": "create_candidate_analysis",
            "description": "Build a fresh campaign analysis from Qloo heatmaps: candidate vs opponent popularity, popularity relative to the political base, and per-issue sentiment. Replaces the current analysis.",
            "parameters": {
                "type": "object",
                "properties": {
                    "candidateName": { "type": "string", "description": "Candidate name" },
                    "opponentName": { "type": "string", "description": "Opponent name" },
                    "location": { "type": "string", "description": "Location query, e.g. 'New York, NY'" },
                    "candidateBase": { "type": "string", "description": "Political base: progressive, conservative or center (default progressive)" },
                    "age": { "type": "string", "enum": ["24_and_younger", "25_to_29", "30_to_34", "35_and_younger", "36_to_55", "35_to_44", "45_to_54", "55_and_older"], "description": "Age bracket" },
                    "gender": { "type": "string", "enum": ["male", "female"], "description": "Gender" },
                    "tags": { "type": "array", "items": { "type": "string" }, "description": "Issue tags to analyse, e.g. ['gun violence', 'politics']" }
                },
                "required": ["candidateName", "opponentName", "location"]
            }
        }),
        serde_json::json!({
            "name": "check_analysis_data_structure",
            "description": "Describe the loaded analysis: row and column counts, column names, value counts of the strategy, status and issue columns, and sample rows. Use this before filtering to see which values exist.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "filter_campaign_locations",
            "description": "Filter the loaded analysis by column criteria and save the matching coordinates as the identified locations. Categorical columns accept one value or a list; min_affinity and min_popularity are numeric thresholds. Issue columns (issue_<name>_popularity_status) and tag columns (tag_<name>) may also be used.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tag": { "type": "string", "description": "Short label for the location group, e.g. 'Swing Voters'" },
                    "criteria": {
                        "type": "object",
                        "description": "Column name to accepted value(s)",
                        "properties": {
                            "strategy": { "type": "array", "items": { "type": "string" }, "description": "Rally the Base, Hidden Goldmine, Bring Them Over, Deep Conversion" },
                            "popularity_status": { "type": "array", "items": { "type": "string" }, "description": "Trailing Opponent, Leading Opponent, Similar Popularity" },
                            "base_popularity_status": { "type": "array", "items": { "type": "string" }, "description": "Less Popular than Party, More Popular than Party, Similar Popularity to Party" },
                            "segment": { "type": "array", "items": { "type": "string" }, "description": "HA-HP, HA-LP, LA-HP, LA-LP" },
                            "min_affinity": { "type": "number", "description": "Minimum affinity (0-1)" },
                            "min_popularity": { "type": "number", "description": "Minimum popularity (0-1)" }
                        }
                    }
                },
                "required": ["tag", "criteria"]
            }
        }),
        serde_json::json!({
            "name": "filter_strategic_locations",
            "description": "Select the locations whose strategy, popularity status and base popularity status equal all three given values, and save them as the identified locations.",
            "parameters": {
                "type": "object",
                "properties": {
                    "strategy": { "type": "string", "enum": ["Rally the Base", "Hidden Goldmine", "Bring Them Over", "Deep Conversion"] },
                    "popularityStatus": { "type": "string", "enum": ["Trailing Opponent", "Leading Opponent", "Similar Popularity"] },
                    "basePopularityStatus": { "type": "string", "enum": ["Less Popular than Party", "More Popular than Party", "Similar Popularity to Party"] },
                    "tag": { "type": "string", "description": "Label for the location group" }
                },
                "required": ["strategy", "popularityStatus", "basePopularityStatus"]
            }
        }),
        serde_json::json!({
            "name": "get_identified_locations",
            "description": "Return the current identified location group: tag, description, filters applied and sample coordinates.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "list_location_history",
            "description": "List the most recent location groups created in this session (up to 10).",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "identify_rally_segments",
            "description": "Break down the Rally the Base locations into swing voters, base introduction targets and per-issue weaknesses, with urgency levels and recommendations.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "identify_hidden_goldmine_segments",
            "description": "Summarize the Hidden Goldmine locations: how many trail the party base, high-priority counts and top and bottom locations by affinity.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "generate_campaign_report",
            "description": "Write a Markdown campaign strategy report for the loaded analysis and save it as an artifact.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "generate_content_insights",
            "description": "Query Qloo for the brands, movies, TV shows, artists, interest tags and places with the highest affinity in the area covered by the identified locations. Saves a Markdown insights report.",
            "parameters": {
                "type": "object",
                "properties": {
                    "categories": { "type": "array", "items": { "type": "string", "enum": ["brands", "movies", "tv_shows", "artists", "tags", "places"] }, "description": "Categories to query (default all)" },
                    "age": { "type": "string", "description": "Age bracket, e.g. 25_to_29 (default: the analysis age)" },
                    "gender": { "type": "string", "enum": ["male", "female"], "description": "Gender (default: the analysis gender)" }
                },
                "required": []
            }
        }),
        serde_json::json!({
            "name": "collect_campaign_inputs",
            "description": "Validate and save the creative brief: campaign goal, call to action, emotional tone and platform are required; key message is optional.",
            "parameters": {
                "type": "object",
                "properties": {
                    "campaignGoal": { "type": "string", "description": "What the campaign should achieve" },
                    "callToAction": { "type": "string", "description": "Action the audience is asked to take" },
                    "emotionalTone": { "type": "string", "description": "Tone, e.g. hopeful, urgent" },
                    "platformType": { "type": "string", "description": "social media, instagram, facebook, twitter, direct mail, email or sms" },
                    "keyMessage": { "type": "string", "description": "Optional key message" },
                    "candidateName": { "type": "string", "description": "Candidate name when no analysis is loaded" },
                    "candidateBase": { "type": "string", "description": "Political base when no analysis is loaded" }
                },
                "required": ["campaignGoal", "callToAction", "emotionalTone", "platformType"]
            }
        }),
        serde_json::json!({
            "name": "generate_campaign_content",
            "description": "Generate short, medium and long campaign copy, an image concept, cultural connections, platform notes and a legal disclaimer from the creative brief and cultural insights.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "generate_campaign_image",
            "description": "Generate a campaign image for the platform's aspect ratio from the image concept and save it as an artifact.",
            "parameters": {
                "type": "object",
                "properties": {
                    "imageConcept": { "type": "string", "description": "Override the generated image concept" }
                },
                "required": []
            }
        }),
        serde_json::json!({
            "name": "create_campaign_package",
            "description": "Assemble the copy, image and cultural connections into a single HTML campaign package artifact.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "debug_campaign_state",
            "description": "Show what the session currently holds and which artifacts exist. Use this when a step reports missing inputs.",
            "parameters": { "type": "object", "properties": {}, "required": [] }
        }),
        serde_json::json!({
            "name": "generate_merchandise_concepts",
            "description": "Generate campaign merchandise concepts grounded in the cultural insights of the identified locations.",
            "parameters": {
                "type": "object",
                "properties": {
                    "productTypes": { "type": "array", "items": { "type": "string" }, "description": "Product kinds to consider, e.g. t-shirt, tote bag, sticker" },
                    "count": { "type": "integer", "description": "Number of concepts (default 3)" }
                },
                "required": []
            }
        }),
        serde_json::json!({
            "name": "generate_merchandise_image",
            "description": "Generate a product mock-up image for one merchandise concept and save it as an artifact.",
            "parameters": {
                "type": "object",
                "properties": {
                    "conceptNumber": { "type": "integer", "description": "1-based number of the concept" }
                },
                "required": ["conceptNumber"]
            }
        }),
    ]
}

/// Returns the definitions of the named tools, in the order given.
/// Unknown names are skipped.
#[must_use]
pub fn tool_definitions_for(names: &[String]) -> Vec<serde_json::Value> {
    let all = tool_definitions();
    names
        .iter()
        .filter_map(|name| all.iter().find(|t| t["name"] == name.as_str()).cloned())
        .collect()
}
