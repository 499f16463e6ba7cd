//! Merchandise concept and mock-up tools.

use std::fmt::Write as _;

use resonance_agents_models::{
    DEFAULT_MERCHANDISE_CONCEPTS, MerchandiseConcept, MerchandiseConceptsParams,
    MerchandiseImageParams,
};
use resonance_ai::AiError;
use resonance_ai::json::generate_json;
use resonance_ai::providers::GenerationOptions;
use resonance_campaign::report::slug;
use resonance_qloo_models::InsightCategory;
use serde_json::json;

use super::render_image;
use crate::session::CampaignSession;
use crate::{AgentError, Services};

/// Upper bound on concepts per request.
pub const MAX_MERCHANDISE_CONCEPTS: u32 = 10;

const DEFAULT_PRODUCT_TYPES: &[&str] = &["t-shirt", "tote bag", "cap", "button", "sticker"];

const MERCHANDISE_ASPECT_RATIO: &str = "1:1";

const CONCEPT_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: 0.8,
    max_output_tokens: 4000,
    json: true,
};

fn concepts_prompt(session: &CampaignSession, product_types: &[String], count: u32) -> String {
    let candidate = session
        .analysis
        .as_ref()
        .and_then(|a| a.metadata.candidate_name.clone())
        .or_else(|| session.campaign_inputs.as_ref().map(|i| i.candidate_name.clone()))
        .unwrap_or_else(|| "the candidate".to_string());

    let mut prompt = String::new();
    writeln!(
        prompt,
        "Design {count} campaign merchandise concepts for {candidate}."
    )
    .unwrap();
    if let Some(group) = &session.identified_locations {
        writeln!(prompt, "Audience: the '{}' locations.", group.tag).unwrap();
    }
    if let Some(insights) = &session.insights {
        writeln!(prompt, "What this audience likes:").unwrap();
        for category in InsightCategory::all() {
            let names = insights.names(*category);
            if !names.is_empty() {
                writeln!(prompt, "- {}: {}", category.title(), names.join(", ")).unwrap();
            }
        }
    }
    if let Some(inputs) = &session.campaign_inputs {
        writeln!(prompt, "Campaign tone: {}", inputs.emotional_tone).unwrap();
        if let Some(key_message) = &inputs.key_message {
            writeln!(prompt, "Key message: {key_message}").unwrap();
        }
    }
    writeln!(prompt, "Product types to consider: {}", product_types.join(", ")).unwrap();
    writeln!(prompt).unwrap();
    writeln!(
        prompt,
        "Draw on the audience's culture without copying trademarks or stereotyping."
    )
    .unwrap();
    writeln!(
        prompt,
        "Respond with a JSON object {{\"concepts\": [...]}} where each concept has the keys \
         name, product_type, description, design_elements (array of strings), \
         cultural_connections (array of strings) and target_audience."
    )
    .unwrap();
    prompt
}

/// Generates merchandise ideas for the identified audience.
///
/// # Errors
///
/// Returns [`AgentError`] if there are no cultural insights, the model is
/// not configured, or the reply has no valid `concepts` array.
pub async fn generate_merchandise_concepts(
    services: &Services,
    session: &mut CampaignSession,
    params: MerchandiseConceptsParams,
) -> Result<serde_json::Value, AgentError> {
    if session.insights.is_none() {
        return Err(AgentError::MissingState {
            message: "No cultural insights yet. Run generate_content_insights first.".to_string(),
        });
    }

    let count = params
        .count
        .unwrap_or(DEFAULT_MERCHANDISE_CONCEPTS)
        .clamp(1, MAX_MERCHANDISE_CONCEPTS);
    let product_types = if params.product_types.is_empty() {
        DEFAULT_PRODUCT_TYPES.iter().map(ToString::to_string).collect()
    } else {
        params.product_types
    };

    let prompt = concepts_prompt(session, &product_types, count);
    let mut value = generate_json(services.llm()?, &prompt, &CONCEPT_OPTIONS).await?;

    let concepts = value
        .get_mut("concepts")
        .map(serde_json::Value::take)
        .ok_or_else(|| AiError::Provider {
            message: "model reply has no concepts array".to_string(),
        })?;
    let mut concepts: Vec<MerchandiseConcept> = serde_json::from_value(concepts)?;
    concepts.truncate(count as usize);

    log::info!("Generated {} merchandise concept(s)", concepts.len());

    let result = json!({
        "status": "success",
        "concepts": concepts
            .iter()
            .enumerate()
            .map(|(i, c)| json!({ "conceptNumber": i + 1, "concept": c }))
            .collect::<Vec<_>>(),
    });
    session.merchandise_concepts = concepts;
    Ok(result)
}

fn mockup_prompt(concept: &MerchandiseConcept) -> String {
    let mut prompt = format!(
        "Product photo mock-up of a {}: {}.\n{}",
        concept.product_type, concept.name, concept.description
    );
    if !concept.design_elements.is_empty() {
        write!(
            prompt,
            "\nDesign elements: {}",
            concept.design_elements.join(", ")
        )
        .unwrap();
    }
    prompt.push_str(
        "\nClean studio background, the product is the only subject, no people, \
         no real brand logos.",
    );
    prompt
}

/// Generates a mock-up image for one of the merchandise concepts.
///
/// # Errors
///
/// Returns [`AgentError`] if `concept_number` is out of range or image
/// generation fails.
pub async fn generate_merchandise_image(
    services: &Services,
    session: &mut CampaignSession,
    params: MerchandiseImageParams,
) -> Result<serde_json::Value, AgentError> {
    let total = session.merchandise_concepts.len();
    if total == 0 {
        return Err(AgentError::MissingState {
            message: "No merchandise concepts yet. Run generate_merchandise_concepts first."
                .to_string(),
        });
    }
    let concept = params
        .concept_number
        .checked_sub(1)
        .and_then(|i| session.merchandise_concepts.get(i))
        .ok_or_else(|| AgentError::InvalidInput {
            message: format!(
                "conceptNumber must be between 1 and {total}, got {}",
                params.concept_number
            ),
        })?;

    let prompt = mockup_prompt(concept);
    let stem = format!("merchandise_{}", slug(&concept.name));
    let concept_name = concept.name.clone();

    let (artifact, image) =
        render_image(services, &stem, &prompt, MERCHANDISE_ASPECT_RATIO).await?;

    let result = json!({
        "status": "success",
        "concept": concept_name,
        "artifact": artifact,
        "url": format!("/artifacts/{}", artifact.filename),
    });
    session.merchandise_images.push(image);
    Ok(result)
}
