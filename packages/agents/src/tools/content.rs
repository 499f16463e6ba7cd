//! Cultural insight and campaign content tools.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::Utc;
use resonance_agents_models::{
    ArtifactInfo, CampaignContent, CampaignImageParams, CampaignInputs, CampaignInputsParams,
    ContentInsightsParams, CulturalInsights,
};
use resonance_ai::json::generate_json;
use resonance_ai::providers::GenerationOptions;
use resonance_campaign_models::LocationGroup;
use resonance_qloo::polygon::{MIN_POLYGON_POINTS, bounding_polygon_wkt};
use resonance_qloo_models::{InsightCategory, InsightItem, InsightSignals};
use serde_json::json;

use super::political::{DEFAULT_CANDIDATE_BASE, parse_age, parse_gender};
use super::{non_empty, render_image, snake_name};
use crate::session::CampaignSession;
use crate::{AgentError, Services};

/// Top results per category echoed back to the model.
const TOP_PICKS: usize = 3;

/// Artifact name prefix written by `create_candidate_analysis`.
const CANDIDATE_ANALYSIS_PREFIX: &str = "candidate_analysis_";

const CONTENT_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: 0.7,
    max_output_tokens: 4000,
    json: true,
};

fn identified_locations(session: &CampaignSession) -> Result<&LocationGroup, AgentError> {
    session
        .identified_locations
        .as_ref()
        .ok_or_else(|| AgentError::MissingState {
            message: "No locations identified yet. Filter campaign locations first.".to_string(),
        })
}

fn insights(session: &CampaignSession) -> Result<&CulturalInsights, AgentError> {
    session.insights.as_ref().ok_or_else(|| AgentError::MissingState {
        message: "No cultural insights yet. Run generate_content_insights first.".to_string(),
    })
}

/// Queries Qloo insights for the identified locations and writes a
/// content strategy report.
///
/// A category that fails is logged and left empty.
///
/// # Errors
///
/// Returns [`AgentError`] if no locations are identified, there are too
/// few to build a polygon, the demographics are invalid, or Qloo is not
/// configured.
pub async fn generate_content_insights(
    services: &Services,
    session: &mut CampaignSession,
    params: ContentInsightsParams,
) -> Result<serde_json::Value, AgentError> {
    let group = identified_locations(session)?;
    if group.coordinates.len() < MIN_POLYGON_POINTS {
        return Err(AgentError::InvalidInput {
            message: format!(
                "'{}' has {} location(s); at least {MIN_POLYGON_POINTS} are needed for insights",
                group.tag,
                group.coordinates.len()
            ),
        });
    }
    let location_wkt = bounding_polygon_wkt(&group.coordinates)?;

    let metadata = session.analysis.as_ref().map(|a| &a.metadata);
    let age = parse_age(
        params
            .age
            .as_deref()
            .or_else(|| metadata.and_then(|m| m.age.as_deref())),
    )?;
    let gender = parse_gender(
        params
            .gender
            .as_deref()
            .or_else(|| metadata.and_then(|m| m.gender.as_deref())),
    )?;

    let qloo = services.qloo()?;
    let signals = InsightSignals {
        location_wkt: location_wkt.clone(),
        age: age.map(|a| a.insights_age()),
        gender,
    };

    let categories = if params.categories.is_empty() {
        InsightCategory::all().to_vec()
    } else {
        params.categories
    };

    let mut results = BTreeMap::new();
    for category in categories {
        let items = match qloo
            .insights(category, &signals, category.default_limit())
            .await
        {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Insights for {category} failed: {e}");
                Vec::new()
            }
        };
        results.insert(category, items);
    }

    let report = insights_report(&group.tag, &group.description, &results);
    let artifact = services
        .artifacts
        .save(&insights_report_name(&group.tag), report.as_bytes())?;

    let insights = CulturalInsights {
        location_tag: group.tag.clone(),
        location_wkt,
        categories: results,
        report_artifact: Some(artifact.filename.clone()),
        created_at: Utc::now(),
    };
    let result = insights_result(&insights, &artifact);
    session.insights = Some(insights);
    Ok(result)
}

fn insights_result(insights: &CulturalInsights, artifact: &ArtifactInfo) -> serde_json::Value {
    let counts: BTreeMap<InsightCategory, usize> = insights
        .categories
        .iter()
        .map(|(category, items)| (*category, items.len()))
        .collect();
    let top_picks: BTreeMap<InsightCategory, Vec<&str>> = insights
        .categories
        .keys()
        .map(|category| {
            let mut names = insights.names(*category);
            names.truncate(TOP_PICKS);
            (*category, names)
        })
        .collect();

    json!({
        "status": "success",
        "locationTag": insights.location_tag,
        "totalInsights": counts.values().sum::<usize>(),
        "counts": counts,
        "topPicks": top_picks,
        "artifact": artifact,
        "url": format!("/artifacts/{}", artifact.filename),
    })
}

/// `content_strategy_<tag>.md`, with the tag lowercased, spaces as `_`
/// and dots removed.
fn insights_report_name(tag: &str) -> String {
    format!("content_strategy_{}.md", snake_name(tag).replace('.', ""))
}

/// Renders the content strategy report.
fn insights_report(
    tag: &str,
    description: &str,
    results: &BTreeMap<InsightCategory, Vec<InsightItem>>,
) -> String {
    let mut out = String::new();
    writeln!(out, "# Content Strategy: {tag}").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "{description}").unwrap();
    writeln!(out).unwrap();
    writeln!(
        out,
        "**Generated:** {}",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    )
    .unwrap();
    writeln!(out).unwrap();

    for category in InsightCategory::all() {
        let Some(items) = results.get(category) else {
            continue;
        };
        writeln!(out, "## {}", category.title()).unwrap();
        writeln!(out).unwrap();
        if items.is_empty() {
            writeln!(out, "No results.").unwrap();
        }
        for (i, item) in items.iter().enumerate() {
            match item.affinity {
                Some(affinity) => {
                    writeln!(out, "{}. {} (affinity {affinity:.2})", i + 1, item.name).unwrap();
                }
                None => {
                    writeln!(out, "{}. {}", i + 1, item.name).unwrap();
                }
            }
        }
        writeln!(out).unwrap();
    }

    writeln!(out, "## Recommendations").unwrap();
    writeln!(out).unwrap();
    let top = |category: InsightCategory| {
        results
            .get(&category)
            .and_then(|items| items.first())
            .map(|item| item.name.as_str())
    };
    if let Some(brand) = top(InsightCategory::Brands) {
        writeln!(
            out,
            "- Reference {brand} and similar brands in visuals and partnerships."
        )
        .unwrap();
    }
    if let Some(artist) = top(InsightCategory::Artists) {
        writeln!(out, "- Use music in the style of {artist} for video content.").unwrap();
    }
    if let Some(place) = top(InsightCategory::Places) {
        writeln!(out, "- Hold events at or near {place}.").unwrap();
    }
    if let Some(interest) = top(InsightCategory::Tags) {
        writeln!(out, "- Build messaging around {interest}.").unwrap();
    }
    writeln!(
        out,
        "- Keep copy specific to {tag} rather than the whole district."
    )
    .unwrap();

    out
}

/// Stores the creative brief for content generation.
///
/// # Errors
///
/// Returns [`AgentError::InvalidInput`] listing every missing field, or if
/// the candidate cannot be determined.
pub fn collect_campaign_inputs(
    services: &Services,
    session: &mut CampaignSession,
    params: CampaignInputsParams,
) -> Result<serde_json::Value, AgentError> {
    let goal = non_empty(params.campaign_goal.as_deref());
    let cta = non_empty(params.call_to_action.as_deref());
    let tone = non_empty(params.emotional_tone.as_deref());
    let platform = non_empty(params.platform_type.as_deref());

    let missing: Vec<&str> = [
        ("campaignGoal", goal.is_none()),
        ("callToAction", cta.is_none()),
        ("emotionalTone", tone.is_none()),
        ("platformType", platform.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, is_missing)| is_missing.then_some(name))
    .collect();

    let (Some(campaign_goal), Some(call_to_action), Some(emotional_tone), Some(platform_type)) =
        (goal, cta, tone, platform)
    else {
        return Err(AgentError::InvalidInput {
            message: format!("Missing required campaign inputs: {}", missing.join(", ")),
        });
    };

    let metadata = session.analysis.as_ref().map(|a| &a.metadata);
    let candidate_name = metadata
        .and_then(|m| non_empty(m.candidate_name.as_deref()))
        .or_else(|| non_empty(params.candidate_name.as_deref()))
        .or_else(|| candidate_from_artifacts(services))
        .ok_or_else(|| AgentError::InvalidInput {
            message: "Candidate name is unknown. Provide candidateName or run a candidate analysis first."
                .to_string(),
        })?;
    let candidate_base = metadata
        .and_then(|m| non_empty(m.candidate_base.as_deref()))
        .or_else(|| non_empty(params.candidate_base.as_deref()))
        .unwrap_or_else(|| DEFAULT_CANDIDATE_BASE.to_string());

    let inputs = CampaignInputs {
        campaign_goal,
        call_to_action,
        emotional_tone,
        platform_type,
        key_message: non_empty(params.key_message.as_deref()),
        candidate_name,
        candidate_base,
    };

    let result = json!({
        "status": "success",
        "message": "Campaign inputs saved",
        "inputs": inputs,
    });
    session.campaign_inputs = Some(inputs);
    Ok(result)
}

/// Candidate name from the most recent candidate analysis artifact.
///
/// Only the first word after the prefix is recoverable from the file name.
fn candidate_from_artifacts(services: &Services) -> Option<String> {
    let artifacts = services.artifacts.list().ok()?;
    let artifact = artifacts
        .iter()
        .rev()
        .find(|a| a.name.starts_with(CANDIDATE_ANALYSIS_PREFIX))?;
    let first = artifact.name[CANDIDATE_ANALYSIS_PREFIX.len()..]
        .split(['_', '.'])
        .next()
        .filter(|s| !s.is_empty())?;

    let mut chars = first.chars();
    let name: String = chars.next().map(|c| c.to_uppercase().chain(chars).collect())?;
    log::info!("Candidate '{name}' taken from {}", artifact.filename);
    Some(name)
}

fn content_prompt(
    inputs: &CampaignInputs,
    insights: &CulturalInsights,
    session: &CampaignSession,
) -> String {
    let mut prompt = String::new();
    writeln!(
        prompt,
        "You are writing political campaign content for {} ({} base).",
        inputs.candidate_name, inputs.candidate_base
    )
    .unwrap();
    if let Some(analysis) = &session.analysis {
        writeln!(
            prompt,
            "The race is against {} in {}.",
            analysis.opponent_name(),
            analysis.location()
        )
        .unwrap();
    }
    writeln!(prompt).unwrap();
    writeln!(prompt, "Campaign goal: {}", inputs.campaign_goal).unwrap();
    writeln!(prompt, "Call to action: {}", inputs.call_to_action).unwrap();
    writeln!(prompt, "Emotional tone: {}", inputs.emotional_tone).unwrap();
    writeln!(prompt, "Platform: {}", inputs.platform_type).unwrap();
    if let Some(key_message) = &inputs.key_message {
        writeln!(prompt, "Key message: {key_message}").unwrap();
    }
    writeln!(prompt).unwrap();
    writeln!(
        prompt,
        "Target audience: the '{}' locations. Their cultural preferences:",
        insights.location_tag
    )
    .unwrap();
    for category in InsightCategory::all() {
        let names = insights.names(*category);
        if !names.is_empty() {
            writeln!(prompt, "- {}: {}", category.title(), names.join(", ")).unwrap();
        }
    }
    writeln!(prompt).unwrap();
    writeln!(
        prompt,
        "Reference these preferences naturally. Do not stereotype or single out any group."
    )
    .unwrap();
    writeln!(
        prompt,
        "Respond with a JSON object with the keys short_copy (under 50 words), \
         medium_copy (50 to 150 words), long_copy (150 to 300 words), image_concept, \
         cultural_connections (array of strings), platform_optimization and legal_disclaimer."
    )
    .unwrap();
    prompt
}

/// Generates campaign copy from the brief and the cultural insights.
///
/// # Errors
///
/// Returns [`AgentError`] if inputs or insights are missing, the model is
/// not configured, or the reply is not valid content JSON.
pub async fn generate_campaign_content(
    services: &Services,
    session: &mut CampaignSession,
) -> Result<serde_json::Value, AgentError> {
    let inputs = session
        .campaign_inputs
        .as_ref()
        .ok_or_else(|| AgentError::MissingState {
            message: "No campaign inputs yet. Run collect_campaign_inputs first.".to_string(),
        })?;
    let insights = insights(session)?;
    let prompt = content_prompt(inputs, insights, session);

    let value = generate_json(services.llm()?, &prompt, &CONTENT_OPTIONS).await?;
    let content: CampaignContent = serde_json::from_value(value)?;

    let result = json!({
        "status": "success",
        "content": content,
    });
    session.campaign_content = Some(content);
    Ok(result)
}

/// Aspect ratio and style hint for a delivery platform.
fn platform_spec(platform: &str) -> (&'static str, &'static str) {
    match platform.trim().to_lowercase().as_str() {
        "social media" => ("1:1", "eye-catching, social media optimized, vibrant colors"),
        "instagram" => ("1:1", "Instagram-style, visually appealing, modern design"),
        "facebook" => ("16:9", "Facebook-optimized, clear messaging, professional"),
        "twitter" => ("16:9", "Twitter-style, concise visual impact, engaging"),
        "direct mail" => ("4:3", "print-ready, high contrast, clear details"),
        "email" => ("16:9", "email-friendly, clear composition, professional"),
        "sms" => ("1:1", "mobile-optimized, simple, clear messaging"),
        _ => ("16:9", "professional campaign style, clear composition"),
    }
}

fn image_prompt(concept: &str, inputs: &CampaignInputs, style: &str) -> String {
    format!(
        "Create a political campaign image.\n\
         Concept: {concept}\n\
         Tone: {}\n\
         Style: {style}\n\
         Requirements:\n\
         - No text overlay\n\
         - Show groups of people or places, not a single person\n\
         - Do not single out any race\n\
         - Do not depict the candidate",
        inputs.emotional_tone
    )
}

/// Generates the campaign image for the brief's platform.
///
/// # Errors
///
/// Returns [`AgentError`] if there is no brief or image concept, or image
/// generation fails.
pub async fn generate_campaign_image(
    services: &Services,
    session: &mut CampaignSession,
    params: CampaignImageParams,
) -> Result<serde_json::Value, AgentError> {
    let inputs = session
        .campaign_inputs
        .as_ref()
        .ok_or_else(|| AgentError::MissingState {
            message: "No campaign inputs yet. Run collect_campaign_inputs first.".to_string(),
        })?;
    let concept = non_empty(params.image_concept.as_deref())
        .or_else(|| {
            session
                .campaign_content
                .as_ref()
                .and_then(|c| non_empty(Some(c.image_concept.as_str())))
        })
        .ok_or_else(|| AgentError::MissingState {
            message: "No image concept. Generate campaign content or pass imageConcept."
                .to_string(),
        })?;

    let (aspect_ratio, style) = platform_spec(&inputs.platform_type);
    let prompt = image_prompt(&concept, inputs, style);
    let stem = format!("campaign_{}", snake_name(&inputs.candidate_name));

    let (artifact, image) = render_image(services, &stem, &prompt, aspect_ratio).await?;

    let result = json!({
        "status": "success",
        "artifact": artifact,
        "url": format!("/artifacts/{}", artifact.filename),
        "aspectRatio": aspect_ratio,
    });
    session.campaign_image = Some(image);
    Ok(result)
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn package_html(
    inputs: &CampaignInputs,
    content: &CampaignContent,
    image: Option<&str>,
    location_tag: Option<&str>,
) -> String {
    let e = escape_html;
    let mut html = String::new();
    writeln!(html, "<!DOCTYPE html>").unwrap();
    writeln!(html, "<html lang=\"en\">").unwrap();
    writeln!(html, "<head>").unwrap();
    writeln!(html, "<meta charset=\"utf-8\">").unwrap();
    writeln!(
        html,
        "<title>{} campaign package</title>",
        e(&inputs.candidate_name)
    )
    .unwrap();
    writeln!(
        html,
        "<style>body{{font-family:sans-serif;max-width:860px;margin:2rem auto;line-height:1.5}}\
         .meta{{color:#555}}.cta{{background:#1d4ed8;color:#fff;padding:1rem;border-radius:6px}}\
         img{{max-width:100%}}.disclaimer{{font-size:.8rem;color:#666}}</style>"
    )
    .unwrap();
    writeln!(html, "</head>").unwrap();
    writeln!(html, "<body>").unwrap();
    writeln!(html, "<header><h1>{}</h1>", e(&inputs.candidate_name)).unwrap();
    writeln!(
        html,
        "<p class=\"meta\">Goal: {} | Tone: {} | Platform: {}</p>",
        e(&inputs.campaign_goal),
        e(&inputs.emotional_tone),
        e(&inputs.platform_type)
    )
    .unwrap();
    if let Some(tag) = location_tag {
        writeln!(html, "<p class=\"meta\">Audience: {}</p>", e(tag)).unwrap();
    }
    writeln!(html, "</header>").unwrap();

    for (title, copy) in [
        ("Short copy", &content.short_copy),
        ("Medium copy", &content.medium_copy),
        ("Long copy", &content.long_copy),
    ] {
        writeln!(html, "<section><h2>{title}</h2><p>{}</p></section>", e(copy)).unwrap();
    }

    writeln!(
        html,
        "<div class=\"cta\"><strong>{}</strong></div>",
        e(&inputs.call_to_action)
    )
    .unwrap();

    if let Some(image) = image {
        writeln!(
            html,
            "<section><h2>Campaign image</h2><img src=\"{}\" alt=\"{}\"></section>",
            e(image),
            e(&content.image_concept)
        )
        .unwrap();
    }

    if !content.cultural_connections.is_empty() {
        writeln!(html, "<section><h2>Cultural connections</h2><ul>").unwrap();
        for connection in &content.cultural_connections {
            writeln!(html, "<li>{}</li>", e(connection)).unwrap();
        }
        writeln!(html, "</ul></section>").unwrap();
    }

    if !content.platform_optimization.is_empty() {
        writeln!(
            html,
            "<section><h2>Platform notes</h2><p>{}</p></section>",
            e(&content.platform_optimization)
        )
        .unwrap();
    }
    if !content.legal_disclaimer.is_empty() {
        writeln!(
            html,
            "<footer class=\"disclaimer\">{}</footer>",
            e(&content.legal_disclaimer)
        )
        .unwrap();
    }
    writeln!(html, "</body>").unwrap();
    writeln!(html, "</html>").unwrap();
    html
}

/// Bundles the brief, copy and image into an HTML artifact.
///
/// # Errors
///
/// Returns [`AgentError`] if inputs or content are missing, or the
/// artifact cannot be written.
pub fn create_campaign_package(
    services: &Services,
    session: &CampaignSession,
) -> Result<serde_json::Value, AgentError> {
    let (Some(inputs), Some(content)) = (&session.campaign_inputs, &session.campaign_content)
    else {
        return Err(AgentError::MissingState {
            message: "Campaign inputs and content are required. Run collect_campaign_inputs and generate_campaign_content first."
                .to_string(),
        });
    };

    let html = package_html(
        inputs,
        content,
        session.campaign_image.as_ref().map(|i| i.filename.as_str()),
        session.identified_locations.as_ref().map(|g| g.tag.as_str()),
    );
    let artifact = services.artifacts.save(
        &format!("campaign_package_{}.html", snake_name(&inputs.candidate_name)),
        html.as_bytes(),
    )?;

    Ok(json!({
        "status": "success",
        "artifact": artifact,
        "url": format!("/artifacts/{}", artifact.filename),
        "includesImage": session.campaign_image.is_some(),
    }))
}

/// Dumps the session state and stored artifacts.
///
/// # Errors
///
/// Returns an I/O error if the artifact directory cannot be read.
pub fn debug_campaign_state(
    services: &Services,
    session: &CampaignSession,
) -> Result<serde_json::Value, AgentError> {
    Ok(json!({
        "status": "success",
        "snapshot": session.snapshot(),
        "artifacts": services.artifacts.list()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::*;

    fn inputs_params() -> CampaignInputsParams {
        CampaignInputsParams {
            campaign_goal: Some("Turn out young voters".to_string()),
            call_to_action: Some("Vote early".to_string()),
            emotional_tone: Some("hopeful".to_string()),
            platform_type: Some("Instagram".to_string()),
            ..CampaignInputsParams::default()
        }
    }

    fn item(name: &str) -> InsightItem {
        InsightItem {
            id: name.to_lowercase(),
            name: name.to_string(),
            affinity: Some(0.9),
            popularity: None,
            subtype: None,
        }
    }

    fn insights_for(tag: &str) -> CulturalInsights {
        let mut categories = BTreeMap::new();
        categories.insert(InsightCategory::Brands, vec![item("Nike"), item("Trader Joe's")]);
        categories.insert(InsightCategory::Artists, vec![item("Bad Bunny")]);
        CulturalInsights {
            location_tag: tag.to_string(),
            location_wkt: "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))".to_string(),
            categories,
            report_artifact: None,
            created_at: Utc::now(),
        }
    }

    fn group(points: usize) -> LocationGroup {
        LocationGroup {
            tag: "Swing Voters".to_string(),
            description: "Filtered locations".to_string(),
            coordinates: (0..points).map(|i| [40.7 + i as f64 * 0.01, -74.0]).collect(),
            total_locations: points,
            filters_applied: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn inputs_take_candidate_from_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        let mut session = session_with_analysis();

        collect_campaign_inputs(&services, &mut session, inputs_params()).unwrap();

        let inputs = session.campaign_inputs.unwrap();
        assert_eq!(inputs.candidate_name, "Jane Doe");
        assert_eq!(inputs.candidate_base, "progressive");
        assert_eq!(inputs.key_message, None);
    }

    #[test]
    fn missing_inputs_are_listed_together() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        let mut session = session_with_analysis();

        let err = collect_campaign_inputs(
            &services,
            &mut session,
            CampaignInputsParams {
                campaign_goal: Some("  ".to_string()),
                emotional_tone: Some("urgent".to_string()),
                ..CampaignInputsParams::default()
            },
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("campaignGoal"));
        assert!(message.contains("callToAction"));
        assert!(message.contains("platformType"));
        assert!(!message.contains("emotionalTone"));
    }

    #[test]
    fn candidate_falls_back_to_analysis_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        services
            .artifacts
            .save("candidate_analysis_maria_new_york.csv", b"x")
            .unwrap();
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());

        collect_campaign_inputs(&services, &mut session, inputs_params()).unwrap();
        assert_eq!(session.campaign_inputs.unwrap().candidate_name, "Maria");

        let empty = tempfile::tempdir().unwrap();
        let mut session = CampaignSession::new(uuid::Uuid::new_v4());
        assert!(matches!(
            collect_campaign_inputs(&crate::tools::test_support::services(empty.path()), &mut session, inputs_params()),
            Err(AgentError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn insights_need_enough_locations() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        let mut session = session_with_analysis();

        assert!(matches!(
            generate_content_insights(&services, &mut session, ContentInsightsParams::default())
                .await,
            Err(AgentError::MissingState { .. })
        ));

        session.set_identified_locations(group(2));
        assert!(matches!(
            generate_content_insights(&services, &mut session, ContentInsightsParams::default())
                .await,
            Err(AgentError::InvalidInput { .. })
        ));

        session.set_identified_locations(group(4));
        assert!(matches!(
            generate_content_insights(&services, &mut session, ContentInsightsParams::default())
                .await,
            Err(AgentError::NotConfigured { .. })
        ));
    }

    #[test]
    fn insights_report_lists_categories_and_recommendations() {
        let insights = insights_for("Swing Voters");
        let report = insights_report("Swing Voters", "Filtered locations", &insights.categories);

        assert!(report.starts_with("# Content Strategy: Swing Voters"));
        assert!(report.contains("## Brand Preferences"));
        assert!(report.contains("1. Nike (affinity 0.90)"));
        assert!(report.contains("## Music & Artist Preferences"));
        assert!(!report.contains("## Movie Preferences"));
        assert!(report.contains("Use music in the style of Bad Bunny"));
        assert_eq!(
            insights_report_name("St. Louis Swing"),
            "content_strategy_st_louis_swing.md"
        );
    }

    #[tokio::test]
    async fn content_is_generated_from_inputs_and_insights() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = services(dir.path());
        let llm = FixedLlm::new(serde_json::to_string(&content()).unwrap());
        let prompts = llm.prompts.clone();
        services.llm = Some(Box::new(llm));

        let mut session = session_with_analysis();
        collect_campaign_inputs(&services, &mut session, inputs_params()).unwrap();
        assert!(matches!(
            generate_campaign_content(&services, &mut session).await,
            Err(AgentError::MissingState { .. })
        ));

        session.insights = Some(insights_for("Swing Voters"));
        let result = generate_campaign_content(&services, &mut session).await.unwrap();

        assert_eq!(result["content"]["short_copy"], "Jane shows up.");
        assert_eq!(session.campaign_content.unwrap(), content());
        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Call to action: Vote early"));
        assert!(prompt.contains("Nike, Trader Joe's"));
        assert!(prompt.contains("against John Roe in New York, NY"));
    }

    #[tokio::test]
    async fn image_uses_platform_aspect_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = services(dir.path());
        services.images = Some(Box::new(FixedImages));

        let mut session = session_with_analysis();
        collect_campaign_inputs(&services, &mut session, inputs_params()).unwrap();
        session.campaign_content = Some(content());

        let result =
            generate_campaign_image(&services, &mut session, CampaignImageParams::default())
                .await
                .unwrap();

        assert_eq!(result["aspectRatio"], "1:1");
        let image = session.campaign_image.unwrap();
        assert!(image.filename.starts_with("campaign_jane_doe_"));
        assert!(image.filename.ends_with("_v1.png"));
        assert!(image.prompt.contains("Neighbors at a summer block party"));
        assert!(image.prompt.contains("No text overlay"));
    }

    #[test]
    fn platform_lookup_is_case_insensitive() {
        assert_eq!(platform_spec("Direct Mail").0, "4:3");
        assert_eq!(platform_spec("SMS").0, "1:1");
        assert_eq!(platform_spec("billboard").0, "16:9");
    }

    #[test]
    fn package_escapes_copy() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        let mut session = session_with_analysis();
        assert!(create_campaign_package(&services, &session).is_err());

        collect_campaign_inputs(&services, &mut session, inputs_params()).unwrap();
        let mut copy = content();
        copy.short_copy = "Jane <3 NYC".to_string();
        session.campaign_content = Some(copy);

        let result = create_campaign_package(&services, &session).unwrap();
        let filename = result["artifact"]["filename"].as_str().unwrap();
        assert_eq!(filename, "campaign_package_jane_doe_v1.html");
        assert_eq!(result["includesImage"], false);

        let html = String::from_utf8(services.artifacts.load(filename).unwrap()).unwrap();
        assert!(html.contains("Jane &lt;3 NYC"));
        assert!(html.contains("<div class=\"cta\"><strong>Vote early</strong></div>"));
        assert!(html.contains("Paid for by Jane Doe for Council"));
    }

    #[test]
    fn debug_state_lists_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        services.artifacts.save("notes.md", b"hi").unwrap();
        let session = session_with_analysis();

        let state = debug_campaign_state(&services, &session).unwrap();
        assert_eq!(state["snapshot"]["recordCount"], 6);
        assert_eq!(state["artifacts"][0]["filename"], "notes_v1.md");
    }
}
