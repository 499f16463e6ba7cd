//! HTTP handler functions for the resonance API.

use std::str::FromStr;

use actix_web::web::Bytes;
use actix_web::{HttpResponse, web};
use resonance_agents::registry::{all_agents, find_agent};
use resonance_ai::AgentEvent;
use resonance_ai::providers::create_provider_from_env;
use resonance_campaign::filter::filter_strategic;
use resonance_campaign_models::{
    BasePopularityStatus, PopularityStatus, StrategicFilter, Strategy,
};
use resonance_server_models::{
    ApiAgent, ApiHealth, ApiLocation, ApiLocations, AskRequest, LocationQueryParams,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::AppState;

/// Capacity of the per-request agent event channel.
const EVENT_BUFFER: usize = 32;

/// Locations returned when no `limit` is given.
const DEFAULT_LOCATION_LIMIT: usize = 500;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/agents`
pub async fn agents() -> HttpResponse {
    let agents: Vec<ApiAgent> = all_agents().into_iter().map(ApiAgent::from).collect();
    HttpResponse::Ok().json(agents)
}

/// `GET /api/sessions/{id}`
pub async fn session(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(&path) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid session ID"
        }));
    };

    match state.sessions.get(&id).await {
        Some(session) => HttpResponse::Ok().json(session.lock().await.snapshot()),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Session not found"
        })),
    }
}

/// `DELETE /api/sessions/{id}`
pub async fn delete_session(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(&path) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid session ID"
        }));
    };

    if state.sessions.remove(&id).await {
        log::debug!("Deleted session {id}");
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::NotFound().json(serde_json::json!({
            "error": "Session not found"
        }))
    }
}

/// `GET /api/artifacts`
pub async fn artifacts(state: web::Data<AppState>) -> HttpResponse {
    match state.services.artifacts.list() {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => {
            log::error!("Failed to list artifacts: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to list artifacts"
            }))
        }
    }
}

fn parse_label<T: FromStr>(name: &str, value: Option<&str>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{name} is required"))?;
    T::from_str(value.trim()).map_err(|_| format!("Invalid {name}: '{value}'"))
}

fn strategic_filter(params: &LocationQueryParams) -> Result<StrategicFilter, String> {
    Ok(StrategicFilter {
        strategy: parse_label::<Strategy>("strategy", params.strategy.as_deref())?,
        popularity_status: parse_label::<PopularityStatus>(
            "popularityStatus",
            params.popularity_status.as_deref(),
        )?,
        base_popularity_status: parse_label::<BasePopularityStatus>(
            "basePopularityStatus",
            params.base_popularity_status.as_deref(),
        )?,
    })
}

/// `GET /api/locations`
///
/// Applies the strategic filter to the preloaded campaign data.
pub async fn locations(
    state: web::Data<AppState>,
    params: web::Query<LocationQueryParams>,
) -> HttpResponse {
    let Some(campaign) = &state.campaign else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "No campaign data loaded. Set CAMPAIGN_DATA_PATH."
        }));
    };

    let filter = match strategic_filter(&params) {
        Ok(filter) => filter,
        Err(message) => {
            return HttpResponse::BadRequest().json(serde_json::json!({ "error": message }));
        }
    };

    let matched = filter_strategic(&campaign.records, &filter);
    let limit = params.limit.unwrap_or(DEFAULT_LOCATION_LIMIT);

    HttpResponse::Ok().json(ApiLocations {
        filter: filter.describe(),
        total_count: matched.len(),
        locations: matched
            .into_iter()
            .take(limit)
            .map(ApiLocation::from)
            .collect(),
    })
}

/// `GET /api/locations/quality`
pub async fn locations_quality(state: web::Data<AppState>) -> HttpResponse {
    match &state.campaign {
        Some(campaign) => HttpResponse::Ok().json(&campaign.report),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "No campaign data loaded. Set CAMPAIGN_DATA_PATH."
        })),
    }
}

/// Formats an agent event as a server-sent event frame.
fn sse_frame(event: &AgentEvent) -> Bytes {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        log::error!("Failed to serialize agent event: {e}");
        r#"{"type":"error","message":"serialization failed"}"#.to_string()
    });
    Bytes::from(format!("data: {json}\n\n"))
}

/// `POST /api/agents/{agent}/ask`
///
/// Runs the agent against the session and streams [`AgentEvent`]s as
/// server-sent events. The first event carries the session ID.
pub async fn ask(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<AskRequest>,
) -> HttpResponse {
    let agent = match find_agent(&path) {
        Ok(agent) => agent,
        Err(e) => {
            return HttpResponse::NotFound().json(serde_json::json!({ "error": e.to_string() }));
        }
    };

    let AskRequest {
        question,
        session_id,
    } = body.into_inner();
    if question.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "question must not be empty"
        }));
    }

    let session_id = session_id.and_then(|id| Uuid::parse_str(&id).ok());
    let (session_id, session) = state.sessions.get_or_create(session_id).await;

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(EVENT_BUFFER);
    let _ = tx
        .send(AgentEvent::SessionId {
            id: session_id.to_string(),
        })
        .await;

    let task_state = state.clone();
    actix_rt::spawn(async move {
        let provider = match create_provider_from_env(&agent.model) {
            Ok(provider) => provider,
            Err(e) => {
                log::error!("Failed to create chat provider: {e}");
                let _ = tx
                    .send(AgentEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        let mut session = session.lock().await;
        if let Err(e) = resonance_agents::ask_agent_with(
            &task_state.services,
            provider.as_ref(),
            &agent,
            &mut session,
            &question,
            &tx,
        )
        .await
        {
            log::error!("[{}] agent run failed: {e}", agent.id);
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, actix_web::Error>(sse_frame(&event));
        }
    };

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}
