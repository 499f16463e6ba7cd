#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the resonance campaign agents.
//!
//! Serves the agent chat endpoint as an SSE stream from
//! `/api/agents/{agent}/ask`, read-only views of the preloaded campaign
//! CSV, and the generated artifacts under `/artifacts`. Sessions are kept
//! in memory for the lifetime of the process.

mod handlers;
pub mod interactive;

use std::path::PathBuf;
use std::time::Duration;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, Scope, middleware, web};
use resonance_agents::Services;
use resonance_agents::session::SessionStore;
use resonance_campaign::ingest::validate_records;
use resonance_campaign_models::{CampaignLocationRecord, DataQualityReport};

/// Campaign CSV loaded at startup from `CAMPAIGN_DATA_PATH`.
pub struct PreloadedCampaign {
    /// Where the file was read from.
    pub path: PathBuf,
    /// Rows that passed validation.
    pub records: Vec<CampaignLocationRecord>,
    /// Validation report for the whole file.
    pub report: DataQualityReport,
}

impl PreloadedCampaign {
    /// Reads and validates `path`. Rows with data-quality issues are
    /// excluded from [`Self::records`] and listed in [`Self::report`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or lacks a required
    /// column.
    pub fn load(path: PathBuf) -> Result<Self, resonance_campaign::CampaignError> {
        let file = std::fs::File::open(&path)?;
        let (records, report) = validate_records(file)?;
        if !report.is_clean() {
            log::warn!(
                "{} of {} rows in {} failed validation",
                report.rows_checked - report.valid_rows,
                report.rows_checked,
                path.display()
            );
        }
        Ok(Self {
            path,
            records,
            report,
        })
    }
}

/// Shared application state.
pub struct AppState {
    /// External clients and the artifact store.
    pub services: Services,
    /// Live chat sessions.
    pub sessions: SessionStore,
    /// Preloaded campaign data, if configured.
    pub campaign: Option<PreloadedCampaign>,
}

/// The `/api` routes.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .route("/health", web::get().to(handlers::health))
        .route("/agents", web::get().to(handlers::agents))
        .route("/agents/{agent}/ask", web::post().to(handlers::ask))
        .route("/sessions/{id}", web::get().to(handlers::session))
        .route("/sessions/{id}", web::delete().to(handlers::delete_session))
        .route("/artifacts", web::get().to(handlers::artifacts))
        .route("/locations", web::get().to(handlers::locations))
        .route(
            "/locations/quality",
            web::get().to(handlers::locations_quality),
        )
}

fn parse_idle_minutes(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|m| *m > 0)
        .map(|m| Duration::from_secs(m * 60))
}

/// Session store whose idle timeout comes from `SESSION_IDLE_MINUTES`.
fn session_store_from_env() -> SessionStore {
    match std::env::var("SESSION_IDLE_MINUTES") {
        Ok(value) => parse_idle_minutes(&value).map_or_else(
            || {
                log::warn!("Ignoring invalid SESSION_IDLE_MINUTES '{value}'");
                SessionStore::new()
            },
            SessionStore::with_idle_timeout,
        ),
        Err(_) => SessionStore::new(),
    }
}

/// Starts the resonance API server.
///
/// Creates the external clients from the environment, preloads the
/// campaign CSV named by `CAMPAIGN_DATA_PATH` (if any), and starts the
/// Actix-Web HTTP server. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let _ = pretty_env_logger::try_init_custom_env("RUST_LOG");

    log::info!("Configuring services...");
    let services = Services::from_env();

    let campaign = services.default_data_path.clone().and_then(|path| {
        log::info!("Preloading campaign data from {}...", path.display());
        PreloadedCampaign::load(path)
            .inspect_err(|e| log::error!("Failed to preload campaign data: {e}"))
            .ok()
    });

    let artifacts_dir = services.artifacts.root().to_path_buf();
    std::fs::create_dir_all(&artifacts_dir)?;

    let state = web::Data::new(AppState {
        services,
        sessions: session_store_from_env(),
        campaign,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(api_scope())
            .service(Files::new("/artifacts", artifacts_dir.clone()))
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
