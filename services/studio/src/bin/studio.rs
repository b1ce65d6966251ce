//! services/studio/src/bin/studio.rs

use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::Router;
use mihrab_core::{
    export::{ExportOrchestrator, ExportSettings},
    session::{self, SessionRegistry},
};
use std::sync::Arc;
use studio_lib::{
    adapters::{DirectorySink, FontLibrary, GeminiContentAdapter, ResvgCaptureAdapter},
    config::Config,
    error::StudioError,
    web::{api_router, state::AppState, ApiDoc},
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), StudioError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    if config.api_key.is_none() {
        warn!("No provider API key configured; generation fails until one is supplied.");
    }
    let credential = Arc::new(RwLock::new(config.api_key.clone()));
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("mihrab-studio/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let provider = Arc::new(GeminiContentAdapter::new(
        http_client,
        config.gemini_api_base.clone(),
        config.gemini_model.clone(),
        credential.clone(),
    ));

    info!("Loading fonts in the background...");
    let fonts = Arc::new(FontLibrary::load(
        config.fonts_dir.clone(),
        config.font_family.clone(),
    ));
    let capture = Arc::new(ResvgCaptureAdapter::new(fonts, config.capture_grace));
    let exporter = Arc::new(ExportOrchestrator::new(
        capture,
        ExportSettings {
            brand_prefix: config.brand_prefix.clone(),
            font_family: config.font_family.clone(),
            settle_delay: config.export_settle,
        },
    ));
    let export_sink = Arc::new(DirectorySink::new(config.export_dir.clone()));
    info!("Exports are written to {}", config.export_dir.display());

    // --- 3. Build the Shared AppState ---
    let sessions = Arc::new(SessionRegistry::new());
    session::spawn_eviction(sessions.clone(), config.session_idle_ttl, config.session_sweep);
    info!(
        "Sessions idle for {}s are evicted.",
        config.session_idle_ttl.as_secs()
    );
    let app_state = Arc::new(AppState {
        config: config.clone(),
        sessions,
        provider,
        exporter,
        export_sink,
        credential,
    });

    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| StudioError::CorsOrigin {
            origin: config.cors_origin.clone(),
            reason: e.to_string(),
        })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 4. Create the Web Router ---
    let app = Router::new()
        .merge(api_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
