//! services/studio/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints, the router that wires
//! them together, and the master definition for the OpenAPI specification.

use crate::config::ApiKey;
use crate::web::protocol::{
    ApiKeyRequest, BatchReportView, CardView, ErrorView, ExportStatusView, ExportTaskView,
    SessionView, StatusView, ThemeRequest, ThemeView, TopicRequest,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use bytes::Bytes;
use mihrab_core::{
    export::{ExportStatus, MemorySink},
    generation::{self, GenerationOutcome},
    ports::PortError,
    render::{render_card, RenderMode},
    session::{SessionHandle, TransitionError},
    themes,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_themes_handler,
        create_session_handler,
        get_session_handler,
        delete_session_handler,
        set_topic_handler,
        select_theme_handler,
        generate_handler,
        reset_handler,
        preview_card_handler,
        download_card_handler,
        export_card_handler,
        export_all_handler,
        set_api_key_handler,
    ),
    components(
        schemas(
            ThemeView, SessionView, StatusView, CardView, ErrorView, TopicRequest,
            ThemeRequest, ApiKeyRequest, ExportTaskView, ExportStatusView, BatchReportView
        )
    ),
    tags(
        (name = "Mihrab Studio API", description = "Generate themed infographic cards and export them as PNG.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// All API routes, bound to the shared state.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/themes", get(list_themes_handler))
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/{id}/topic", put(set_topic_handler))
        .route("/sessions/{id}/theme", put(select_theme_handler))
        .route("/sessions/{id}/generate", post(generate_handler))
        .route("/sessions/{id}/reset", post(reset_handler))
        .route(
            "/sessions/{id}/cards/{index}/preview.svg",
            get(preview_card_handler),
        )
        .route(
            "/sessions/{id}/cards/{index}/image.png",
            get(download_card_handler),
        )
        .route("/sessions/{id}/cards/{index}/export", post(export_card_handler))
        .route("/sessions/{id}/export", post(export_all_handler))
        .route("/settings/api-key", put(set_api_key_handler))
        .with_state(app_state)
}

//=========================================================================================
// Helpers
//=========================================================================================

async fn find_session(app_state: &AppState, id: Uuid) -> Result<Arc<SessionHandle>, HandlerError> {
    app_state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Session {id} not found")))
}

async fn session_view(session: &SessionHandle) -> SessionView {
    SessionView::new(session.id, &session.snapshot().await)
}

/// The HTTP status that best describes a port failure.
fn status_for(e: &PortError) -> StatusCode {
    match e {
        PortError::MissingCredential | PortError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
        PortError::MalformedResponse(_) | PortError::ProviderUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        PortError::NoResult => StatusCode::CONFLICT,
        PortError::IndexOutOfRange { .. } | PortError::ElementNotFound(_) => StatusCode::NOT_FOUND,
        PortError::CaptureFailed(_) | PortError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `Content-Disposition` for a possibly non-ASCII file name (RFC 6266).
fn attachment_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

/// Runs `work` on its own task so a dropped request cannot cancel it halfway.
async fn run_detached<T, F>(id: Uuid, what: &'static str, work: F) -> Result<T, HandlerError>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    tokio::spawn(work).await.map_err(|e| {
        error!(session_id = %id, "{} task failed: {}", what, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{what} task failed"),
        )
    })
}

fn export_response(task: &mihrab_core::export::ExportTask) -> (StatusCode, Json<ExportTaskView>) {
    let status = match &task.cause {
        Some(cause) => status_for(cause),
        None => StatusCode::OK,
    };
    (status, Json(ExportTaskView::from(task)))
}

//=========================================================================================
// Theme & Session Handlers
//=========================================================================================

/// List the theme catalog. The first entry is the default theme.
#[utoipa::path(
    get,
    path = "/themes",
    responses((status = 200, description = "All themes", body = [ThemeView]))
)]
pub async fn list_themes_handler() -> Json<Vec<ThemeView>> {
    Json(themes::catalog().iter().map(ThemeView::from).collect())
}

/// Create a new, idle session with the default theme.
#[utoipa::path(
    post,
    path = "/sessions",
    responses((status = 201, description = "Session created", body = SessionView))
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = app_state.sessions.create().await;
    Ok((StatusCode::CREATED, Json(session_view(&session).await)))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Current session state", body = SessionView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = find_session(&app_state, id).await?;
    Ok(Json(session_view(&session).await))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    if app_state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Session {id} not found")))
    }
}

/// Replace the topic. Rejected while a result is shown or a generation runs.
#[utoipa::path(
    put,
    path = "/sessions/{id}/topic",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = TopicRequest,
    responses(
        (status = 200, description = "Topic updated", body = SessionView),
        (status = 409, description = "Topic is locked in the current status")
    )
)]
pub async fn set_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TopicRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = find_session(&app_state, id).await?;
    session
        .state
        .lock()
        .await
        .set_topic(body.topic)
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    Ok(Json(session_view(&session).await))
}

/// Select a theme by name. Allowed in every status.
#[utoipa::path(
    put,
    path = "/sessions/{id}/theme",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = ThemeRequest,
    responses(
        (status = 200, description = "Theme selected", body = SessionView),
        (status = 400, description = "Unknown theme")
    )
)]
pub async fn select_theme_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ThemeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = find_session(&app_state, id).await?;
    session
        .state
        .lock()
        .await
        .select_theme(&body.name)
        .map_err(|e| match e {
            TransitionError::UnknownTheme(_) => (StatusCode::BAD_REQUEST, e.to_string()),
            TransitionError::TopicLocked(_) => (StatusCode::CONFLICT, e.to_string()),
        })?;
    Ok(Json(session_view(&session).await))
}

//=========================================================================================
// Generation Handlers
//=========================================================================================

/// Generate the cards for the current topic and wait for the outcome.
///
/// While this request is pending, `GET /sessions/{id}` reports the rotating
/// loading message.
#[utoipa::path(
    post,
    path = "/sessions/{id}/generate",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Generation settled; the view carries the result or the error", body = SessionView),
        (status = 409, description = "Empty topic or a generation is already running")
    )
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = find_session(&app_state, id).await?;

    let outcome = {
        let session = session.clone();
        let provider = app_state.provider.clone();
        let period = app_state.config.loading_rotation;
        run_detached(id, "Generation", async move {
            generation::generate(session, provider.as_ref(), period).await
        })
        .await?
    };

    match outcome {
        GenerationOutcome::Ignored => Err((
            StatusCode::CONFLICT,
            "The topic is empty or a generation is already running".to_string(),
        )),
        GenerationOutcome::Superseded => {
            warn!(session_id = %id, "Generation result discarded after a reset.");
            Ok(Json(session_view(&session).await))
        }
        GenerationOutcome::Ready | GenerationOutcome::Failed(_) => {
            Ok(Json(session_view(&session).await))
        }
    }
}

/// Return to the idle state, discarding the result and any running generation.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reset",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Session reset", body = SessionView))
)]
pub async fn reset_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = find_session(&app_state, id).await?;
    session.state.lock().await.reset();
    info!(session_id = %id, "Session reset.");
    Ok(Json(session_view(&session).await))
}

//=========================================================================================
// Card & Export Handlers
//=========================================================================================

/// The screen-mode SVG of one card under the selected theme.
#[utoipa::path(
    get,
    path = "/sessions/{id}/cards/{index}/preview.svg",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("index" = usize, Path, description = "Zero-based card index")
    ),
    responses(
        (status = 200, description = "SVG document (image/svg+xml)"),
        (status = 404, description = "Unknown session or card"),
        (status = 409, description = "No generation result")
    )
)]
pub async fn preview_card_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, HandlerError> {
    let session = find_session(&app_state, id).await?;
    let state = session.state.lock().await;
    let result = state
        .generation_result()
        .ok_or_else(|| (StatusCode::CONFLICT, PortError::NoResult.to_string()))?;
    let part = result.part(index).ok_or_else(|| {
        let e = PortError::IndexOutOfRange {
            index,
            len: result.len(),
        };
        (StatusCode::NOT_FOUND, e.to_string())
    })?;
    let card = render_card(
        part,
        state.selected_theme(),
        &app_state.config.font_family,
        index,
        RenderMode::Screen,
    );
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], card.svg).into_response())
}

/// Export one card and return the PNG as a download.
#[utoipa::path(
    get,
    path = "/sessions/{id}/cards/{index}/image.png",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("index" = usize, Path, description = "Zero-based card index")
    ),
    responses(
        (status = 200, description = "PNG attachment (image/png)"),
        (status = 404, description = "Unknown session or card"),
        (status = 409, description = "No generation result"),
        (status = 500, description = "Capture failed", body = ExportTaskView)
    )
)]
pub async fn download_card_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, HandlerError> {
    let session = find_session(&app_state, id).await?;
    let sink = Arc::new(MemorySink::new());
    let task = {
        let (exporter, sink) = (app_state.exporter.clone(), sink.clone());
        run_detached(id, "Export", async move {
            exporter.export_one(&session, index, sink.as_ref()).await
        })
        .await?
    };
    if task.status != ExportStatus::Succeeded {
        return Ok(export_response(&task).into_response());
    }

    let (file_name, image) = sink.take().await.pop().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Export produced no file".to_string(),
        )
    })?;
    let disposition = HeaderValue::from_str(&attachment_disposition(&file_name))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Bytes::from(image.png),
    )
        .into_response())
}

/// Export one card into the configured export directory.
#[utoipa::path(
    post,
    path = "/sessions/{id}/cards/{index}/export",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("index" = usize, Path, description = "Zero-based card index")
    ),
    responses(
        (status = 200, description = "Card exported", body = ExportTaskView),
        (status = 404, description = "Unknown session or card", body = ExportTaskView),
        (status = 409, description = "No generation result", body = ExportTaskView),
        (status = 500, description = "Capture failed", body = ExportTaskView)
    )
)]
pub async fn export_card_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = find_session(&app_state, id).await?;
    let (exporter, sink) = (app_state.exporter.clone(), app_state.export_sink.clone());
    let task = run_detached(id, "Export", async move {
        exporter.export_one(&session, index, sink.as_ref()).await
    })
    .await?;
    Ok(export_response(&task))
}

/// Export every card, one after the other, into the export directory.
#[utoipa::path(
    post,
    path = "/sessions/{id}/export",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Per-card outcome of the batch", body = BatchReportView),
        (status = 409, description = "No generation result")
    )
)]
pub async fn export_all_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = find_session(&app_state, id).await?;
    if session.state.lock().await.generation_result().is_none() {
        return Err((StatusCode::CONFLICT, PortError::NoResult.to_string()));
    }
    let (exporter, sink) = (app_state.exporter.clone(), app_state.export_sink.clone());
    let report = run_detached(id, "Batch export", async move {
        exporter.export_all(&session, sink.as_ref()).await
    })
    .await?;
    Ok(Json(BatchReportView::from(&report)))
}

//=========================================================================================
// Settings Handlers
//=========================================================================================

/// Supply the provider key at runtime. Applies to every session.
#[utoipa::path(
    put,
    path = "/settings/api-key",
    request_body = ApiKeyRequest,
    responses(
        (status = 204, description = "Key stored"),
        (status = 400, description = "Empty or placeholder key")
    )
)]
pub async fn set_api_key_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<ApiKeyRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let key = ApiKey::parse(&body.api_key).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "The API key is empty or a placeholder".to_string(),
        )
    })?;
    *app_state.credential.write().await = Some(key);
    info!("Provider API key updated.");
    Ok(StatusCode::NO_CONTENT)
}
