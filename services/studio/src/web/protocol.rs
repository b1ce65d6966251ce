//! services/studio/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the
//! studio server.

use chrono::{DateTime, Utc};
use mihrab_core::{
    domain::{CardContent, Theme},
    export::{BatchReport, ExportStatus, ExportTask},
    ports::PortError,
    session::{SessionState, SessionStatus},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests FROM the Client (Browser)
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct TopicRequest {
    pub topic: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ThemeRequest {
    /// Name of a theme from `GET /themes`.
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest {
    pub api_key: String,
}

//=========================================================================================
// Responses TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThemeView {
    pub name: String,
    pub background_color: String,
    pub accent_color: String,
    pub text_color: String,
    pub swatch: Vec<String>,
}

impl From<&Theme> for ThemeView {
    fn from(theme: &Theme) -> Self {
        Self {
            name: theme.name.to_string(),
            background_color: theme.background_color.to_string(),
            accent_color: theme.accent_color.to_string(),
            text_color: theme.text_color.to_string(),
            swatch: theme.swatch.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusView {
    Idle,
    Editing,
    Generating,
    Ready,
    Failed,
}

impl From<SessionStatus> for StatusView {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Idle => Self::Idle,
            SessionStatus::Editing => Self::Editing,
            SessionStatus::Generating => Self::Generating,
            SessionStatus::Ready => Self::Ready,
            SessionStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub title: String,
    pub hook: String,
    pub bullet_points: Vec<String>,
    pub closing_line: String,
}

impl From<&CardContent> for CardView {
    fn from(card: &CardContent) -> Self {
        Self {
            title: card.title.clone(),
            hook: card.hook.clone(),
            bullet_points: card.bullet_points.clone(),
            closing_line: card.closing_line.clone(),
        }
    }
}

/// A failure as shown to the user, with its machine-readable class.
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorView {
    pub kind: String,
    pub message: String,
}

impl From<&PortError> for ErrorView {
    fn from(e: &PortError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.user_message().to_string(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub status: StatusView,
    pub topic: String,
    pub selected_theme: String,
    pub collection_name: Option<String>,
    pub parts: Vec<CardView>,
    /// Present only while a generation is running.
    pub loading_message: Option<String>,
    pub active_download_index: Option<usize>,
    /// Exports still queued or capturing.
    pub exports: Vec<ExportTaskView>,
    pub error: Option<ErrorView>,
}

impl SessionView {
    pub fn new(session_id: Uuid, state: &SessionState) -> Self {
        let result = state.generation_result();
        Self {
            session_id,
            status: state.status().into(),
            topic: state.topic().to_string(),
            selected_theme: state.selected_theme().name.to_string(),
            collection_name: result.map(|r| r.collection_name().to_string()),
            parts: result
                .map(|r| r.parts().iter().map(CardView::from).collect())
                .unwrap_or_default(),
            loading_message: state.loading_message().map(str::to_string),
            active_download_index: state.active_download_index(),
            exports: state.exports().iter().map(ExportTaskView::from).collect(),
            error: state.last_error().map(ErrorView::from),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatusView {
    Pending,
    Capturing,
    Succeeded,
    Failed,
}

impl From<ExportStatus> for ExportStatusView {
    fn from(status: ExportStatus) -> Self {
        match status {
            ExportStatus::Pending => Self::Pending,
            ExportStatus::Capturing => Self::Capturing,
            ExportStatus::Succeeded => Self::Succeeded,
            ExportStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportTaskView {
    pub id: Uuid,
    pub card_index: usize,
    pub status: ExportStatusView,
    pub file_name: Option<String>,
    pub error: Option<ErrorView>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&ExportTask> for ExportTaskView {
    fn from(task: &ExportTask) -> Self {
        Self {
            id: task.id,
            card_index: task.card_index,
            status: task.status.into(),
            file_name: task.file_name.clone(),
            error: task.cause.as_ref().map(ErrorView::from),
            started_at: task.started_at,
            finished_at: task.finished_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchReportView {
    pub tasks: Vec<ExportTaskView>,
    pub succeeded: usize,
    pub failed: usize,
}

impl From<&BatchReport> for BatchReportView {
    fn from(report: &BatchReport) -> Self {
        Self {
            tasks: report.tasks.iter().map(ExportTaskView::from).collect(),
            succeeded: report.succeeded,
            failed: report.failed,
        }
    }
}
