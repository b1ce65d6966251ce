//! crates/mihrab_core/src/export.rs
//!
//! Drives card exports: one card at a time, or the whole collection strictly
//! in order with a settling pause between items. A failed card is reported on
//! its own task and never stops the batch.

use crate::domain::{CapturedImage, GenerationResult};
use crate::ports::{CaptureService, ImageSink, PortError, PortResult};
use crate::render::{CardStage, DEFAULT_FONT_FAMILY};
use crate::session::{SessionHandle, SessionState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Used when neither the collection name nor the topic yields a usable name.
const FALLBACK_NAME: &str = "design";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Pending,
    Capturing,
    Succeeded,
    Failed,
}

/// The record of one card export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTask {
    pub id: Uuid,
    pub card_index: usize,
    pub status: ExportStatus,
    pub file_name: Option<String>,
    /// Localized message shown to the user on failure.
    pub error: Option<String>,
    #[serde(skip)]
    pub cause: Option<PortError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExportTask {
    pub fn new(card_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_index,
            status: ExportStatus::Pending,
            file_name: None,
            error: None,
            cause: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn succeed(mut self, file_name: String) -> Self {
        self.status = ExportStatus::Succeeded;
        self.file_name = Some(file_name);
        self.finished_at = Some(Utc::now());
        self
    }

    fn fail(mut self, cause: PortError) -> Self {
        self.status = ExportStatus::Failed;
        self.error = Some(cause.user_message().to_string());
        self.cause = Some(cause);
        self.finished_at = Some(Utc::now());
        self
    }
}

/// Outcome of a whole-collection export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub tasks: Vec<ExportTask>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub brand_prefix: String,
    /// Primary font family of the captured cards.
    pub font_family: String,
    /// Pause after each item of a batch.
    pub settle_delay: Duration,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            brand_prefix: "AlMihrab".to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            settle_delay: Duration::from_millis(1000),
        }
    }
}

/// Builds `<prefix>-<normalized name>-<index + 1>.png`.
///
/// Whitespace runs become a single `-`; characters that are unsafe in file
/// names are dropped. Letters and digits of any script are kept.
pub fn export_file_name(prefix: &str, collection_name: &str, topic: &str, index: usize) -> String {
    let name = [collection_name, topic]
        .into_iter()
        .map(normalize_name)
        .find(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    format!("{prefix}-{name}-{}.png", index + 1)
}

fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub struct ExportOrchestrator {
    capture: Arc<dyn CaptureService>,
    settings: ExportSettings,
}

impl ExportOrchestrator {
    pub fn new(capture: Arc<dyn CaptureService>, settings: ExportSettings) -> Self {
        Self { capture, settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Exports one card through `sink`.
    ///
    /// The task is listed on the session as `Pending` until the export lane is
    /// free, then as `Capturing`. It is removed from the session when the
    /// export finishes or the future is dropped. Failures are reported on the
    /// returned task; the generation result and the session error are left
    /// untouched.
    pub async fn export_one(
        &self,
        session: &Arc<SessionHandle>,
        card_index: usize,
        sink: &dyn ImageSink,
    ) -> ExportTask {
        let mut task = ExportTask::new(card_index);

        let precheck = exportable(&*session.state.lock().await, card_index).map(|_| ());
        if let Err(e) = precheck {
            warn!(session_id = %session.id, card_index, error = %e, "Export rejected.");
            return task.fail(e);
        }
        let in_flight = InFlightExport::queue(session, &task).await;
        let _lane = session.export_lane.lock().await;

        let prepared = {
            let mut state = session.state.lock().await;
            let prepared = exportable(&state, card_index).map(|result| {
                (
                    CardStage::build(result, state.selected_theme(), &self.settings.font_family),
                    export_file_name(
                        &self.settings.brand_prefix,
                        result.collection_name(),
                        state.topic(),
                        card_index,
                    ),
                )
            });
            if prepared.is_ok() {
                state.mark_download(task.id);
            }
            prepared
        };

        let (stage, file_name) = match prepared {
            Ok(p) => p,
            Err(e) => {
                in_flight.release().await;
                warn!(session_id = %session.id, card_index, error = %e, "Export rejected.");
                return task.fail(e);
            }
        };

        task.status = ExportStatus::Capturing;
        let outcome = self.capture_and_save(&stage, card_index, &file_name, sink).await;
        in_flight.release().await;

        match outcome {
            Ok(()) => {
                info!(session_id = %session.id, card_index, %file_name, "Card exported.");
                task.succeed(file_name)
            }
            Err(e) => {
                error!(session_id = %session.id, card_index, error = %e, "Card export failed.");
                task.fail(e)
            }
        }
    }

    async fn capture_and_save(
        &self,
        stage: &CardStage,
        card_index: usize,
        file_name: &str,
        sink: &dyn ImageSink,
    ) -> PortResult<()> {
        let image = self.capture.capture(stage, card_index).await?;
        sink.save(file_name, &image).await
    }

    /// Exports every card in index order, one after the other.
    pub async fn export_all(
        &self,
        session: &Arc<SessionHandle>,
        sink: &dyn ImageSink,
    ) -> BatchReport {
        let count = session
            .state
            .lock()
            .await
            .generation_result()
            .map(|r| r.len())
            .unwrap_or(0);
        info!(session_id = %session.id, cards = count, "Batch export started.");

        let mut tasks = Vec::with_capacity(count);
        for card_index in 0..count {
            tasks.push(self.export_one(session, card_index, sink).await);
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        let succeeded = tasks
            .iter()
            .filter(|t| t.status == ExportStatus::Succeeded)
            .count();
        let failed = tasks.len() - succeeded;
        info!(session_id = %session.id, succeeded, failed, "Batch export finished.");
        BatchReport {
            tasks,
            succeeded,
            failed,
        }
    }
}

fn exportable(state: &SessionState, card_index: usize) -> PortResult<&GenerationResult> {
    match state.generation_result() {
        None => Err(PortError::NoResult),
        Some(result) if card_index >= result.len() => Err(PortError::IndexOutOfRange {
            index: card_index,
            len: result.len(),
        }),
        Some(result) => Ok(result),
    }
}

/// Keeps an export listed on its session and unlists it on drop, so an
/// aborted or cancelled export never leaves a stale entry behind.
struct InFlightExport {
    session: Arc<SessionHandle>,
    task_id: Uuid,
    armed: bool,
}

impl InFlightExport {
    async fn queue(session: &Arc<SessionHandle>, task: &ExportTask) -> Self {
        session.state.lock().await.queue_export(task.clone());
        Self {
            session: session.clone(),
            task_id: task.id,
            armed: true,
        }
    }

    async fn release(mut self) {
        self.session.state.lock().await.clear_download(self.task_id);
        self.armed = false;
    }
}

impl Drop for InFlightExport {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.session.state.try_lock() {
            state.clear_download(self.task_id);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let (session, task_id) = (self.session.clone(), self.task_id);
                runtime.spawn(async move {
                    session.state.lock().await.clear_download(task_id);
                });
            }
            Err(_) => warn!(
                session_id = %self.session.id,
                task_id = %self.task_id,
                "Export dropped outside a runtime; its entry stays listed."
            ),
        }
    }
}

//=========================================================================================
// MemorySink
//=========================================================================================

/// Keeps exported files in memory, in the order they were saved.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, CapturedImage)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn take(&self) -> Vec<(String, CapturedImage)> {
        std::mem::take(&mut *self.files.lock().await)
    }
}

#[async_trait]
impl ImageSink for MemorySink {
    async fn save(&self, file_name: &str, image: &CapturedImage) -> PortResult<()> {
        self.files
            .lock()
            .await
            .push((file_name.to_string(), image.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CardContent, GenerationResult};
    use crate::session::SessionStatus;
    use std::sync::Mutex as StdMutex;
    use tokio::time::Instant;

    /// Records the start/end of every capture and fails on chosen indices.
    struct RecordingCapture {
        fail_on: Vec<usize>,
        work: Duration,
        spans: StdMutex<Vec<(usize, Instant, Instant)>>,
    }

    #[async_trait]
    impl CaptureService for RecordingCapture {
        async fn capture(&self, stage: &CardStage, card_index: usize) -> PortResult<CapturedImage> {
            let start = Instant::now();
            tokio::time::sleep(self.work).await;
            let end = Instant::now();
            self.spans.lock().unwrap().push((card_index, start, end));
            if self.fail_on.contains(&card_index) {
                return Err(PortError::CaptureFailed("simulated".to_string()));
            }
            let card = stage
                .card(card_index, crate::render::RenderMode::Capture)
                .ok_or_else(|| PortError::ElementNotFound(card_index.to_string()))?;
            let (width, height) = card.pixel_size().unwrap_or((0, 0));
            Ok(CapturedImage {
                width,
                height,
                png: vec![card_index as u8],
            })
        }
    }

    fn capture(fail_on: Vec<usize>) -> Arc<RecordingCapture> {
        Arc::new(RecordingCapture {
            fail_on,
            work: Duration::from_millis(300),
            spans: StdMutex::new(Vec::new()),
        })
    }

    async fn ready_session(name: &str) -> Arc<SessionHandle> {
        let session = Arc::new(SessionHandle::new());
        let parts = (0..6)
            .map(|i| CardContent {
                title: format!("t{i}"),
                hook: "h".to_string(),
                bullet_points: vec!["a".into(), "b".into(), "c".into()],
                closing_line: "c".to_string(),
            })
            .collect();
        {
            let mut state = session.state.lock().await;
            state.set_topic("topic words").unwrap();
            let ticket = state.begin_generation().unwrap();
            state.complete_generation(ticket, Ok(GenerationResult::new(name, parts).unwrap()));
        }
        session
    }

    fn orchestrator(capture: Arc<RecordingCapture>) -> ExportOrchestrator {
        ExportOrchestrator::new(
            capture,
            ExportSettings {
                settle_delay: Duration::from_millis(800),
                ..ExportSettings::default()
            },
        )
    }

    #[test]
    fn file_name_is_deterministic() {
        let name = export_file_name("AlMihrab", "Al-Kahf Reflections", "", 2);
        assert_eq!(name, "AlMihrab-Al-Kahf-Reflections-3.png");
        assert_eq!(name, export_file_name("AlMihrab", "Al-Kahf Reflections", "", 2));
    }

    #[test]
    fn file_name_normalizes_whitespace_and_unsafe_characters() {
        assert_eq!(
            export_file_name("AlMihrab", "  سورة   الكهف / تأملات ", "", 0),
            "AlMihrab-سورة-الكهف-تأملات-1.png"
        );
        assert_eq!(export_file_name("P", "", "fallback topic", 5), "P-fallback-topic-6.png");
        assert_eq!(export_file_name("P", "///", "  ", 0), "P-design-1.png");
    }

    #[tokio::test(start_paused = true)]
    async fn export_one_saves_and_clears_marker() {
        let session = ready_session("Al-Kahf Reflections").await;
        let sink = MemorySink::new();
        let task = orchestrator(capture(vec![])).export_one(&session, 2, &sink).await;

        assert_eq!(task.status, ExportStatus::Succeeded);
        assert_eq!(task.file_name.as_deref(), Some("AlMihrab-Al-Kahf-Reflections-3.png"));
        let files = sink.take().await;
        assert_eq!(files.len(), 1);
        assert_eq!((files[0].1.width, files[0].1.height), (1080, 1920));
        assert!(session.snapshot().await.active_download_index().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_capture_leaves_result_intact() {
        let session = ready_session("c").await;
        let sink = MemorySink::new();
        let task = orchestrator(capture(vec![1])).export_one(&session, 1, &sink).await;

        assert_eq!(task.status, ExportStatus::Failed);
        assert!(matches!(task.cause, Some(PortError::CaptureFailed(_))));
        assert!(task.error.is_some());
        let state = session.snapshot().await;
        assert_eq!(state.status(), SessionStatus::Ready);
        assert!(state.last_error().is_none());
        assert!(state.active_download_index().is_none());
        assert!(sink.take().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn export_requires_a_result_and_valid_index() {
        let sink = MemorySink::new();
        let orch = orchestrator(capture(vec![]));

        let empty = Arc::new(SessionHandle::new());
        let task = orch.export_one(&empty, 0, &sink).await;
        assert!(matches!(task.cause, Some(PortError::NoResult)));

        let session = ready_session("c").await;
        let task = orch.export_one(&session, 6, &sink).await;
        assert!(matches!(
            task.cause,
            Some(PortError::IndexOutOfRange { index: 6, len: 6 })
        ));
        let state = session.snapshot().await;
        assert!(state.active_download_index().is_none());
        assert!(state.exports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_export_clears_marker() {
        let session = ready_session("c").await;
        let orch = Arc::new(orchestrator(capture(vec![])));
        let sink = Arc::new(MemorySink::new());

        let handle = {
            let (session, orch, sink) = (session.clone(), orch.clone(), sink.clone());
            tokio::spawn(async move { orch.export_one(&session, 1, sink.as_ref()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.snapshot().await.active_download_index(), Some(1));

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        let state = session.snapshot().await;
        assert!(state.active_download_index().is_none());
        assert!(state.exports().is_empty());
        assert!(sink.take().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_export_is_listed_as_pending() {
        let session = ready_session("c").await;
        let orch = Arc::new(orchestrator(capture(vec![])));
        let sink = Arc::new(MemorySink::new());

        let mut handles = Vec::new();
        for idx in [0, 4] {
            let (session, orch, sink) = (session.clone(), orch.clone(), sink.clone());
            handles.push(tokio::spawn(async move {
                orch.export_one(&session, idx, sink.as_ref()).await
            }));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let state = session.snapshot().await;
        let listed: Vec<(usize, ExportStatus)> = state
            .exports()
            .iter()
            .map(|t| (t.card_index, t.status))
            .collect();
        assert_eq!(
            listed,
            vec![(0, ExportStatus::Capturing), (4, ExportStatus::Pending)]
        );

        for h in handles {
            assert_eq!(h.await.unwrap().status, ExportStatus::Succeeded);
        }
        assert!(session.snapshot().await.exports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn batch_is_sequential_and_isolates_failures() {
        let session = ready_session("c").await;
        let sink = MemorySink::new();
        let recorder = capture(vec![2]);
        let report = orchestrator(recorder.clone()).export_all(&session, &sink).await;

        assert_eq!(report.tasks.len(), 6);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.failed, 1);
        assert_eq!(report.tasks[2].status, ExportStatus::Failed);

        let spans = recorder.spans.lock().unwrap().clone();
        let order: Vec<usize> = spans.iter().map(|(i, _, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
        for pair in spans.windows(2) {
            let (_, _, prev_end) = pair[0];
            let (_, next_start, _) = pair[1];
            assert!(next_start >= prev_end + Duration::from_millis(800));
        }

        let names: Vec<String> = sink.take().await.into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| !n.ends_with("-3.png")));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_exports_never_overlap() {
        let session = ready_session("c").await;
        let recorder = capture(vec![]);
        let orch = Arc::new(orchestrator(recorder.clone()));
        let sink = Arc::new(MemorySink::new());

        let mut handles = Vec::new();
        for idx in 0..3 {
            let (session, orch, sink) = (session.clone(), orch.clone(), sink.clone());
            handles.push(tokio::spawn(async move {
                orch.export_one(&session, idx, sink.as_ref()).await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().status, ExportStatus::Succeeded);
        }

        let mut spans = recorder.spans.lock().unwrap().clone();
        spans.sort_by_key(|(_, start, _)| *start);
        for pair in spans.windows(2) {
            assert!(pair[1].1 >= pair[0].2);
        }
    }
}
