//! crates/mihrab_core/src/session.rs
//!
//! The per-session state machine. Every mutation goes through a named
//! transition so the lifecycle `Idle → Editing → Generating → Ready | Failed`
//! can be enforced and tested without any web framework.

use crate::domain::{GenerationResult, Theme};
use crate::export::{ExportStatus, ExportTask};
use crate::ports::{PortError, PortResult};
use crate::themes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cosmetic messages rotated while a generation is in flight.
pub const LOADING_MESSAGES: [&str; 4] = [
    "جاري تصميم المحراب الرقمي...",
    "تنسيق الزخارف الفضية...",
    "تجهيز بطاقات المعلومات...",
    "وضع اللمسات الروحانية الأخيرة...",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Editing,
    Generating,
    Ready,
    Failed,
}

/// Errors raised by transitions that are not allowed in the current status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Unknown theme: {0}")]
    UnknownTheme(String),
    #[error("The topic cannot change while {0:?}")]
    TopicLocked(SessionStatus),
}

/// Proof that a generation was started; required to report its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    epoch: u64,
}

/// The state of one browser session.
#[derive(Debug, Clone)]
pub struct SessionState {
    topic: String,
    selected_theme: &'static Theme,
    generation_result: Option<GenerationResult>,
    /// Exports that have been requested and not yet finished, in request order.
    exports: Vec<ExportTask>,
    last_error: Option<PortError>,
    loading_step: usize,
    epoch: u64,
    in_flight: Option<u64>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            topic: String::new(),
            selected_theme: themes::default_theme(),
            generation_result: None,
            exports: Vec::new(),
            last_error: None,
            loading_step: 0,
            epoch: 0,
            in_flight: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.in_flight.is_some() {
            SessionStatus::Generating
        } else if self.generation_result.is_some() {
            SessionStatus::Ready
        } else if self.last_error.is_some() {
            SessionStatus::Failed
        } else if self.topic.trim().is_empty() {
            SessionStatus::Idle
        } else {
            SessionStatus::Editing
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn selected_theme(&self) -> &'static Theme {
        self.selected_theme
    }

    pub fn generation_result(&self) -> Option<&GenerationResult> {
        self.generation_result.as_ref()
    }

    /// The card currently being captured, if any.
    pub fn active_download_index(&self) -> Option<usize> {
        self.exports
            .iter()
            .find(|t| t.status == ExportStatus::Capturing)
            .map(|t| t.card_index)
    }

    /// Unfinished exports: at most one `Capturing`, the rest `Pending`.
    pub fn exports(&self) -> &[ExportTask] {
        &self.exports
    }

    pub fn last_error(&self) -> Option<&PortError> {
        self.last_error.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The loading message to display, only while generating.
    pub fn loading_message(&self) -> Option<&'static str> {
        self.in_flight
            .map(|_| LOADING_MESSAGES[self.loading_step % LOADING_MESSAGES.len()])
    }

    //-------------------------------------------------------------------------------------
    // Transitions
    //-------------------------------------------------------------------------------------

    /// Edits the topic. Allowed only from the form (no result, not generating).
    pub fn set_topic(&mut self, topic: impl Into<String>) -> Result<(), TransitionError> {
        match self.status() {
            SessionStatus::Generating | SessionStatus::Ready => {
                Err(TransitionError::TopicLocked(self.status()))
            }
            _ => {
                self.topic = topic.into();
                Ok(())
            }
        }
    }

    pub fn select_theme(&mut self, name: &str) -> Result<&'static Theme, TransitionError> {
        let theme =
            themes::find(name).ok_or_else(|| TransitionError::UnknownTheme(name.to_string()))?;
        self.selected_theme = theme;
        Ok(theme)
    }

    /// Enters `Generating`. Returns `None` (and changes nothing) when the topic
    /// is empty or a generation is already running.
    pub fn begin_generation(&mut self) -> Option<GenerationTicket> {
        if self.topic.trim().is_empty() {
            debug!("Generation ignored: empty topic.");
            return None;
        }
        if self.in_flight.is_some() {
            debug!("Generation ignored: already generating.");
            return None;
        }
        self.epoch += 1;
        self.in_flight = Some(self.epoch);
        self.generation_result = None;
        self.last_error = None;
        self.loading_step = 0;
        Some(GenerationTicket { epoch: self.epoch })
    }

    /// Rotates the loading message. Stale tickets are ignored.
    pub fn advance_loading(&mut self, ticket: GenerationTicket) -> bool {
        if self.in_flight != Some(ticket.epoch) {
            return false;
        }
        self.loading_step = (self.loading_step + 1) % LOADING_MESSAGES.len();
        true
    }

    /// Settles a generation. Returns `false` when the ticket was superseded by
    /// a reset or a newer generation, in which case nothing changes.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        outcome: PortResult<GenerationResult>,
    ) -> bool {
        if self.in_flight != Some(ticket.epoch) {
            warn!(
                epoch = ticket.epoch,
                current = self.epoch,
                "Discarding a superseded generation response."
            );
            return false;
        }
        self.in_flight = None;
        match outcome {
            Ok(result) if !result.is_empty() => {
                info!(
                    collection = result.collection_name(),
                    cards = result.len(),
                    "Generation ready."
                );
                self.generation_result = Some(result);
            }
            Ok(_) => {
                self.last_error = Some(PortError::MalformedResponse(
                    "response contained no parts".to_string(),
                ));
            }
            Err(e) => {
                self.last_error = Some(e);
            }
        }
        true
    }

    /// Returns to `Idle`: clears the result, topic and error, and orphans any
    /// generation still in flight.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.in_flight = None;
        self.generation_result = None;
        self.topic.clear();
        self.last_error = None;
        self.loading_step = 0;
    }

    /// Records a requested export as `Pending`.
    pub fn queue_export(&mut self, task: ExportTask) {
        self.exports.push(task);
    }

    /// Moves a queued export to `Capturing`.
    pub fn mark_download(&mut self, task_id: Uuid) {
        if let Some(task) = self.exports.iter_mut().find(|t| t.id == task_id) {
            task.status = ExportStatus::Capturing;
        }
    }

    /// Forgets a queued or capturing export. Unknown ids are ignored.
    pub fn clear_download(&mut self, task_id: Uuid) {
        self.exports.retain(|t| t.id != task_id);
    }
}

//=========================================================================================
// SessionHandle & SessionRegistry
//=========================================================================================

/// A session shared between request handlers and background tasks.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: Uuid,
    pub state: Mutex<SessionState>,
    /// Held for the duration of one card export so captures never overlap.
    pub export_lane: Mutex<()>,
    /// Unix milliseconds of the last lookup.
    last_touched: AtomicI64,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState::new()),
            export_lane: Mutex::new(()),
            last_touched: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// A consistent copy of the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub fn touch(&self) {
        self.last_touched
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// True while a generation or an export is running, or the state is locked.
    fn is_busy(&self) -> bool {
        if self.export_lane.try_lock().is_err() {
            return true;
        }
        match self.state.try_lock() {
            Ok(state) => state.is_generating() || !state.exports().is_empty(),
            Err(_) => true,
        }
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory sessions keyed by id. Nothing is persisted.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new());
        self.sessions
            .write()
            .await
            .insert(handle.id, handle.clone());
        info!(session_id = %handle.id, "Session created.");
        handle
    }

    /// Looks a session up and marks it as recently used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.read().await.get(&id).cloned()?;
        handle.touch();
        Some(handle)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions unused for longer than `max_idle`.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<Uuid> {
        self.evict_idle_at(Utc::now(), max_idle).await
    }

    /// Drops sessions last used before `now - max_idle`. Sessions with a
    /// generation or an export in flight are kept.
    pub async fn evict_idle_at(&self, now: DateTime<Utc>, max_idle: Duration) -> Vec<Uuid> {
        let max_idle_ms = i64::try_from(max_idle.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.timestamp_millis().saturating_sub(max_idle_ms);
        let mut sessions = self.sessions.write().await;
        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|h| h.last_touched.load(Ordering::Relaxed) < cutoff && !h.is_busy())
            .map(|h| h.id)
            .collect();
        for id in &expired {
            sessions.remove(id);
            info!(session_id = %id, "Idle session evicted.");
        }
        expired
    }
}

/// Runs [`SessionRegistry::evict_idle`] every `every` until the task is aborted.
pub fn spawn_eviction(
    registry: Arc<SessionRegistry>,
    max_idle: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = registry.evict_idle(max_idle).await;
            if !evicted.is_empty() {
                let remaining = registry.len().await;
                debug!(evicted = evicted.len(), remaining, "Session sweep done.");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CardContent;

    fn result(n: usize) -> GenerationResult {
        let parts = (0..n)
            .map(|i| CardContent {
                title: format!("t{i}"),
                hook: "h".to_string(),
                bullet_points: vec!["a".into(), "b".into(), "c".into()],
                closing_line: "c".to_string(),
            })
            .collect();
        GenerationResult::new("collection", parts).unwrap()
    }

    #[test]
    fn status_follows_topic_edits() {
        let mut s = SessionState::new();
        assert_eq!(s.status(), SessionStatus::Idle);
        s.set_topic("سورة الكهف").unwrap();
        assert_eq!(s.status(), SessionStatus::Editing);
        s.set_topic("   ").unwrap();
        assert_eq!(s.status(), SessionStatus::Idle);
    }

    #[test]
    fn empty_topic_does_not_start_generation() {
        let mut s = SessionState::new();
        assert!(s.begin_generation().is_none());
        assert_eq!(s.status(), SessionStatus::Idle);
    }

    #[test]
    fn reentrant_generation_is_ignored() {
        let mut s = SessionState::new();
        s.set_topic("x").unwrap();
        let first = s.begin_generation().unwrap();
        assert!(s.begin_generation().is_none());
        assert_eq!(s.status(), SessionStatus::Generating);
        assert!(s.complete_generation(first, Ok(result(6))));
        assert_eq!(s.status(), SessionStatus::Ready);
    }

    #[test]
    fn failure_records_error_and_allows_retry() {
        let mut s = SessionState::new();
        s.set_topic("x").unwrap();
        let ticket = s.begin_generation().unwrap();
        s.complete_generation(ticket, Err(PortError::ProviderUnavailable("503".into())));
        assert_eq!(s.status(), SessionStatus::Failed);
        assert!(s.generation_result().is_none());

        let retry = s.begin_generation().unwrap();
        assert!(s.last_error().is_none());
        assert_eq!(s.status(), SessionStatus::Generating);
        s.complete_generation(retry, Ok(result(6)));
        assert_eq!(s.status(), SessionStatus::Ready);
    }

    #[test]
    fn late_response_after_reset_is_discarded() {
        let mut s = SessionState::new();
        s.set_topic("x").unwrap();
        let ticket = s.begin_generation().unwrap();
        s.reset();
        assert!(!s.complete_generation(ticket, Ok(result(6))));
        assert!(s.generation_result().is_none());
        assert_eq!(s.status(), SessionStatus::Idle);
        assert!(!s.advance_loading(ticket));
    }

    #[test]
    fn reset_clears_result_topic_and_error() {
        let mut s = SessionState::new();
        s.set_topic("x").unwrap();
        let ticket = s.begin_generation().unwrap();
        s.complete_generation(ticket, Ok(result(6)));
        assert!(s.set_topic("y").is_err());
        s.reset();
        assert_eq!(s.status(), SessionStatus::Idle);
        assert_eq!(s.topic(), "");
        assert!(s.last_error().is_none());
        assert!(s.generation_result().is_none());
    }

    #[test]
    fn loading_message_rotates_only_while_generating() {
        let mut s = SessionState::new();
        assert!(s.loading_message().is_none());
        s.set_topic("x").unwrap();
        let ticket = s.begin_generation().unwrap();
        assert_eq!(s.loading_message(), Some(LOADING_MESSAGES[0]));
        for _ in 0..LOADING_MESSAGES.len() + 1 {
            s.advance_loading(ticket);
        }
        assert_eq!(s.loading_message(), Some(LOADING_MESSAGES[1]));
    }

    #[test]
    fn unknown_theme_is_rejected() {
        let mut s = SessionState::new();
        assert!(s.select_theme("nope").is_err());
        let theme = s.select_theme("الأسود الفيروزي").unwrap();
        assert_eq!(s.selected_theme(), theme);
    }

    #[tokio::test]
    async fn registry_creates_and_removes_sessions() {
        let registry = SessionRegistry::new();
        let handle = registry.create().await;
        assert!(registry.get(handle.id).await.is_some());
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(handle.id).await);
        assert!(registry.get(handle.id).await.is_none());
    }

    #[test]
    fn export_queue_tracks_pending_and_capturing() {
        let mut s = SessionState::new();
        let first = ExportTask::new(0);
        let second = ExportTask::new(3);
        let (first_id, second_id) = (first.id, second.id);
        s.queue_export(first);
        s.queue_export(second);
        assert!(s.active_download_index().is_none());

        s.mark_download(first_id);
        assert_eq!(s.active_download_index(), Some(0));
        assert_eq!(s.exports()[1].status, ExportStatus::Pending);

        s.clear_download(first_id);
        assert!(s.active_download_index().is_none());
        assert_eq!(s.exports().len(), 1);
        s.clear_download(second_id);
        s.clear_download(second_id);
        assert!(s.exports().is_empty());
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let registry = SessionRegistry::new();
        let stale = registry.create().await;
        let later = Utc::now() + chrono::Duration::hours(2);

        let evicted = registry
            .evict_idle_at(later, Duration::from_secs(3600))
            .await;
        assert_eq!(evicted, vec![stale.id]);
        assert!(registry.get(stale.id).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn recently_used_sessions_are_kept() {
        let registry = SessionRegistry::new();
        let handle = registry.create().await;
        let soon = Utc::now() + chrono::Duration::minutes(10);

        assert!(registry
            .evict_idle_at(soon, Duration::from_secs(3600))
            .await
            .is_empty());
        assert!(registry.get(handle.id).await.is_some());
    }

    #[tokio::test]
    async fn busy_sessions_are_not_evicted() {
        let registry = SessionRegistry::new();
        let exporting = registry.create().await;
        let generating = registry.create().await;
        {
            let mut state = generating.state.lock().await;
            state.set_topic("x").unwrap();
            state.begin_generation().unwrap();
        }
        let later = Utc::now() + chrono::Duration::hours(2);

        let _lane = exporting.export_lane.lock().await;
        assert!(registry
            .evict_idle_at(later, Duration::from_secs(3600))
            .await
            .is_empty());
        assert_eq!(registry.len().await, 2);
    }
}
