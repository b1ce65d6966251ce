//! crates/mihrab_core/src/generation.rs
//!
//! The asynchronous generation flow: start a generation on a session, rotate
//! the loading message while the provider works, and settle the outcome.

use crate::ports::{ContentProvider, PortError};
use crate::session::{GenerationTicket, SessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// How a call to [`generate`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Topic empty or a generation already running; nothing happened.
    Ignored,
    Ready,
    Failed(PortError),
    /// The session was reset while the provider was working.
    Superseded,
}

/// Rotates the loading message of a session until dropped.
///
/// The task is aborted in `Drop`, so it stops on every exit path of the
/// generation, including errors, panics and cancellation of the future.
pub struct LoadingTicker {
    task: JoinHandle<()>,
}

impl LoadingTicker {
    pub fn start(session: Arc<SessionHandle>, ticket: GenerationTicket, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if !session.state.lock().await.advance_loading(ticket) {
                    break;
                }
            }
        });
        Self { task }
    }
}

impl Drop for LoadingTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs one generation for the session's current topic.
pub async fn generate(
    session: Arc<SessionHandle>,
    provider: &dyn ContentProvider,
    rotation_period: Duration,
) -> GenerationOutcome {
    let (ticket, topic) = {
        let mut state = session.state.lock().await;
        match state.begin_generation() {
            Some(ticket) => (ticket, state.topic().to_string()),
            None => return GenerationOutcome::Ignored,
        }
    };
    info!(session_id = %session.id, %topic, "Generation started.");

    let ticker = LoadingTicker::start(session.clone(), ticket, rotation_period);
    let outcome = provider.generate(&topic).await;
    drop(ticker);

    if let Err(e) = &outcome {
        error!(session_id = %session.id, error = %e, "Generation failed.");
    }
    let failure = outcome.as_ref().err().cloned();

    let mut state = session.state.lock().await;
    if !state.complete_generation(ticket, outcome) {
        return GenerationOutcome::Superseded;
    }
    match failure.or_else(|| state.last_error().cloned()) {
        Some(e) => GenerationOutcome::Failed(e),
        None => GenerationOutcome::Ready,
    }
}
