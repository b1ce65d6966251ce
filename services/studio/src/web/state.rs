//! services/studio/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::CredentialSlot;
use crate::config::Config;
use mihrab_core::{
    export::ExportOrchestrator,
    ports::{ContentProvider, ImageSink},
    session::SessionRegistry,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
    pub provider: Arc<dyn ContentProvider>,
    pub exporter: Arc<ExportOrchestrator>,
    /// Destination of the export endpoints that write to disk.
    pub export_sink: Arc<dyn ImageSink>,
    /// The key used by the provider; replaced by `PUT /settings/api-key`.
    pub credential: CredentialSlot,
}
