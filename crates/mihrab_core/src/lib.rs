//! crates/mihrab_core/src/lib.rs
//!
//! Domain core of the Mihrab infographic studio: themes, the card renderer,
//! the session state machine, and the generation and export flows. Everything
//! external is reached through the traits in [`ports`].

pub mod domain;
pub mod export;
pub mod generation;
pub mod ports;
pub mod render;
pub mod session;
pub mod themes;

pub use domain::{CapturedImage, CardContent, GenerationResult, Theme};
pub use export::{BatchReport, ExportOrchestrator, ExportSettings, ExportStatus, ExportTask};
pub use ports::{CaptureService, ContentProvider, ImageSink, PortError, PortResult};
pub use render::{CardStage, RenderMode};
pub use session::{SessionHandle, SessionRegistry, SessionState, SessionStatus};
