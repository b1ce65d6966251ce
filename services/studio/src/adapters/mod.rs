pub mod fonts;
pub mod gemini;
pub mod raster;
pub mod sanitize;
pub mod sink;

pub use fonts::FontLibrary;
pub use gemini::{CredentialSlot, GeminiContentAdapter};
pub use raster::ResvgCaptureAdapter;
pub use sink::DirectorySink;
