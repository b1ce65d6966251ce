//! services/studio/src/adapters/fonts.rs
//!
//! Loads the font database used by the rasterizer. Loading scans the system
//! font directories and can take a while, so it runs on a blocking thread and
//! captures wait on [`FontLibrary::ready`] instead of blocking startup.

use mihrab_core::ports::{PortError, PortResult};
use resvg::usvg::fontdb;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct FontLibrary {
    family: String,
    /// Holds `None` until loading finishes. The sender is shared with the
    /// loading task so the channel stays open for late waiters.
    database: Arc<watch::Sender<Option<Arc<fontdb::Database>>>>,
}

impl FontLibrary {
    /// Starts loading system fonts plus the fonts in `fonts_dir`, if given.
    pub fn load(fonts_dir: Option<PathBuf>, family: String) -> Self {
        let (tx, _) = watch::channel(None);
        let database = Arc::new(tx);
        let slot = database.clone();
        let pinned = family.clone();
        tokio::task::spawn_blocking(move || {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            if let Some(dir) = &fonts_dir {
                if dir.is_dir() {
                    db.load_fonts_dir(dir);
                } else {
                    warn!(dir = %dir.display(), "FONTS_DIR is not a directory; skipping.");
                }
            }
            db.set_sans_serif_family(pinned.as_str());
            let has_family = db.faces().any(|face| {
                face.families.iter().any(|(name, _)| name == &pinned)
            });
            if !has_family {
                warn!(family = %pinned, "Pinned font family not found; text will use fallbacks.");
            }
            info!(faces = db.len(), "Font database loaded.");
            slot.send_replace(Some(Arc::new(db)));
        });
        Self { family, database }
    }

    /// A library that is ready immediately with the given database.
    pub fn from_database(db: fontdb::Database, family: String) -> Self {
        let (tx, _) = watch::channel(Some(Arc::new(db)));
        Self {
            family,
            database: Arc::new(tx),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Waits until the font database is loaded.
    pub async fn ready(&self) -> PortResult<Arc<fontdb::Database>> {
        let mut rx = self.database.subscribe();
        let loaded = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| PortError::CaptureFailed("font loading did not complete".to_string()))?;
        (*loaded)
            .clone()
            .ok_or_else(|| PortError::CaptureFailed("font database unavailable".to_string()))
    }
}
