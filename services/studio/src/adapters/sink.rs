//! services/studio/src/adapters/sink.rs
//!
//! Writes exported images into a directory on disk.

use async_trait::async_trait;
use mihrab_core::{
    domain::CapturedImage,
    ports::{ImageSink, PortError, PortResult},
};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageSink for DirectorySink {
    async fn save(&self, file_name: &str, image: &CapturedImage) -> PortResult<()> {
        // File names are generated, but never let one escape the directory.
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(PortError::Unexpected(format!(
                "refusing to write file name {file_name:?}"
            )));
        }
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            PortError::CaptureFailed(format!("cannot create {}: {e}", self.dir.display()))
        })?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &image.png)
            .await
            .map_err(|e| PortError::CaptureFailed(format!("cannot write {}: {e}", path.display())))?;
        debug!(path = %path.display(), bytes = image.png.len(), "Image written.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> CapturedImage {
        CapturedImage {
            width: 1,
            height: 1,
            png: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn writes_into_a_created_directory() {
        let dir = std::env::temp_dir().join(format!("mihrab-sink-{}", uuid::Uuid::new_v4()));
        let sink = DirectorySink::new(&dir);
        sink.save("AlMihrab-test-1.png", &image()).await.unwrap();

        let written = tokio::fs::read(dir.join("AlMihrab-test-1.png")).await.unwrap();
        assert_eq!(written, vec![1, 2, 3]);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let sink = DirectorySink::new(std::env::temp_dir());
        assert!(sink.save("../escape.png", &image()).await.is_err());
        assert!(sink.save("a/b.png", &image()).await.is_err());
    }
}
