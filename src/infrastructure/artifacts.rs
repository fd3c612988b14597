//! Filesystem model persistence.

use crate::domain::ports::ModelArtifactStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Single-file store. Writes go to a sibling temp file first and are
/// renamed into place, so concurrent readers never see a torn artifact.
pub struct FsModelArtifactStore {
    path: PathBuf,
}

impl FsModelArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl ModelArtifactStore for FsModelArtifactStore {
    async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create model directory")?;
            }
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, bytes)
            .await
            .context("Failed to write model temp file")?;
        fs::rename(&tmp, &self.path)
            .await
            .context("Failed to move model into place")?;
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).context("Failed to read model artifact"),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
