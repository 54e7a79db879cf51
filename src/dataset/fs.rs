use async_trait::async_trait;
use log::{ debug, info };
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{ sample_stem, DatasetError, DatasetStore, Label };
use crate::models::chat::ChatMessage;

/// Stores samples as JSON files under `<root>/good` and `<root>/bad`.
pub struct FsDatasetStore {
    root: PathBuf,
}

impl FsDatasetStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn partition_dir(&self, label: Label) -> PathBuf {
        self.root.join(label.partition())
    }

    fn io_error(path: &Path, source: std::io::Error) -> DatasetError {
        DatasetError::Io { path: path.to_path_buf(), source }
    }
}

#[async_trait]
impl DatasetStore for FsDatasetStore {
    async fn write_sample(
        &self,
        label: Label,
        messages: &[ChatMessage]
    ) -> Result<PathBuf, DatasetError> {
        let first = messages.first().ok_or(DatasetError::EmptySample)?;
        let dir = self.partition_dir(label);
        fs::create_dir_all(&dir).await.map_err(|e| Self::io_error(&dir, e))?;

        let payload = serde_json::to_vec_pretty(messages)?;
        let stem = sample_stem(first);

        // Never overwrite an earlier sample sharing the same first timestamp.
        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}__{}.json", stem, attempt)
            };
            let path = dir.join(name);

            let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Sample {} exists, trying next suffix", path.display());
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    return Err(Self::io_error(&path, e));
                }
            };

            file.write_all(&payload).await.map_err(|e| Self::io_error(&path, e))?;
            file.sync_all().await.map_err(|e| Self::io_error(&path, e))?;

            info!("Wrote {} sample with {} messages to {}", label.partition(), messages.len(), path.display());
            return Ok(path);
        }
    }
}
