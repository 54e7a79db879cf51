mod fs;

use async_trait::async_trait;
use log::info;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use thiserror::Error;

use crate::models::chat::ChatMessage;

pub use self::fs::FsDatasetStore;

/// Messages persisted per rated exchange: 3 user/assistant exchanges.
pub const DEFAULT_DATA_SAMPLE_SIZE: usize = 6;

const SAMPLE_PREFIX: &str = "chat_log__";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("refusing to write an empty sample")]
    EmptySample,
    #[error("dataset IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode sample: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Good,
    Bad,
}

impl Label {
    pub fn from_thumbs_up(thumbs_up: bool) -> Self {
        if thumbs_up { Label::Good } else { Label::Bad }
    }

    pub fn partition(&self) -> &'static str {
        match self {
            Label::Good => "good",
            Label::Bad => "bad",
        }
    }
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Durably writes one labelled sample and returns where it was stored.
    async fn write_sample(
        &self,
        label: Label,
        messages: &[ChatMessage]
    ) -> Result<PathBuf, DatasetError>;
}

/// `chat_log__<first timestamp>` with `:` made filesystem safe.
pub fn sample_stem(first: &ChatMessage) -> String {
    format!("{}{}", SAMPLE_PREFIX, first.iso_timestamp().replace(':', "-"))
}

pub fn create_dataset_store(root: &Path) -> Arc<dyn DatasetStore> {
    info!("Rated samples will be stored under: {}", root.display());
    Arc::new(FsDatasetStore::new(root))
}
