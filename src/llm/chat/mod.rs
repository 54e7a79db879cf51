pub mod openai;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use super::{ GenerationParams, LlmConfig };
use self::openai::OpenAIChatClient;
use crate::models::chat::PromptMessage;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request to completion endpoint failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion endpoint returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("completion endpoint offers no models")]
    NoModels,
    #[error("invalid endpoint configuration: {0}")]
    Config(String),
    #[error("completion stream failed: {0}")]
    Stream(String),
}

/// One incremental event of a streamed completion.
///
/// `content` is `None` for role-only or empty chunks; such events carry no
/// text but do not end the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub content: Option<String>,
}

impl Delta {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()) }
    }

    pub fn empty() -> Self {
        Self { content: None }
    }
}

/// Lazy, finite, forward-only sequence of deltas. Exhaustion ends the stream.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<Delta, ChatError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Model identifiers offered by the endpoint, in endpoint order.
    async fn list_models(&self) -> Result<Vec<String>, ChatError>;

    /// Opens a completion stream over `messages` with a single candidate.
    async fn stream_chat(
        &self,
        messages: Vec<PromptMessage>,
        params: GenerationParams
    ) -> Result<DeltaStream, ChatError>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
