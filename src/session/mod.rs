//! Per-viewer chat session: the conversation log plus the streaming state
//! machine that fills in assistant replies one delta per tick.
//!
//! ```text
//! IDLE --submit--> ACTIVE --tick (delta)--> ACTIVE
//!                  ACTIVE --tick (exhausted | error)--> IDLE
//! ```
//!
//! The owner of the session (the render loop) calls [`ChatSession::tick`]
//! repeatedly while [`ChatSession::is_streaming`] is true and redraws the
//! log after every call.

mod rating;
#[cfg(test)]
pub(crate) mod test_support;

use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::sync::Arc;
use thiserror::Error;

pub use self::rating::RateOutcome;
use crate::dataset::{ DatasetError, DatasetStore, DEFAULT_DATA_SAMPLE_SIZE };
use crate::history::{ ConversationError, ConversationLog, DEFAULT_CONTEXT_SIZE };
use crate::llm::chat::{ ChatClient, ChatError, Delta, DeltaStream };
use crate::llm::GenerationParams;
use crate::models::chat::{ ChatMessage, PromptMessage };

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a response is still streaming")]
    AlreadyStreaming,
    #[error("cannot rate while a response is still streaming")]
    StillStreaming,
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error("failed to save rated sample: {0}")]
    Dataset(#[from] DatasetError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Messages preceding the request that are sent as context.
    pub context_size: usize,
    /// Messages persisted per rated sample.
    pub data_sample_size: usize,
    pub generation: GenerationParams,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            context_size: DEFAULT_CONTEXT_SIZE,
            data_sample_size: DEFAULT_DATA_SAMPLE_SIZE,
            generation: GenerationParams::default(),
        }
    }
}

/// Result of a single [`ChatSession::tick`].
#[derive(Debug)]
pub enum TickOutcome {
    /// No response is streaming.
    Idle,
    /// A text delta was appended to the last message.
    Applied,
    /// The stream produced an event without text.
    Empty,
    /// The stream is exhausted; the session is idle again.
    Finished,
    /// The stream failed to open or broke off; partial content is kept.
    Failed(SessionError),
}

impl TickOutcome {
    pub fn changed_log(&self) -> bool {
        matches!(self, TickOutcome::Applied)
    }

    pub fn ended_stream(&self) -> bool {
        matches!(self, TickOutcome::Finished | TickOutcome::Failed(_))
    }
}

struct BoundStream {
    index: usize,
    deltas: DeltaStream,
}

pub struct ChatSession {
    chat_log: ConversationLog,
    streaming_idx: Option<usize>,
    rating: Option<bool>,
    is_copying: bool,
    stream: Option<BoundStream>,
    client: Arc<dyn ChatClient>,
    dataset: Arc<dyn DatasetStore>,
    settings: SessionSettings,
}

impl ChatSession {
    pub fn new(
        client: Arc<dyn ChatClient>,
        dataset: Arc<dyn DatasetStore>,
        settings: SessionSettings
    ) -> Self {
        Self {
            chat_log: ConversationLog::new(),
            streaming_idx: None,
            rating: None,
            is_copying: false,
            stream: None,
            client,
            dataset,
            settings,
        }
    }

    pub fn chat_log(&self) -> &ConversationLog {
        &self.chat_log
    }

    /// Index of the user message whose reply is streaming, if any.
    pub fn streaming_index(&self) -> Option<usize> {
        self.streaming_idx
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_idx.is_some()
    }

    pub fn rating(&self) -> Option<bool> {
        self.rating
    }

    pub fn is_copying(&self) -> bool {
        self.is_copying
    }

    /// Records the user's message and an empty assistant placeholder, and
    /// marks the user message as awaiting a streamed reply. Returns the
    /// user message's index.
    pub fn submit(&mut self, user_text: impl Into<String>) -> Result<usize, SessionError> {
        if self.is_streaming() {
            return Err(SessionError::AlreadyStreaming);
        }
        let index = self.chat_log.append(ChatMessage::user(user_text));
        self.streaming_idx = Some(index);
        self.chat_log.append(ChatMessage::placeholder());
        self.rating = None;
        debug!("Submitted message {}; awaiting reply", index);
        Ok(index)
    }

    /// Advances the active stream by exactly one event.
    pub async fn tick(&mut self) -> TickOutcome {
        let Some(index) = self.streaming_idx else {
            return TickOutcome::Idle;
        };

        let mut bound = match self.stream.take() {
            Some(bound) if bound.index == index => bound,
            stale => {
                if let Some(stale) = stale {
                    warn!("Dropping stream bound to message {} before opening {}", stale.index, index);
                }
                let context = self.request_context(index);
                debug!("Opening stream for message {} with {} context messages", index, context.len());
                let client = Arc::clone(&self.client);
                match client.stream_chat(context, self.settings.generation).await {
                    Ok(deltas) => BoundStream { index, deltas },
                    Err(e) => {
                        error!("Failed to open completion stream for message {}: {}", index, e);
                        return self.fail(e.into());
                    }
                }
            }
        };

        match bound.deltas.next().await {
            None => {
                self.streaming_idx = None;
                info!(
                    "Finished streaming reply to message {} ({} chars)",
                    index,
                    self.chat_log.last().map(|m| m.content.len()).unwrap_or(0)
                );
                TickOutcome::Finished
            }
            Some(Err(e)) => {
                error!("Completion stream for message {} broke off: {}", index, e);
                self.fail(e.into())
            }
            Some(Ok(Delta { content: None })) => {
                self.stream = Some(bound);
                TickOutcome::Empty
            }
            Some(Ok(Delta { content: Some(text) })) => {
                match self.chat_log.replace_last_with_appended_content(&text) {
                    Ok(_) => {
                        self.stream = Some(bound);
                        TickOutcome::Applied
                    }
                    Err(e) => {
                        error!("Cannot apply delta for message {}: {}", index, e);
                        self.fail(e.into())
                    }
                }
            }
        }
    }

    fn request_context(&self, index: usize) -> Vec<PromptMessage> {
        self.chat_log
            .window(index, self.settings.context_size)
            .iter()
            .map(ChatMessage::to_prompt)
            .collect()
    }

    fn fail(&mut self, error: SessionError) -> TickOutcome {
        self.streaming_idx = None;
        self.stream = None;
        TickOutcome::Failed(error)
    }
}
