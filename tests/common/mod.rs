#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use olier_chat::llm::chat::{ ChatClient, ChatError, Delta, DeltaStream };
use olier_chat::llm::GenerationParams;
use olier_chat::models::chat::PromptMessage;

/// Streams the same canned reply for every request, optionally breaking
/// off with a stream error after the last piece.
pub struct CannedClient {
    pub pieces: Vec<&'static str>,
    pub break_off: bool,
}

impl CannedClient {
    pub fn replying(pieces: Vec<&'static str>) -> Self {
        Self { pieces, break_off: false }
    }

    pub fn breaking_off(pieces: Vec<&'static str>) -> Self {
        Self { pieces, break_off: true }
    }
}

#[async_trait]
impl ChatClient for CannedClient {
    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        Ok(vec!["canned".to_string()])
    }

    async fn stream_chat(
        &self,
        _messages: Vec<PromptMessage>,
        _params: GenerationParams
    ) -> Result<DeltaStream, ChatError> {
        let mut events: Vec<Result<Delta, ChatError>> = self.pieces
            .iter()
            .map(|p| Ok(Delta::text(*p)))
            .collect();
        if self.break_off {
            events.push(Err(ChatError::Stream("connection reset".to_string())));
        }
        Ok(Box::pin(stream::iter(events)))
    }
}
