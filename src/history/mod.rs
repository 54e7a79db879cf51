use crate::models::chat::ChatMessage;
use thiserror::Error;

/// Prior messages submitted alongside a request: 3 user/assistant exchanges.
pub const DEFAULT_CONTEXT_SIZE: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("cannot append content: conversation log is empty")]
    EmptyLog,
}

/// Ordered, append-only record of the conversation.
///
/// Only the last element may be replaced, and only with a content-appended
/// version of itself.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn replace_last_with_appended_content(
        &mut self,
        delta: &str
    ) -> Result<&ChatMessage, ConversationError> {
        let last = self.messages.last_mut().ok_or(ConversationError::EmptyLog)?;
        *last = last.append(delta);
        Ok(last)
    }

    /// Messages `[end_index - size, end_index]`, clamped to the log bounds.
    pub fn window(&self, end_index: usize, size: usize) -> &[ChatMessage] {
        if self.messages.is_empty() {
            return &[];
        }
        let end = end_index.min(self.messages.len() - 1);
        let start = end.saturating_sub(size);
        &self.messages[start..=end]
    }

    pub fn tail(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Plain-text transcript for the copy view.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
