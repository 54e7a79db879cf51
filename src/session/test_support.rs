use async_trait::async_trait;
use futures::stream;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{ AtomicUsize, Ordering };

use crate::dataset::{ DatasetError, DatasetStore, Label };
use crate::llm::chat::{ ChatClient, ChatError, Delta, DeltaStream };
use crate::llm::GenerationParams;
use crate::models::chat::{ ChatMessage, PromptMessage };

/// Replays the same scripted events for every stream it opens.
pub struct FakeChatClient {
    script: Vec<Result<Delta, String>>,
    fail_open: bool,
    opened: AtomicUsize,
    requests: Mutex<Vec<Vec<PromptMessage>>>,
}

impl FakeChatClient {
    pub fn scripted(script: Vec<Result<Delta, String>>) -> Self {
        Self {
            script,
            fail_open: false,
            opened: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(pieces: &[&str]) -> Self {
        Self::scripted(pieces.iter().map(|p| Ok(Delta::text(*p))).collect())
    }

    pub fn failing_open() -> Self {
        Self { fail_open: true, ..Self::scripted(Vec::new()) }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<PromptMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        Ok(vec!["fake-model".to_string()])
    }

    async fn stream_chat(
        &self,
        messages: Vec<PromptMessage>,
        _params: GenerationParams
    ) -> Result<DeltaStream, ChatError> {
        if self.fail_open {
            return Err(ChatError::Stream("endpoint unreachable".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages);
        let events: Vec<Result<Delta, ChatError>> = self.script
            .iter()
            .map(|event| event.clone().map_err(ChatError::Stream))
            .collect();
        Ok(Box::pin(stream::iter(events)))
    }
}

/// Keeps written samples in memory, optionally failing every write.
#[derive(Default)]
pub struct RecordingStore {
    pub fail: bool,
    samples: Mutex<Vec<(Label, Vec<ChatMessage>)>>,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn samples(&self) -> Vec<(Label, Vec<ChatMessage>)> {
        self.samples.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatasetStore for RecordingStore {
    async fn write_sample(
        &self,
        label: Label,
        messages: &[ChatMessage]
    ) -> Result<PathBuf, DatasetError> {
        if self.fail {
            return Err(DatasetError::Io {
                path: PathBuf::from("/unwritable"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        let mut samples = self.samples.lock().unwrap();
        samples.push((label, messages.to_vec()));
        Ok(PathBuf::from(format!("{}/{}.json", label.partition(), samples.len())))
    }
}
