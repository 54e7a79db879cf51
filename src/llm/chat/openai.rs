use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info, warn };
use once_cell::sync::OnceCell;
use reqwest::{ Client as HttpClient, Response, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ ChatClient, ChatError, Delta, DeltaStream };
use crate::llm::{ GenerationParams, LlmConfig };
use crate::models::chat::PromptMessage;

pub struct OpenAIChatClient {
    http: HttpClient,
    base_url: String,
    model_id: OnceCell<String>,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<PromptMessage>,
    max_tokens: u32,
    temperature: f32,
    n: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIModelList {
    data: Vec<OpenAIModel>,
}

#[derive(Deserialize)]
struct OpenAIModel {
    id: String,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
}

#[derive(Deserialize, Default)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Event(Delta),
    Done,
    Skip,
    Malformed(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(chunk) => {
            let content = chunk.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty());
            SseLine::Event(Delta { content })
        }
        Err(e) => SseLine::Malformed(format!("{} for data: {}", e, data)),
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: &str,
        model: Option<String>,
        base_url: String
    ) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                ChatError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        let model_id = OnceCell::new();
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            let _ = model_id.set(model);
        }

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        Self::new(&config.api_key, config.completion_model.clone(), config.base_url.clone())
    }

    /// First model offered by the endpoint, fetched once per client.
    pub async fn model_id(&self) -> Result<String, ChatError> {
        if let Some(id) = self.model_id.get() {
            return Ok(id.clone());
        }
        let first = self.list_models().await?.into_iter().next().ok_or(ChatError::NoModels)?;
        info!("Using model '{}' from {}", first, self.base_url);
        Ok(self.model_id.get_or_init(|| first).clone())
    }

    async fn check_status(resp: Response) -> Result<Response, ChatError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ChatError::Status { status: status.as_u16(), body })
    }

    fn spawn_reader(resp: Response) -> DeltaStream {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut pending: Vec<u8> = Vec::new();

            while let Some(chunk_result) = bytes.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(ChatError::Http(e))).await;
                        return;
                    }
                };
                pending.extend_from_slice(&chunk);

                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                    match parse_sse_line(&line) {
                        SseLine::Event(delta) => {
                            if tx.send(Ok(delta)).await.is_err() {
                                debug!("Delta receiver dropped, abandoning stream");
                                return;
                            }
                        }
                        SseLine::Done => {
                            return;
                        }
                        SseLine::Skip => {}
                        SseLine::Malformed(reason) => {
                            warn!("Skipping undecodable stream chunk: {}", reason);
                        }
                    }
                }
            }

            // body ended without a trailing newline
            if !pending.is_empty() {
                let line = String::from_utf8_lossy(&pending);
                let item = match parse_sse_line(&line) {
                    SseLine::Event(delta) => Ok(delta),
                    SseLine::Malformed(reason) => Err(ChatError::Stream(format!("truncated event: {}", reason))),
                    SseLine::Done | SseLine::Skip => {
                        return;
                    }
                };
                let _ = tx.send(item).await;
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let url = format!("{}/models", self.base_url);
        let resp = Self::check_status(self.http.get(&url).send().await?).await?;
        let models = resp.json::<OpenAIModelList>().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    async fn stream_chat(
        &self,
        messages: Vec<PromptMessage>,
        params: GenerationParams
    ) -> Result<DeltaStream, ChatError> {
        let model = self.model_id().await?;
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Opening completion stream: model={} messages={}", model, messages.len());

        let req = OpenAIChatRequest {
            model: &model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            n: 1,
            stream: true,
        };

        let resp = Self::check_status(self.http.post(&url).json(&req).send().await?).await?;
        Ok(Self::spawn_reader(resp))
    }
}
