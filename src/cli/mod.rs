use clap::Parser;
use std::path::PathBuf;

use crate::llm::{ GenerationParams, LlmConfig };
use crate::session::SessionSettings;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Completion Endpoint Args ---
    /// Base URL of the OpenAI-compatible endpoint (e.g., http://localhost:8000/v1)
    #[arg(long, env = "OPENAI_API_BASE", default_value = "http://localhost:8000/v1")]
    pub api_base: String,

    /// Credential for the endpoint. Local endpoints accept the placeholder.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "NA")]
    pub api_key: String,

    /// Model to use. If unset, the first model listed by the endpoint is used.
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Maximum tokens generated per reply.
    #[arg(long, env = "MODEL_MAX_TOKENS", default_value = "1000")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[arg(long, env = "MODEL_TEMPERATURE", default_value = "0.4")]
    pub temperature: f32,

    // --- Conversation Args ---
    /// Number of messages preceding a request that are sent as context.
    #[arg(long, env = "CONTEXT_SIZE", default_value = "6")]
    pub context_size: usize,

    /// Number of trailing messages saved per rated sample.
    #[arg(long, env = "DATA_SAMPLE_SIZE", default_value = "6")]
    pub data_sample_size: usize,

    /// Directory holding the `good` and `bad` sample partitions.
    #[arg(long, env = "DATASET_DIR", default_value = "data")]
    pub dataset_dir: PathBuf,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,
}

impl Args {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            base_url: self.api_base.clone(),
            api_key: self.api_key.clone(),
            completion_model: self.chat_model.clone().filter(|m| !m.trim().is_empty()),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            context_size: self.context_size,
            data_sample_size: self.data_sample_size,
            generation: GenerationParams {
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            },
        }
    }
}
