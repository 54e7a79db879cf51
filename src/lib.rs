pub mod models;
pub mod server;
pub mod llm;
pub mod cli;
pub mod history;
pub mod dataset;
pub mod session;

use cli::Args;
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Endpoint Base URL: {}", args.api_base);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("first listed by endpoint"));
    info!("Max Tokens: {}", args.max_tokens);
    info!("Temperature: {}", args.temperature);
    info!("Context Size: {}", args.context_size);
    info!("Data Sample Size: {}", args.data_sample_size);
    info!("Dataset Directory: {}", args.dataset_dir.display());
    info!("-------------------------");

    let client = llm::chat::new_client(&args.llm_config())?;
    let dataset = dataset::create_dataset_store(&args.dataset_dir);

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, client, dataset, args.session_settings());
    server.run().await?;

    Ok(())
}
