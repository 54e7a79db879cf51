pub mod websocket;

use crate::dataset::DatasetStore;
use crate::llm::chat::ChatClient;
use crate::session::SessionSettings;

use std::error::Error;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use log::{ info, warn, error };

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap_or(NonZeroU32::MIN)));
}

/// Accepts viewers over WebSocket. Every connection gets its own session.
pub struct Server {
    addr: String,
    client: Arc<dyn ChatClient>,
    dataset: Arc<dyn DatasetStore>,
    settings: SessionSettings,
}

impl Server {
    pub fn new(
        addr: String,
        client: Arc<dyn ChatClient>,
        dataset: Arc<dyn DatasetStore>,
        settings: SessionSettings
    ) -> Self {
        Self { addr, client, dataset, settings }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("WS server listening on: {}", self.addr);

        loop {
            let (stream, peer) = listener.accept().await?;

            if CONNECTION_LIMITER.check().is_err() {
                warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming connection from: {}", peer);
            let client = Arc::clone(&self.client);
            let dataset = Arc::clone(&self.dataset);
            let settings = self.settings;

            tokio::spawn(async move {
                match accept_async(stream).await {
                    Ok(ws) => {
                        websocket::handle_connection(peer, ws, client, dataset, settings).await;
                    }
                    Err(e) => {
                        error!("Handshake failed for {}: {}", peer, e);
                    }
                }
            });
        }
    }
}
