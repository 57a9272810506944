//! # Prochord Chat Server
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! prochord-chat
//!
//! # Run with a specific config file
//! CHAT_CONFIG=/path/to/prochord-chat.toml prochord-chat
//!
//! # Run with environment variables
//! CHAT_PORT=8080 CHAT_HOST=0.0.0.0 prochord-chat
//! ```

use anyhow::Result;
use prochord_chat_server::{config, handlers, metrics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prochord_chat=debug,chat_protocol=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;

    tracing::info!("Starting chat server on {}:{}", config.host, config.port);

    metrics::init_metrics();

    handlers::run_server(config).await?;

    Ok(())
}
