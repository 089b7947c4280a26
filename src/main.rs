mod chat;
mod cli;
mod config;
mod error;
mod llm;
mod profile;
mod store;
mod templates;
mod types;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chat::ChatSession;
use cli::Cli;
use config::AppConfig;
use llm::transport::ReqwestTransport;
use store::ConfigStore;

/// Logs go to stderr so they never interleave with streamed replies.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Auto-generate config file on first run
    let config_path = AppConfig::config_path()?;
    if !config_path.exists() {
        let path = AppConfig::save_default()?;
        eprintln!("[Config] Created default config: {}", path.display());
    }

    let config = AppConfig::load()?;
    init_logging(&config);
    debug!(
        provider = %config.chat.default_provider,
        template = %config.chat.template,
        "config loaded"
    );

    let store = ConfigStore::from_config(&config)?;
    let transport = Arc::new(ReqwestTransport::new(
        config.connect_timeout(),
        config.read_timeout(),
    )?);
    let session = ChatSession::new(store, transport, config.chat.template)
        .with_read_timeout(config.read_timeout());

    cli.run(session).await
}
