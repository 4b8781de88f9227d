//! RK Listener (rk-listener) - Main entry point
//!
//! Console listener for a server-authoritative audio broadcast: follows the
//! real-time channel, mirrors player state onto the local stream output and
//! forwards owner commands to the control API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rk_common::config::TomlConfig;
use rk_listener::config::ListenerSettings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for rk-listener
#[derive(Parser, Debug)]
#[command(name = "rk-listener")]
#[command(about = "Listener client for an RK audio broadcast")]
#[command(version)]
struct Args {
    /// Bootstrap TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Real-time channel URL
    #[arg(long, env = "RK_WS_URL")]
    ws_url: Option<String>,

    /// Control API base URL
    #[arg(long, env = "RK_API_URL")]
    api_url: Option<String>,

    /// Audio stream URL
    #[arg(long, env = "RK_STREAM_URL")]
    stream_url: Option<String>,

    /// Never start audio without an explicit `listen`
    #[arg(long)]
    no_autoplay: bool,
}

impl Args {
    /// Command-line and environment values override the config file
    fn apply(&self, config: &mut TomlConfig) {
        if let Some(url) = &self.ws_url {
            config.ws_url = url.clone();
        }
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &self.stream_url {
            config.stream_url = url.clone();
        }
        if self.no_autoplay {
            config.playback.autoplay = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    let settings = ListenerSettings::from_toml(&config).context("Invalid configuration")?;

    // Initialize tracing (stderr; stdout belongs to the console)
    let default_filter = format!(
        "rk_listener={0},rk_common={0}",
        settings.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting RK Listener v{}", env!("CARGO_PKG_VERSION"));
    info!("Channel: {}", settings.ws_url);
    info!("Control API: {}", settings.api_base_url);
    info!("Stream: {}", settings.stream_url);

    rk_listener::runtime::run(settings)
        .await
        .context("Listener session failed")?;

    info!("Shutdown complete");
    Ok(())
}
