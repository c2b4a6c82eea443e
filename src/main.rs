mod api;
mod webhook;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wabridge_channels::{sidecar::SidecarClient, whatsapp::WhatsAppSession};
use wabridge_core::{
    config::{self, BridgeConfig, Config, ConfigSource},
    traits::AutomationClient,
};

#[derive(Parser)]
#[command(
    name = "wabridge",
    version,
    about = "HTTP bridge for sending WhatsApp messages and managing groups"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge (HTTP API + WhatsApp session).
    Start,
    /// Query the status endpoint of a running bridge.
    Status,
    /// Print the chat id a destination normalizes to.
    Normalize {
        /// Phone number or chat id.
        input: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (cfg, source) = config::load(&cli.config)?;
    let _log_guard = init_logging(&cfg.bridge)?;
    match source {
        ConfigSource::File => info!(path = %cli.config, "loaded config"),
        ConfigSource::Defaults => {
            info!(path = %cli.config, "config file not found, using defaults");
        }
    }

    match cli.command {
        Commands::Start => run(cfg).await?,
        Commands::Status => status(&cfg).await?,
        Commands::Normalize { input } => {
            let chat_id = cfg.whatsapp.normalization.normalize(&input)?;
            println!("{chat_id}");
        }
    }

    Ok(())
}

/// Console logging filtered by `RUST_LOG` (or the configured level), plus an
/// optional plain-text file under `{data_dir}/logs`.
fn init_logging(bridge: &BridgeConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&bridge.log_level));

    if !bridge.log_to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return Ok(None);
    }

    let dir = Path::new(&bridge.data_dir).join("logs");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, "wabridge.log"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    info!(name = %cfg.bridge.name, "starting WhatsApp bridge");

    let (event_tx, event_rx) = mpsc::channel(64);
    let client: Arc<dyn AutomationClient> =
        Arc::new(SidecarClient::new(cfg.whatsapp.clone(), event_tx));
    let session = Arc::new(WhatsAppSession::new(client, cfg.whatsapp.clone()));
    session.spawn_event_loop(event_rx);

    if cfg.api.api_key.is_empty() {
        warn!("api.api_key is empty, every endpoint is unauthenticated");
    }

    // The listener comes up whether or not the client does.
    let init = Arc::clone(&session);
    tokio::spawn(async move {
        if let Err(e) = init.initialize().await {
            error!(error = %e, "WhatsApp initialization failed, use /reset to retry");
        }
    });

    let webhook = webhook::GroupWebhook::from_config(&cfg.webhook)?;
    if webhook.is_some() {
        info!("group-id webhook enabled");
    }

    let state = api::ApiState::new(&cfg.api, session, webhook);
    api::serve(state, &cfg.api.bind_addr()).await
}

/// `wabridge status`: ask a running instance for its readiness snapshot.
async fn status(cfg: &Config) -> anyhow::Result<()> {
    let host = match cfg.api.host.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    };
    let url = format!("http://{host}:{}/status", cfg.api.port);

    let mut req = reqwest::Client::new().get(&url);
    if !cfg.api.api_key.is_empty() {
        req = req.header("x-api-key", &cfg.api.api_key);
    }
    let resp = req
        .send()
        .await
        .with_context(|| format!("bridge not reachable at {url}"))?;
    let code = resp.status();
    let body: serde_json::Value = resp.json().await.context("invalid status response")?;

    println!("wabridge status ({url})\n");
    // 503 still carries the snapshot.
    if !code.is_success() && code != reqwest::StatusCode::SERVICE_UNAVAILABLE {
        anyhow::bail!("status endpoint returned {code}: {body}");
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
