use std::time::Duration;

use anyhow::{Context, Result};
use crabirc::client::{Client, ClientEvent, Diagnostic};
use crabirc::config::{self, ClientConfig};
use crabirc::irc::connection;
use crabirc::logging::TrafficLogger;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long the server gets to close the link after QUIT.
const QUIT_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load_config()?;
    if !config::config_exists() {
        config::save_config(&cfg).context("Failed to write default config")?;
    }

    let client = Client::new(&cfg);
    let events = client.subscribe();
    let watcher = tokio::spawn(watch_events(client.clone(), cfg.clone(), events));

    let session = connection::connect(&client, &cfg);
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupted"),
            Err(e) => {
                warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        }
    };
    let result =
        connection::run_until(&client, session, shutdown, Some("crabirc"), QUIT_GRACE).await;

    drop(client);
    if let Err(e) = watcher.await {
        warn!(error = %e, "event task failed");
    }

    let reason = result.context("Connection failed")?;
    info!(%reason, "session ended");
    Ok(())
}

/// Log events, record traffic and join the configured channels.
async fn watch_events(
    client: Client,
    cfg: ClientConfig,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
) {
    let mut traffic = TrafficLogger::new(&cfg.logging, &cfg.server.host);
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::RawMessageReceived(msg) => traffic.log_received(&msg.to_string()),
            ClientEvent::RawMessageSent(line) => traffic.log_sent(&line),
            ClientEvent::Registered { nick } => {
                info!(%nick, "registered");
                for channel in &cfg.channels {
                    if let Err(e) = client.send(format!("JOIN {}", channel), None) {
                        warn!(%channel, error = %e, "join failed");
                    }
                }
            }
            ClientEvent::MessageReceived {
                source,
                targets,
                text,
            } => {
                let from = source.as_ref().map(|p| p.name()).unwrap_or("?");
                info!(%from, ?targets, %text, "message");
            }
            ClientEvent::NoticeReceived { source, text, .. } => {
                let from = source.as_ref().map(|p| p.name()).unwrap_or("?");
                info!(%from, %text, "notice");
            }
            ClientEvent::Diagnostic(Diagnostic::Unhandled(_)) => {}
            ClientEvent::Diagnostic(d) => warn!(?d, "diagnostic"),
            ClientEvent::Disconnected { reason } => {
                info!(%reason, "disconnected");
                break;
            }
            ClientEvent::MessageSent { .. } | ClientEvent::Ping { .. } => {}
            other => info!(event = ?other, "event"),
        }
    }
}
