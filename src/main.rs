use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wayfarer::api;
use wayfarer::db::{seed_itinerary, Store};
use wayfarer::events::{spawn_change_relay, EventHub};
use wayfarer::sync::{DocumentApi, DocumentSession, HttpDocumentApi, SyncClient};

/// Default server URL for the watch client.
const DEFAULT_URL: &str = "http://127.0.0.1:3000";

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(about = "Collaborative travel itinerary planner with live multi-session sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Wayfarer server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Follow a remote server's live updates from the terminal
    Watch {
        /// Base URL of the server (falls back to WAYFARER_URL)
        #[arg(long)]
        url: Option<String>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "wayfarer=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Watch { url }) => {
            let url = url
                .or_else(|| std::env::var("WAYFARER_URL").ok())
                .unwrap_or_else(|| DEFAULT_URL.to_string());
            run_watch(&url).await;
        }
        Some(Commands::Serve { port }) => serve(port).await?,
        None => serve(3000).await?,
    }

    Ok(())
}

async fn serve(port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting Wayfarer server on port {}", port);

    let store = Store::open_default()?;
    store.migrate()?;

    let hub = EventHub::new();
    spawn_change_relay(store.notifier(), hub.clone());
    hub.spawn_heartbeat();

    let app = api::create_router(store, hub.clone());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Wayfarer server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {e}");
                return;
            }
            tracing::info!("shutdown signal received; notifying live streams");
            hub.announce_shutdown();
            // Let open streams flush the shutdown event before closing.
            tokio::time::sleep(Duration::from_millis(200)).await;
        })
        .await?;

    Ok(())
}

async fn run_watch(url: &str) {
    let api = HttpDocumentApi::new(url);
    let initial = match api.fetch_latest().await {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("initial fetch failed, starting from seed: {e}");
            seed_itinerary()
        }
    };
    tracing::info!(title = %initial.title, "watching itinerary");

    let mut session = DocumentSession::new(api, initial);
    if let Some(dirs) = directories::ProjectDirs::from("", "", "wayfarer") {
        if std::fs::create_dir_all(dirs.data_dir()).is_ok() {
            session = session.with_backup_path(dirs.data_dir().join("itinerary_backup.json"));
        }
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = stop_tx.send(true);
    });

    let mut client = SyncClient::new(url, session, stop_rx);
    client.run().await;
    tracing::info!("disconnected");
}
