use std::sync::Arc;

use weekpass::channels::{Channel, CliChannel, TelegramChannel};
use weekpass::config::Config;
use weekpass::destinations::DestinationStore;
use weekpass::directory::StudentDirectory;
use weekpass::engine::ConversationEngine;
use weekpass::export::WeeklyExporter;
use weekpass::gate::AccessGate;
use weekpass::store::{LibSqlBackend, StudentStore};

use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export WEEKPASS_SECRET_HASH=<sha256 hex of the export passphrase>");
        std::process::exit(1);
    });

    eprintln!("🎒 Weekpass v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Exports: {}", config.export_dir.display());

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn StudentStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    // ── Roster seeding ──────────────────────────────────────────────────
    if let Some(roster_path) = &config.roster_path {
        let inserted = weekpass::roster::seed_if_empty(store.as_ref(), roster_path).await?;
        if inserted > 0 {
            eprintln!("   Roster: seeded {inserted} students from {}", roster_path.display());
        }
    }

    // ── Engine ──────────────────────────────────────────────────────────
    let engine = Arc::new(ConversationEngine::new(
        StudentDirectory::new(Arc::clone(&store)),
        DestinationStore::new(Arc::clone(&store)),
        AccessGate::new(config.secret_hash.clone()),
        WeeklyExporter::new(Arc::clone(&store), config.export_dir.clone()),
    ));

    // ── Channels ────────────────────────────────────────────────────────
    let mut channels: Vec<Arc<dyn Channel>> = vec![Arc::new(CliChannel::new())];
    let mut active_channels = vec!["cli"];

    if let Some(token) = config.telegram_token.clone() {
        let allowed = config.telegram_allowed_users.clone();
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if allowed.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                allowed.join(", ")
            }
        );
        channels.push(Arc::new(TelegramChannel::new(token, allowed)));
        active_channels.push("telegram");
    }

    eprintln!("   Channels: {}\n", active_channels.join(", "));

    let mut handles = Vec::new();
    for channel in channels {
        let engine = Arc::clone(&engine);
        let name = channel.name().to_string();

        let mut stream = channel.start().await?;
        handles.push(tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let replies = engine.handle(&msg.user_id, &msg.content).await;
                for reply in replies {
                    if let Err(e) = channel.respond(&msg, reply).await {
                        tracing::error!(channel = %name, error = %e, "Failed to send reply");
                    }
                }
            }
            tracing::info!(channel = %name, "Channel stream ended");
        }));
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}
