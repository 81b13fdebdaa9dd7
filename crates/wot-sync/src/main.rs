//! CLI entry point for the wot-sync service.

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use wot_core::LedgerEvent;
use wot_sync::WotService;

#[derive(Parser)]
#[command(name = "wot-sync")]
#[command(about = "Web-of-trust graph rebuilds and trust-path queries")]
struct Cli {
    /// Config file prefix (default: wot).
    #[arg(short, long, default_value = "wot", global = true)]
    config: String,

    /// Ledger snapshot path, overriding `ledger.snapshot_path`.
    #[arg(long, global = true)]
    snapshot: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild once and print the generation statistics.
    Refresh,

    /// Rebuild once and print the shortening paths toward an identity.
    Shortening {
        #[arg(long)]
        uid: String,
    },

    /// Rebuild once and print the shortest paths from an identity to every sentry.
    Sentries {
        #[arg(long)]
        uid: String,
    },

    /// Rebuild, then resync on ledger events read as JSON lines from stdin.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.command {
        Command::Watch => fmt().with_env_filter(filter).json().init(),
        _ => fmt().with_env_filter(filter).with_writer(std::io::stderr).init(),
    }

    let service = WotService::from_config_file(&cli.config, cli.snapshot).await?;

    match cli.command {
        Command::Refresh => {
            service.refresh_wot().await?;
            print_json(&service.stats())?;
        }
        Command::Shortening { uid } => {
            service.refresh_wot().await?;
            print_json(&service.get_shortening_path(&uid)?)?;
        }
        Command::Sentries { uid } => {
            service.refresh_wot().await?;
            print_json(&service.get_sentries_paths(&uid)?)?;
        }
        Command::Watch => watch(&service).await?,
    }

    Ok(())
}

/// Feed stdin events to the resync trigger until EOF.
async fn watch(service: &WotService) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(64);
    let handle = service.init(rx).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LedgerEvent>(&line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    tracing::error!("Resync listener stopped, no longer reading events");
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed ledger event"),
        }
    }
    drop(tx);

    let stats = handle.join().await;
    tracing::info!(
        events = stats.events_seen,
        rebuilds = stats.rebuilds_succeeded,
        failed = stats.rebuilds_failed,
        coalesced = stats.rebuilds_coalesced,
        generation = service.generation().id,
        "Watch finished"
    );
    print_json(&service.stats())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
