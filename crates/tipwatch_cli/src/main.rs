mod config;
mod presenter;

use anyhow::{Context, Result};
use clap::Parser;
use tipwatch_scanner::{NodeClient, PollLoop, TipTracker};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::WatcherConfig;
use crate::presenter::ConsolePresenter;

#[derive(Parser)]
#[command(name = "tipwatch")]
#[command(about = "Print the transactions of every new block seen by an Ergo node")]
#[command(version = "0.1.0")]
struct Cli {
    /// Base URL of the Ergo node, e.g. http://127.0.0.1:9053
    node_url: String,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tipwatch=info,tipwatch_scanner=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config =
        WatcherConfig::load(Some(&cli.node_url)).context("Failed to load configuration")?;
    let poll_config = config.poll_config().context("Invalid poll configuration")?;

    let client = NodeClient::new(&config.node)?;
    info!(node = %client.base_url(), "Watching Ergo node");

    let tracker = TipTracker::new(client).with_mode(config.poll_mode());
    let mut poll_loop = PollLoop::new(tracker, ConsolePresenter::stdout(), poll_config);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut handle = tokio::spawn(async move { poll_loop.run(shutdown_rx).await });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for interrupt signal")?;
            info!("Interrupt received, stopping watcher");
            let _ = shutdown_tx.send(());
            let cursor = handle.await.context("Poll loop task panicked")??;
            info!(cursor = %cursor, "Watcher stopped");
            Ok(())
        }
        result = &mut handle => {
            let cursor = result.context("Poll loop task panicked")??;
            info!(cursor = %cursor, "Poll loop ended");
            Ok(())
        }
    }
}
