use std::io;
use std::sync::Arc;
use tokio::sync::oneshot;
use votebox::cli::Console;
use votebox::config::Config;
use votebox::storage::JsonFileStore;
use votebox::{Result, VotingService};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The process always exits 0; failures are reported, not signalled
        eprintln!("Error: {e}");
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    votebox::init(&config.logging)?;

    let store = JsonFileStore::new(&config.storage);
    let service = Arc::new(VotingService::open(&config, store)?);

    // Console input blocks, so it runs on its own thread and races Ctrl-C
    let (done_tx, done_rx) = oneshot::channel();
    let console_service = Arc::clone(&service);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let outcome = Console::new(&*console_service, stdin.lock(), stdout.lock()).run();
        let _ = done_tx.send(outcome);
    });

    tokio::select! {
        outcome = done_rx => match outcome {
            Ok(result) => result?,
            Err(_) => tracing::error!("Console thread ended unexpectedly"),
        },
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nGoodbye!");
            tracing::info!("Interrupted, shutting down");
        }
    }

    tracing::info!(
        "Session closed: {} votes, {} voters",
        service.total_votes()?,
        service.voter_count()?
    );
    Ok(())
}
