//! Candidate registry and anonymous one-vote-per-identity ballot box
//!
//! Candidates are registered by an operator, voters are deduplicated by a
//! one-way digest of their national ID, and results are ranked on demand.
//! State lives in JSON files.

pub mod ballot;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod ranking;
pub mod registry;
pub mod service;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use errors::{Error, Result};
pub use service::VotingService;

use config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level. Output goes to
/// stderr so it never interleaves with the console menu.
pub fn init(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("votebox={}", logging.level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match logging.format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| Error::internal(format!("Logging already initialized: {e}")))?;

    tracing::info!("🗳️  Votebox v{} initialized", VERSION);
    Ok(())
}
