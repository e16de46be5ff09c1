//! # ragbase-cli
//!
//! The `ragbase` command-line front end.
//!
//! ```bash
//! # Index a directory of notes for one user
//! ragbase ingest ./notes --user alice
//!
//! # Talk to them (requires a running Ollama server)
//! ragbase chat --user alice
//! ```
//!
//! Flags can also be set through `RAGBASE_*` environment variables or a
//! `.env` file.

pub mod chat;
pub mod cli;
pub mod ingest;
pub mod providers;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Command};

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
/// Logs go to stderr so they never interleave with streamed answers.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest(args) => ingest::run(args, &cli.store_dir, &cli.models).await,
        Command::Chat(args) => chat::run(args, &cli.store_dir, &cli.models).await,
    }
}
