use anyhow::Result;
use clap::Parser;
use ragbase_cli::{Cli, execute, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `.env` values feed the `env` fallbacks.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);
    execute(cli).await
}
