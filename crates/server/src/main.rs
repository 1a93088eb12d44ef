mod api;
mod cli;
mod router;
mod startup;
mod state;

use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    herald_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command() {
        Command::Serve => {
            let config = herald_core::Config::from_env()?;
            startup::serve(&config).await
        }
        Command::Migrate => {
            let postgres = herald_core::config::PostgresConfig::load()?;
            startup::migrate(&postgres).await
        }
    }
}
