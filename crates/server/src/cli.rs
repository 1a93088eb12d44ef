//! CLI argument parsing.

use clap::{Parser, Subcommand};

/// herald: periodic outbound message delivery service.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the scheduler and the HTTP control API (default).
    Serve,
    /// Apply database migrations and exit.
    Migrate,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
