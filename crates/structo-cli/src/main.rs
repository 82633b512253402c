mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::check::CheckArgs;
use commands::fmt::FmtArgs;

#[derive(Parser, Debug)]
#[command(
    name = "structo",
    version,
    about = "Check and normalize structured-output schema documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a schema document decodes cleanly
    Check(CheckArgs),

    /// Re-encode a schema document in normalized form
    Fmt(FmtArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check(args) => commands::check::cmd_check(&args),
        Command::Fmt(args) => commands::fmt::cmd_fmt(&args),
    }
}
