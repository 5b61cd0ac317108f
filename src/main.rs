// ABOUTME: CLI entry point for portable-sql-dump
// ABOUTME: Parses commands and routes to appropriate handlers

use clap::{Parser, Subcommand};
use portable_sql_dump::commands;

#[derive(Parser)]
#[command(name = "portable-sql-dump")]
#[command(
    about = "Dump a SQLite, MySQL or PostgreSQL database as a SQL script for any of the three",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write schema and data as a SQL script for the target dialect
    Dump {
        #[command(flatten)]
        args: commands::DumpArgs,
    },
    /// List tables in dump order with their foreign key parents
    Tables {
        #[arg(long)]
        source: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so a dump on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dump { args } => commands::dump(args).await,
        Commands::Tables { source } => commands::tables(&source).await,
    }
}
