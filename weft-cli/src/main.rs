//! # weft CLI
//!
//! Command-line interface for resolving weft pointcuts against a catalog.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(long, default_value = "weft.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve pointcuts against a catalog manifest
    Resolve {
        /// Catalog manifest (YAML) describing types, methods and objects
        #[arg(long)]
        catalog: PathBuf,

        /// Pointcut options (YAML): one map, or a list of maps to combine with `or`
        #[arg(long)]
        pointcut: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check pointcut options without resolving them
    Validate {
        /// Pointcut options (YAML)
        #[arg(long)]
        pointcut: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Resolve {
            catalog,
            pointcut,
            json,
        } => commands::resolve(&cli.config, &catalog, &pointcut, json),
        Commands::Validate { pointcut, json } => commands::validate(&pointcut, json),
    }
}
