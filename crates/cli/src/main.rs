//! Borealis CLI - Command-line interface for the Borealis runtime.

mod bootstrap;
mod commands;
mod discovery;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "borealis")]
#[command(
    author,
    version,
    about = "Serve WASM plugin functions with an embedded vector collection service"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute an invocation envelope
    Run {
        /// Directory containing plugin directories (metadata.json + plugin.wasm)
        #[arg(short, long, default_value = "./plugins")]
        plugins: PathBuf,

        /// Collection manifest file
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Runtime configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Envelope JSON file, or "-" for stdin
        #[arg(value_name = "ENVELOPE")]
        envelope: String,
    },

    /// Validate plugin metadata and manifest embedders without executing
    Validate {
        /// Directory containing plugin directories
        #[arg(short, long, default_value = "./plugins")]
        plugins: PathBuf,

        /// Collection manifest file
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Runtime configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            plugins,
            manifest,
            config,
            envelope,
        } => commands::run::execute(
            &plugins,
            manifest.as_deref(),
            config.as_deref(),
            &envelope,
        ),

        Commands::Validate {
            plugins,
            manifest,
            config,
        } => commands::validate::execute(&plugins, manifest.as_deref(), config.as_deref()),
    }
}
