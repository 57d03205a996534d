//! nbpages CLI - execute Jupyter notebooks and publish them as HTML pages.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use commands::build::BuildArgs;

#[derive(Parser)]
#[command(name = "nbpages")]
#[command(about = "Execute Jupyter notebooks and publish them as styled HTML pages")]
#[command(version)]
pub struct Cli {
    /// Defaults to `build` when omitted
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to nbpages.toml config file
    #[arg(short, long, default_value = "nbpages.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute notebooks and write one HTML page per notebook
    Build(BuildArgs),

    /// Write a default config file and style.css next to it
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Preview generated pages in a browser
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the configured output directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    // Execute command
    match cli.command.unwrap_or_else(|| Commands::Build(BuildArgs::default())) {
        Commands::Build(args) => {
            commands::build::run(&cli.config, args).await?;
        }
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes)?;
        }
        Commands::Serve { port, dir, no_open } => {
            commands::serve::run(&cli.config, port, dir, !no_open).await?;
        }
    }

    Ok(())
}
