//! ezsite CLI - builds and serves the ez-term website.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "ezsite")]
#[command(about = "Static site builder for the ez-term website")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to site.toml config file
    #[arg(short, long, default_value = ezsite_core::CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold site.toml and a starter page
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the static site (set GITHUB_PAGES=true for the project page)
    Build {
        /// Output directory for pages and assets (defaults to config or "build")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start development server with live reload
    Dev {
        /// Port to listen on (defaults to config or 5173)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Preview the built site
    Preview {
        /// Port to listen on (defaults to config or 4173)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (defaults to the pages output directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Print the structured-data document
    Schema {
        /// Print on a single line
        #[arg(long)]
        compact: bool,
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
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Build { output } => {
            commands::build::run(&cli.config, output)?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(&cli.config, port, !no_open).await?;
        }
        Commands::Preview { port, dir, no_open } => {
            commands::preview::run(&cli.config, port, dir, !no_open).await?;
        }
        Commands::Schema { compact } => {
            commands::schema::run(compact)?;
        }
    }

    Ok(())
}
