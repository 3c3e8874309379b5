// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "skin-scanner")]
#[command(about = "Scan skin with your camera and get a remote analysis")]
#[command(version = skin_scanner::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/skin-scanner/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive scanner in the terminal (default)
    Terminal {
        /// Camera index to use (from 'skin-scanner list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Use an image file instead of a camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// List available cameras
    List,

    /// Capture one frame, analyze it and print the result as JSON
    Scan {
        /// Camera index to use (from 'skin-scanner list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Analyze an image file instead of a camera frame
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Also save the JPEG that was sent (file or directory)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Primary analysis endpoint URL
        #[arg(long)]
        primary: Option<String>,

        /// Fallback analysis endpoint URL
        #[arg(long)]
        fallback: Option<String>,

        /// Save the result to this user's history
        #[arg(long)]
        user: Option<String>,

        /// Bearer token for the history service
        #[arg(long, requires = "user")]
        token: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=skin_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Terminal { camera, image }) => {
            let backend = cli::open_backend(&config, camera, image.as_deref())?;
            skin_scanner::terminal::run(config, backend)
        }
        None => {
            let backend = cli::open_backend(&config, None, None)?;
            skin_scanner::terminal::run(config, backend)
        }
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Scan {
            camera,
            image,
            snapshot,
            primary,
            fallback,
            user,
            token,
        }) => {
            let mut config = config;
            if let Some(url) = primary {
                config.primary_url = url;
            }
            if let Some(url) = fallback {
                config.fallback_url = url;
            }
            let user = user.map(|id| {
                let identity = skin_scanner::UserIdentity::new(id);
                match token {
                    Some(token) => identity.with_access_token(token),
                    None => identity,
                }
            });
            let backend = cli::open_backend(&config, camera, image.as_deref())?;
            cli::scan(config, backend, snapshot, user)
        }
    }
}
