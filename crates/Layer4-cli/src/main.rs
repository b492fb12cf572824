//! AddonBridge CLI - Main entry point

mod commands;
mod engine;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::Context;

/// AddonBridge - manage BetterDiscord-style plugins from the terminal
#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Plugin folder (overrides bridge.json)
    #[arg(long, global = true)]
    plugins_dir: Option<PathBuf>,

    /// Store API URL (overrides bridge.json)
    #[arg(long, global = true)]
    store_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed plugins
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the parsed header of a plugin
    Info {
        /// Plugin name or file name
        plugin: String,
    },
    /// Mark plugins as enabled
    Enable {
        #[arg(required = true)]
        plugins: Vec<String>,
    },
    /// Mark plugins as disabled
    Disable {
        #[arg(required = true)]
        plugins: Vec<String>,
    },
    /// Compare installed versions with the plugin store
    CheckUpdates,
    /// Download newer versions from the plugin store
    Update {
        /// Plugins to update (all when omitted)
        plugins: Vec<String>,
    },
    /// Watch the plugin folder and log changes
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let ctx = Context::load(args.plugins_dir, args.store_url)?;
    tracing::debug!("Using plugin folder {}", ctx.plugins_dir.display());

    match args.command {
        Command::List { json } => commands::list(&ctx, json).await,
        Command::Info { plugin } => commands::info(&ctx, &plugin).await,
        Command::Enable { plugins } => commands::set_enabled(&ctx, &plugins, true).await,
        Command::Disable { plugins } => commands::set_enabled(&ctx, &plugins, false).await,
        Command::CheckUpdates => commands::check_updates(&ctx).await,
        Command::Update { plugins } => commands::update(&ctx, &plugins).await,
        Command::Watch => commands::watch(&ctx).await,
    }
}
