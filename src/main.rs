//! orapaint CLI
//!
//! Command-line front end for layered OpenRaster documents.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use orapaint::cli::{commands, Cli, Commands};
use orapaint::config::PaintConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("orapaint v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => PaintConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PaintConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    debug!("Using config: {:?}", config);

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("orapaint v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &PaintConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::New { path, width, height } => commands::new_document(&path, width, height, config)?,
        Commands::Info { path } => commands::show_info(&path)?,
        Commands::Flatten {
            path,
            output,
            transparent,
        } => commands::flatten(&path, &output, transparent, config)?,
        Commands::Extract { path, output } => commands::extract(&path, &output)?,
        Commands::Paint {
            script,
            output,
            preview,
        } => commands::paint(&script, &output, preview.as_deref(), config)
            .with_context(|| format!("painting {}", script.display()))?,
    }
    Ok(())
}
