//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path` and `config show`.

use chunkcoord::config::ConfigFile;
use clap::Subcommand;
use std::path::Path;

use crate::error::CliError;
use crate::runner::resolve_config_path;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    let path = resolve_config_path(config_path);
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(&path),
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if force {
        ConfigFile::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
    } else if ConfigFile::ensure_exists_at(path)? {
        println!("Created {}", path.display());
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "defaults (no config file)".to_string()
    };

    println!("Configuration: {}", source);
    println!();
    println!("[coordinator]");
    println!(
        "  max_concurrent_loads = {}",
        config.coordinator.max_concurrent_loads
    );
    println!("  unload_after         = {}", config.coordinator.unload_after);
    println!(
        "  stall_threshold_secs = {}",
        config.coordinator.stall_threshold_secs
    );
    println!();
    println!("[host]");
    println!("  max_concurrent_loads = {}", config.host.max_concurrent_loads);
    println!("  loads_per_tick       = {}", config.host.loads_per_tick);
    println!("  tick_ms              = {}", config.host.tick_ms);
    println!("  load_latency_ms      = {}", config.host.load_latency_ms);
    println!("  reclaim_unpinned     = {}", config.host.reclaim_unpinned);
    println!();
    println!("[logging]");
    println!("  directory            = {}", config.logging.directory.display());
    println!("  file                 = {}", config.logging.file);
    Ok(())
}
