//! chunkcoord CLI - Command-line interface
//!
//! This binary drives the chunkcoord batch scheduler against a simulated
//! host, and manages the configuration file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;
use commands::run::RunArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "chunkcoord")]
#[command(version = chunkcoord::VERSION)]
#[command(about = "Coordinate bounded, cancellable batch processing of regions", long_about = None)]
struct Cli {
    /// Path to the configuration file (default: ~/.chunkcoord/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Coordinate a rectangular area of regions against the simulated host
    Run(RunArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Run(args) => {
            let runner = CliRunner::new(cli.config.as_deref())?;
            commands::run::run(args, &runner)
        }
        Commands::Config(command) => commands::config::run(command, cli.config.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcoord::coord::RegionId;

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "chunkcoord",
            "run",
            "--from",
            "-2,-2",
            "--to",
            "2,2",
            "--max-concurrent",
            "4",
            "--fail",
            "0,0",
            "--fail",
            "1,1",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.from, RegionId::new(-2, -2));
                assert_eq!(args.to, RegionId::new(2, 2));
                assert_eq!(args.max_concurrent, Some(4));
                assert_eq!(args.fail, vec![RegionId::new(0, 0), RegionId::new(1, 1)]);
                assert_eq!(args.work_ms, 0);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_config_with_global_path() {
        let cli =
            Cli::try_parse_from(["chunkcoord", "config", "show", "--config", "/tmp/c.ini"]).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.ini")));
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));
    }

    #[test]
    fn test_invalid_region_rejected() {
        assert!(Cli::try_parse_from(["chunkcoord", "run", "--from", "1;2", "--to", "0,0"]).is_err());
    }
}
