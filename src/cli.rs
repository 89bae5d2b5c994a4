use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::init::InitBuilder;

#[derive(Parser)]
#[command(name = "effects")]
#[command(about = "One-shot algebraic effect handlers", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Stack size in bytes for execution contexts (overrides config file and env vars)
    #[arg(long, global = true)]
    pub stack_size: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one of the bundled demo programs
    Demo {
        /// Which demo to run
        #[arg(value_enum)]
        name: Demo,
    },

    /// Time a tight loop of state commands
    Bench {
        /// Number of `put(get() + 1)` rounds
        #[arg(long, default_value = "100000")]
        iterations: u64,

        /// Use the in-place state handler instead of the resuming one
        #[arg(long)]
        plain: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// State threading through get/put
    State,
    /// Exceptions with abort clauses
    Exceptions,
    /// Generators zipped together
    Generators,
    /// Swapping a handler under a running computation
    Swap,
    /// Commands addressed to labelled handlers
    Labels,
    /// Resumptions stored and resumed after the handler returned
    Stored,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

/// Internal function that handles CLI commands
fn run_cli_with_args(cli: Cli) -> Result<()> {
    use crate::{benchmark, demos};

    // Load and validate configuration before executing any command
    let mut init = InitBuilder::new();
    if let Some(path) = &cli.config {
        init = init.config_path(path.clone());
    }
    if let Some(bytes) = cli.stack_size {
        init = init.stack_size(bytes);
    }
    init.init()?;

    match cli.command {
        Commands::Demo { name } => {
            let lines = match name {
                Demo::State => demos::state(),
                Demo::Exceptions => demos::exceptions(),
                Demo::Generators => demos::generators(),
                Demo::Swap => demos::swap(),
                Demo::Labels => demos::labels(),
                Demo::Stored => demos::stored(),
            };
            for line in lines {
                println!("{}", line);
            }
        }

        Commands::Bench { iterations, plain } => {
            let params = benchmark::BenchmarkParams { iterations, plain };
            let report = benchmark::run_benchmark(params)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Config => {
            let config = crate::init::get_config().cloned().unwrap_or_else(Config::default);
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demo() {
        let cli = Cli::parse_from(["effects", "demo", "generators"]);
        assert!(matches!(
            cli.command,
            Commands::Demo {
                name: Demo::Generators
            }
        ));
    }

    #[test]
    fn test_parse_bench_with_globals() {
        let cli = Cli::parse_from([
            "effects",
            "bench",
            "--iterations",
            "10",
            "--plain",
            "--stack-size",
            "262144",
        ]);
        assert_eq!(cli.stack_size, Some(262144));
        match cli.command {
            Commands::Bench { iterations, plain } => {
                assert_eq!(iterations, 10);
                assert!(plain);
            }
            _ => panic!("expected bench"),
        }
    }

    #[test]
    fn test_unknown_demo_rejected() {
        assert!(Cli::try_parse_from(["effects", "demo", "actors"]).is_err());
    }
}
