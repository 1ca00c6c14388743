mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::commission::CommissionArgs;
use commands::irr::IrrArgs;
use commands::preview::PreviewArgs;
use commands::simulate::SimulateArgs;
use commands::timeline::TimelineArgs;

/// Deal-approval financials from the command line
#[derive(Parser)]
#[command(
    name = "deal",
    version,
    about = "Deal-approval financials from the command line",
    long_about = "Preview the cash-flow timeline, VAN, TIR, payback and commission of a \
                  commercial proposal, compute investment metrics for a raw series, or \
                  replay an approval scenario against an in-memory engine."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full financial summary of a proposal
    Preview(PreviewArgs),
    /// Month-by-month cash-flow timeline of a proposal
    Timeline(TimelineArgs),
    /// VAN, TIR and payback of a raw monthly series
    Irr(IrrArgs),
    /// Commission for a business unit and deal figures
    Commission(CommissionArgs),
    /// Replay an approval scenario against an in-memory engine
    Simulate(SimulateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match input::file::read_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Preview(args) => commands::preview::run_preview(args, &config),
        Commands::Timeline(args) => commands::timeline::run_timeline(args, &config),
        Commands::Irr(args) => commands::irr::run_irr(args, &config),
        Commands::Commission(args) => commands::commission::run_commission(args),
        Commands::Simulate(args) => commands::simulate::run_simulate(args, config),
        Commands::Version => {
            println!("deal {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
