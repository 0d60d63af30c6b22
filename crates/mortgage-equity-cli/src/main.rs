mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::cap_rate::{CapRateArgs, TermsArgs};
use commands::sensitivity::SensitivityArgs;

/// Mortgage-equity capitalisation rate calculations
#[derive(Parser)]
#[command(
    name = "meq",
    version,
    about = "Mortgage-equity capitalisation rate calculations",
    long_about = "A CLI for deriving real-estate capitalisation rates with the \
                  mortgage-equity (band of investment / Ellwood) technique, with \
                  decimal precision. Reads a flat JSON scenario from --input or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve for the cap rate and its components
    CapRate(CapRateArgs),
    /// Derive the capital structure and debt terms only
    Terms(TermsArgs),
    /// Sweep one or two inputs and tabulate an output metric
    Sensitivity(SensitivityArgs),
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
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::CapRate(args) => commands::cap_rate::run_cap_rate(args),
        Commands::Terms(args) => commands::cap_rate::run_terms(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::Version => {
            println!("meq {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            log::debug!("command failed: {e:?}");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
