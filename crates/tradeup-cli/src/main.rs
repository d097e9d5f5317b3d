mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::offers::{OffersArgs, QuoteArgs};
use commands::schedule::ScheduleArgs;
use commands::subsidy::SubsidyArgs;

/// Trade-up loan offers with decimal precision
#[derive(Parser)]
#[command(
    name = "tradeup",
    version,
    about = "Trade-up loan offers, amortization schedules and subsidy search",
    long_about = "Generates tiered car trade-up loan offers for existing finance customers, \
                  regenerates month-by-month amortization schedules for any offer, and \
                  searches for the minimum subsidy that makes a vehicle viable."
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
    /// Match a customer against a vehicle catalog and tier the offers
    Offers(OffersArgs),
    /// Price one vehicle at one term
    Quote(QuoteArgs),
    /// Regenerate the amortization table of a stored offer
    Schedule(ScheduleArgs),
    /// Search for the minimum subsidy that clears every hard gate
    Subsidy(SubsidyArgs),
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
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Offers(args) => commands::offers::run_offers(args),
        Commands::Quote(args) => commands::offers::run_quote(args),
        Commands::Schedule(args) => commands::schedule::run_schedule(args),
        Commands::Subsidy(args) => commands::subsidy::run_subsidy(args),
        Commands::Version => {
            println!("tradeup {}", env!("CARGO_PKG_VERSION"));
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
