use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use tradeup_core::config::FeeConfig;
use tradeup_core::matching::matcher::{generate_offers, OfferRequest};
use tradeup_core::matching::offer::quote_vehicle;

use crate::input;

/// Arguments for offer matching
#[derive(Args)]
pub struct OffersArgs {
    /// Path to JSON/YAML offer request (customer, vehicles, optional config)
    #[arg(long)]
    pub input: Option<String>,

    /// Fee configuration file; replaces the request's config
    #[arg(long)]
    pub config: Option<String>,

    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Nominal annual rate used instead of the risk-class table
    #[arg(long)]
    pub rate_override: Option<Decimal>,

    /// Evaluate this single term instead of the candidate set
    #[arg(long)]
    pub term_override: Option<u32>,
}

/// Arguments for a single vehicle x term quote
#[derive(Args)]
pub struct QuoteArgs {
    /// Path to JSON/YAML offer request
    #[arg(long)]
    pub input: Option<String>,

    /// Fee configuration file; replaces the request's config
    #[arg(long)]
    pub config: Option<String>,

    /// Vehicle id from the request's catalog
    #[arg(long)]
    pub vehicle: String,

    /// Term in months
    #[arg(long)]
    pub term: u32,

    /// Nominal annual rate used instead of the risk-class table
    #[arg(long)]
    pub rate_override: Option<Decimal>,
}

fn load_request(
    path: Option<&str>,
    config_path: Option<&str>,
) -> Result<OfferRequest, Box<dyn std::error::Error>> {
    let mut request: OfferRequest = input::read_document(path)?;
    if let Some(config_path) = config_path {
        let config: FeeConfig = input::file::read_document(config_path)?;
        log::debug!("fee configuration replaced from {config_path}");
        request.config = config;
    }
    Ok(request)
}

pub fn run_offers(args: OffersArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request = load_request(args.input.as_deref(), args.config.as_deref())?;
    if args.workers.is_some() {
        request.workers = args.workers;
    }
    if args.rate_override.is_some() {
        request.config.rate_override = args.rate_override;
    }
    if args.term_override.is_some() {
        request.config.term_override = args.term_override;
    }

    let result = generate_offers(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_quote(args: QuoteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request = load_request(args.input.as_deref(), args.config.as_deref())?;
    if args.rate_override.is_some() {
        request.config.rate_override = args.rate_override;
    }

    let result = quote_vehicle(&request, &args.vehicle, args.term)?;
    Ok(serde_json::to_value(result)?)
}
