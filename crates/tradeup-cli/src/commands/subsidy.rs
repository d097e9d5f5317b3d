use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use tradeup_core::subsidy::search::{
    search_minimum_subsidy, search_minimum_subsidy_batch, LeverRange, SubsidyBatchRequest,
    SubsidyPlan, SubsidySearchRequest,
};

use crate::input;

/// Arguments for the minimum-subsidy search
#[derive(Args)]
pub struct SubsidyArgs {
    /// Path to a search request: one `vehicle`, or a `vehicles` list for a batch
    #[arg(long)]
    pub input: Option<String>,

    /// Worker threads for a batch search
    #[arg(long)]
    pub workers: Option<usize>,

    /// Hold the service fee fraction at this value instead of searching it
    #[arg(long)]
    pub service_fee: Option<Decimal>,

    /// Hold the acquisition bonus at this amount instead of searching it
    #[arg(long)]
    pub acquisition_bonus: Option<Decimal>,

    /// Hold the marketing fee fraction at this value instead of searching it
    #[arg(long)]
    pub marketing_fee: Option<Decimal>,
}

impl SubsidyArgs {
    fn pin_levers(&self, plan: &mut SubsidyPlan) {
        if let Some(value) = self.service_fee {
            plan.service_fee = LeverRange::fixed(value);
        }
        if let Some(value) = self.acquisition_bonus {
            plan.acquisition_bonus = LeverRange::fixed(value);
        }
        if let Some(value) = self.marketing_fee {
            plan.marketing_fee = LeverRange::fixed(value);
        }
    }
}

pub fn run_subsidy(args: SubsidyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let document: Value = input::read_document(args.input.as_deref())?;

    if document.get("vehicles").is_some() {
        let mut request: SubsidyBatchRequest = serde_json::from_value(document)?;
        if args.workers.is_some() {
            request.workers = args.workers;
        }
        args.pin_levers(&mut request.plan);
        let result = search_minimum_subsidy_batch(&request)?;
        Ok(serde_json::to_value(result)?)
    } else {
        let mut request: SubsidySearchRequest = serde_json::from_value(document)?;
        args.pin_levers(&mut request.plan);
        let result = search_minimum_subsidy(&request)?;
        Ok(serde_json::to_value(result)?)
    }
}
