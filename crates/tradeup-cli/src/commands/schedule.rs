use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use tradeup_core::matching::offer::{offer_schedule, Offer};

use crate::input;

/// Arguments for amortization table regeneration
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to a stored offer, or to `quote` output containing one
    #[arg(long)]
    pub input: Option<String>,

    /// Due date of period 1 (YYYY-MM-DD); later periods follow monthly
    #[arg(long)]
    pub first_due: Option<NaiveDate>,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let document: Value = input::read_document(args.input.as_deref())?;
    let offer: Offer = serde_json::from_value(unwrap_offer(document))?;

    let result = offer_schedule(&offer, args.first_due)?;
    Ok(serde_json::to_value(result)?)
}

/// Accept a bare offer or the `{"result": {"status": "offered", "data": ...}}`
/// envelope printed by `quote`.
fn unwrap_offer(mut document: Value) -> Value {
    for key in ["result", "data"] {
        if let Some(inner) = document.get_mut(key).map(Value::take) {
            document = inner;
        }
    }
    document
}
