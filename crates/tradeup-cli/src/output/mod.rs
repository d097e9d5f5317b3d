pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Render a scalar for a table or CSV cell.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Flatten every offer of a tiered result into one list, tagged by tier.
pub fn flatten_tiers(result: &Value) -> Option<Vec<Value>> {
    let tiers = result.get("tiers")?.as_object()?;
    let mut offers = Vec::new();
    for (tier, list) in tiers {
        for offer in list.as_array().into_iter().flatten() {
            let mut row = serde_json::Map::new();
            row.insert("tier".into(), Value::String(tier.clone()));
            for key in OFFER_COLUMNS {
                row.insert(key.to_string(), offer.get(key).cloned().unwrap_or(Value::Null));
            }
            offers.push(Value::Object(row));
        }
    }
    Some(offers)
}

const OFFER_COLUMNS: [&str; 9] = [
    "vehicle_id",
    "brand",
    "model",
    "price",
    "term",
    "loan_amount",
    "monthly_payment",
    "payment_delta",
    "npv",
];

/// Schedule rows without the nested per-bucket balances.
pub fn schedule_rows(result: &Value) -> Option<Vec<Value>> {
    let rows = result.get("rows")?.as_array()?;
    Some(
        rows.iter()
            .map(|row| match row {
                Value::Object(map) => {
                    let mut flat = map.clone();
                    flat.remove("bucket_balances");
                    Value::Object(flat)
                }
                other => other.clone(),
            })
            .collect(),
    )
}
