use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Looks for well-known result fields in order of priority, then falls back
/// to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Offers: one line per tier count
    if let Some(Value::Object(stats)) = result_obj.get("stats") {
        for key in ["refresh_offers", "upgrade_offers", "max_upgrade_offers"] {
            if let Some(val) = stats.get(key) {
                println!("{}: {}", key, format_minimal(val));
            }
        }
        return;
    }

    // Quote: the payment of an offered vehicle
    if let Some(Value::Object(data)) = result_obj.get("data") {
        if let Some(payment) = data.get("monthly_payment") {
            println!("{}", format_minimal(payment));
            return;
        }
    }

    // Subsidy: the outcome status
    if let Some(Value::Object(outcome)) = result_obj.get("outcome") {
        if let Some(status) = outcome.get("status") {
            println!("{}", format_minimal(status));
            return;
        }
    }

    let priority_keys = ["totals", "status", "reason"];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
