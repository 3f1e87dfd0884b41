use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Looks for the headline field of each operation in priority order, then
/// falls back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    // Multi-company scoring: one "company<TAB>composite" line each.
    if let Some(Value::Array(results)) = value.as_object().and_then(|m| m.get("results")) {
        for row in results {
            if let (Some(company), Some(composite)) = (row.get("company"), row.get("composite")) {
                println!("{}\t{}", format_minimal(company), format_minimal(composite));
            }
        }
        return;
    }

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "composite",
        "percentile",
        "company_score",
        "tier_code",
        "fit",
        "total_failed",
        "compliant",
        "narrative",
    ];

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
