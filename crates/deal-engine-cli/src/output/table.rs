use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Columns of the proposal overview printed for a scenario replay.
const PROPOSAL_COLUMNS: [(&str, &str); 7] = [
    ("ID", "/id"),
    ("Owner", "/owner"),
    ("Status", "/status"),
    ("Version", "/version"),
    ("MRC", "/summary/mrc"),
    ("VAN", "/summary/van"),
    ("Commission", "/summary/commission"),
];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) if map.contains_key("result") => print_envelope(map),
        Value::Object(map) if map.contains_key("proposals") => print_simulation(map),
        Value::Object(map) => print_fields(map),
        Value::Array(rows) => print_rows(rows),
        _ => println!("{}", value),
    }
}

fn print_envelope(envelope: &Map<String, Value>) {
    match envelope.get("result") {
        Some(Value::Object(result)) => {
            print_fields(result);
            if let Some(Value::Object(timeline)) = result.get("timeline") {
                if let Some(Value::Array(periods)) = timeline.get("periods") {
                    println!("\nTimeline:");
                    print_rows(periods);
                }
            }
        }
        Some(other) => println!("{}", format_value(other)),
        None => {}
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_simulation(report: &Map<String, Value>) {
    if let Some(Value::Array(proposals)) = report.get("proposals") {
        let mut builder = Builder::default();
        builder.push_record(PROPOSAL_COLUMNS.iter().map(|(h, _)| *h));
        for entry in proposals {
            // A decided proposal reports its frozen figures
            let proposal = entry.get("proposal").unwrap_or(&Value::Null);
            let figures = match proposal.get("financial_cache") {
                Some(cache) if !cache.is_null() => cache,
                _ => proposal,
            };
            builder.push_record(PROPOSAL_COLUMNS.iter().map(|(_, pointer)| {
                let source = if pointer.starts_with("/summary") { figures } else { proposal };
                source.pointer(pointer).map(format_value).unwrap_or_default()
            }));
        }
        println!("{}", Table::from(builder));

        for entry in proposals {
            if let Some(Value::String(err)) = entry.get("decision_error") {
                let id = entry.pointer("/proposal/id").and_then(Value::as_str).unwrap_or("?");
                println!("  ! {}: {}", id, err);
            }
        }
    }

    if let Some(Value::Object(kpi)) = report.get("kpi") {
        println!("\nKPI:");
        print_fields(kpi);
    }
}

/// Two-column table of the scalar fields; nested values are summarized.
fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        let shown = match val {
            Value::Object(_) => "{...}".to_string(),
            Value::Array(items) if items.iter().any(Value::is_object) => {
                format!("[{} rows]", items.len())
            }
            other => format_value(other),
        };
        builder.push_record([key.clone(), shown]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            println!("{}", format_value(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows.iter().filter_map(Value::as_object) {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(h).map(format_value).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
