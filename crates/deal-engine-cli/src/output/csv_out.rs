use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    write_csv(value, io::stdout().lock());
}

/// Row-shaped output (a timeline, or the timeline nested in a preview) is
/// written one row per period; anything else as `field,value` pairs.
fn write_csv<W: io::Write>(value: &Value, out: W) {
    let mut wtr = csv::Writer::from_writer(out);

    match value {
        Value::Array(rows) => write_rows(&mut wtr, rows),
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => {
                match result.get("timeline").and_then(|t| t.get("periods")) {
                    Some(Value::Array(periods)) => write_rows(&mut wtr, periods),
                    _ => write_fields(&mut wtr, result),
                }
            }
            _ => match map.get("proposals") {
                Some(Value::Array(entries)) => {
                    let proposals: Vec<Value> = entries
                        .iter()
                        .filter_map(|e| e.get("proposal").cloned())
                        .collect();
                    write_rows(&mut wtr, &proposals)
                }
                _ => write_fields(&mut wtr, map),
            },
        },
        _ => {
            let _ = wtr.write_record([format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_fields<W: io::Write>(wtr: &mut csv::Writer<W>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([format_csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for row in rows.iter().filter_map(Value::as_object) {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(format_csv_value).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: &Value) -> String {
        let mut buf = Vec::new();
        write_csv(value, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_preview_envelope_writes_timeline_rows() {
        let envelope = json!({
            "result": {
                "van": 12.5,
                "timeline": {
                    "periods": [
                        {"period": 0, "net": -100.0},
                        {"period": 1, "net": 60.0}
                    ]
                }
            }
        });
        let lines: Vec<String> = render(&envelope).lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("period") && lines[0].contains("net"));
        assert!(lines[2].contains("60.0"));
    }

    #[test]
    fn test_result_without_timeline_writes_fields() {
        let envelope = json!({"result": {"amount": 168.0}});
        let out = render(&envelope);
        assert!(out.starts_with("field,value"));
        assert!(out.contains("amount,168.0"));
    }
}
