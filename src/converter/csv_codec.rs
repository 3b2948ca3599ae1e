//! Quote-aware CSV parsing and serialization over ordered string records.
//!
//! Output escapes embedded quotes as `\"` rather than doubling them, and the
//! parser does not undo either escape; both quirks are kept so that files
//! produced by earlier versions read back identically.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// One CSV row: column name → cell text, in header order.
pub type TabularRecord = IndexMap<String, String>;

/// Trim the way `String.prototype.trim` does, which includes the BOM.
fn trim_js(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')
}

/// Trim a field and remove one leading and one trailing double quote.
fn clean_field(raw: &str) -> String {
    let trimmed = trim_js(raw);
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    trimmed.to_string()
}

/// Split one line into fields on commas outside double quotes.
///
/// Quote characters toggle the quoted state and are not kept.
fn split_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for c in line.chars() {
        match c {
            '"' => in_quote = !in_quote,
            ',' if !in_quote => {
                values.push(clean_field(&current));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    values.push(clean_field(&current));
    values
}

/// Parse CSV text into records keyed by the header row.
///
/// Lines are split on `\n` or `\r\n`. Input with fewer than two lines yields
/// no records. Short rows are padded with empty strings; surplus cells are
/// dropped.
pub fn parse_csv(text: &str) -> Vec<TabularRecord> {
    let text = trim_js(text);
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    let headers = split_line(lines[0]);

    lines[1..]
        .iter()
        .map(|line| {
            let mut values = split_line(line);
            values.resize(headers.len().max(values.len()), String::new());
            let mut record = TabularRecord::with_capacity(headers.len());
            for (header, value) in headers.iter().zip(values) {
                record.insert(header.clone(), value);
            }
            record
        })
        .collect()
}

/// Format a JSON number the way JavaScript stringifies it.
fn js_number(n: &serde_json::Number) -> String {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.is_finite()
        && f.fract() == 0.0
        && f.abs() < 1e21
    {
        return format!("{f:.0}");
    }
    n.to_string()
}

/// String coercion matching JavaScript's `'' + value`.
pub(crate) fn js_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => js_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// The enumerable keys of a value, as `Object.keys` reports them.
pub(crate) fn js_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Look up `row[key]`; `None` stands for `undefined`.
fn js_get(row: &Value, key: &str) -> Option<Value> {
    match row {
        Value::Object(map) => map.get(key).cloned(),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        Value::String(s) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string())),
        _ => None,
    }
}

/// Serialize rows to CSV using the first row's keys as the column order.
///
/// The header line is unquoted; every cell is wrapped in double quotes with
/// embedded quotes written as `\"`. Null and missing values become `""`.
/// Empty input produces an empty string.
pub fn to_csv(rows: &[Value]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers = js_keys(first);

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));

    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|header| {
                let text = js_get(row, header).map(|v| js_string(&v)).unwrap_or_default();
                format!("\"{}\"", text.replace('"', "\\\""))
            })
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

/// Convert a record into a JSON object with string values, preserving key order.
pub fn record_to_value(record: &TabularRecord) -> Value {
    let map: Map<String, Value> = record
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(map)
}

/// Serialize parsed records back to CSV.
pub fn records_to_csv(records: &[TabularRecord]) -> String {
    let rows: Vec<Value> = records.iter().map(record_to_value).collect();
    to_csv(&rows)
}
