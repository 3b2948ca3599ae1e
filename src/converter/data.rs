//! Conversions among JSON, CSV and plain text through a JSON value.

use serde_json::{Map, Value};

use crate::converter::csv_codec::{self, js_string};
use crate::converter::{ConversionResult, decode_text};
use crate::error::ConvertError;
use crate::format::DataFormat;
use crate::source::SourceFile;

/// Parse the source text into the intermediate JSON value.
///
/// The file extension picks the reader: `.json` is parsed, `.csv` becomes an
/// array of string records, `.txt` an array of `{"line": ...}` objects, and
/// anything else a single `{"content": ...}` object.
fn read_intermediate(extension: &str, text: &str) -> Result<Value, ConvertError> {
    match extension {
        "json" => serde_json::from_str(text).map_err(|e| {
            tracing::debug!(error = %e, "JSON source did not parse");
            ConvertError::InvalidJson
        }),
        "csv" => Ok(Value::Array(
            csv_codec::parse_csv(text)
                .iter()
                .map(csv_codec::record_to_value)
                .collect(),
        )),
        "txt" => Ok(Value::Array(
            text.split('\n')
                .map(|line| {
                    let mut row = Map::new();
                    row.insert("line".to_string(), Value::String(line.to_string()));
                    Value::Object(row)
                })
                .collect(),
        )),
        _ => {
            let mut row = Map::new();
            row.insert("content".to_string(), Value::String(text.to_string()));
            Ok(Value::Object(row))
        }
    }
}

/// Rewrite whole-valued floats (`1.0`, `1e2`) as integers so they serialize
/// the way `JSON.stringify` prints them.
fn normalize_numbers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            let whole = n
                .as_f64()
                .filter(|f| n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e18);
            if let Some(f) = whole {
                *n = serde_json::Number::from(f as i64);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_numbers),
        Value::Object(map) => map.values_mut().for_each(normalize_numbers),
        _ => {}
    }
}

/// The values of a row in key order, as `Object.values` yields them.
fn row_values(row: &Value) -> Vec<String> {
    let cell = |v: &Value| match v {
        Value::Null => String::new(),
        other => js_string(other),
    };
    match row {
        Value::Object(map) => map.values().map(cell).collect(),
        Value::Array(items) => items.iter().map(cell).collect(),
        Value::String(s) => s.chars().map(String::from).collect(),
        _ => Vec::new(),
    }
}

/// Render the intermediate value as plain text.
///
/// Strings pass through; arrays become one line per element with the
/// element's values joined by a space; anything else is compact JSON.
fn to_text(value: &Value) -> Result<String, ConvertError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Array(rows) => Ok(rows
            .iter()
            .map(|row| row_values(row).join(" "))
            .collect::<Vec<_>>()
            .join("\n")),
        other => Ok(serde_json::to_string(other)?),
    }
}

/// Convert a JSON, CSV or text file into another data format.
pub fn convert_data(
    source: &SourceFile,
    target: DataFormat,
) -> Result<ConversionResult, ConvertError> {
    let (text, warning) = decode_text(&source.data);
    let extension = source.extension().unwrap_or_default();
    let mut value = read_intermediate(&extension, &text)?;
    normalize_numbers(&mut value);

    let output = match target {
        DataFormat::Json => serde_json::to_string_pretty(&value)?,
        DataFormat::Csv => match &value {
            Value::Array(rows) => csv_codec::to_csv(rows),
            _ => return Err(ConvertError::NonArrayToCsv),
        },
        DataFormat::Txt => to_text(&value)?,
    };

    tracing::debug!(
        source = %source.name,
        target = %target,
        bytes = output.len(),
        "converted data file"
    );

    Ok(ConversionResult::new(output.into_bytes(), target.mime_type())
        .with_warnings(warning.into_iter().collect()))
}
