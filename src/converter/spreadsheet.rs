use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{Datelike, Timelike};
use serde_json::{Map, Number, Value};

use crate::converter::{ConversionWarning, WarningCode};
use crate::error::ConvertError;
use crate::markup::{build_table, html_page};

/// Reads the first worksheet of a workbook.
pub trait SpreadsheetCodec: Send + Sync {
    fn first_sheet(&self, data: &[u8]) -> Result<Worksheet, ConvertError>;
}

/// A single worksheet cell after workbook decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Display text: whole numbers without a fraction, booleans as `TRUE`/`FALSE`.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(f) => {
                if f.is_finite() && f.fract() == 0.0 {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
            Cell::Bool(true) => "TRUE".to_string(),
            Cell::Bool(false) => "FALSE".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                    Value::Number(Number::from(*f as i64))
                } else {
                    Number::from_f64(*f).map_or(Value::Null, Value::Number)
                }
            }
        }
    }
}

/// The decoded contents of one worksheet.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
    pub warnings: Vec<ConversionWarning>,
}

impl Worksheet {
    fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::display).collect())
            .collect()
    }

    /// Comma-separated rows joined by `\n`, quoting only where needed.
    pub fn to_csv(&self) -> Result<String, ConvertError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(Vec::new());
        for row in self.display_rows() {
            writer.write_record(&row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ConvertError::Io(e.into_error()))?;
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }

    /// Header-keyed objects for every non-blank row after the first, pretty-printed.
    pub fn to_json(&self) -> Result<String, ConvertError> {
        let Some((header_row, body)) = self.rows.split_first() else {
            return Ok("[]".to_string());
        };
        let keys = header_keys(header_row);

        let objects: Vec<Value> = body
            .iter()
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .map(|row| {
                let mut object = Map::new();
                for (key, cell) in keys.iter().zip(row) {
                    if !cell.is_empty() {
                        object.insert(key.clone(), cell.to_json());
                    }
                }
                Value::Object(object)
            })
            .collect();

        Ok(serde_json::to_string_pretty(&Value::Array(objects))?)
    }

    /// A standalone HTML page holding the sheet as a table.
    pub fn to_html(&self) -> String {
        html_page(&self.name, &build_table(&self.display_rows()))
    }
}

/// Unique object keys for a header row.
///
/// Blank headers become `__EMPTY`, `__EMPTY_1`, ...; repeated names get
/// `_1`, `_2`, ... suffixes.
fn header_keys(header_row: &[Cell]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(header_row.len());
    for cell in header_row {
        let base = match cell.display() {
            s if s.is_empty() => "__EMPTY".to_string(),
            s => s,
        };
        let mut key = base.clone();
        let mut n = 1;
        while keys.contains(&key) {
            key = format!("{base}_{n}");
            n += 1;
        }
        keys.push(key);
    }
    keys
}

/// Convert a 0-based column index to an Excel-style column letter (A, B, ..., Z, AA, ...).
fn col_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Map a calamine value onto a [`Cell`].
///
/// Dates are rendered as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
/// Error cells keep their error text (e.g. `#DIV/0!`) and emit a warning.
fn decode_cell(cell: &Data, location: &str, warnings: &mut Vec<ConversionWarning>) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.hour() == 0 && ndt.minute() == 0 && ndt.second() == 0 => {
                Cell::Text(format!(
                    "{:04}-{:02}-{:02}",
                    ndt.year(),
                    ndt.month(),
                    ndt.day()
                ))
            }
            Some(ndt) => Cell::Text(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                ndt.year(),
                ndt.month(),
                ndt.day(),
                ndt.hour(),
                ndt.minute(),
                ndt.second()
            )),
            None => Cell::Text(dt.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => {
            let text = e.to_string();
            warnings.push(
                ConversionWarning::new(
                    WarningCode::MalformedSegment,
                    format!("cell contains error: {text}"),
                )
                .at(location),
            );
            Cell::Text(text)
        }
    }
}

/// Workbook reader backed by `calamine` (xlsx, xlsm, xls, ods).
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineCodec;

impl SpreadsheetCodec for CalamineCodec {
    fn first_sheet(&self, data: &[u8]) -> Result<Worksheet, ConvertError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
        let Some(name) = workbook.sheet_names().first().cloned() else {
            return Err(ConvertError::MalformedDocument {
                reason: "workbook has no sheets".to_string(),
            });
        };
        let range = workbook.worksheet_range(&name)?;

        let mut warnings = Vec::new();
        let rows = range
            .rows()
            .enumerate()
            .map(|(ri, row)| {
                row.iter()
                    .enumerate()
                    .map(|(ci, cell)| {
                        let location = format!("{name}!{}{}", col_letter(ci), ri + 1);
                        decode_cell(cell, &location, &mut warnings)
                    })
                    .collect()
            })
            .collect();

        tracing::debug!(sheet = %name, rows = range.height(), "read first worksheet");
        Ok(Worksheet {
            name,
            rows,
            warnings,
        })
    }
}
