// src/export.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::error::{ClientError, Result};
use crate::state::unix_ms;
use crate::types::{Message, Row};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ClientError::InvalidSelection(format!(
                "unknown export format: {}",
                other
            ))),
        }
    }
}

/// The table a message offers for export: the report's rows when it has
/// any, otherwise the raw data.
pub fn export_rows(message: &Message) -> Vec<Row> {
    let from_report = message.report().map(|p| p.rows()).unwrap_or_default();
    if !from_report.is_empty() {
        return from_report;
    }
    message.raw_data.clone().unwrap_or_default()
}

/// Column order is the order in which keys are first seen across rows.
pub fn headers(rows: &[Row]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !out.iter().any(|h| h == key) {
                out.push(key.clone());
            }
        }
    }
    out
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn to_csv(rows: &[Row]) -> String {
    let headers = headers(rows);
    let mut out = String::new();

    let header_line: Vec<String> = headers.iter().map(|h| escape_field(h)).collect();
    out.push_str(&header_line.join(","));
    out.push('\n');

    for row in rows {
        let line: Vec<String> = headers
            .iter()
            .map(|h| escape_field(&field_text(row.get(h))))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

pub fn to_json(rows: &[Row]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

/// Writes `{stem}_{unix_ms}.{ext}` into `dir` and returns its path.
pub fn write_export(rows: &[Row], format: ExportFormat, dir: &Path, stem: &str) -> Result<PathBuf> {
    if rows.is_empty() {
        return Err(ClientError::InvalidSelection(
            "nothing to export".to_string(),
        ));
    }

    fs::create_dir_all(dir)?;

    let body = match format {
        ExportFormat::Csv => to_csv(rows),
        ExportFormat::Json => to_json(rows)?,
    };

    let path = dir.join(format!(
        "{}_{}.{}",
        sanitize_stem(stem),
        unix_ms(),
        format.extension()
    ));
    fs::write(&path, body)?;

    info!(path = %path.display(), rows = rows.len(), "export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    /// Reads `to_csv` output back with the `csv` crate.
    fn parse_csv(text: &str) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(text.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn round_trips_embedded_comma() {
        let data = rows(json!([{"a": "x,y", "b": 1}]));
        let csv = to_csv(&data);
        assert_eq!(csv, "a,b\n\"x,y\",1\n");

        let parsed = parse_csv(&csv);
        assert_eq!(parsed[0], vec!["a", "b"]);
        assert_eq!(parsed[1], vec!["x,y", "1"]);
        assert_eq!(parsed[1][1].parse::<i64>().unwrap(), 1);
    }

    #[test]
    fn doubles_embedded_quotes_and_keeps_newlines() {
        let data = rows(json!([{"name": "say \"hi\"", "note": "two\nlines"}]));
        let parsed = parse_csv(&to_csv(&data));
        assert_eq!(parsed[1], vec!["say \"hi\"", "two\nlines"]);
    }

    #[test]
    fn headers_are_union_in_first_seen_order() {
        let data = rows(json!([
            {"deck": "A", "value": 1},
            {"deck": "B", "delta": 2, "value": 3}
        ]));
        let csv = to_csv(&data);
        let parsed = parse_csv(&csv);
        assert_eq!(parsed[0], vec!["deck", "value", "delta"]);
        assert_eq!(parsed[1], vec!["A", "1", ""]);
        assert_eq!(parsed[2], vec!["B", "3", "2"]);
    }

    #[test]
    fn nulls_are_empty_and_nested_values_are_json() {
        let data = rows(json!([{"a": null, "b": [1, 2], "c": true}]));
        let parsed = parse_csv(&to_csv(&data));
        assert_eq!(parsed[1], vec!["", "[1,2]", "true"]);
    }

    #[test]
    fn json_export_is_pretty() {
        let data = rows(json!([{"a": 1}]));
        assert_eq!(to_json(&data).unwrap(), "[\n  {\n    \"a\": 1\n  }\n]");
    }

    #[test]
    fn writes_file_with_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let data = rows(json!([{"a": 1}]));
        let path = write_export(&data, ExportFormat::Csv, dir.path(), "load curve/SE").unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("load_curve_SE_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a\n1\n");
    }

    #[test]
    fn refuses_empty_exports() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_export(&[], ExportFormat::Json, dir.path(), "x").is_err());
    }

    #[test]
    fn export_rows_prefer_report_table() {
        let mut message = Message::assistant("done");
        message.raw_data = Some(rows(json!([{"raw": 1}])));
        assert_eq!(export_rows(&message)[0].get("raw"), Some(&json!(1)));

        message.comparison = Some(
            serde_json::from_value(json!({"comparison_table": [{"deck": "A"}]})).unwrap(),
        );
        assert_eq!(export_rows(&message)[0].get("deck"), Some(&json!("A")));
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }
}
