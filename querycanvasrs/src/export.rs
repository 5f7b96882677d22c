//! CSV and JSON renditions of a [`QueryResult`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueryCanvasError, Result};
use crate::executor::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "query-results.csv",
            ExportFormat::Json => "query-results.json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn render(&self, result: &QueryResult) -> Result<String> {
        match self {
            ExportFormat::Csv => Ok(to_csv(result)),
            ExportFormat::Json => to_json(result),
        }
    }
}

/// Header line of column names followed by one line per row.
///
/// The header is written even when there are no rows.
pub fn to_csv(result: &QueryResult) -> String {
    let mut out = String::new();
    push_record(&mut out, result.columns.iter().map(String::as_str));
    for row in &result.rows {
        out.push('\n');
        let fields: Vec<String> = result
            .columns
            .iter()
            .map(|col| field_text(row.get(col)))
            .collect();
        push_record(&mut out, fields.iter().map(String::as_str));
    }
    out
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\r', '\n']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Rows as a two-space indented JSON array, keys in column order.
pub fn to_json(result: &QueryResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(&result.rows)?)
}

/// Parse CSV text produced by [`to_csv`]. Every value comes back as a string.
pub fn parse_csv(text: &str) -> Result<(Vec<String>, Vec<Map<String, Value>>)> {
    let mut records = read_records(text)?.into_iter();
    let Some(columns) = records.next() else {
        return Ok((Vec::new(), Vec::new()));
    };

    let mut rows = Vec::new();
    for (line, record) in records.enumerate() {
        if record.len() != columns.len() {
            return Err(QueryCanvasError::Validation(format!(
                "csv record {} has {} fields, expected {}",
                line + 2,
                record.len(),
                columns.len()
            )));
        }
        let row: Map<String, Value> = columns
            .iter()
            .cloned()
            .zip(record.into_iter().map(Value::String))
            .collect();
        rows.push(row);
    }
    Ok((columns, rows))
}

fn read_records(text: &str) -> Result<Vec<Vec<String>>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if quoted {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() => quoted = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if quoted {
        return Err(QueryCanvasError::Validation(
            "csv ends inside a quoted field".to_string(),
        ));
    }
    record.push(field);
    records.push(record);
    Ok(records)
}

/// Render `result` in `format` and write it to `path`.
pub fn write_export(path: impl AsRef<Path>, result: &QueryResult, format: ExportFormat) -> Result<()> {
    let path = path.as_ref();
    let content = format.render(result)?;
    std::fs::write(path, content)?;
    tracing::info!(
        path = %path.display(),
        format = ?format,
        rows = result.row_count,
        "exported query results"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result() -> QueryResult {
        let rows = vec![
            json!({ "id": 1, "name": "Doe, John", "note": "said \"hi\"", "active": true }),
            json!({ "id": 2, "name": "Jane", "note": null, "active": false }),
        ]
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
        QueryResult::from_rows(
            vec!["id".into(), "name".into(), "note".into(), "active".into()],
            rows,
        )
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        let csv = to_csv(&result());
        assert_eq!(
            csv,
            "id,name,note,active\n1,\"Doe, John\",\"said \"\"hi\"\"\",true\n2,Jane,,false"
        );
    }

    #[test]
    fn csv_of_empty_result_is_header_only() {
        let empty = QueryResult::from_rows(vec!["a".into(), "b".into()], Vec::new());
        assert_eq!(to_csv(&empty), "a,b");
    }

    #[test]
    fn json_is_pretty_and_ordered() {
        let text = to_json(&result()).unwrap();
        assert!(text.starts_with("[\n  {\n    \"id\": 1,\n    \"name\": \"Doe, John\""));
        let back: Vec<Map<String, Value>> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, result().rows);
    }

    #[test]
    fn parse_reads_back_quoted_fields() {
        let (columns, rows) = parse_csv(&to_csv(&result())).unwrap();
        assert_eq!(columns, vec!["id", "name", "note", "active"]);
        assert_eq!(rows[0]["name"], "Doe, John");
        assert_eq!(rows[0]["note"], "said \"hi\"");
        assert_eq!(rows[1]["note"], "");
        assert_eq!(rows[1]["id"], "2");
    }

    #[test]
    fn parse_rejects_ragged_and_unterminated_input() {
        assert!(parse_csv("a,b\n1").is_err());
        assert!(parse_csv("a\n\"open").is_err());
        assert_eq!(parse_csv("").unwrap(), (Vec::new(), Vec::new()));
    }

    #[test]
    fn writes_file_per_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ExportFormat::Csv.file_name());
        write_export(&path, &result(), ExportFormat::Csv).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("id,name,note,active\n"));
        assert_eq!(ExportFormat::Json.content_type(), "application/json");
    }
}
