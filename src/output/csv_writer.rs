//! CSV Writer
//!
//! Schema-aware CSV writing shared by modules. Each module passes its own
//! column schema, so the writer stays reusable without knowing any module's
//! record shape. Always writes a header row, even with no data.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Write JSON records to a CSV file with an optional column schema.
///
/// With a schema, columns follow it exactly: keys outside the schema are
/// dropped (with a warning), missing fields become empty cells. Without a
/// schema, columns are the sorted union of keys across the data.
pub fn write_csv_with_schema(path: &Path, data: &[Value], schema: Option<&[&str]>) -> Result<()> {
    let fieldnames: Vec<String> = match schema {
        Some(schema) => {
            if !data.is_empty() {
                let data_keys = collect_keys(data);
                let extra: Vec<&String> = data_keys
                    .iter()
                    .filter(|key| !schema.contains(&key.as_str()))
                    .collect();
                if !extra.is_empty() {
                    tracing::warn!("Data contains keys not in schema: {:?}. These will be ignored.", extra);
                }
            }
            schema.iter().map(|s| s.to_string()).collect()
        }
        None if data.is_empty() => {
            // Fallback headers when there is neither schema nor data
            tracing::warn!(
                "No schema provided and no data available for {}, using default headers",
                path.display()
            );
            vec!["id".to_string(), "name".to_string(), "type".to_string()]
        }
        None => collect_keys(data).into_iter().collect(),
    };

    if data.is_empty() {
        tracing::warn!(
            "No data to write to {}, creating file with headers only",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    writer
        .write_record(&fieldnames)
        .context("Failed to write CSV header")?;

    for record in data {
        let row: Vec<String> = fieldnames
            .iter()
            .map(|field| cell_text(record.get(field)))
            .collect();
        writer.write_record(&row).context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush CSV file")?;

    tracing::info!(
        "Successfully wrote {} records to {}",
        data.len(),
        path.display()
    );

    Ok(())
}

/// Write JSON records to a CSV file, deriving the headers from the data.
pub fn write_csv(path: &Path, data: &[Value]) -> Result<()> {
    write_csv_with_schema(path, data, None)
}

fn collect_keys(data: &[Value]) -> BTreeSet<String> {
    data.iter()
        .filter_map(|record| record.as_object())
        .flat_map(|map| map.keys().cloned())
        .collect()
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_empty_data_with_schema_writes_headers_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_csv_with_schema(&path, &[], Some(&["id", "name"])).unwrap();

        assert_eq!(read_lines(&path), vec!["id,name"]);
    }

    #[test]
    fn test_empty_data_without_schema_uses_default_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_csv(&path, &[]).unwrap();

        assert_eq!(read_lines(&path), vec!["id,name,type"]);
    }

    #[test]
    fn test_schema_fills_missing_and_drops_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");

        let data = vec![
            json!({"id": "1", "name": "first", "secret": "drop-me"}),
            json!({"id": "2"}),
        ];
        write_csv_with_schema(&path, &data, Some(&["id", "name"])).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines[0], "id,name");
        assert_eq!(lines[1], "1,first");
        assert_eq!(lines[2], "2,");
        assert!(!lines.iter().any(|l| l.contains("drop-me")));
    }

    #[test]
    fn test_derived_headers_are_sorted_union() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");

        let data = vec![json!({"b": "2", "a": "1"}), json!({"c": "3"})];
        write_csv(&path, &data).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines[0], "a,b,c");
        assert_eq!(lines[1], "1,2,");
        assert_eq!(lines[2], ",,3");
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("data.csv");

        write_csv_with_schema(&path, &[], Some(&["id"])).unwrap();

        assert!(path.exists());
    }
}
