//! Terminal table rendering
//!
//! Renders lists of JSON records as tables given a column mapping from
//! JSON path to header.

use prettytable::{Cell, Row, Table};
use serde_json::Value;

/// Column mapping: JSON dot-path to display header.
pub type Columns<'a> = &'a [(&'a str, &'a str)];

/// Build a table from JSON records.
pub fn format_table(columns: Columns, records: &[Value]) -> Table {
    let mut table = Table::new();

    table.set_titles(Row::new(
        columns.iter().map(|(_, header)| Cell::new(header)).collect(),
    ));

    for record in records {
        table.add_row(Row::new(
            columns
                .iter()
                .map(|(path, _)| Cell::new(&extract_json_value(record, path)))
                .collect(),
        ));
    }

    table
}

/// Print records as a table, or a "not found" notice when empty.
pub fn display_records(title: &str, columns: Columns, records: &[Value]) {
    if records.is_empty() {
        println!("No {} found", title.to_lowercase());
        return;
    }

    println!("{}", title);
    format_table(columns, records).printstd();
}

/// Extract a value from JSON using a dot-notation path
pub fn extract_json_value(item: &Value, path: &str) -> String {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = item;

    for part in parts {
        // Handle array index
        if let Ok(idx) = part.parse::<usize>() {
            current = match current.get(idx) {
                Some(v) => v,
                None => return "-".to_string(),
            };
        } else {
            current = match current.get(part) {
                Some(v) => v,
                None => return "-".to_string(),
            };
        }
    }

    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(_) => "[object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_simple_path() {
        let item = json!({"name": "cap-1", "location": "westeurope"});
        assert_eq!(extract_json_value(&item, "name"), "cap-1");
        assert_eq!(extract_json_value(&item, "location"), "westeurope");
    }

    #[test]
    fn test_extract_nested_path() {
        let item = json!({"sku": {"name": "F64"}, "properties": {"state": "Active"}});
        assert_eq!(extract_json_value(&item, "sku.name"), "F64");
        assert_eq!(extract_json_value(&item, "properties.state"), "Active");
    }

    #[test]
    fn test_extract_missing_path_yields_dash() {
        let item = json!({"name": "cap-1"});
        assert_eq!(extract_json_value(&item, "sku.name"), "-");
        assert_eq!(extract_json_value(&item, "nope"), "-");
    }

    #[test]
    fn test_extract_array_index() {
        let item = json!({"tags": ["prod", "emea"]});
        assert_eq!(extract_json_value(&item, "tags.1"), "emea");
        assert_eq!(extract_json_value(&item, "tags.5"), "-");
    }

    #[test]
    fn test_format_table_has_all_rows() {
        let records = vec![
            json!({"name": "a", "location": "westus"}),
            json!({"name": "b", "location": "eastus"}),
        ];
        let table = format_table(&[("name", "Name"), ("location", "Location")], &records);
        assert_eq!(table.len(), 2);
    }
}
