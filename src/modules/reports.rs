//! Reports module
//!
//! Assembles existing module output files into a single HTML report. Makes
//! no Azure calls: it reads CSV files produced by other modules from the
//! output directory, converts them into HTML tables, and embeds any
//! visualisation images found next to them.

use crate::dispatch::{ArgumentSet, Callable, Module, ResultEnvelope};
use anyhow::{Context, Result};
use futures::FutureExt;
use serde_json::json;
use std::path::PathBuf;

use super::topology::DEFAULT_OUTPUT_DIR;

/// CSV files produced by the topology module.
const TOPOLOGY_FILES: &[(&str, &str)] = &[
    ("Subscriptions", "subscriptions.csv"),
    ("Management Groups", "management_groups.csv"),
    ("Resource Groups", "resource_groups.csv"),
    ("Resources", "resources.csv"),
];

/// Visualisation images embedded when present.
const TOPOLOGY_IMAGES: &[&str] = &[
    "mgmt_groups_subscriptions.png",
    "subscriptions_resource_groups.png",
    "resource_groups_resources.png",
    "complete_azure_hierarchy.png",
];

/// CSV files produced by the Power BI module.
const POWERBI_FILES: &[(&str, &str)] = &[
    ("Capacities", "capacities.csv"),
    ("Workspaces", "workspaces.csv"),
    ("Workspace Users", "workspace_users.csv"),
    ("Dashboards", "dashboards.csv"),
    ("Dataflows", "dataflows.csv"),
    ("Datasets", "datasets.csv"),
];

/// Manager to generate HTML reports from existing data files.
struct ReportsManager {
    output_dir: PathBuf,
}

impl ReportsManager {
    fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Load a CSV file as headers plus rows, skipping missing/empty/broken files.
    fn load_csv(&self, filename: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
        let path = self.output_dir.join(filename);
        let metadata = std::fs::metadata(&path).ok()?;
        if metadata.len() == 0 {
            return None;
        }

        let mut reader = match csv::Reader::from_path(&path) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!("Failed to load CSV {}: {}", filename, e);
                return None;
            }
        };

        let headers = match reader.headers() {
            Ok(headers) => headers.iter().map(str::to_string).collect(),
            Err(e) => {
                tracing::warn!("Failed to read CSV headers from {}: {}", filename, e);
                return None;
            }
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            match record {
                Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
                Err(e) => {
                    tracing::warn!("Skipping malformed row in {}: {}", filename, e);
                }
            }
        }

        if rows.is_empty() {
            return None;
        }
        Some((headers, rows))
    }

    fn add_section(parts: &mut Vec<String>, title: &str, headers: &[String], rows: &[Vec<String>]) {
        parts.push(format!("<h2>{}</h2>", escape_html(title)));
        parts.push("<table border=\"1\">".to_string());

        let header_cells: String = headers
            .iter()
            .map(|h| format!("<th>{}</th>", escape_html(h)))
            .collect();
        parts.push(format!("<tr>{}</tr>", header_cells));

        for row in rows {
            let cells: String = row
                .iter()
                .map(|cell| format!("<td>{}</td>", escape_html(cell)))
                .collect();
            parts.push(format!("<tr>{}</tr>", cells));
        }

        parts.push("</table>".to_string());
    }

    /// Generate the HTML report file and return its path.
    fn build_report(&self) -> Result<PathBuf> {
        let mut parts: Vec<String> = vec![
            "<html>".to_string(),
            "<head><title>FabFriend Report</title></head>".to_string(),
            "<body>".to_string(),
            "<h1>FabFriend Report</h1>".to_string(),
        ];

        for (title, filename) in TOPOLOGY_FILES {
            if let Some((headers, rows)) = self.load_csv(filename) {
                Self::add_section(&mut parts, title, &headers, &rows);
            }
        }

        for image in TOPOLOGY_IMAGES {
            if self.output_dir.join(image).exists() {
                parts.push(format!(
                    "<img src=\"{img}\" alt=\"{img}\" style=\"max-width: 100%;\">",
                    img = image
                ));
            }
        }

        for (title, filename) in POWERBI_FILES {
            if let Some((headers, rows)) = self.load_csv(filename) {
                Self::add_section(&mut parts, title, &headers, &rows);
            }
        }

        parts.push("</body></html>".to_string());

        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let report_path = self.output_dir.join("report.html");
        std::fs::write(&report_path, parts.join("\n"))
            .with_context(|| format!("Failed to write report to {}", report_path.display()))?;

        Ok(report_path)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The `reports` module.
pub struct ReportsModule;

impl ReportsModule {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, args: ArgumentSet) -> Result<ResultEnvelope> {
        tracing::info!("Generating HTML report");

        let output_dir = PathBuf::from(
            args.extra_str("output_dir").unwrap_or(DEFAULT_OUTPUT_DIR),
        );
        let manager = ReportsManager::new(output_dir);
        let report_path = manager.build_report()?;

        tracing::info!("Report generated at {}", report_path.display());
        Ok(ResultEnvelope::success(json!({
            "report": report_path.display().to_string(),
        })))
    }
}

impl Default for ReportsModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for ReportsModule {
    fn name(&self) -> &'static str {
        "reports"
    }

    fn description(&self) -> &'static str {
        "HTML report assembly from exported files"
    }

    fn entry_point(&self) -> Option<Callable<'_>> {
        Some(Box::new(move |args| self.run(args).boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_report_includes_populated_csv_sections() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "resources.csv",
            "id,name,type\n/sub/r1,vm-1,Microsoft.Compute/virtualMachines\n",
        );

        let manager = ReportsManager::new(dir.path().to_path_buf());
        let report_path = manager.build_report().unwrap();

        let html = std::fs::read_to_string(report_path).unwrap();
        assert!(html.contains("<h2>Resources</h2>"));
        assert!(html.contains("<td>vm-1</td>"));
    }

    #[test]
    fn test_report_skips_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "subscriptions.csv", "");
        write_file(dir.path(), "capacities.csv", "id,name\n");

        let manager = ReportsManager::new(dir.path().to_path_buf());
        let report_path = manager.build_report().unwrap();

        let html = std::fs::read_to_string(report_path).unwrap();
        assert!(!html.contains("<h2>Subscriptions</h2>"));
        assert!(!html.contains("<h2>Capacities</h2>"));
        assert!(!html.contains("<h2>Resources</h2>"));
    }

    #[test]
    fn test_report_embeds_existing_images() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "complete_azure_hierarchy.png", "not-a-real-png");

        let manager = ReportsManager::new(dir.path().to_path_buf());
        let report_path = manager.build_report().unwrap();

        let html = std::fs::read_to_string(report_path).unwrap();
        assert!(html.contains("src=\"complete_azure_hierarchy.png\""));
    }

    #[test]
    fn test_cell_text_is_html_escaped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "resources.csv",
            "id,name\n/sub/r1,\"<script>alert(1)</script>\"\n",
        );

        let manager = ReportsManager::new(dir.path().to_path_buf());
        let report_path = manager.build_report().unwrap();

        let html = std::fs::read_to_string(report_path).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
