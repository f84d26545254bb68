//! Azure topology module
//!
//! Maps the resource groups and resources under a subscription into a
//! node/connection graph, and can export the flat CSV files the reports
//! module consumes. Dependency lookup for a single resource returns the
//! other resources in the same resource group.

use crate::azure::client::AzureClient;
use crate::dispatch::{ArgumentSet, Callable, Module, ResultEnvelope};
use crate::output::csv_writer::write_csv_with_schema;
use anyhow::{Context, Result};
use futures::FutureExt;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const API_VERSION: &str = "2021-04-01";

/// Default output directory for exports when none is passed.
pub const DEFAULT_OUTPUT_DIR: &str = "./outputs";

const SUBSCRIPTIONS_SCHEMA: &[&str] = &["id", "name"];
const RESOURCE_GROUPS_SCHEMA: &[&str] = &["id", "name", "location"];
const RESOURCES_SCHEMA: &[&str] = &["id", "name", "type", "location", "resource_group"];

/// Manager for the resource topology of one subscription.
struct TopologyManager {
    client: AzureClient,
    subscription_id: String,
}

impl TopologyManager {
    fn new(subscription_id: &str) -> Result<Self> {
        Ok(Self {
            client: AzureClient::new(subscription_id)?,
            subscription_id: subscription_id.to_string(),
        })
    }

    async fn list_resource_groups(&self) -> Result<Vec<Value>> {
        let url = self.client.subscription_url("resourcegroups", API_VERSION);
        self.client.get_all_pages(&url).await
    }

    async fn list_resources(&self, resource_group: Option<&str>) -> Result<Vec<Value>> {
        let url = match resource_group {
            Some(group) => self
                .client
                .resource_group_url(group, "resources", API_VERSION),
            None => self.client.subscription_url("resources", API_VERSION),
        };
        self.client.get_all_pages(&url).await
    }

    /// Assemble the subscription's topology as nodes and connections.
    async fn get_resource_topology(
        &self,
        resource_group: Option<&str>,
        resource_type: Option<&str>,
    ) -> Result<Value> {
        tracing::info!("Getting Azure resource topology");

        let groups = self.list_resource_groups().await?;
        let resources = filter_by_type(self.list_resources(resource_group).await?, resource_type);

        let mut nodes = Vec::new();
        let mut connections = Vec::new();

        let subscription_node_id = format!("/subscriptions/{}", self.subscription_id);
        nodes.push(json!({
            "id": subscription_node_id,
            "name": self.subscription_id,
            "kind": "subscription",
        }));

        for group in &groups {
            let name = string_field(group, "name");
            if let Some(filter) = resource_group {
                if !name.eq_ignore_ascii_case(filter) {
                    continue;
                }
            }
            let id = string_field(group, "id");
            nodes.push(json!({
                "id": id,
                "name": name,
                "kind": "resource_group",
                "location": string_field(group, "location"),
            }));
            connections.push(json!({
                "source": subscription_node_id,
                "target": id,
            }));
        }

        for resource in &resources {
            let id = string_field(resource, "id");
            nodes.push(json!({
                "id": id,
                "name": string_field(resource, "name"),
                "kind": string_field(resource, "type"),
                "location": string_field(resource, "location"),
            }));
            if let Some(group_name) = extract_resource_group(&id) {
                connections.push(json!({
                    "source": format!(
                        "/subscriptions/{}/resourceGroups/{}",
                        self.subscription_id, group_name
                    ),
                    "target": id,
                }));
            }
        }

        Ok(json!({ "nodes": nodes, "connections": connections }))
    }

    /// Resources sharing a resource group with the given resource,
    /// excluding the resource itself.
    async fn get_resource_dependencies(&self, resource_id: &str) -> Result<Vec<Value>> {
        tracing::info!("Getting dependencies for resource {}", resource_id);

        let group = extract_resource_group(resource_id)
            .context("resource id does not contain a resource group segment")?;

        let resources = self.list_resources(Some(group.as_str())).await?;
        Ok(resources
            .into_iter()
            .filter(|r| {
                r.get("id")
                    .and_then(|v| v.as_str())
                    .map(|id| !id.eq_ignore_ascii_case(resource_id))
                    .unwrap_or(true)
            })
            .collect())
    }

    /// Export the standard topology CSV files and return their paths.
    async fn export(
        &self,
        output_dir: &Path,
        resource_group: Option<&str>,
        resource_type: Option<&str>,
    ) -> Result<Vec<PathBuf>> {
        tracing::info!("Exporting topology CSV files to {}", output_dir.display());

        let groups = self.list_resource_groups().await?;
        let resources = filter_by_type(self.list_resources(resource_group).await?, resource_type);

        let subscription_rows = vec![json!({
            "id": self.subscription_id,
            "name": self.subscription_id,
        })];
        let group_rows: Vec<Value> = groups
            .iter()
            .map(|g| {
                json!({
                    "id": string_field(g, "id"),
                    "name": string_field(g, "name"),
                    "location": string_field(g, "location"),
                })
            })
            .collect();
        let resource_rows: Vec<Value> = resources
            .iter()
            .map(|r| {
                let id = string_field(r, "id");
                json!({
                    "id": id,
                    "name": string_field(r, "name"),
                    "type": string_field(r, "type"),
                    "location": string_field(r, "location"),
                    "resource_group": extract_resource_group(&id).unwrap_or_default(),
                })
            })
            .collect();

        let files = [
            ("subscriptions.csv", subscription_rows, SUBSCRIPTIONS_SCHEMA),
            ("resource_groups.csv", group_rows, RESOURCE_GROUPS_SCHEMA),
            ("resources.csv", resource_rows, RESOURCES_SCHEMA),
        ];

        let mut written = Vec::new();
        for (filename, rows, schema) in files {
            let path = output_dir.join(filename);
            write_csv_with_schema(&path, &rows, Some(schema))?;
            written.push(path);
        }

        Ok(written)
    }
}

/// Keep only resources matching the given type (case-insensitive), e.g.
/// "Microsoft.Web/sites". `None` keeps everything.
fn filter_by_type(resources: Vec<Value>, resource_type: Option<&str>) -> Vec<Value> {
    let Some(wanted) = resource_type else {
        return resources;
    };
    resources
        .into_iter()
        .filter(|r| {
            r.get("type")
                .and_then(|v| v.as_str())
                .map(|t| t.eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        })
        .collect()
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Pull the resource group name out of a full ARM resource id.
fn extract_resource_group(resource_id: &str) -> Option<String> {
    let mut segments = resource_id.split('/').skip_while(|s| s.is_empty());
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourcegroups") {
            return segments.next().map(str::to_string);
        }
    }
    None
}

/// The `topology` module.
pub struct TopologyModule {
    manager: RwLock<Option<Arc<TopologyManager>>>,
}

impl TopologyModule {
    pub fn new() -> Self {
        Self {
            manager: RwLock::new(None),
        }
    }

    async fn manager(&self, subscription_id: &str) -> Result<Arc<TopologyManager>> {
        {
            let cached = self.manager.read().await;
            if let Some(manager) = cached.as_ref() {
                if manager.subscription_id == subscription_id {
                    return Ok(manager.clone());
                }
            }
        }

        let manager = Arc::new(TopologyManager::new(subscription_id)?);
        *self.manager.write().await = Some(manager.clone());
        Ok(manager)
    }

    /// Default entry point. Branches on the injected `command` extra so that
    /// a dispatched `export` still lands here when the caller routed through
    /// the fallback path, then on the presence of a resource id.
    async fn run(&self, args: ArgumentSet) -> Result<ResultEnvelope> {
        tracing::info!("Running Azure topology module");

        if args.extra_str("command") == Some("export") {
            return self.export(args).await;
        }

        let manager = self.manager(&args.subscription_id).await?;
        match args.resource_id.as_deref() {
            Some(id) => {
                let dependencies = manager.get_resource_dependencies(id).await?;
                Ok(ResultEnvelope::success(
                    json!({ "dependencies": dependencies }),
                ))
            }
            None => {
                let topology = manager
                    .get_resource_topology(
                        args.resource_group.as_deref(),
                        args.extra_str("resource_type"),
                    )
                    .await?;
                Ok(ResultEnvelope::success(json!({ "topology": topology })))
            }
        }
    }

    async fn export(&self, args: ArgumentSet) -> Result<ResultEnvelope> {
        let manager = self.manager(&args.subscription_id).await?;
        let output_dir = PathBuf::from(
            args.extra_str("output_dir").unwrap_or(DEFAULT_OUTPUT_DIR),
        );
        let files = manager
            .export(
                &output_dir,
                args.resource_group.as_deref(),
                args.extra_str("resource_type"),
            )
            .await?;

        let files: Vec<String> = files
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        Ok(ResultEnvelope::success(json!({ "files": files })))
    }
}

impl Default for TopologyModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for TopologyModule {
    fn name(&self) -> &'static str {
        "topology"
    }

    fn description(&self) -> &'static str {
        "Azure resource topology"
    }

    fn entry_point(&self) -> Option<Callable<'_>> {
        Some(Box::new(move |args| self.run(args).boxed()))
    }

    fn command(&self, name: &str) -> Option<Callable<'_>> {
        match name {
            "export" => Some(Box::new(move |args| self.export(args).boxed())),
            _ => None,
        }
    }
}
