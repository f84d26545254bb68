//! Microsoft Fabric module
//!
//! Lists and inspects Microsoft Fabric capacities through the ARM API.
//! The manager instance is cached per subscription id and replaced when a
//! call arrives for a different subscription.

use crate::azure::client::AzureClient;
use crate::dispatch::{ArgumentSet, Callable, Module, ResultEnvelope};
use anyhow::{Context, Result};
use futures::FutureExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

const PROVIDER: &str = "Microsoft.Fabric";
const API_VERSION: &str = "2023-11-01";

/// Manager for Microsoft Fabric capacities in one subscription.
struct FabricManager {
    client: AzureClient,
    subscription_id: String,
}

impl FabricManager {
    fn new(subscription_id: &str) -> Result<Self> {
        Ok(Self {
            client: AzureClient::new(subscription_id)?,
            subscription_id: subscription_id.to_string(),
        })
    }

    /// List all Fabric capacities, optionally scoped to a resource group.
    async fn list_capacities(&self, resource_group: Option<&str>) -> Result<Vec<Value>> {
        tracing::info!("Listing Fabric capacities");

        let url = match resource_group {
            Some(group) => self
                .client
                .provider_in_group_url(group, PROVIDER, "capacities", API_VERSION),
            None => self.client.provider_url(PROVIDER, "capacities", API_VERSION),
        };

        let capacities = self.client.get_all_pages(&url).await?;
        Ok(capacities.into_iter().map(enrich_capacity).collect())
    }

    /// Get one capacity, either by full ARM resource id or by name within a
    /// resource group.
    async fn get_capacity(&self, resource_id: &str, resource_group: Option<&str>) -> Result<Value> {
        tracing::info!("Getting Fabric capacity {}", resource_id);

        let url = if resource_id.starts_with("/subscriptions/") {
            self.client.resource_id_url(resource_id, API_VERSION)
        } else {
            let group = resource_group
                .context("resource group is required when the capacity is given by name")?;
            self.client
                .named_resource_url(group, PROVIDER, "capacities", resource_id, API_VERSION)
        };

        Ok(enrich_capacity(self.client.get(&url).await?))
    }
}

/// Add computed display fields used by table rendering.
fn enrich_capacity(mut capacity: Value) -> Value {
    if let Some(obj) = capacity.as_object_mut() {
        let sku = obj
            .get("sku")
            .and_then(|v| v.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("-")
            .to_string();
        obj.insert("sku_display".to_string(), Value::String(sku));

        let state = obj
            .get("properties")
            .and_then(|v| v.get("state"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();
        obj.insert("state_display".to_string(), Value::String(state));
    }
    capacity
}

/// The `fabric` module.
pub struct FabricModule {
    manager: RwLock<Option<Arc<FabricManager>>>,
}

impl FabricModule {
    pub fn new() -> Self {
        Self {
            manager: RwLock::new(None),
        }
    }

    /// Get the cached manager for the subscription, creating or replacing it
    /// when the subscription id changed since the last call.
    async fn manager(&self, subscription_id: &str) -> Result<Arc<FabricManager>> {
        {
            let cached = self.manager.read().await;
            if let Some(manager) = cached.as_ref() {
                if manager.subscription_id == subscription_id {
                    return Ok(manager.clone());
                }
            }
        }

        let manager = Arc::new(FabricManager::new(subscription_id)?);
        *self.manager.write().await = Some(manager.clone());
        Ok(manager)
    }

    /// Default entry point: get when a resource id is present, list otherwise.
    async fn run(&self, args: ArgumentSet) -> Result<ResultEnvelope> {
        tracing::info!("Running Fabric module");
        let manager = self.manager(&args.subscription_id).await?;

        match args.resource_id.as_deref() {
            Some(id) => {
                let capacity = manager
                    .get_capacity(id, args.resource_group.as_deref())
                    .await?;
                Ok(ResultEnvelope::success(json!({ "instance": capacity })))
            }
            None => {
                let capacities = manager
                    .list_capacities(args.resource_group.as_deref())
                    .await?;
                Ok(ResultEnvelope::success(json!({ "instances": capacities })))
            }
        }
    }

    async fn list(&self, args: ArgumentSet) -> Result<ResultEnvelope> {
        let manager = self.manager(&args.subscription_id).await?;
        let capacities = manager
            .list_capacities(args.resource_group.as_deref())
            .await?;
        Ok(ResultEnvelope::success(json!({ "instances": capacities })))
    }

    async fn get(&self, args: ArgumentSet) -> Result<ResultEnvelope> {
        let manager = self.manager(&args.subscription_id).await?;
        let id = args
            .resource_id
            .as_deref()
            .context("resource id is required for get")?;
        let capacity = manager
            .get_capacity(id, args.resource_group.as_deref())
            .await?;
        Ok(ResultEnvelope::success(json!({ "instance": capacity })))
    }
}

impl Default for FabricModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for FabricModule {
    fn name(&self) -> &'static str {
        "fabric"
    }

    fn description(&self) -> &'static str {
        "Microsoft Fabric capacities"
    }

    fn entry_point(&self) -> Option<Callable<'_>> {
        Some(Box::new(move |args| self.run(args).boxed()))
    }

    fn command(&self, name: &str) -> Option<Callable<'_>> {
        match name {
            "list" => Some(Box::new(move |args| self.list(args).boxed())),
            "get" => Some(Box::new(move |args| self.get(args).boxed())),
            _ => None,
        }
    }
}
