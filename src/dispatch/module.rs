//! Module calling contract
//!
//! Every module registers one implementation of [`Module`]. The dispatcher
//! only ever talks to modules through this trait: a default entry point plus
//! zero or more named commands, each taking a normalized [`ArgumentSet`] and
//! returning a [`ResultEnvelope`].
//!
//! Modules that hold expensive per-subscription state (an API client, a
//! manager struct) own their own cache keyed by the subscription id and must
//! replace it when the id changes; the dispatcher never caches handles
//! across calls.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Future returned by a module callable.
pub type ModuleFuture<'a> = BoxFuture<'a, anyhow::Result<ResultEnvelope>>;

/// An invocable entry point bound to its module.
pub type Callable<'m> = Box<dyn Fn(ArgumentSet) -> ModuleFuture<'m> + Send + Sync + 'm>;

/// The contract every registered module implements.
pub trait Module: Send + Sync {
    /// Identifier the module is registered under.
    fn name(&self) -> &'static str;

    /// One-line description for help output.
    fn description(&self) -> &'static str;

    /// One-time initialization, run on every resolve. Must be idempotent
    /// within a process lifetime.
    fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// The default entry point, used when no named command matches.
    fn entry_point(&self) -> Option<Callable<'_>>;

    /// Look up a named command. Returning `None` makes the selector fall
    /// back to the default entry point.
    fn command(&self, name: &str) -> Option<Callable<'_>> {
        let _ = name;
        None
    }
}

/// Normalized arguments forwarded to every module callable.
///
/// `extras` is forwarded verbatim, no validation: well-known fields cover
/// the common cases and anything else rides along untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSet {
    /// Azure subscription id. Mandatory; the invoker rejects empty values
    /// before any module code runs.
    pub subscription_id: String,
    /// Optional resource group filter.
    pub resource_group: Option<String>,
    /// Optional resource name or full ARM resource id.
    pub resource_id: Option<String>,
    /// Open-ended extra parameters, forwarded verbatim.
    pub extras: BTreeMap<String, Value>,
}

impl ArgumentSet {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            ..Self::default()
        }
    }

    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Get an extra parameter as a string, if present and string-valued.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(|v| v.as_str())
    }
}

/// Uniform result passed back up from a module call.
///
/// No schema beyond "status plus data" is enforced here; the payload shape
/// is the module's contract with its renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub status: Status,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

impl ResultEnvelope {
    pub fn success(data: Value) -> Self {
        Self {
            status: Status::Success,
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Convenience accessor for list payloads keyed by `key`.
    pub fn records(&self, key: &str) -> Option<&Vec<Value>> {
        self.data.get(key)?.as_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extras_are_stored_verbatim() {
        let args = ArgumentSet::new("sub-1")
            .with_extra("output_dir", "/tmp/out")
            .with_extra("page_size", 50);

        assert_eq!(args.extra_str("output_dir"), Some("/tmp/out"));
        assert_eq!(args.extras.get("page_size"), Some(&json!(50)));
        assert_eq!(args.extra_str("missing"), None);
    }

    #[test]
    fn envelope_records_accessor() {
        let envelope = ResultEnvelope::success(json!({
            "instances": [{"name": "cap-1"}, {"name": "cap-2"}]
        }));
        assert!(envelope.is_success());
        assert_eq!(envelope.records("instances").map(Vec::len), Some(2));
        assert_eq!(envelope.records("missing"), None);
    }

    #[test]
    fn envelope_serializes_status_as_snake_case() {
        let envelope = ResultEnvelope::success(json!({}));
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains("\"status\":\"success\""));
    }
}
