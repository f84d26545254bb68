//! Module dispatch
//!
//! The one path the CLI takes into a module: resolve the identifier in the
//! registry, select a callable (exact named command first, default entry
//! point as fallback), then invoke it with the normalized argument set. A
//! failure at any stage short-circuits with that stage's error kind; there
//! is no retry and no partial progress.
//!
//! # Architecture
//!
//! - [`registry`] - static identifier-to-implementation mapping
//! - [`module`] - the calling contract every module implements
//! - [`error`] - the failure taxonomy surfaced to the CLI
//!
//! # Example
//!
//! ```ignore
//! use fabfriend::dispatch::{dispatch, ArgumentSet};
//!
//! async fn list_fabric() -> anyhow::Result<()> {
//!     let args = ArgumentSet::new("00000000-0000-0000-0000-000000000000");
//!     let envelope = dispatch("fabric", args, Some("list")).await?;
//!     println!("{}", envelope.data);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod module;
pub mod registry;

pub use error::DispatchError;
pub use module::{ArgumentSet, Callable, Module, ModuleFuture, ResultEnvelope, Status};
pub use registry::{ModuleHandle, Registry};

use serde_json::Value;

/// A selected callable plus the command name to inject when the selection
/// fell back to the default entry point.
struct Selected<'r> {
    callable: Callable<'r>,
    fallback_command: Option<String>,
}

/// Pick the callable to invoke.
///
/// Selection order: the named command if the module exposes one under
/// exactly that name, otherwise the default entry point, otherwise
/// `NoEntryPoint`. A requested name the module does not expose as a
/// callable is treated as absent and falls through.
fn select<'r>(
    handle: &ModuleHandle<'r>,
    command: Option<&str>,
) -> Result<Selected<'r>, DispatchError> {
    if let Some(name) = command {
        if let Some(callable) = handle.module.command(name) {
            tracing::debug!("selected command {} on module {}", name, handle.name());
            return Ok(Selected {
                callable,
                fallback_command: None,
            });
        }
        tracing::warn!(
            "module {} has no {} command, falling back to the default entry point",
            handle.name(),
            name
        );
    }

    match handle.module.entry_point() {
        Some(callable) => Ok(Selected {
            callable,
            fallback_command: command.map(str::to_string),
        }),
        None => Err(DispatchError::NoEntryPoint {
            module: handle.name().to_string(),
            command: command.map(str::to_string),
        }),
    }
}

/// Invoke the selected callable with the normalized argument set.
///
/// Fails fast on a missing subscription id so no network-backed module ever
/// runs with incomplete input. When the default entry point stands in for a
/// requested command, the command name is injected into the extras bag
/// under `command` so the module can branch on it.
async fn invoke(
    module: &str,
    mut selected: Selected<'_>,
    mut args: ArgumentSet,
) -> Result<ResultEnvelope, DispatchError> {
    if args.subscription_id.trim().is_empty() {
        return Err(DispatchError::MissingRequiredArgument("subscription_id"));
    }

    if let Some(command) = selected.fallback_command.take() {
        args.extras
            .insert("command".to_string(), Value::String(command));
    }

    tracing::info!("executing module {}", module);
    (selected.callable)(args)
        .await
        .map_err(|source| DispatchError::Execution {
            module: module.to_string(),
            source,
        })
}

impl Registry {
    /// Dispatch a module invocation: resolve, select, invoke.
    pub async fn dispatch(
        &self,
        module: &str,
        args: ArgumentSet,
        command: Option<&str>,
    ) -> Result<ResultEnvelope, DispatchError> {
        tracing::info!("dispatching module {}", module);
        let handle = self.resolve(module)?;
        let selected = select(&handle, command)?;
        invoke(handle.name(), selected, args).await
    }
}

/// Dispatch against the builtin registry.
pub async fn dispatch(
    module: &str,
    args: ArgumentSet,
    command: Option<&str>,
) -> Result<ResultEnvelope, DispatchError> {
    Registry::builtin().dispatch(module, args, command).await
}
