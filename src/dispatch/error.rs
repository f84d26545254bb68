//! Dispatch failure taxonomy
//!
//! Every stage of a dispatch reports its own error kind so the CLI can tell
//! "nothing registered" apart from "registered but broken" and render an
//! actionable message. Nothing here is retried.

use thiserror::Error;

/// Errors surfaced by [`dispatch`](super::dispatch).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No module is registered under the given identifier.
    #[error("no module registered under {0:?}")]
    ModuleNotFound(String),

    /// The module exists but its one-time initialization failed.
    #[error("module {module} failed to initialize: {source}")]
    ModuleLoad {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    /// The module exposes neither the requested command nor a default entry point.
    #[error("module {module} has no matching command and no default entry point")]
    NoEntryPoint {
        module: String,
        command: Option<String>,
    },

    /// A mandatory argument was absent or empty; the module was never invoked.
    #[error("missing required argument: {0}")]
    MissingRequiredArgument(&'static str),

    /// The selected callable ran and failed.
    #[error("module {module} failed: {source}")]
    Execution {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_display_preserves_source_text() {
        let err = DispatchError::Execution {
            module: "powerbi".to_string(),
            source: anyhow::anyhow!("token expired for tenant contoso"),
        };
        assert!(err.to_string().contains("token expired for tenant contoso"));
    }

    #[test]
    fn module_not_found_names_the_identifier() {
        let err = DispatchError::ModuleNotFound("nope".to_string());
        assert!(err.to_string().contains("nope"));
    }
}
