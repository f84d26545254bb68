//! Module registry
//!
//! Static mapping from module identifiers to their implementations. The
//! builtin registry is built once per process; adding a module means adding
//! one registration line here, the dispatcher itself never changes. Tests
//! build their own [`Registry`] with mock modules.

use super::error::DispatchError;
use super::module::Module;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Registry of dispatchable modules.
pub struct Registry {
    modules: HashMap<&'static str, Box<dyn Module>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Register a module under its own name. A duplicate name replaces the
    /// earlier registration.
    pub fn register(&mut self, module: Box<dyn Module>) {
        let name = module.name();
        if self.modules.insert(name, module).is_some() {
            tracing::warn!("module {} registered twice, keeping the later one", name);
        }
    }

    /// The process-wide registry of builtin modules (built on first access).
    pub fn builtin() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            let mut registry = Registry::new();
            registry.register(Box::new(crate::modules::fabric::FabricModule::new()));
            registry.register(Box::new(crate::modules::powerbi::PowerBiModule::new()));
            registry.register(Box::new(crate::modules::topology::TopologyModule::new()));
            registry.register(Box::new(crate::modules::reports::ReportsModule::new()));
            registry
        })
    }

    /// Registered module names, sorted (for help and autocomplete output).
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.modules.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Locate a module and run its one-time initialization.
    ///
    /// `ModuleNotFound` when nothing is registered under the identifier,
    /// `ModuleLoad` when the module exists but initialization fails.
    pub fn resolve(&self, name: &str) -> Result<ModuleHandle<'_>, DispatchError> {
        let Some(module) = self.modules.get(name) else {
            return Err(DispatchError::ModuleNotFound(name.to_string()));
        };

        module
            .init()
            .map_err(|source| DispatchError::ModuleLoad {
                module: name.to_string(),
                source,
            })?;

        tracing::debug!("resolved module {}", name);
        Ok(ModuleHandle {
            module: module.as_ref(),
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a resolved module, owned by the dispatcher for one invocation.
pub struct ModuleHandle<'r> {
    pub(super) module: &'r dyn Module,
}

impl std::fmt::Debug for ModuleHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("module", &self.module.name())
            .finish()
    }
}

impl ModuleHandle<'_> {
    pub fn name(&self) -> &'static str {
        self.module.name()
    }

    pub fn description(&self) -> &'static str {
        self.module.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_modules() {
        let names = Registry::builtin().names();
        assert_eq!(names, vec!["fabric", "powerbi", "reports", "topology"]);
    }

    #[test]
    fn resolve_unknown_module_fails() {
        let registry = Registry::new();
        assert!(matches!(
            registry.resolve("does-not-exist"),
            Err(DispatchError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn resolve_empty_identifier_fails() {
        assert!(matches!(
            Registry::builtin().resolve(""),
            Err(DispatchError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn resolve_is_idempotent() {
        let registry = Registry::builtin();
        assert!(registry.resolve("fabric").is_ok());
        assert!(registry.resolve("fabric").is_ok());
    }
}
