//! fabfriend - Microsoft Fabric and Power BI management for Azure
//!
//! The crate is organized around a small dispatch core and a set of
//! pluggable modules:
//!
//! - [`dispatch`] - module registry, callable selection, and invocation
//! - [`modules`] - the builtin Azure modules (fabric, powerbi, topology, reports)
//! - [`azure`] - authentication, HTTP, and the ARM client
//! - [`output`] - terminal tables and CSV writing
//! - [`config`] - persisted user configuration

pub mod azure;
pub mod config;
pub mod dispatch;
pub mod modules;
pub mod output;

/// Version injected at compile time via FABFRIEND_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("FABFRIEND_VERSION") {
    Some(v) => v,
    None => "dev",
};
