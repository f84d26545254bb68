//! Builtin modules
//!
//! Each module wraps one Azure surface behind the dispatch calling
//! contract: a default entry point plus zero or more named commands, all
//! taking a normalized argument set and returning a result envelope.
//! Modules that hold per-subscription API state cache their manager keyed
//! by subscription id and replace it when the id changes.
//!
//! - [`fabric`] - Microsoft Fabric capacities
//! - [`powerbi`] - Power BI Premium capacities
//! - [`topology`] - resource topology mapping and CSV export
//! - [`reports`] - HTML report assembly from exported files

pub mod fabric;
pub mod powerbi;
pub mod reports;
pub mod topology;
