//! Azure API interaction module
//!
//! Core functionality for talking to the Azure management plane:
//! authentication through the CLI credential chain, the HTTP wrapper, and
//! the ARM client with URL building and pagination.
//!
//! # Module Structure
//!
//! - [`auth`] - credential chain (az CLI, azd CLI) with token caching
//! - [`client`] - ARM client scoped to one subscription
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use crate::azure::client::AzureClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = AzureClient::new("00000000-0000-0000-0000-000000000000")?;
//!     let url = client.subscription_url("resources", "2021-04-01");
//!     let resources = client.get_all_pages(&url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
