//! Azure Authentication
//!
//! Acquires ARM access tokens through a chain of credential sources: the
//! Azure CLI (`az account get-access-token`) first, then the Azure
//! Developer CLI (`azd auth token`). Tokens are cached with an expiry
//! buffer so a token about to expire is never handed to a request.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::RwLock;

/// ARM resource the token chain requests scopes for.
pub const ARM_RESOURCE: &str = "https://management.azure.com";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// so a token never dies mid-request.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL when the CLI output carries no usable expiry (conservative: 30 minutes).
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Azure credential chain with token caching.
#[derive(Clone, Default)]
pub struct AzureCredentials {
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied).
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

struct AcquiredToken {
    token: String,
    ttl: Duration,
}

impl AzureCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an access token for ARM calls, reusing the cache while valid.
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let acquired = acquire_token().await?;

        let ttl = acquired.ttl.max(TOKEN_EXPIRY_BUFFER);
        let expires_at = Instant::now() + ttl - TOKEN_EXPIRY_BUFFER;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: acquired.token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (ttl - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(acquired.token)
    }

    /// Force refresh the token.
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }
        self.get_token().await
    }
}

/// Walk the credential chain: az CLI, then azd CLI.
async fn acquire_token() -> Result<AcquiredToken> {
    match az_cli_token().await {
        Ok(token) => return Ok(token),
        Err(e) => {
            tracing::warn!("Azure CLI credential failed: {:#}", e);
        }
    }

    azd_cli_token().await.context(
        "Failed to authenticate with Azure. Login using 'az login' or 'azd auth login' and try again",
    )
}

/// `az account get-access-token --resource https://management.azure.com`
async fn az_cli_token() -> Result<AcquiredToken> {
    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            ARM_RESOURCE,
            "--output",
            "json",
        ])
        .output()
        .await
        .context("Failed to run 'az account get-access-token'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("az account get-access-token failed: {}", stderr.trim());
    }

    let body: Value = serde_json::from_slice(&output.stdout)
        .context("Failed to parse az CLI token output")?;

    let token = body
        .get("accessToken")
        .and_then(|v| v.as_str())
        .context("az CLI output has no accessToken field")?
        .to_string();

    Ok(AcquiredToken {
        token,
        ttl: az_token_ttl(&body),
    })
}

/// `azd auth token --output json`
async fn azd_cli_token() -> Result<AcquiredToken> {
    let output = Command::new("azd")
        .args(["auth", "token", "--scope", "https://management.azure.com/.default", "--output", "json"])
        .output()
        .await
        .context("Failed to run 'azd auth token'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("azd auth token failed: {}", stderr.trim());
    }

    let body: Value =
        serde_json::from_slice(&output.stdout).context("Failed to parse azd token output")?;

    let token = body
        .get("token")
        .and_then(|v| v.as_str())
        .context("azd output has no token field")?
        .to_string();

    let ttl = body
        .get("expiresOn")
        .and_then(|v| v.as_str())
        .and_then(ttl_from_rfc3339)
        .unwrap_or(DEFAULT_TOKEN_TTL);

    Ok(AcquiredToken { token, ttl })
}

/// Derive a TTL from az CLI output: epoch `expires_on` first, then the
/// local-time `expiresOn` string, then the conservative default.
fn az_token_ttl(body: &Value) -> Duration {
    if let Some(epoch) = body.get("expires_on").and_then(|v| v.as_i64()) {
        let remaining = epoch - Utc::now().timestamp();
        if remaining > 0 {
            return Duration::from_secs(remaining as u64);
        }
    }

    if let Some(ttl) = body
        .get("expiresOn")
        .and_then(|v| v.as_str())
        .and_then(ttl_from_local_timestamp)
    {
        return ttl;
    }

    DEFAULT_TOKEN_TTL
}

/// az CLI prints expiresOn as a local naive timestamp, e.g. "2026-08-29 12:04:59.000000".
fn ttl_from_local_timestamp(text: &str) -> Option<Duration> {
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    let expires = Local.from_local_datetime(&naive).single()?;
    let remaining = expires.signed_duration_since(Local::now()).num_seconds();
    (remaining > 0).then(|| Duration::from_secs(remaining as u64))
}

fn ttl_from_rfc3339(text: &str) -> Option<Duration> {
    let expires = DateTime::parse_from_rfc3339(text).ok()?;
    let remaining = expires.signed_duration_since(Utc::now()).num_seconds();
    (remaining > 0).then(|| Duration::from_secs(remaining as u64))
}

/// Get the Azure CLI configuration directory.
pub fn get_azure_config_dir() -> Option<PathBuf> {
    // AZURE_CONFIG_DIR overrides the default ~/.azure
    if let Ok(path) = std::env::var("AZURE_CONFIG_DIR") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|p| p.join(".azure"))
}

/// Validate an Azure subscription id (a GUID: 8-4-4-4-12 hex groups).
pub fn is_valid_subscription_id(subscription: &str) -> bool {
    let groups: Vec<&str> = subscription.split('-').collect();
    if groups.len() != 5 {
        return false;
    }
    let expected = [8usize, 4, 4, 4, 12];
    groups
        .iter()
        .zip(expected)
        .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Read the default subscription from the environment or the az CLI profile.
/// Validates the subscription id format before returning.
pub fn get_default_subscription() -> Option<String> {
    if let Ok(subscription) = std::env::var("AZURE_SUBSCRIPTION_ID") {
        if is_valid_subscription_id(&subscription) {
            return Some(subscription);
        }
        tracing::warn!("Invalid subscription id format in AZURE_SUBSCRIPTION_ID");
    }

    let profile_path = get_azure_config_dir()?.join("azureProfile.json");
    let content = std::fs::read_to_string(&profile_path).ok()?;
    parse_default_subscription(&content)
}

/// Parse azureProfile.json, which az writes with a UTF-8 BOM.
fn parse_default_subscription(content: &str) -> Option<String> {
    let profile: Value = serde_json::from_str(content.trim_start_matches('\u{feff}')).ok()?;
    let subscriptions = profile.get("subscriptions")?.as_array()?;

    subscriptions
        .iter()
        .find(|s| {
            s.get("isDefault")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        })
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .filter(|id| is_valid_subscription_id(id))
        .map(str::to_string)
}

/// Check authentication status with Azure.
pub async fn check_auth() -> bool {
    match AzureCredentials::new().get_token().await {
        Ok(_) => {
            tracing::info!("Successfully authenticated with Azure");
            true
        }
        Err(e) => {
            tracing::error!("Authentication failed: {:#}", e);
            false
        }
    }
}
