//! Azure Client
//!
//! Main client for ARM API calls, combining the credential chain with the
//! HTTP wrapper and URL building for the management plane.

use super::auth::AzureCredentials;
use super::http::AzureHttpClient;
use anyhow::Result;
use serde_json::Value;

/// ARM management plane endpoint
pub const ARM_ENDPOINT: &str = "https://management.azure.com";

/// Main Azure client, scoped to one subscription
#[derive(Clone)]
pub struct AzureClient {
    pub credentials: AzureCredentials,
    pub http: AzureHttpClient,
    pub subscription_id: String,
}

impl AzureClient {
    pub fn new(subscription_id: &str) -> Result<Self> {
        Ok(Self {
            credentials: AzureCredentials::new(),
            http: AzureHttpClient::new()?,
            subscription_id: subscription_id.to_string(),
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to an Azure API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to an Azure API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a DELETE request to an Azure API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    /// GET a paginated ARM listing, following `nextLink` until exhausted
    /// and accumulating the `value` arrays.
    pub async fn get_all_pages(&self, url: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut next: Option<String> = Some(url.to_string());

        while let Some(url) = next {
            let response = self.get(&url).await?;

            if let Some(page) = response.get("value").and_then(|v| v.as_array()) {
                items.extend(page.iter().cloned());
            }

            next = response
                .get("nextLink")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }

        Ok(items)
    }

    // =========================================================================
    // ARM URL helpers
    // =========================================================================

    /// Build a subscription-scoped ARM URL
    pub fn subscription_url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}/{}?api-version={}",
            ARM_ENDPOINT, self.subscription_id, path, api_version
        )
    }

    /// Build a resource-group-scoped ARM URL
    pub fn resource_group_url(&self, resource_group: &str, path: &str, api_version: &str) -> String {
        self.subscription_url(
            &format!(
                "resourceGroups/{}/{}",
                urlencoding::encode(resource_group),
                path
            ),
            api_version,
        )
    }

    /// Build a provider listing URL at subscription scope
    pub fn provider_url(&self, provider: &str, resource_type: &str, api_version: &str) -> String {
        self.subscription_url(
            &format!("providers/{}/{}", provider, resource_type),
            api_version,
        )
    }

    /// Build a provider listing URL at resource-group scope
    pub fn provider_in_group_url(
        &self,
        resource_group: &str,
        provider: &str,
        resource_type: &str,
        api_version: &str,
    ) -> String {
        self.resource_group_url(
            resource_group,
            &format!("providers/{}/{}", provider, resource_type),
            api_version,
        )
    }

    /// Build a URL for one named resource inside a resource group
    pub fn named_resource_url(
        &self,
        resource_group: &str,
        provider: &str,
        resource_type: &str,
        name: &str,
        api_version: &str,
    ) -> String {
        self.provider_in_group_url(
            resource_group,
            provider,
            &format!("{}/{}", resource_type, urlencoding::encode(name)),
            api_version,
        )
    }

    /// Build a URL from a full ARM resource id
    /// (e.g. "/subscriptions/{sub}/resourceGroups/{rg}/providers/.../name")
    pub fn resource_id_url(&self, resource_id: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", ARM_ENDPOINT, resource_id, api_version)
    }
}

/// Format an Azure API error for display
pub fn format_azure_error(error: &anyhow::Error) -> String {
    super::http::format_azure_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AzureClient {
        AzureClient::new("00000000-0000-0000-0000-000000000000").unwrap()
    }

    #[test]
    fn test_subscription_url() {
        assert_eq!(
            client().subscription_url("resources", "2021-04-01"),
            "https://management.azure.com/subscriptions/00000000-0000-0000-0000-000000000000/resources?api-version=2021-04-01"
        );
    }

    #[test]
    fn test_provider_in_group_url() {
        let url = client().provider_in_group_url(
            "my-rg",
            "Microsoft.Fabric",
            "capacities",
            "2023-11-01",
        );
        assert!(url.contains("/resourceGroups/my-rg/providers/Microsoft.Fabric/capacities"));
        assert!(url.ends_with("api-version=2023-11-01"));
    }

    #[test]
    fn test_named_resource_url_encodes_name() {
        let url = client().named_resource_url(
            "my-rg",
            "Microsoft.PowerBIDedicated",
            "capacities",
            "cap one",
            "2021-01-01",
        );
        assert!(url.contains("capacities/cap%20one"));
    }

    #[test]
    fn test_resource_id_url() {
        let id = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Fabric/capacities/c";
        let url = client().resource_id_url(id, "2023-11-01");
        assert_eq!(
            url,
            format!("https://management.azure.com{}?api-version=2023-11-01", id)
        );
    }
}
