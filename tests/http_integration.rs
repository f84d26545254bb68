//! Integration tests for the Azure HTTP client using wiremock
//!
//! These tests verify the HTTP client behavior against mocked ARM
//! endpoints, ensuring proper handling of various response codes and
//! edge cases.

use fabfriend::azure::http::{format_azure_error, AzureHttpClient};
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test module for HTTP client integration tests
mod http_client_tests {
    use super::*;

    /// Test successful GET request returns parsed JSON
    #[tokio::test]
    async fn test_get_success_returns_json() {
        let server = MockServer::start().await;

        let expected_response = json!({
            "value": [
                {"name": "cap-east", "location": "eastus", "sku": {"name": "F64"}},
                {"name": "cap-west", "location": "westus", "sku": {"name": "F2"}}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub-1/providers/Microsoft.Fabric/capacities"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&expected_response))
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!(
            "{}/subscriptions/sub-1/providers/Microsoft.Fabric/capacities",
            server.uri()
        );

        let response = client
            .get(&url, "test-token")
            .await
            .expect("Request should succeed");

        assert_eq!(response["value"].as_array().unwrap().len(), 2);
        assert_eq!(response["value"][0]["name"], "cap-east");
    }

    /// Test 401 response surfaces an authentication hint
    #[tokio::test]
    async fn test_401_maps_to_login_hint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub-1/resources"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({
                    "error": {
                        "code": "InvalidAuthenticationToken",
                        "message": "The access token is invalid."
                    }
                })),
            )
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!("{}/subscriptions/sub-1/resources", server.uri());

        let err = client
            .get(&url, "expired-token")
            .await
            .expect_err("Request should fail");

        assert!(err.to_string().contains("401"));
        assert!(format_azure_error(&err).contains("az login"));
    }

    /// Test 403 response surfaces an RBAC hint
    #[tokio::test]
    async fn test_403_maps_to_rbac_hint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/locked-sub/resources"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({
                    "error": {
                        "code": "AuthorizationFailed",
                        "message": "The client does not have authorization."
                    }
                })),
            )
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!("{}/subscriptions/locked-sub/resources", server.uri());

        let err = client
            .get(&url, "valid-token")
            .await
            .expect_err("Request should fail");

        assert!(format_azure_error(&err).contains("RBAC"));
    }

    /// Test 404 response for non-existent resources
    #[tokio::test]
    async fn test_404_returns_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/no-such-group/providers/Microsoft.Fabric/capacities/missing",
            ))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({
                    "error": {
                        "code": "ResourceNotFound",
                        "message": "The Resource was not found."
                    }
                })),
            )
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!(
            "{}/subscriptions/sub-1/resourceGroups/no-such-group/providers/Microsoft.Fabric/capacities/missing",
            server.uri()
        );

        let err = client
            .get(&url, "test-token")
            .await
            .expect_err("Request should fail");

        assert_eq!(format_azure_error(&err), "Resource not found.");
    }

    /// Test POST request with JSON body
    #[tokio::test]
    async fn test_post_with_body() {
        let server = MockServer::start().await;

        let operation_response = json!({
            "name": "cap-east",
            "properties": {"state": "Resuming"}
        });

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/my-rg/providers/Microsoft.Fabric/capacities/cap-east/resume",
            ))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&operation_response))
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!(
            "{}/subscriptions/sub-1/resourceGroups/my-rg/providers/Microsoft.Fabric/capacities/cap-east/resume",
            server.uri()
        );

        let response = client
            .post(&url, "test-token", Some(&json!({})))
            .await
            .expect("Request should succeed");

        assert_eq!(response["properties"]["state"], "Resuming");
    }

    /// Test DELETE request returning an empty body
    #[tokio::test]
    async fn test_delete_empty_body_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/my-rg/providers/Microsoft.Fabric/capacities/cap-east",
            ))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!(
            "{}/subscriptions/sub-1/resourceGroups/my-rg/providers/Microsoft.Fabric/capacities/cap-east",
            server.uri()
        );

        let response = client
            .delete(&url, "test-token")
            .await
            .expect("Request should succeed");

        assert!(response.is_null());
    }

    /// Test POST with 202 Accepted and no body
    #[tokio::test]
    async fn test_post_accepted_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/some/endpoint"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!("{}/some/endpoint", server.uri());

        let response = client
            .post(&url, "test-token", None)
            .await
            .expect("Request should succeed");

        assert!(response.is_null());
    }

    /// Test rate limiting (429) response
    #[tokio::test]
    async fn test_rate_limit_429() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rate-limited"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({
                    "error": {
                        "code": "TooManyRequests",
                        "message": "Rate limit exceeded"
                    }
                })),
            )
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!("{}/rate-limited", server.uri());

        let err = client
            .get(&url, "test-token")
            .await
            .expect_err("Request should fail");

        assert!(format_azure_error(&err).contains("Rate limit"));
    }

    /// Test ARM pagination with nextLink
    #[tokio::test]
    async fn test_pagination_with_next_link() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub-1/resources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"name": "resource-1"},
                    {"name": "resource-2"}
                ],
                "nextLink": format!("{}/subscriptions/sub-1/resources-page-2", server.uri())
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub-1/resources-page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"name": "resource-3"}
                ]
            })))
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");

        // Follow nextLink the way the paginated listing does
        let mut items = Vec::new();
        let mut next = Some(format!("{}/subscriptions/sub-1/resources", server.uri()));
        while let Some(url) = next {
            let page = client
                .get(&url, "test-token")
                .await
                .expect("Request should succeed");
            items.extend(page["value"].as_array().unwrap().iter().cloned());
            next = page
                .get("nextLink")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }

        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["name"], "resource-3");
    }

    /// Test malformed JSON in a successful response is an error
    #[tokio::test]
    async fn test_malformed_json_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let client = AzureHttpClient::new().expect("Client should build");
        let url = format!("{}/broken", server.uri());

        let err = client
            .get(&url, "test-token")
            .await
            .expect_err("Request should fail");

        assert!(err.to_string().contains("parse"));
    }
}
