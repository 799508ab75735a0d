use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::iam::{Credentials, TokenSource};
use super::{CloudError, LoggingService};
use crate::config::DatasourceSettings;
use crate::models::cloud::{
    ListLogGroupsResponse, ListResourcesResponse, LogGroupResource, ReadRequest, ReadResponse,
};

/// REST client of the cloud logging API
pub struct CloudLoggingClient {
    http: Client,
    api_endpoint: String,
    api_base: Url,
    timeout: Duration,
    tokens: TokenSource,
    cancel: CancellationToken,
}

impl CloudLoggingClient {
    /// Fails on a malformed endpoint or credentials, or when the HTTP client cannot be built
    pub fn new(settings: &DatasourceSettings) -> Result<Self, CloudError> {
        let api_base = Url::parse(&settings.api_endpoint)
            .map_err(|e| CloudError::Endpoint(format!("{}: {}", settings.api_endpoint, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(CloudError::Endpoint(settings.api_endpoint.clone()));
        }
        let credentials = Credentials::from_key_json(&settings.api_key_json)?;
        let http = Client::builder().build()?;
        let tokens = TokenSource::new(http.clone(), credentials, settings);

        Ok(Self {
            http,
            api_endpoint: settings.api_endpoint.trim_end_matches('/').to_string(),
            api_base,
            timeout: Duration::from_secs(settings.timeout_seconds),
            tokens,
            cancel: CancellationToken::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_endpoint, path)
    }

    /// `group_id` goes into a single percent-encoded path segment
    fn resources_url(&self, group_id: &str) -> Result<Url, CloudError> {
        let last = format!("{}:listResources", group_id);
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::Endpoint(self.api_endpoint.clone()))?
            .pop_if_empty()
            .extend(["logging", "v1", "logGroups", last.as_str()]);
        Ok(url)
    }

    /// Run `call` unless the client is shut down, aborting it on shutdown
    async fn guarded<T>(
        &self,
        call: impl Future<Output = Result<T, CloudError>>,
    ) -> Result<T, CloudError> {
        if self.cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CloudError::Cancelled),
            result = call => result,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CloudError> {
        let token = self.tokens.token().await?;
        let response = request
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CloudError::Status {
                status,
                message: error_text,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LoggingService for CloudLoggingClient {
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, CloudError> {
        let builder = self.http.post(self.url("/logging/v1/read")).json(&request);
        self.guarded(self.send(builder)).await
    }

    async fn list_groups_page(
        &self,
        folder_id: &str,
        page_token: &str,
    ) -> Result<ListLogGroupsResponse, CloudError> {
        let mut query = vec![("folderId", folder_id)];
        if !page_token.is_empty() {
            query.push(("pageToken", page_token));
        }
        let builder = self.http.get(self.url("/logging/v1/logGroups")).query(&query);
        self.guarded(self.send(builder)).await
    }

    async fn list_resources(&self, group_id: &str) -> Result<Vec<LogGroupResource>, CloudError> {
        let builder = self.http.get(self.resources_url(group_id)?);
        let response: ListResourcesResponse = self.guarded(self.send(builder)).await?;
        Ok(response.resources)
    }

    async fn check_connection(&self) -> Result<(), CloudError> {
        self.guarded(async {
            let token = self.tokens.token().await?;
            // Any HTTP answer proves the endpoint is reachable
            self.http
                .get(&self.api_endpoint)
                .bearer_auth(token)
                .timeout(self.timeout)
                .send()
                .await?;
            Ok(())
        })
        .await
    }

    async fn shutdown(&self) {
        info!("Shutting down cloud logging client");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

    async fn server_with_token() -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(TOKEN_PATH);
                then.status(200)
                    .json_body(json!({"access_token": "t1", "expires_in": 3600}));
            })
            .await;
        server
    }

    fn client(server: &MockServer) -> CloudLoggingClient {
        CloudLoggingClient::new(&DatasourceSettings {
            api_endpoint: server.base_url(),
            metadata_endpoint: server.base_url(),
            ..DatasourceSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_read_with_page_token() {
        let server = server_with_token().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/logging/v1/read")
                    .header("Authorization", "Bearer t1")
                    .json_body(json!({"pageToken": "next"}));
                then.status(200).json_body(json!({
                    "logGroupId": "g1",
                    "entries": [{
                        "uid": "1",
                        "timestamp": "2024-01-15T10:30:00Z",
                        "level": "INFO",
                        "message": "hello"
                    }],
                    "nextPageToken": ""
                }));
            })
            .await;

        let response = client(&server)
            .read(ReadRequest::PageToken("next".to_string()))
            .await
            .unwrap();
        assert_eq!(response.entries.len(), 1);
        assert_eq!(response.entries[0].message, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = server_with_token().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/logging/v1/read");
                then.status(403).body("permission denied");
            })
            .await;

        let err = client(&server)
            .read(ReadRequest::PageToken("x".to_string()))
            .await
            .unwrap_err();
        match err {
            CloudError::Status { status, message } => {
                assert_eq!(status.as_u16(), 403);
                assert_eq!(message, "permission denied");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_groups_page_query() {
        let server = server_with_token().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/logging/v1/logGroups")
                    .query_param("folderId", "f1")
                    .query_param("pageToken", "p2");
                then.status(200).json_body(json!({
                    "groups": [{"id": "g1", "name": "default"}],
                    "nextPageToken": ""
                }));
            })
            .await;

        let page = client(&server).list_groups_page("f1", "p2").await.unwrap();
        assert_eq!(page.groups[0].id, "g1");
        assert!(page.next_page_token.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_resources() {
        let server = server_with_token().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/logging/v1/logGroups/g1:listResources");
                then.status(200).json_body(json!({
                    "resources": [{"type": "serverless.function", "ids": ["fn1", "fn2"]}]
                }));
            })
            .await;

        let resources = client(&server).list_resources("g1").await.unwrap();
        assert_eq!(resources[0].resource_type, "serverless.function");
        assert_eq!(resources[0].ids, vec!["fn1", "fn2"]);
    }

    #[test]
    fn test_resources_url_escapes_group_id() {
        let server = MockServer::start();
        let url = client(&server).resources_url("a/b?c#d").unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(url
            .as_str()
            .ends_with("/logging/v1/logGroups/a%2Fb%3Fc%23d:listResources"));

        let url = client(&server).resources_url("g1").unwrap();
        assert_eq!(url.as_str(), server.url("/logging/v1/logGroups/g1:listResources"));
    }

    #[test]
    fn test_resources_url_keeps_endpoint_prefix() {
        let client = CloudLoggingClient::new(&DatasourceSettings {
            api_endpoint: "https://logging.example.com/api/".to_string(),
            ..DatasourceSettings::default()
        })
        .unwrap();
        assert_eq!(
            client.resources_url("g1").unwrap().as_str(),
            "https://logging.example.com/api/logging/v1/logGroups/g1:listResources"
        );
    }

    #[test]
    fn test_malformed_endpoint_fails_construction() {
        for endpoint in ["not a url", "mailto:ops@example.com"] {
            let result = CloudLoggingClient::new(&DatasourceSettings {
                api_endpoint: endpoint.to_string(),
                ..DatasourceSettings::default()
            });
            assert!(matches!(result, Err(CloudError::Endpoint(_))), "{endpoint}");
        }
    }

    #[tokio::test]
    async fn test_check_connection_accepts_any_response() {
        let server = server_with_token().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(404);
            })
            .await;

        assert!(client(&server).check_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_calls_fail_after_shutdown() {
        let server = server_with_token().await;
        let client = client(&server);
        client.shutdown().await;

        let err = client.list_resources("g1").await.unwrap_err();
        assert!(matches!(err, CloudError::Cancelled));
    }

    #[test]
    fn test_malformed_key_fails_construction() {
        let result = CloudLoggingClient::new(&DatasourceSettings {
            api_key_json: "{".to_string(),
            ..DatasourceSettings::default()
        });
        assert!(matches!(result, Err(CloudError::Credentials(_))));
    }
}
