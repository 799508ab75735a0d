pub mod cloud_logging;
pub mod iam;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::cloud::{ListLogGroupsResponse, LogGroupResource, ReadRequest, ReadResponse};

pub use cloud_logging::CloudLoggingClient;

/// Errors raised talking to the remote logging service
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream error ({status}): {message}")]
    Status { status: StatusCode, message: String },
    #[error("Invalid credentials: {0}")]
    Credentials(String),
    #[error("IAM token error: {0}")]
    Token(String),
    #[error("Invalid API endpoint: {0}")]
    Endpoint(String),
    #[error("client is shut down")]
    Cancelled,
}

/// Operations of the remote logging service used by the datasource
#[async_trait]
pub trait LoggingService: Send + Sync {
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, CloudError>;

    /// One page of log groups in a folder
    async fn list_groups_page(
        &self,
        folder_id: &str,
        page_token: &str,
    ) -> Result<ListLogGroupsResponse, CloudError>;

    async fn list_resources(&self, group_id: &str) -> Result<Vec<LogGroupResource>, CloudError>;

    /// Verify credentials and reachability
    async fn check_connection(&self) -> Result<(), CloudError>;

    /// Abort in-flight calls and refuse new ones
    async fn shutdown(&self);
}
