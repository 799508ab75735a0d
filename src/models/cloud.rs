//! Wire types of the cloud logging REST API

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::level::ServiceLevel;

/// Log read request: either fresh search criteria or a continuation token, never both
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadRequest {
    Criteria(Criteria),
    PageToken(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    pub log_group_id: String,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<ServiceLevel>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filter: String,
    pub page_size: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stream_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    #[serde(default)]
    pub log_group_id: String,
    #[serde(default)]
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub next_page_token: String,
}

/// A single log record as returned by the service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub resource: LogEntryResource,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default)]
    pub level: ServiceLevel,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub json_payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub stream_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogEntryResource {
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroup {
    pub id: String,
    #[serde(default)]
    pub folder_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogGroupsResponse {
    #[serde(default)]
    pub groups: Vec<LogGroup>,
    #[serde(default)]
    pub next_page_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogGroupResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResourcesResponse {
    #[serde(default)]
    pub resources: Vec<LogGroupResource>,
}
