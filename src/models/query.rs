//! Host-facing request and response shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::frame::Frame;
use super::level::Level;

/// Batch of sub-queries sent by the host
#[derive(Debug, Clone, Deserialize)]
pub struct QueryDataRequest {
    #[serde(default)]
    pub queries: Vec<DataQuery>,
}

/// One sub-query; `json` holds the datasource-specific query object
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub ref_id: String,
    pub time_range: TimeRange,
    #[serde(default)]
    pub json: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Explicit `null` reads as the field's zero value, like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Logging query as edited in the host UI
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub group_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub limit: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub query_text: String,
    #[serde(deserialize_with = "null_as_default")]
    pub levels: Vec<Level>,
    #[serde(deserialize_with = "null_as_default")]
    pub stream: String,
    #[serde(deserialize_with = "null_as_default")]
    pub resource_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub resource_ids: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub add_payload_fields: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub derived_fields: Vec<DerivedFieldRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivedFieldRule {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub template: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryDataResponse {
    pub responses: BTreeMap<String, DataResponse>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataResponse {
    pub frames: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuggestQueryRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub group_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub resource_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestQueryResponse {
    pub groups: Vec<String>,
    pub resource_types: Vec<String>,
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckHealthResult {
    pub status: HealthStatus,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_logging_request_defaults() {
        let req: LoggingRequest = serde_json::from_value(json!({"groupId": "g1"})).unwrap();
        assert_eq!(req.group_id, "g1");
        assert_eq!(req.limit, 0);
        assert!(req.levels.is_empty());
        assert!(req.derived_fields.is_empty());
    }

    #[test]
    fn test_logging_request_full() {
        let req: LoggingRequest = serde_json::from_value(json!({
            "groupId": "g1",
            "limit": 2500,
            "queryText": "message: \"timeout\"",
            "levels": ["WARN", "ERROR"],
            "stream": "api",
            "resourceType": "serverless.function",
            "resourceIds": ["fn1"],
            "addPayloadFields": ["request_id"],
            "derivedFields": [{"name": "trace", "template": "{{trace_id}}"}]
        }))
        .unwrap();
        assert_eq!(req.limit, 2500);
        assert_eq!(req.levels, vec![Level::Warn, Level::Error]);
        assert_eq!(req.derived_fields[0].template, "{{trace_id}}");
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let req: LoggingRequest = serde_json::from_str(
            r#"{"groupId":"g1","limit":null,"stream":null,"resourceIds":null,"levels":null,"derivedFields":[{"name":"t","template":null}]}"#,
        )
        .unwrap();
        assert_eq!(req.group_id, "g1");
        assert_eq!(req.limit, 0);
        assert_eq!(req.stream, "");
        assert!(req.resource_ids.is_empty());
        assert!(req.levels.is_empty());
        assert_eq!(req.derived_fields[0].template, "");

        let suggest: SuggestQueryRequest =
            serde_json::from_str(r#"{"groupId":null,"resourceType":"k8s.pod"}"#).unwrap();
        assert_eq!(suggest.group_id, "");
        assert_eq!(suggest.resource_type, "k8s.pod");
    }

    #[test]
    fn test_malformed_logging_request() {
        let result = serde_json::from_value::<LoggingRequest>(json!({"limit": "many"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_health_status_serialization() {
        let result = CheckHealthResult {
            status: HealthStatus::Ok,
            message: "OK".to_string(),
        };
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({"status": "OK", "message": "OK"})
        );
    }
}
