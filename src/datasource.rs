//! Datasource instance: query execution, resource calls and health

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{DatasourceSettings, DerivedLinkConfig};
use crate::metrics;
use crate::models::frame::DataLink;
use crate::models::query::{
    CheckHealthResult, DataQuery, DataResponse, HealthStatus, LoggingRequest, QueryDataRequest,
    QueryDataResponse, SuggestQueryRequest, SuggestQueryResponse,
};
use crate::pagination;
use crate::providers::{CloudError, CloudLoggingClient, LoggingService};
use crate::suggest;
use crate::values::{FieldLinks, LogEntriesValues};

/// Grace period for releasing the remote client
pub const DISPOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("invalid query {ref_id:?}: {source}")]
    InvalidQuery {
        ref_id: String,
        source: serde_json::Error,
    },
}

/// Status and JSON body of a resource call
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ResourceResponse {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
            },
            Err(err) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }

    fn error(status: StatusCode, message: String) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }
}

pub struct Datasource {
    service: Arc<dyn LoggingService>,
    folder_id: String,
    links: FieldLinks,
}

impl Datasource {
    /// Build the shared REST client; fails on malformed credentials
    pub fn new(settings: &DatasourceSettings) -> Result<Self, CloudError> {
        let client = CloudLoggingClient::new(settings)?;
        Ok(Self::with_service(Arc::new(client), settings))
    }

    pub fn with_service(service: Arc<dyn LoggingService>, settings: &DatasourceSettings) -> Self {
        Self {
            service,
            folder_id: settings.folder_id.clone(),
            links: field_links(&settings.derived_links),
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn service(&self) -> &dyn LoggingService {
        self.service.as_ref()
    }

    /// Run a batch. Every sub-query is parsed before any remote call; a
    /// malformed one fails the whole batch.
    pub async fn query_data(
        &self,
        batch: QueryDataRequest,
    ) -> Result<QueryDataResponse, DatasourceError> {
        let mut parsed = Vec::with_capacity(batch.queries.len());
        for query in batch.queries {
            let req = parse_logging_request(&query)?;
            parsed.push((query, req));
        }

        let mut response = QueryDataResponse::default();
        for (query, req) in parsed {
            if req.group_id.is_empty() {
                debug!(ref_id = %query.ref_id, "Skipping sub-query without log group");
                continue;
            }
            let data = self.run_query(&query, &req).await;
            response.responses.insert(query.ref_id, data);
        }
        Ok(response)
    }

    async fn run_query(&self, query: &DataQuery, req: &LoggingRequest) -> DataResponse {
        let started = Instant::now();
        let plan = pagination::plan(req.limit);
        let criteria = pagination::build_criteria(req, query.time_range, plan.page_size);

        let entries =
            match pagination::read_entries(self.service.as_ref(), criteria, req.limit, plan).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        ref_id = %query.ref_id,
                        group_id = %req.group_id,
                        count = err.entries.len(),
                        error = %err.source,
                        "Log query failed"
                    );
                    metrics::record_error("read");
                    return DataResponse {
                        frames: Vec::new(),
                        error: Some(err.to_string()),
                    };
                }
            };

        let mut values = LogEntriesValues::new(req.add_payload_fields.clone(), &req.derived_fields);
        for entry in &entries {
            values.append(entry);
        }
        let frame = values.into_frame(&query.ref_id, &req.group_id, &self.links);

        metrics::record_query(&req.group_id, entries.len(), started.elapsed());
        info!(
            ref_id = %query.ref_id,
            group_id = %req.group_id,
            count = entries.len(),
            "Log query completed"
        );

        DataResponse {
            frames: vec![frame],
            error: None,
        }
    }

    /// Dispatch a resource call by path
    pub async fn call_resource(&self, path: &str, body: &[u8]) -> ResourceResponse {
        match path {
            "suggestQuery" => {
                let req: SuggestQueryRequest = match serde_json::from_slice(body) {
                    Ok(req) => req,
                    Err(err) => return ResourceResponse::error(StatusCode::BAD_REQUEST, err.to_string()),
                };
                match self.suggest_query(&req).await {
                    Ok(suggestions) => ResourceResponse::ok(&suggestions),
                    Err(err) => ResourceResponse::error(StatusCode::BAD_GATEWAY, err.to_string()),
                }
            }
            _ => ResourceResponse::error(StatusCode::NOT_FOUND, format!("unknown path {:?}", path)),
        }
    }

    pub async fn suggest_query(
        &self,
        req: &SuggestQueryRequest,
    ) -> Result<SuggestQueryResponse, CloudError> {
        metrics::record_suggestion();
        suggest::suggest(self.service.as_ref(), &self.folder_id, req)
            .await
            .map_err(|err| {
                warn!(group_id = %req.group_id, error = %err, "Suggestion lookup failed");
                metrics::record_error("suggest");
                err
            })
    }

    /// Probe the remote service without side effects
    pub async fn check_health(&self) -> CheckHealthResult {
        match self.service.check_connection().await {
            Ok(()) => CheckHealthResult {
                status: HealthStatus::Ok,
                message: "OK".to_string(),
            },
            Err(err) => {
                metrics::record_error("health");
                CheckHealthResult {
                    status: HealthStatus::Error,
                    message: err.to_string(),
                }
            }
        }
    }

    /// Release the remote client, giving up after [`DISPOSE_TIMEOUT`]
    pub async fn dispose(&self) {
        if tokio::time::timeout(DISPOSE_TIMEOUT, self.service.shutdown())
            .await
            .is_err()
        {
            error!("Timed out releasing the cloud logging client");
        }
    }
}

fn parse_logging_request(query: &DataQuery) -> Result<LoggingRequest, DatasourceError> {
    if query.json.is_null() {
        return Ok(LoggingRequest::default());
    }
    serde_json::from_value(query.json.clone()).map_err(|source| DatasourceError::InvalidQuery {
        ref_id: query.ref_id.clone(),
        source,
    })
}

/// Group configured links by the field they decorate
pub fn field_links(configs: &[DerivedLinkConfig]) -> FieldLinks {
    let mut links = FieldLinks::new();
    for config in configs {
        links.entry(config.field.clone()).or_default().push(DataLink {
            title: config.title.clone(),
            url: config.url.clone(),
            target_blank: config.target_blank,
        });
    }
    links
}
