//! Suggestion lists for the query editor

use tracing::debug;

use crate::models::cloud::{LogGroup, LogGroupResource};
use crate::models::query::{SuggestQueryRequest, SuggestQueryResponse};
use crate::providers::{CloudError, LoggingService};

/// Every log group of a folder, following continuation tokens to the end
pub async fn list_groups(
    service: &dyn LoggingService,
    folder_id: &str,
) -> Result<Vec<LogGroup>, CloudError> {
    let mut groups = Vec::new();
    let mut page_token = String::new();
    loop {
        let page = service.list_groups_page(folder_id, &page_token).await?;
        groups.extend(page.groups);
        if page.next_page_token.is_empty() {
            break;
        }
        page_token = page.next_page_token;
    }
    Ok(groups)
}

/// Group ids of the folder plus resource types and ids of the requested group.
///
/// Both lookups run concurrently; the first error wins and drops the other.
pub async fn suggest(
    service: &dyn LoggingService,
    folder_id: &str,
    req: &SuggestQueryRequest,
) -> Result<SuggestQueryResponse, CloudError> {
    let (groups, (resource_types, resource_ids)) = tokio::try_join!(
        group_ids(service, folder_id),
        resource_lists(service, &req.group_id, &req.resource_type),
    )?;
    debug!(
        groups = groups.len(),
        resource_types = resource_types.len(),
        resource_ids = resource_ids.len(),
        "Suggestions collected"
    );

    Ok(SuggestQueryResponse {
        groups,
        resource_types,
        resource_ids,
    })
}

async fn group_ids(service: &dyn LoggingService, folder_id: &str) -> Result<Vec<String>, CloudError> {
    if folder_id.is_empty() {
        return Ok(Vec::new());
    }
    let groups = list_groups(service, folder_id).await?;
    Ok(groups.into_iter().map(|g| g.id).collect())
}

async fn resource_lists(
    service: &dyn LoggingService,
    group_id: &str,
    resource_type: &str,
) -> Result<(Vec<String>, Vec<String>), CloudError> {
    if group_id.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let resources = service.list_resources(group_id).await?;
    Ok(split_resources(resources, resource_type))
}

/// Distinct resource types, and the distinct ids of `resource_type`, in first-seen order
fn split_resources(resources: Vec<LogGroupResource>, resource_type: &str) -> (Vec<String>, Vec<String>) {
    let mut types: Vec<String> = Vec::new();
    let mut ids: Vec<String> = Vec::new();
    for resource in resources {
        if !resource_type.is_empty() && resource.resource_type == resource_type {
            for id in resource.ids {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if !types.contains(&resource.resource_type) {
            types.push(resource.resource_type);
        }
    }
    (types, ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cloud::{ListLogGroupsResponse, ReadRequest, ReadResponse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeCatalog {
        /// page token -> (group ids, next token)
        pages: HashMap<String, (Vec<&'static str>, &'static str)>,
        resources: Vec<(&'static str, Vec<&'static str>)>,
        fail_resources: bool,
        /// Group listing never completes
        hang_groups: bool,
        seen_tokens: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LoggingService for FakeCatalog {
        async fn read(&self, _: ReadRequest) -> Result<ReadResponse, CloudError> {
            Ok(ReadResponse::default())
        }

        async fn list_groups_page(
            &self,
            _folder_id: &str,
            page_token: &str,
        ) -> Result<ListLogGroupsResponse, CloudError> {
            self.seen_tokens.lock().unwrap().push(page_token.to_string());
            if self.hang_groups {
                std::future::pending::<()>().await;
            }
            let (ids, next) = self.pages.get(page_token).cloned().unwrap_or_default();
            Ok(ListLogGroupsResponse {
                groups: ids
                    .into_iter()
                    .map(|id| LogGroup {
                        id: id.to_string(),
                        folder_id: "f1".to_string(),
                        name: format!("{id}-name"),
                        status: "ACTIVE".to_string(),
                    })
                    .collect(),
                next_page_token: next.to_string(),
            })
        }

        async fn list_resources(&self, _: &str) -> Result<Vec<LogGroupResource>, CloudError> {
            if self.fail_resources {
                return Err(CloudError::Token("denied".to_string()));
            }
            Ok(self
                .resources
                .iter()
                .map(|(t, ids)| LogGroupResource {
                    resource_type: t.to_string(),
                    ids: ids.iter().map(|s| s.to_string()).collect(),
                })
                .collect())
        }

        async fn check_connection(&self) -> Result<(), CloudError> {
            Ok(())
        }

        async fn shutdown(&self) {}
    }

    fn request(group_id: &str, resource_type: &str) -> SuggestQueryRequest {
        SuggestQueryRequest {
            group_id: group_id.to_string(),
            resource_type: resource_type.to_string(),
        }
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog {
            pages: HashMap::from([
                (String::new(), (vec!["g1", "g2"], "p2")),
                ("p2".to_string(), (vec!["g3"], "")),
            ]),
            resources: vec![
                ("serverless.function", vec!["fn1", "fn2"]),
                ("k8s.pod", vec!["pod1"]),
                ("serverless.function", vec!["fn2", "fn3"]),
            ],
            ..FakeCatalog::default()
        }
    }

    #[tokio::test]
    async fn test_list_groups_follows_tokens() {
        let service = catalog();
        let groups = list_groups(&service, "f1").await.unwrap();
        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2", "g3"]);
        assert_eq!(*service.seen_tokens.lock().unwrap(), vec!["", "p2"]);
    }

    #[tokio::test]
    async fn test_suggest_full() {
        let service = catalog();
        let response = suggest(&service, "f1", &request("g1", "serverless.function"))
            .await
            .unwrap();
        assert_eq!(response.groups, vec!["g1", "g2", "g3"]);
        assert_eq!(response.resource_types, vec!["serverless.function", "k8s.pod"]);
        assert_eq!(response.resource_ids, vec!["fn1", "fn2", "fn3"]);
    }

    #[tokio::test]
    async fn test_empty_folder_skips_group_listing() {
        let service = catalog();
        let response = suggest(&service, "", &request("g1", "k8s.pod")).await.unwrap();
        assert!(response.groups.is_empty());
        assert_eq!(response.resource_types.len(), 2);
        assert_eq!(response.resource_ids, vec!["pod1"]);
        assert!(service.seen_tokens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_inputs_give_empty_lists() {
        let service = catalog();
        let response = suggest(&service, "", &request("", "")).await.unwrap();
        assert_eq!(response, SuggestQueryResponse::default());
    }

    #[tokio::test]
    async fn test_resource_failure_fails_whole_call() {
        let service = FakeCatalog {
            fail_resources: true,
            ..catalog()
        };
        let err = suggest(&service, "f1", &request("g1", "")).await.unwrap_err();
        assert!(err.to_string().contains("denied"));
    }

    #[tokio::test]
    async fn test_resource_failure_does_not_wait_for_groups() {
        let service = FakeCatalog {
            hang_groups: true,
            fail_resources: true,
            ..catalog()
        };
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            suggest(&service, "f1", &request("g1", "")),
        )
        .await
        .expect("suggest waited on the group listing");
        assert!(result.unwrap_err().to_string().contains("denied"));
        assert_eq!(*service.seen_tokens.lock().unwrap(), vec![""]);
    }
}
