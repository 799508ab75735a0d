//! Page planning and the sequential read loop

use thiserror::Error;
use tracing::debug;

use crate::models::cloud::{Criteria, LogEntry, ReadRequest};
use crate::models::query::{LoggingRequest, TimeRange};
use crate::providers::{CloudError, LoggingService};

/// Largest page the service accepts
pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    pub page_size: i64,
    pub page_count: usize,
}

/// Split `limit` into the fewest pages of near-equal size
pub fn plan(limit: i64) -> PagePlan {
    if limit <= 0 {
        return PagePlan {
            page_size: MAX_PAGE_SIZE,
            page_count: 1,
        };
    }
    if limit <= MAX_PAGE_SIZE {
        return PagePlan {
            page_size: limit,
            page_count: 1,
        };
    }
    let pages = ceil_div(limit, MAX_PAGE_SIZE);
    PagePlan {
        page_size: ceil_div(limit, pages),
        page_count: pages as usize,
    }
}

/// Ceiling division of positive values without the `a + b - 1` overflow
fn ceil_div(a: i64, b: i64) -> i64 {
    a / b + i64::from(a % b != 0)
}

pub fn build_criteria(req: &LoggingRequest, range: TimeRange, page_size: i64) -> Criteria {
    let non_empty = |value: &str| {
        if value.is_empty() {
            Vec::new()
        } else {
            vec![value.to_string()]
        }
    };

    Criteria {
        log_group_id: req.group_id.clone(),
        since: range.from,
        until: range.to,
        levels: req.levels.iter().map(|level| level.to_service()).collect(),
        filter: req.query_text.clone(),
        page_size,
        stream_names: non_empty(&req.stream),
        resource_types: non_empty(&req.resource_type),
        resource_ids: req.resource_ids.clone(),
    }
}

/// A failed read, with whatever was collected before it
#[derive(Debug, Error)]
#[error("{source}")]
pub struct FetchError {
    pub entries: Vec<LogEntry>,
    #[source]
    pub source: CloudError,
}

/// Read up to `plan.page_count` pages, never returning more than `limit` entries when `limit > 0`
pub async fn read_entries(
    service: &dyn LoggingService,
    criteria: Criteria,
    limit: i64,
    plan: PagePlan,
) -> Result<Vec<LogEntry>, FetchError> {
    let mut entries: Vec<LogEntry> = Vec::new();
    let mut request = ReadRequest::Criteria(criteria);

    for page in 0..plan.page_count {
        let response = match service.read(request).await {
            Ok(response) => response,
            Err(source) => return Err(FetchError { entries, source }),
        };

        let received = response.entries.len();
        let mut batch = response.entries;
        if limit > 0 {
            let remaining = (limit as usize).saturating_sub(entries.len());
            batch.truncate(remaining);
        }
        entries.extend(batch);
        debug!(page, received, total = entries.len(), "Read log page");

        if (received as i64) < plan.page_size || response.next_page_token.is_empty() {
            break;
        }
        request = ReadRequest::PageToken(response.next_page_token);
    }

    Ok(entries)
}
