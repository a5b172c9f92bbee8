use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::LogCache;
use crate::error::OperationError;
use crate::model::{LogDetail, LogDetailRequest, QueryRequest, QueryResult};
use crate::provider::LogProvider;
use crate::query::{QueryOptions, DEFAULT_PAGE_SIZE};
use crate::summary::summarize;

/// Query and detail lookups over a provider, with a shared record cache.
///
/// Detail lookups are served from the cache whenever the record was seen
/// by an earlier query, since the provider can only find a single record
/// through a filtered query.
#[derive(Clone)]
pub struct LogService {
    provider: Arc<dyn LogProvider>,
    cache: LogCache,
}

impl LogService {
    pub fn new(provider: Arc<dyn LogProvider>, cache: LogCache) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &LogCache {
        &self.cache
    }

    pub async fn query_logs(&self, req: &QueryRequest) -> Result<QueryResult, OperationError> {
        let options = QueryOptions::from_request(req);
        let page = match self.provider.fetch_entries(&req.project_id, &options).await {
            Ok(page) => page,
            Err(e) => {
                warn!(project_id = %req.project_id, filter = %req.filter, error = %e, "query failed");
                return Err(e);
            }
        };

        for record in &page.entries {
            if let Some(id) = record.log_id() {
                self.cache.add(id, record.clone());
            }
        }

        let fields = req.summary_fields.as_deref();
        let logs: Vec<_> = page.entries.iter().map(|r| summarize(r, fields)).collect();
        let requested = req.page_size.unwrap_or(DEFAULT_PAGE_SIZE) as usize;

        info!(
            project_id = %req.project_id,
            returned = logs.len(),
            has_next = page.next_page_token.is_some(),
            "queried logs"
        );
        Ok(QueryResult {
            page_size: logs.len().min(requested),
            logs,
            next_page_token: page.next_page_token,
        })
    }

    pub async fn get_log_detail(&self, req: &LogDetailRequest) -> Result<LogDetail, OperationError> {
        if let Some(log) = self.cache.get(&req.log_id) {
            debug!(log_id = %req.log_id, "log detail cache hit");
            return Ok(LogDetail { log });
        }
        debug!(log_id = %req.log_id, "log detail cache miss");

        let log = match self.provider.fetch_one(&req.project_id, &req.log_id).await {
            Ok(log) => log,
            Err(e) => {
                warn!(project_id = %req.project_id, log_id = %req.log_id, error = %e, "log detail failed");
                return Err(e);
            }
        };
        self.cache.add(req.log_id.clone(), log.clone());
        Ok(LogDetail { log })
    }
}
