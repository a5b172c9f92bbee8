use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AppError, OperationError, Result};
use crate::filter::Filter;
use crate::model::{LogRecord, SortOrder};
use crate::query::QueryOptions;
use crate::timestamp;

/// One page of provider entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntriesPage {
    pub entries: Vec<LogRecord>,
    pub next_page_token: Option<String>,
}

/// Remote log store the retrieval service reads from.
///
/// Built once per process and shared; implementations own their transport,
/// authentication and retry policy.
#[async_trait]
pub trait LogProvider: Send + Sync {
    async fn fetch_entries(
        &self,
        project_id: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EntriesPage, OperationError>;

    /// Fails with `NOT_FOUND` when no record carries `log_id`.
    async fn fetch_one(
        &self,
        project_id: &str,
        log_id: &str,
    ) -> std::result::Result<LogRecord, OperationError>;
}

/// Serves a local export (JSON array or JSON lines) of provider records.
///
/// Records whose `logName` belongs to another project (`projects/<id>/...`)
/// are invisible to that project's queries. Page tokens are offsets.
#[derive(Debug, Clone, Default)]
pub struct FileProvider {
    records: Vec<LogRecord>,
    source: Option<PathBuf>,
}

impl FileProvider {
    pub fn from_records(records: Vec<LogRecord>) -> Self {
        Self {
            records,
            source: None,
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::FileAccessError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let records = parse_records(path, &raw)?;
        info!(path = %path.display(), records = records.len(), "loaded log records");
        Ok(Self {
            records,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn visible<'a>(&'a self, project_id: &'a str) -> impl Iterator<Item = &'a LogRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| in_project(r, project_id))
    }
}

#[async_trait]
impl LogProvider for FileProvider {
    async fn fetch_entries(
        &self,
        project_id: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EntriesPage, OperationError> {
        let filter = Filter::parse(&options.filter)?;
        let offset = match options.page_token.as_deref() {
            Some(token) => token.parse::<usize>().map_err(|_| {
                OperationError::invalid_argument(format!("invalid page token: {token}"))
            })?,
            None => 0,
        };
        let order = options.order_by.as_deref().map(parse_order_by).transpose()?;

        let mut matched: Vec<&LogRecord> = self
            .visible(project_id)
            .filter(|r| in_resources(r, options.resource_names.as_deref()))
            .filter(|r| filter.matches(r))
            .collect();

        if let Some(order) = order {
            matched.sort_by_key(|r| r.timestamp_value().and_then(timestamp::parse_value));
            if order == SortOrder::Desc {
                matched.reverse();
            }
        }

        let page_size = options.page_size.max(1) as usize;
        let entries: Vec<LogRecord> = matched
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|r| (*r).clone())
            .collect();
        let next = offset.checked_add(page_size).ok_or_else(|| {
            OperationError::invalid_argument(format!("page token out of range: {offset}"))
        })?;
        let next_page_token = (next < matched.len()).then(|| next.to_string());

        debug!(
            project_id,
            filter = %options.filter,
            matched = matched.len(),
            returned = entries.len(),
            "file provider page"
        );
        Ok(EntriesPage {
            entries,
            next_page_token,
        })
    }

    async fn fetch_one(
        &self,
        project_id: &str,
        log_id: &str,
    ) -> std::result::Result<LogRecord, OperationError> {
        self.visible(project_id)
            .find(|r| r.log_id() == Some(log_id))
            .cloned()
            .ok_or_else(|| OperationError::not_found(format!("Log entry with ID {log_id} not found")))
    }
}

fn parse_records(path: &Path, raw: &str) -> Result<Vec<LogRecord>> {
    let parse_err = |line: Option<usize>, e: serde_json::Error| {
        let at = line.map(|n| format!(":{n}")).unwrap_or_default();
        AppError::ConfigError(format!("{}{at}: {e}", path.display()))
    };

    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw).map_err(|e| parse_err(None, e));
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str(line).map_err(|e| parse_err(Some(i + 1), e)))
        .collect()
}

fn parse_order_by(raw: &str) -> std::result::Result<SortOrder, OperationError> {
    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("timestamp"), Some(dir), None) if dir.eq_ignore_ascii_case("asc") => Ok(SortOrder::Asc),
        (Some("timestamp"), Some(dir), None) if dir.eq_ignore_ascii_case("desc") => {
            Ok(SortOrder::Desc)
        }
        _ => Err(OperationError::invalid_argument(format!(
            "unsupported orderBy: {raw}"
        ))),
    }
}

fn in_project(record: &LogRecord, project_id: &str) -> bool {
    let Some(rest) = record
        .log_name
        .as_deref()
        .and_then(|n| n.strip_prefix("projects/"))
    else {
        return true;
    };
    rest.split('/').next() == Some(project_id)
}

fn in_resources(record: &LogRecord, names: Option<&[String]>) -> bool {
    match names {
        None | Some([]) => true,
        Some(names) => record
            .log_name
            .as_deref()
            .map(|log| names.iter().any(|n| log.starts_with(n.as_str())))
            .unwrap_or(false),
    }
}
