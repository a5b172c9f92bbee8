use serde::{Deserialize, Serialize};

use crate::model::QueryRequest;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Option set handed to the log provider for one page of entries.
///
/// Unset keys are omitted when serialized, matching what the provider's
/// `entries.list` call expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub filter: String,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl QueryOptions {
    /// Maps a client request onto provider options. The filter is passed
    /// through untouched; its grammar belongs to the provider.
    pub fn from_request(req: &QueryRequest) -> Self {
        Self {
            filter: req.filter.clone(),
            page_size: req.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            resource_names: req
                .resource_names
                .as_ref()
                .filter(|names| !names.is_empty())
                .cloned(),
            page_token: req.page_token.clone(),
            order_by: req
                .order_by
                .map(|o| format!("timestamp {}", o.timestamp.as_str())),
        }
    }
}

impl From<&QueryRequest> for QueryOptions {
    fn from(req: &QueryRequest) -> Self {
        Self::from_request(req)
    }
}
