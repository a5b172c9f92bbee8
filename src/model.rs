use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One raw log record as returned by the provider.
///
/// Known provider fields are typed; everything else is kept verbatim in
/// `extra` so the record serializes back to the shape it was read from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// The provider's insert id: top-level first, then `metadata.insertId`.
    pub fn log_id(&self) -> Option<&str> {
        self.insert_id
            .as_deref()
            .or_else(|| self.metadata_field("insertId").and_then(Value::as_str))
            .filter(|id| !id.is_empty())
    }

    /// `metadata.timestamp`, falling back to the top-level field.
    pub fn timestamp_value(&self) -> Option<&Value> {
        self.metadata_field("timestamp")
            .or(self.timestamp.as_ref())
            .filter(|v| !v.is_null())
    }

    /// `metadata.severity`, falling back to the top-level field.
    pub fn severity_value(&self) -> Option<&Value> {
        self.metadata_field("severity")
            .or(self.severity.as_ref())
            .filter(|v| !v.is_null())
    }

    pub fn severity(&self) -> Severity {
        self.severity_value()
            .map(Severity::from_value)
            .unwrap_or_default()
    }

    /// Structured payload: `jsonPayload` if set, otherwise `protoPayload`.
    pub fn payload(&self) -> Option<&Value> {
        self.json_payload
            .as_ref()
            .filter(|v| !v.is_null())
            .or(self.proto_payload.as_ref().filter(|v| !v.is_null()))
    }

    fn metadata_field(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref()?.as_object()?.get(key)
    }

    /// JSON view of the whole record, as the provider shaped it.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        let known: [(&str, Option<Value>); 9] = [
            ("insertId", self.insert_id.clone().map(Value::String)),
            ("logName", self.log_name.clone().map(Value::String)),
            ("timestamp", self.timestamp.clone()),
            ("severity", self.severity.clone()),
            ("textPayload", self.text_payload.clone()),
            ("jsonPayload", self.json_payload.clone()),
            ("protoPayload", self.proto_payload.clone()),
            ("labels", self.labels.clone()),
            ("metadata", self.metadata.clone()),
        ];
        for (key, value) in known {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        }
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// Provider severity levels, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub const ALL: [Severity; 9] = [
        Severity::Default,
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Alert,
        Severity::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }

    /// Case-insensitive name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }

    /// Numeric provider code (0, 100, .., 800).
    pub fn from_code(code: i64) -> Option<Self> {
        if code < 0 || code % 100 != 0 {
            return None;
        }
        Self::ALL.get((code / 100) as usize).copied()
    }

    /// Unrecognized values map to `DEFAULT`.
    pub fn from_value(value: &Value) -> Self {
        let parsed = match value {
            Value::String(s) => Self::from_name(s),
            Value::Number(n) => n.as_i64().and_then(Self::from_code),
            _ => None,
        };
        parsed.unwrap_or_default()
    }
}

/// Short projection of a [`LogRecord`], recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
    pub timestamp: String,
    pub severity: Severity,
    pub summary: String,
    /// Requested summary fields keyed by the last segment of their path.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub timestamp: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub project_id: String,
    pub filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub logs: Vec<LogSummary>,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDetailRequest {
    pub project_id: String,
    pub log_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDetail {
    pub log: LogRecord,
}
