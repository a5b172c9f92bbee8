use std::sync::Arc;

use cloud_log_mcp::cache::LogCache;
use cloud_log_mcp::config::Config;
use cloud_log_mcp::error::ErrorCode;
use cloud_log_mcp::model::{LogDetailRequest, OrderBy, QueryRequest, SortOrder};
use cloud_log_mcp::provider::FileProvider;
use cloud_log_mcp::service::LogService;
use tempfile::tempdir;

const RECORDS: &str = r#"{"insertId":"r1","logName":"projects/demo/logs/stdout","timestamp":{"seconds":"1714557600","nanos":0},"severity":"INFO","textPayload":"service started"}
{"insertId":"r2","logName":"projects/demo/logs/stderr","timestamp":"2024-05-01T10:05:00Z","severity":"ERROR","jsonPayload":{"request":{"path":"/login"},"error":{"message":"bad password for bob@example.com"}}}
{"insertId":"r3","logName":"projects/demo/logs/stderr","timestamp":"2024-05-01T10:10:00Z","severity":"CRITICAL","jsonPayload":{"dump":"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"}}
"#;

async fn service_from_config() -> (tempfile::TempDir, LogService) {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("records.jsonl"), RECORDS).unwrap();
    let cfg_path = dir.path().join("config.yaml");
    std::fs::write(
        &cfg_path,
        "cache:\n  ttl_secs: 60\n  max_entries: 100\nprovider:\n  records_path: records.jsonl\n",
    )
    .unwrap();

    let cfg = Config::load_from_path(&cfg_path).unwrap();
    let path = cfg.provider.records_path.clone().unwrap();
    let provider = FileProvider::load(&path).await.unwrap();
    let svc = LogService::new(Arc::new(provider), LogCache::from_config(&cfg.cache));
    (dir, svc)
}

#[tokio::test]
async fn errors_newest_first_with_fallback_summaries() {
    let (_dir, svc) = service_from_config().await;
    let req = QueryRequest {
        project_id: "demo".into(),
        filter: "severity>=ERROR".into(),
        order_by: Some(OrderBy { timestamp: SortOrder::Desc }),
        ..Default::default()
    };

    let result = svc.query_logs(&req).await.unwrap();
    let ids: Vec<_> = result.logs.iter().filter_map(|l| l.insert_id.as_deref()).collect();
    assert_eq!(ids, vec!["r3", "r2"]);

    // no textPayload and no message: truncated payload dump
    let dump = &result.logs[0].summary;
    assert_eq!(dump.chars().count(), 200);
    assert!(dump.ends_with("..."));

    // nested message, redacted
    let login = &result.logs[1].summary;
    assert!(login.starts_with("bad password for "));
    assert!(!login.contains("bob@example.com"));
}

#[tokio::test]
async fn pagination_and_detail_lookup() {
    let (_dir, svc) = service_from_config().await;
    let mut req = QueryRequest {
        project_id: "demo".into(),
        filter: String::new(),
        page_size: Some(2),
        order_by: Some(OrderBy { timestamp: SortOrder::Asc }),
        ..Default::default()
    };

    let first = svc.query_logs(&req).await.unwrap();
    assert_eq!(first.page_size, 2);
    assert_eq!(first.logs[0].timestamp, "2024-05-01T10:00:00.000Z");
    assert_eq!(first.next_page_token.as_deref(), Some("2"));

    req.page_token = first.next_page_token.clone();
    let second = svc.query_logs(&req).await.unwrap();
    assert_eq!(second.page_size, 1);
    assert_eq!(second.next_page_token, None);

    let detail = svc
        .get_log_detail(&LogDetailRequest { project_id: "demo".into(), log_id: "r2".into() })
        .await
        .unwrap();
    assert_eq!(
        detail.log.json_payload.as_ref().unwrap()["error"]["message"],
        "bad password for bob@example.com"
    );
}

#[tokio::test]
async fn other_projects_see_nothing() {
    let (_dir, svc) = service_from_config().await;
    let req = QueryRequest {
        project_id: "elsewhere".into(),
        filter: String::new(),
        ..Default::default()
    };
    assert!(svc.query_logs(&req).await.unwrap().logs.is_empty());

    let err = svc
        .get_log_detail(&LogDetailRequest { project_id: "elsewhere".into(), log_id: "r9".into() })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn out_of_range_page_token_is_rejected() {
    let (_dir, svc) = service_from_config().await;
    let req = QueryRequest {
        project_id: "demo".into(),
        filter: String::new(),
        page_token: Some(usize::MAX.to_string()),
        ..Default::default()
    };
    let err = svc.query_logs(&req).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArgument);
    assert!(svc.cache().is_empty());
}

#[tokio::test]
async fn quoted_filter_values_keep_their_and() {
    let (_dir, svc) = service_from_config().await;
    let req = QueryRequest {
        project_id: "demo".into(),
        filter: r#"textPayload:"service AND started""#.into(),
        ..Default::default()
    };
    let result = svc.query_logs(&req).await.unwrap();
    assert!(result.logs.is_empty());

    let req = QueryRequest {
        filter: r#"textPayload:"service started" AND severity="INFO""#.into(),
        ..req
    };
    let result = svc.query_logs(&req).await.unwrap();
    assert_eq!(result.logs.len(), 1);
    assert_eq!(result.logs[0].insert_id.as_deref(), Some("r1"));
}
