//! Integration tests for the Hyros clients using wiremock HTTP mocks.

use std::collections::HashMap;
use std::time::Duration;

use attrsync_core::{EntityId, Granularity, SyncWindow};
use attrsync_hyros::{
    DirectClient, HyrosError, ReportClient, ReportClientConfig, ReportTemplate,
};
use chrono::TimeZone;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn two_day_window() -> SyncWindow {
    SyncWindow::new(
        chrono::Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        chrono::Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

fn report_template(server_uri: &str) -> ReportTemplate {
    ReportTemplate {
        url: format!("{server_uri}/api/sourceboardV2/stats"),
        headers: HashMap::from([("Cookie".to_string(), "session=abc".to_string())]),
        body: json!({
            "start": "01-01-2020",
            "end": "02-01-2020",
            "customerIds": ["old"],
            "groupAConfiguration": {"metric": "clicks"},
            "groupBConfiguration": {},
        }),
    }
}

fn report_client(server_uri: &str, max_poll_attempts: u32) -> ReportClient {
    ReportClient::new(
        report_template(server_uri),
        30,
        ReportClientConfig {
            max_poll_attempts,
            poll_interval: Duration::from_millis(0),
        },
    )
    .expect("client construction should not fail")
}

// ---------------------------------------------------------------------------
// Direct API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_fetch_tags_rows_with_sub_window_bounds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/attribution"))
        .and(query_param("startDate", "2024-05-01T00:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"id": "111", "sales": 2.0, "revenue": 50.0}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/attribution"))
        .and(query_param("startDate", "2024-05-02T00:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": "111", "sales": 1.0},
                {"id": "222", "revenue": 10.5}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DirectClient::with_base_url("test-key", 30, &server.uri()).unwrap();
    let rows = client
        .fetch_attribution(
            &[EntityId::from("111"), EntityId::from("222")],
            two_day_window(),
            "facebook_adset",
            Granularity::Day,
            8,
        )
        .await
        .expect("fetch should succeed");

    assert_eq!(rows.len(), 3);
    let day_one = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let day_two = chrono::Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
    assert_eq!(rows.iter().filter(|r| r.start_time == day_one).count(), 1);
    assert_eq!(rows.iter().filter(|r| r.start_time == day_two).count(), 2);
    for row in &rows {
        assert_eq!(row.end_time - row.start_time, chrono::Duration::days(1));
    }
}

#[tokio::test]
async fn direct_fetch_sends_api_key_and_manifest() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/attribution"))
        .and(wiremock::matchers::header("API-key", "test-key"))
        .and(query_param("attributionModel", "last_click"))
        .and(query_param("currency", "usd"))
        .and(query_param("ids", "111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;

    let window = SyncWindow::new(
        chrono::Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        chrono::Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
    )
    .unwrap();

    let client = DirectClient::with_base_url("test-key", 30, &server.uri()).unwrap();
    let rows = client
        .fetch_attribution(
            &[EntityId::from("111")],
            window,
            "google_campaign",
            Granularity::Day,
            8,
        )
        .await
        .expect("fetch should succeed");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn direct_fetch_fails_on_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/attribution"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = DirectClient::with_base_url("test-key", 30, &server.uri()).unwrap();
    let result = client
        .fetch_attribution(
            &[EntityId::from("111")],
            two_day_window(),
            "facebook_adset",
            Granularity::Day,
            8,
        )
        .await;

    assert!(matches!(result, Err(HyrosError::Http(_))));
}

// ---------------------------------------------------------------------------
// Report workflow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn report_workflow_submits_polls_and_exports() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sourceboardV2/stats"))
        .and(body_partial_json(json!({
            "start": "01-05-2024",
            "end": "03-05-2024",
            "customerIds": ["42"],
            "timeGroupingOption": "DAY",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "k1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/sourceboardV2/poll-current-step"))
        .and(query_param("key", "k1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reportReady": true})))
        .expect(1)
        .mount(&server)
        .await;

    let csv_payload = "\
Source,Clicks,Cost\n\
report metadata,,\n\
\"May 01\",10,5.25\n\
\"May 02\",20,-\n\
Total,30,5.25\n";
    Mock::given(method("POST"))
        .and(path("/api/sourceboardV2/export-report/k1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv_payload))
        .expect(1)
        .mount(&server)
        .await;

    let client = report_client(&server.uri(), 5);
    let rows = client
        .fetch_account(&EntityId::from("42"), two_day_window())
        .await
        .expect("workflow should succeed");

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["Source"], "May 01");
    assert_eq!(rows[1]["Cost"], "-");
}

#[tokio::test]
async fn report_poll_fails_after_exact_attempt_budget() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sourceboardV2/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "k1"})))
        .expect(1)
        .mount(&server)
        .await;

    // Never ready: retrieval must stop at the budget, not loop forever.
    Mock::given(method("GET"))
        .and(path("/api/sourceboardV2/poll-current-step"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reportReady": false})))
        .expect(3)
        .mount(&server)
        .await;

    let client = report_client(&server.uri(), 3);
    let result = client
        .fetch_account(&EntityId::from("42"), two_day_window())
        .await;

    match result {
        Err(HyrosError::PollExhausted { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected PollExhausted, got: {other:?}"),
    }
}

#[tokio::test]
async fn report_export_without_source_column_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sourceboardV2/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "k1"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/sourceboardV2/poll-current-step"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reportReady": true})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/sourceboardV2/export-report/k1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Clicks,Cost\nnoise,\n1,2\n"))
        .mount(&server)
        .await;

    let client = report_client(&server.uri(), 5);
    let result = client
        .fetch_account(&EntityId::from("42"), two_day_window())
        .await;

    assert!(matches!(result, Err(HyrosError::MalformedExport(_))));
}

#[tokio::test]
async fn report_submit_replays_intercepted_session_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sourceboardV2/stats"))
        .and(wiremock::matchers::header("Cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "k1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/sourceboardV2/poll-current-step"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reportReady": true})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/sourceboardV2/export-report/k1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("Source,Clicks\nnoise,\n\"May 01\",1\n"),
        )
        .mount(&server)
        .await;

    let client = report_client(&server.uri(), 5);
    let rows = client
        .fetch_account(&EntityId::from("42"), two_day_window())
        .await
        .expect("workflow should succeed");
    assert_eq!(rows.len(), 1);
}
