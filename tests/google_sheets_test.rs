//! Full run with all three sheets on a mock Google Sheets API

use cosmetica_scraper::{Scraper, ScraperConfig};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const SPREADSHEET: &str = "sheet123";

fn echo_detail(req: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&req.body).unwrap_or_default();
    let regnos = body["MODEL"]["datail_string"]["regnos"].clone();
    ResponseTemplate::new(200).set_body_json(json!({
        "MODEL": {"datail_string": {"regnos": regnos, "lb_status": "คงอยู่"}}
    }))
}

async fn mount_sheets(server: &MockServer, input: Value, result: Value) {
    Mock::given(method("GET"))
        .and(path_regex(format!("/v4/spreadsheets/{}/values/.*INPUT", SPREADSHEET)))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(input))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/values/.*RESULT'?$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(result))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/values/.*ERROR'?$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"range": "ERROR!A1:Z1000"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r":append$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/FUNCTION_CENTER"))
        .respond_with(echo_detail)
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ScraperConfig {
    let location = |ws: &str| format!("gsheet:{}/{}", SPREADSHEET, ws);
    ScraperConfig {
        registry_url: format!("{}/FUNCTION_CENTER", server.uri()),
        sheets_api_url: server.uri(),
        input: location("INPUT"),
        results: location("RESULT"),
        errors: location("ERROR"),
        google_token: Some("tok".into()),
        batch_size: 2,
        max_workers: 3,
        backoff_base_ms: 10,
        ..Default::default()
    }
}

/// Row batches appended to a worksheet, in request order
async fn appends_to(server: &MockServer, worksheet: &str) -> Vec<Vec<Vec<String>>> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path().ends_with(":append"))
        .filter(|r| r.url.path().contains(worksheet))
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            assert_eq!(body["majorDimension"], "ROWS");
            serde_json::from_value(body["values"].clone()).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_google_run_initializes_headers_and_batches_appends() {
    let server = MockServer::start().await;
    mount_sheets(
        &server,
        json!({"values": [
            ["เลขที่จดแจ้ง"],
            ["10-2-6700038284"],
            ["10-1-6500000001"],
            ["10-1-6500000002"],
            ["10-1-6500000003"],
            ["10-1-6500000004"]
        ]}),
        json!({"range": "RESULT!A1:Z1000", "majorDimension": "ROWS"}),
    )
    .await;

    let summary = Scraper::new(config(&server)).unwrap().run().await.unwrap();
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.result_rows_written, 5);

    let result_appends = appends_to(&server, "RESULT").await;
    // header first, on its own
    assert_eq!(result_appends[0].len(), 1);
    assert_eq!(result_appends[0][0][0], "notify_number");

    let data = &result_appends[1..];
    assert!(data.iter().all(|batch| batch.len() <= 2));
    assert_eq!(data.iter().map(Vec::len).sum::<usize>(), 5);

    let error_appends = appends_to(&server, "ERROR").await;
    assert_eq!(error_appends.len(), 1);
    assert_eq!(error_appends[0][0][2], "error_code");
}

#[tokio::test]
async fn test_google_input_read_from_column_a_whatever_its_header() {
    let server = MockServer::start().await;
    mount_sheets(
        &server,
        json!({"values": [["notify", "note"], ["10-2-6700038284", "x"], ["10-1-6500000001", ""]]}),
        json!({"range": "RESULT!A1:Z1000"}),
    )
    .await;

    let config = config(&server);
    assert!(config.input_column.is_none());

    let summary = Scraper::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.total_input, 2);
    assert_eq!(summary.succeeded, 2);
}

#[tokio::test]
async fn test_google_refused_result_row_goes_to_error_sheet() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"RESULT.*:append$"))
        .and(body_string_contains("1016500000009"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid values[0][5]"))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_sheets(
        &server,
        json!({"values": [
            ["เลขที่จดแจ้ง"],
            ["10-1-6500000009"],
            ["10-1-6500000001"],
            ["10-1-6500000002"],
            ["10-1-6500000003"]
        ]}),
        json!({"range": "RESULT!A1:Z1000"}),
    )
    .await;

    let mut config = config(&server);
    config.batch_size = 1;
    config.max_workers = 1;

    let summary = Scraper::new(config).unwrap().run().await.unwrap();
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.result_rows_written, 3);
    assert_eq!(summary.error_rows_written, 1);

    let batches = appends_to(&server, "RESULT").await;
    let (refused, landed): (Vec<_>, Vec<_>) = batches[1..]
        .iter()
        .partition(|batch| batch.iter().any(|r| r[1] == "1016500000009"));
    // three refused appends before the row is set aside
    assert!(refused.len() >= 3);
    assert_eq!(landed.iter().map(|b| b.len()).sum::<usize>(), 3);

    let errors = appends_to(&server, "ERROR").await;
    let row = &errors[1][0];
    assert_eq!(row[1], "1016500000009");
    assert_eq!(row[2], "SHEET_API");
    assert!(row[3].starts_with("RESULT append rejected"));
}

#[tokio::test]
async fn test_google_resume_reads_existing_result_rows() {
    let server = MockServer::start().await;
    mount_sheets(
        &server,
        json!({"values": [["เลขที่จดแจ้ง"], ["10-2-6700038284"], ["10-1-6500000001"]]}),
        json!({"values": [
            ["notify_number", "regnos"],
            ["10-2-6700038284", "1026700038284"],
            ["10-1-6500000001", "1016500000001"]
        ]}),
    )
    .await;

    let summary = Scraper::new(config(&server)).unwrap().run().await.unwrap();
    assert_eq!(summary.already_done, 2);
    assert_eq!(summary.completed, 0);

    // nothing fetched, RESULT header already present
    assert!(appends_to(&server, "RESULT").await.is_empty());
    let fetches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/FUNCTION_CENTER")
        .count();
    assert_eq!(fetches, 0);
}

#[tokio::test]
async fn test_google_api_error_fails_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let err = Scraper::new(config(&server)).unwrap().run().await.unwrap_err();
    assert_eq!(err.code_str(), "SHEET_API");
    assert!(err.message.contains("403"));
}
