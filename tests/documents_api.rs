#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prose(len: usize) -> String {
    "Expense reports are due on the last business day of each month. "
        .repeat(len / 64 + 1)
        .chars()
        .take(len)
        .collect()
}

fn document_request(server: &MockServer, file_name: &str, file_type: &str) -> Value {
    json!({
        "documentId": "d1",
        "workspaceId": "w1",
        "fileUrl": format!("{}/files/{}", server.uri(), file_name),
        "fileName": file_name,
        "fileType": file_type
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn process_document_reports_contiguous_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/policy.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(prose(3000)))
        .mount(&server)
        .await;
    let app = TestApp::start().await;

    let (status, body) = app
        .post(
            "/process-document",
            &document_request(&server, "policy.txt", "text/plain"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "unexpected response {}", body);
    assert_eq!(body["documentId"], "d1");

    let chunks = body["chunks"].as_u64().expect("chunk count");
    assert!((4..=5).contains(&chunks), "unexpected chunk count {}", chunks);
    assert_eq!(
        body["vectorIds"].as_array().map(Vec::len),
        Some(chunks as usize)
    );

    let (status, body) = app
        .post(
            "/knowledge-base/generate",
            &json!({"query": "when are expense reports due", "workspaceId": "w1", "limit": 10}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut indices: Vec<u64> = body["sourceMessages"]
        .as_array()
        .expect("sources")
        .iter()
        .map(|s| {
            assert_eq!(s["documentId"], "d1");
            assert_eq!(s["fileName"], "policy.txt");
            s["chunkIndex"].as_u64().expect("chunk index")
        })
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..chunks).collect::<Vec<_>>());

    app.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn process_document_failures_are_reported_in_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/missing.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = TestApp::start().await;

    let (status, body) = app
        .post(
            "/process-document",
            &document_request(&server, "missing.txt", "text/plain"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, body) = app
        .post(
            "/process-document",
            &document_request(&server, "diagram.png", "image/png"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (status, body) = app.post_raw("/process-document", "[]").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (_, health) = app.get("/health").await;
    assert_eq!(health["records"], 0);

    app.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_document_removes_chunks_and_calls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/handbook.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string(prose(1800)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callbacks/documents"))
        .and(header("x-callback-token", "s3cret"))
        .and(body_json(json!({"documentId": "d1", "status": "DELETED"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::start().await;

    let (_, processed) = app
        .post(
            "/process-document",
            &document_request(&server, "handbook.md", "text/markdown"),
        )
        .await;
    assert_eq!(processed["success"], true, "unexpected response {}", processed);

    let (status, body) = app
        .post(
            "/delete-document",
            &json!({
                "documentId": "d1",
                "workspaceId": "w1",
                "callbackUrl": format!("{}/callbacks/documents", server.uri()),
                "callbackToken": "s3cret"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "unexpected response {}", body);
    assert_eq!(body["deletedCount"], processed["chunks"]);

    let (_, health) = app.get("/health").await;
    assert_eq!(health["records"], 0);

    app.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_document_rejections_are_reported_in_the_body() {
    let app = TestApp::start().await;

    let (status, body) = app.post_raw("/delete-document", "{\"documentId\":").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, body) = app
        .post(
            "/delete-document",
            &json!({"documentId": "d1", "workspaceId": "  "}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["documentId"], "d1");

    app.stop().await;
}
