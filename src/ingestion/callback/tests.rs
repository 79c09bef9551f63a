use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn body_uses_camel_case_and_uppercase_status() {
    let body = DocumentCallback {
        document_id: "d1".to_string(),
        status: DocumentStatus::Deleted,
        error: None,
    };
    assert_eq!(
        serde_json::to_value(&body).expect("should serialize"),
        json!({"documentId": "d1", "status": "DELETED"})
    );

    let failed = DocumentCallback {
        error: Some("boom".to_string()),
        status: DocumentStatus::Failed,
        ..body
    };
    assert_eq!(
        serde_json::to_value(&failed).expect("should serialize"),
        json!({"documentId": "d1", "status": "FAILED", "error": "boom"})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn notify_sends_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/documents"))
        .and(header("x-callback-token", "secret"))
        .and(body_json(json!({"documentId": "d1", "status": "DELETED"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let target = CallbackTarget {
        url: format!("{}/hooks/documents", server.uri()),
        token: "secret".to_string(),
    };
    CallbackClient::default()
        .notify(
            &target,
            DocumentCallback {
                document_id: "d1".to_string(),
                status: DocumentStatus::Deleted,
                error: None,
            },
        )
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn delivery_failures_are_reported_by_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let target = CallbackTarget {
        url: server.uri(),
        token: "secret".to_string(),
    };
    let body = DocumentCallback {
        document_id: "d1".to_string(),
        status: DocumentStatus::Failed,
        error: Some("boom".to_string()),
    };

    let client = CallbackClient::with_timeout(Duration::from_secs(2));
    let result = tokio::task::spawn_blocking({
        let client = client.clone();
        let target = target.clone();
        let body = body.clone();
        move || client.post(&target, &body)
    })
    .await
    .expect("callback task should finish");
    assert!(result.is_err());

    client.notify(&target, body).await;
}
