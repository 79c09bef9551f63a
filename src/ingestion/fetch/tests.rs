use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> BlobFetcher {
    BlobFetcher::with_limits(Duration::from_secs(5), 1024)
}

#[tokio::test(flavor = "multi_thread")]
async fn download_writes_bytes_to_temp_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello from a file"))
        .mount(&server)
        .await;

    let blob = fetcher()
        .fetch(&format!("{}/files/notes.txt", server.uri()), ".txt")
        .await
        .expect("should download");

    assert_eq!(blob.len(), 17);
    assert!(!blob.is_empty());
    assert!(blob.path().to_string_lossy().ends_with(".txt"));
    let contents = std::fs::read_to_string(blob.path()).expect("should read temp file");
    assert_eq!(contents, "hello from a file");
}

#[tokio::test(flavor = "multi_thread")]
async fn temp_file_is_removed_on_drop_and_close() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("bytes"))
        .mount(&server)
        .await;

    let blob = fetcher()
        .fetch(&server.uri(), ".bin")
        .await
        .expect("should download");
    let dropped_path = blob.path().to_path_buf();
    drop(blob);
    assert!(!dropped_path.exists());

    let blob = fetcher()
        .fetch(&server.uri(), ".bin")
        .await
        .expect("should download");
    let closed_path = blob.path().to_path_buf();
    blob.close().expect("should close");
    assert!(!closed_path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn http_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let fetcher = fetcher();
    let missing = fetcher.fetch(&format!("{}/missing", server.uri()), "").await;
    assert!(matches!(missing, Err(RagError::NotFound(_))));

    let forbidden = fetcher.fetch(&format!("{}/forbidden", server.uri()), "").await;
    assert!(matches!(forbidden, Err(RagError::Validation(_))));

    let broken = fetcher.fetch(&format!("{}/broken", server.uri()), "").await;
    assert!(matches!(broken, Err(RagError::UpstreamUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let result = fetcher().fetch(&server.uri(), "").await;
    assert!(matches!(result, Err(RagError::Validation(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_host_is_upstream_unavailable() {
    let result = fetcher().fetch("http://127.0.0.1:9/file.txt", ".txt").await;
    assert!(matches!(result, Err(RagError::UpstreamUnavailable(_))));
}

#[test]
fn suffix_comes_from_extension() {
    assert_eq!(file_suffix("report.pdf"), ".pdf");
    assert_eq!(file_suffix("archive.tar.gz"), ".gz");
    assert_eq!(file_suffix("README"), "");
}
