use super::*;
use crate::embeddings::HashingEmbedder;
use tempfile::TempDir;

const DIMENSION: usize = 64;

async fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(
        &temp_dir.path().join("vectors"),
        Arc::new(HashingEmbedder::new(DIMENSION)),
    )
    .await
    .expect("should open vector store");
    (store, temp_dir)
}

async fn message_record(
    store: &VectorStore,
    workspace_id: &str,
    message_id: &str,
    user_id: &str,
    text: &str,
) -> NewRecord {
    NewRecord {
        workspace_id: workspace_id.to_string(),
        text: text.to_string(),
        vector: store
            .embedder()
            .embed_one(text)
            .await
            .expect("should embed text"),
        origin: RecordOrigin::Message(MessageOrigin {
            message_id: message_id.to_string(),
            user_id: user_id.to_string(),
            channel_id: "c1".to_string(),
            user_name: "alice".to_string(),
            channel_name: "general".to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
        }),
    }
}

async fn document_record(
    store: &VectorStore,
    workspace_id: &str,
    document_id: &str,
    chunk_index: u32,
    text: &str,
) -> NewRecord {
    NewRecord {
        workspace_id: workspace_id.to_string(),
        text: text.to_string(),
        vector: store
            .embedder()
            .embed_one(text)
            .await
            .expect("should embed text"),
        origin: RecordOrigin::Document(DocumentOrigin {
            document_id: document_id.to_string(),
            file_name: "handbook.txt".to_string(),
            chunk_index,
        }),
    }
}

fn workspace(id: &str) -> QueryScope {
    QueryScope::workspace(id).expect("valid scope")
}

#[tokio::test]
async fn upsert_returns_one_id_per_record() {
    let (store, _temp_dir) = create_test_store().await;
    let records = vec![
        message_record(&store, "w1", "m1", "u1", "hello world").await,
        message_record(&store, "w1", "m2", "u1", "deploy is done").await,
    ];

    let ids = store.upsert(records).await.expect("should upsert");

    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(store.count(None).await.expect("should count"), 2);
}

#[tokio::test]
async fn upsert_rejects_whole_batch_on_invalid_record() {
    let (store, _temp_dir) = create_test_store().await;
    let good = message_record(&store, "w1", "m1", "u1", "hello world").await;
    let mut bad = message_record(&store, "w1", "m2", "u1", "second").await;
    bad.vector.truncate(3);

    let result = store.upsert(vec![good, bad]).await;

    assert!(matches!(result, Err(RagError::Validation(_))));
    assert_eq!(store.count(None).await.expect("should count"), 0);
}

#[tokio::test]
async fn upsert_rejects_empty_workspace() {
    let (store, _temp_dir) = create_test_store().await;
    let record = message_record(&store, "  ", "m1", "u1", "hello world").await;

    let result = store.upsert(vec![record]).await;
    assert!(matches!(result, Err(RagError::Validation(_))));
}

#[tokio::test]
async fn query_round_trips_metadata() {
    let (store, _temp_dir) = create_test_store().await;
    let record = message_record(&store, "w1", "m1", "u1", "hello world").await;
    let ids = store.upsert(vec![record]).await.expect("should upsert");

    let results = store
        .query("hello", &workspace("w1"), 5)
        .await
        .expect("should query");

    assert_eq!(results.len(), 1);
    let hit = &results[0];
    assert_eq!(hit.record.id, ids[0]);
    assert_eq!(hit.record.workspace_id, "w1");
    assert_eq!(hit.record.text, "hello world");
    let message = hit.record.message().expect("message origin");
    assert_eq!(message.message_id, "m1");
    assert_eq!(message.user_name, "alice");
    assert!(hit.record.document().is_none());
}

#[tokio::test]
async fn query_orders_by_descending_similarity_and_honours_limit() {
    let (store, _temp_dir) = create_test_store().await;
    let records = vec![
        message_record(&store, "w1", "m1", "u1", "lunch menu for friday").await,
        message_record(&store, "w1", "m2", "u1", "billing service deploy failed").await,
        message_record(&store, "w1", "m3", "u1", "deploy the billing service").await,
    ];
    store.upsert(records).await.expect("should upsert");

    let results = store
        .query("deploy the billing service", &workspace("w1"), 2)
        .await
        .expect("should query");

    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
    assert_eq!(
        results[0].record.message().map(|m| m.message_id.as_str()),
        Some("m3")
    );
}

#[tokio::test]
async fn query_never_crosses_workspaces() {
    let (store, _temp_dir) = create_test_store().await;
    let records = vec![
        message_record(&store, "w1", "m1", "u1", "quarterly revenue report").await,
        message_record(&store, "w2", "m2", "u1", "quarterly revenue report").await,
    ];
    store.upsert(records).await.expect("should upsert");

    for (ws, expected) in [("w1", "m1"), ("w2", "m2")] {
        let results = store
            .query("quarterly revenue report", &workspace(ws), 10)
            .await
            .expect("should query");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.workspace_id, ws);
        assert_eq!(
            results[0].record.message().map(|m| m.message_id.as_str()),
            Some(expected)
        );
    }

    let empty = store
        .query("quarterly revenue report", &workspace("w3"), 10)
        .await
        .expect("should query");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn query_applies_peer_filter() {
    let (store, _temp_dir) = create_test_store().await;
    let records = vec![
        message_record(&store, "w1", "m1", "u1", "standup notes").await,
        message_record(&store, "w1", "m2", "u2", "standup notes").await,
        document_record(&store, "w1", "d1", 0, "standup notes").await,
    ];
    store.upsert(records).await.expect("should upsert");

    let results = store
        .query("standup", &workspace("w1").with_user("u2"), 10)
        .await
        .expect("should query");

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].record.message().map(|m| m.user_id.as_str()),
        Some("u2")
    );
}

#[tokio::test]
async fn delete_by_ids_removes_only_requested_records() {
    let (store, _temp_dir) = create_test_store().await;
    let records = vec![
        message_record(&store, "w1", "m1", "u1", "first").await,
        message_record(&store, "w1", "m2", "u1", "second").await,
    ];
    let ids = store.upsert(records).await.expect("should upsert");

    let deleted = store
        .delete("w1", DeleteCriteria::Ids(vec![ids[0].clone()]))
        .await
        .expect("should delete");

    assert_eq!(deleted, 1);
    let remaining = store.list(&workspace("w1"), 10).await.expect("should list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[1]);
}

#[tokio::test]
async fn delete_by_foreign_id_is_a_tenant_violation() {
    let (store, _temp_dir) = create_test_store().await;
    let own = message_record(&store, "w1", "m1", "u1", "mine").await;
    let foreign = message_record(&store, "w2", "m2", "u1", "theirs").await;
    let ids = store.upsert(vec![own, foreign]).await.expect("should upsert");

    let result = store
        .delete("w1", DeleteCriteria::Ids(vec![ids[0].clone(), ids[1].clone()]))
        .await;

    assert!(matches!(result, Err(RagError::TenantViolation(_))));
    assert_eq!(store.count(None).await.expect("should count"), 2);
}

#[tokio::test]
async fn delete_unknown_ids_is_a_no_op() {
    let (store, _temp_dir) = create_test_store().await;
    let record = message_record(&store, "w1", "m1", "u1", "kept").await;
    store.upsert(vec![record]).await.expect("should upsert");

    let deleted = store
        .delete("w1", DeleteCriteria::Ids(vec!["missing".to_string()]))
        .await
        .expect("should succeed");

    assert_eq!(deleted, 0);
    assert_eq!(store.count(None).await.expect("should count"), 1);
}

#[tokio::test]
async fn delete_by_scope_stays_in_workspace() {
    let (store, _temp_dir) = create_test_store().await;
    let records = vec![
        document_record(&store, "w1", "d1", 0, "chunk zero").await,
        document_record(&store, "w1", "d1", 1, "chunk one").await,
        document_record(&store, "w1", "d2", 0, "other document").await,
        document_record(&store, "w2", "d1", 0, "same id other tenant").await,
    ];
    store.upsert(records).await.expect("should upsert");

    let deleted = store
        .delete(
            "w1",
            DeleteCriteria::Scope(workspace("w1").with_document("d1")),
        )
        .await
        .expect("should delete");

    assert_eq!(deleted, 2);
    assert_eq!(store.count(Some(&workspace("w1"))).await.expect("count"), 1);
    assert_eq!(store.count(Some(&workspace("w2"))).await.expect("count"), 1);

    let cross = store
        .delete("w1", DeleteCriteria::Scope(workspace("w2")))
        .await;
    assert!(matches!(cross, Err(RagError::TenantViolation(_))));
}

#[tokio::test]
async fn reopening_with_different_dimension_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");
    VectorStore::open(&path, Arc::new(HashingEmbedder::new(DIMENSION)))
        .await
        .expect("should open vector store");

    let reopened = VectorStore::open(&path, Arc::new(HashingEmbedder::new(DIMENSION)))
        .await;
    assert!(reopened.is_ok());

    let mismatched = VectorStore::open(&path, Arc::new(HashingEmbedder::new(32))).await;
    assert!(matches!(mismatched, Err(RagError::Config(_))));
}

#[tokio::test]
async fn optimize_keeps_records() {
    let (store, _temp_dir) = create_test_store().await;
    let record = message_record(&store, "w1", "m1", "u1", "hello").await;
    store.upsert(vec![record]).await.expect("should upsert");

    store.optimize().await.expect("should optimize");
    assert_eq!(store.count(None).await.expect("should count"), 1);
}
