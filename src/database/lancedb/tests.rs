use super::*;

fn message_record() -> StoredRecord {
    StoredRecord {
        id: "vec_1".to_string(),
        workspace_id: "w1".to_string(),
        text: "hello world".to_string(),
        origin: RecordOrigin::Message(MessageOrigin {
            message_id: "m1".to_string(),
            user_id: "u1".to_string(),
            channel_id: "c1".to_string(),
            user_name: "alice".to_string(),
            channel_name: "general".to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
        }),
        created_at: "2024-01-01T00:00:01+00:00".to_string(),
    }
}

#[test]
fn origin_accessors_follow_the_variant() {
    let record = message_record();
    assert_eq!(record.origin.kind(), "message");
    assert_eq!(record.message().map(|m| m.message_id.as_str()), Some("m1"));
    assert!(record.document().is_none());

    let document = StoredRecord {
        origin: RecordOrigin::Document(DocumentOrigin {
            document_id: "d1".to_string(),
            file_name: "guide.pdf".to_string(),
            chunk_index: 3,
        }),
        ..record
    };
    assert_eq!(document.origin.kind(), "document");
    assert_eq!(document.document().map(|d| d.chunk_index), Some(3));
    assert!(document.message().is_none());
}

#[test]
fn origin_serializes_with_kind_tag() {
    let json = serde_json::to_value(&message_record().origin).expect("should serialize origin");
    assert_eq!(json["kind"], "message");
    assert_eq!(json["message_id"], "m1");

    let parsed: RecordOrigin = serde_json::from_value(json).expect("should parse origin");
    assert_eq!(parsed, message_record().origin);
}
