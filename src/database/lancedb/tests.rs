use super::*;
use crate::database::sqlite::models::FileStatus;

#[test]
fn record_ids_are_deterministic() {
    assert_eq!(EmbeddingRecord::record_id(7, 0), "7:0");
    assert_eq!(EmbeddingRecord::record_id(7, 12), "7:12");
}

#[test]
fn record_from_chunk() {
    let now = chrono::Utc::now().naive_utc();
    let file = FileRecord {
        id: 3,
        notebook_id: 1,
        original_filename: "paper.pdf".to_string(),
        stored_filename: "paper-1a2b3c4d.pdf".to_string(),
        upload_date: now,
        status: FileStatus::Processing,
        error_message: None,
        chunk_count: 0,
        processed_at: None,
    };
    let chunk = TextChunk {
        content: "Some chunk text".to_string(),
        chunk_index: 4,
        char_offset: 512,
    };

    let record = EmbeddingRecord::from_chunk(1, &file, &chunk, vec![0.1, 0.2], "2024-01-01T00:00:00Z");

    assert_eq!(record.id, "3:4");
    assert_eq!(record.vector.len(), 2);
    assert_eq!(record.metadata.source, "paper.pdf");
    assert_eq!(record.metadata.chunk_index, 4);
    assert_eq!(record.metadata.char_offset, 512);
    assert_eq!(record.metadata.notebook_id, 1);
}

#[test]
fn chunk_metadata_serialization() {
    let metadata = ChunkMetadata {
        notebook_id: 1,
        file_id: 2,
        source: "notes.md".to_string(),
        chunk_index: 5,
        char_offset: 100,
        content: "Test content".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
    };

    let json = serde_json::to_string(&metadata).expect("can serialize json");
    let deserialized: ChunkMetadata = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(metadata, deserialized);
}
