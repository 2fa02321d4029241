use super::*;
use tempfile::TempDir;

#[test]
fn format_detection() {
    assert_eq!(
        DocumentFormat::from_path("paper.pdf").expect("pdf"),
        DocumentFormat::Pdf
    );
    assert_eq!(
        DocumentFormat::from_path("PAPER.PDF").expect("pdf"),
        DocumentFormat::Pdf
    );
    assert_eq!(
        DocumentFormat::from_path("notes.txt").expect("txt"),
        DocumentFormat::Text
    );
    assert_eq!(
        DocumentFormat::from_path("readme.Md").expect("md"),
        DocumentFormat::Markdown
    );
    assert_eq!(
        DocumentFormat::from_path("guide.markdown").expect("markdown"),
        DocumentFormat::Markdown
    );
}

#[test]
fn unsupported_formats() {
    for name in ["notes.exe", "archive.tar.gz", "Makefile", "slides.pptx"] {
        assert!(
            matches!(
                DocumentFormat::from_path(name),
                Err(NotebookError::UnsupportedFormat(_))
            ),
            "{name} should be rejected"
        );
    }
}

#[test]
fn extracts_text_and_markdown() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let txt = temp_dir.path().join("notes.txt");
    let md = temp_dir.path().join("readme.md");
    std::fs::write(&txt, "plain text\nsecond line").expect("write txt");
    std::fs::write(&md, "# Title\n\nSome *markdown*.").expect("write md");

    assert_eq!(
        extract_text(&txt).expect("extract txt"),
        "plain text\nsecond line"
    );
    // Markdown is kept as-is
    assert_eq!(
        extract_text(&md).expect("extract md"),
        "# Title\n\nSome *markdown*."
    );
}

#[test]
fn invalid_utf8_is_replaced() {
    let text = extract_text_from_bytes(DocumentFormat::Text, b"caf\xe9 au lait", "menu.txt")
        .expect("lossy decode");
    assert!(text.starts_with("caf"));
    assert!(text.ends_with(" au lait"));
    assert!(text.contains('\u{FFFD}'));
}

#[test]
fn missing_file_is_io_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("missing.txt");
    assert!(matches!(extract_text(&missing), Err(NotebookError::Io(_))));
}

#[test]
fn broken_pdf_is_processing_error() {
    let result = extract_text_from_bytes(DocumentFormat::Pdf, b"%PDF-1.4 not really", "bad.pdf");
    match result {
        Err(NotebookError::Processing { file, .. }) => assert_eq!(file, "bad.pdf"),
        other => panic!("expected processing error, got {other:?}"),
    }
}

#[test]
fn process_document_chunks_text() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("long.txt");
    std::fs::write(&path, "A sentence about retrieval. ".repeat(100)).expect("write");

    let chunks = process_document(
        &path,
        &ChunkingConfig {
            chunk_size: 200,
            chunk_overlap: 40,
        },
    )
    .expect("process");

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.content.chars().count() <= 200));
}

#[test]
fn process_document_rejects_bad_chunking() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("short.txt");
    std::fs::write(&path, "text").expect("write");

    assert!(matches!(
        process_document(
            &path,
            &ChunkingConfig {
                chunk_size: 10,
                chunk_overlap: 10,
            }
        ),
        Err(NotebookError::Config(_))
    ));
}
