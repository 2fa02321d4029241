use super::estimate_token_count as estimate_token_count_impl;
use super::*;

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

fn contents(chunks: &[TextChunk]) -> Vec<&str> {
    chunks.iter().map(|c| c.content.as_str()).collect()
}

#[test]
fn estimate_token_count() {
    assert_eq!(estimate_token_count_impl("hello world"), 2);
    assert_eq!(estimate_token_count_impl("This is a test."), 5);
    assert_eq!(estimate_token_count_impl(""), 0);
}

#[test]
fn empty_and_blank_text() {
    assert!(chunk_text("", &config(100, 10)).expect("chunk").is_empty());
    assert!(chunk_text("  \n\n \n ", &config(100, 10)).expect("chunk").is_empty());
}

#[test]
fn short_text_is_one_trimmed_chunk() {
    let chunks = chunk_text("  A short note.\n", &config(100, 10)).expect("chunk");
    assert_eq!(contents(&chunks), vec!["A short note."]);
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].char_offset, 2);
}

#[test]
fn words_merge_greedily_without_overlap() {
    let chunks = chunk_text("one two three four five six", &config(10, 0)).expect("chunk");
    assert_eq!(
        contents(&chunks),
        vec!["one two", "three", "four five", "six"]
    );
}

#[test]
fn overlap_is_carried_between_chunks() {
    let text = "one two three four five six";
    let chunks = chunk_text(text, &config(10, 5)).expect("chunk");

    assert_eq!(
        contents(&chunks),
        vec!["one two", "two three", "four five", "five six"]
    );
    let offsets: Vec<usize> = chunks.iter().map(|c| c.char_offset).collect();
    assert_eq!(offsets, vec![0, 4, 14, 19]);
}

#[test]
fn separator_stays_with_following_piece() {
    let chunks = chunk_text("aaa\n\nbbb", &config(5, 0)).expect("chunk");
    assert_eq!(contents(&chunks), vec!["aaa", "bbb"]);
    assert_eq!(chunks[1].char_offset, 5);
}

#[test]
fn paragraphs_are_preferred_boundaries() {
    let paragraph = "Lorem ipsum dolor sit amet consectetur.";
    let text = [paragraph; 4].join("\n\n");
    let chunks = chunk_text(&text, &config(90, 0)).expect("chunk");

    assert_eq!(chunks.len(), 2);
    for chunk in &chunks {
        assert!(chunk.content.starts_with("Lorem"));
        assert!(chunk.content.ends_with("consectetur."));
    }
}

#[test]
fn chunks_respect_size_limit() {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(200);
    let cfg = config(120, 30);
    let chunks = chunk_text(&text, &cfg).expect("chunk");

    assert!(chunks.len() > 10);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert!(chunk.content.chars().count() <= cfg.chunk_size);
        assert!(!chunk.content.is_empty());
    }
}

#[test]
fn long_word_falls_back_to_characters() {
    let text = "x".repeat(25);
    let chunks = chunk_text(&text, &config(10, 0)).expect("chunk");
    assert_eq!(
        contents(&chunks),
        vec!["xxxxxxxxxx", "xxxxxxxxxx", "xxxxx"]
    );
}

#[test]
fn lengths_are_counted_in_characters() {
    let text = "日本語のテキスト ".repeat(20);
    let chunks = chunk_text(&text, &config(20, 5)).expect("chunk");

    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= 20);
        let located: String = text
            .chars()
            .skip(chunk.char_offset)
            .take(chunk.content.chars().count())
            .collect();
        assert_eq!(located, chunk.content);
    }
}

#[test]
fn offsets_point_at_chunk_text() {
    let text = "First paragraph here.\n\nSecond paragraph is a little longer.\nWith a second line.\n\nThird.";
    let chunks = chunk_text(text, &config(40, 10)).expect("chunk");

    for chunk in &chunks {
        let located: String = text
            .chars()
            .skip(chunk.char_offset)
            .take(chunk.content.chars().count())
            .collect();
        assert_eq!(located, chunk.content);
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = "Sentence number one. Sentence number two.\nAnother line.\n\n".repeat(30);
    let cfg = config(64, 16);
    assert_eq!(
        chunk_text(&text, &cfg).expect("chunk"),
        chunk_text(&text, &cfg).expect("chunk")
    );
}

#[test]
fn invalid_configuration_is_rejected() {
    assert!(matches!(
        chunk_text("text", &config(100, 100)),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));
    assert!(matches!(
        chunk_text("text", &config(0, 0)),
        Err(ConfigError::InvalidChunkSize(0))
    ));
}

#[test]
fn large_documents_chunk_in_linear_time() {
    let paragraph = "Überschrift über Kapitel. The quick brown fox jumps over the lazy dog.\n";
    let text = paragraph.repeat(4 * 1024 * 1024 / paragraph.len());
    assert!(text.len() > 3_000_000);

    let started = std::time::Instant::now();
    let chunks = chunk_text(&text, &ChunkingConfig::default()).expect("chunk");
    let elapsed = started.elapsed();

    assert!(chunks.len() > 3000);
    assert!(
        elapsed < std::time::Duration::from_secs(30),
        "chunking took {elapsed:?}"
    );

    // Map char offsets to byte offsets once and check every chunk against the source
    let byte_at: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let mut previous_offset = 0;
    for chunk in &chunks {
        assert!(chunk.char_offset >= previous_offset);
        let start = byte_at[chunk.char_offset];
        assert!(
            text.get(start..)
                .is_some_and(|rest| rest.starts_with(&chunk.content))
        );
        previous_offset = chunk.char_offset;
    }
}
