//! Text chunking for embeddings.
//!
//! Fixed-size windows with overlap, breaking at the last whitespace
//! before the size limit so words are not split mid-token. The window
//! start always advances by `size - overlap`, clamped to at least one
//! character so inputs with no whitespace still make progress.

/// Splits `text` into ordered, overlapping chunks of at most `size`
/// characters. Empty or whitespace-only input yields no chunks.
///
/// Indices are character-based, not byte-based, so multi-byte input
/// never splits inside a code point.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + size).min(len);

        // Not the last chunk: prefer the last space inside the window.
        if start + size < len {
            if let Some(space_pos) = (start..end).rev().find(|&i| chars[i] == ' ') {
                if space_pos > start {
                    end = space_pos;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        // Advance by size - overlap, clamped so we always move forward.
        start = (start + size - overlap.min(size.saturating_sub(1))).max(start + 1);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        // "word0 word1 word2 ..." with predictable content
        (0..n)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunk_text("", 400, 50).is_empty());
    }

    #[test]
    fn test_whitespace_only_input_yields_no_chunks() {
        assert!(chunk_text("   \n\t  ", 400, 50).is_empty());
    }

    #[test]
    fn test_short_input_is_a_single_chunk() {
        let chunks = chunk_text("hello world", 400, 50);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_thousand_chars_400_50_yields_three_chunks() {
        // 1000 chars at size=400/overlap=50: window starts 0, 350, 700.
        let text = words(170);
        let text = &text[..1000];
        let chunks = chunk_text(text, 400, 50);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 400));
    }

    #[test]
    fn test_second_chunk_overlaps_tail_of_first() {
        let text = words(170);
        let text = &text[..1000];
        let chunks = chunk_text(text, 400, 50);
        // The second window starts 50 chars before the first window's end,
        // so its opening text must appear inside the first 400 chars.
        let second_head: String = chunks[1].chars().take(20).collect();
        let first_window: String = text.chars().take(400).collect();
        assert!(first_window.contains(&second_head));
    }

    #[test]
    fn test_chunk_ends_break_at_word_boundaries() {
        // Window starts land wherever the stride puts them, but ends
        // prefer the last space before the limit, so the final token of
        // every non-final chunk is a complete word.
        let text = words(200);
        let chunks = chunk_text(&text, 400, 50);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            let last = chunk.split_whitespace().last().unwrap();
            assert!(
                text.split_whitespace().any(|w| w == last),
                "chunk ends mid-word: {last:?}"
            );
        }
    }

    #[test]
    fn test_every_word_is_covered_by_some_chunk() {
        let text = words(300);
        let chunks = chunk_text(&text, 400, 50);
        for word in text.split_whitespace() {
            assert!(
                chunks.iter().any(|c| c.split_whitespace().any(|w| w == word)),
                "word {word:?} missing from all chunks"
            );
        }
    }

    #[test]
    fn test_no_whitespace_input_still_progresses() {
        let text = "x".repeat(1200);
        let chunks = chunk_text(&text, 400, 50);
        // Starts at 0, 350, 700, 1050: four windows, all full of 'x'.
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 400));
        let covered: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(covered >= text.len());
    }

    #[test]
    fn test_overlap_larger_than_size_still_terminates() {
        let text = words(100);
        let chunks = chunk_text(&text, 10, 50);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_multibyte_input_does_not_split_code_points() {
        let text = "héllo wörld ".repeat(60);
        let chunks = chunk_text(&text, 100, 20);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }
}
