/// Hard cap on chunks emitted for a single file, guarding against
/// pathologically large inputs.
pub const MAX_CHUNKS_PER_FILE: usize = 2000;

/// Split `text` into overlapping character windows of `window` length with
/// `overlap` shared characters between consecutive windows. Deterministic:
/// the same input always yields the same sequence of chunk strings, so
/// chunk indices stay stable across reindexes of identical content.
///
/// An empty input yields no chunks. An input no longer than `window` yields
/// a single chunk equal to the whole input.
pub fn chunk_text(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }
    if len <= window {
        return vec![text.to_string()];
    }

    let step = window.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window).min(len);
        chunks.push(chars[start..end].iter().collect());
        if end == len || chunks.len() >= MAX_CHUNKS_PER_FILE {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_for_short_input() {
        let chunks = chunk_text("the quick brown fox", 800, 120);
        assert_eq!(chunks, vec!["the quick brown fox".to_string()]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 800, 120).is_empty());
    }

    #[test]
    fn overlapping_windows_on_long_input() {
        let text: String = "ab".repeat(1000); // 2000 chars
        let chunks = chunk_text(&text, 800, 120);
        assert!(chunks.len() > 1);
        for w in chunks.windows(2) {
            let prev_tail: String = w[0].chars().rev().take(120).collect();
            let next_head: String = w[1].chars().take(120).collect();
            let prev_tail_fwd: String = prev_tail.chars().rev().collect();
            assert_eq!(prev_tail_fwd, next_head);
        }
    }

    #[test]
    fn deterministic_for_same_input() {
        let text: String = "lorem ipsum dolor sit amet ".repeat(100);
        let a = chunk_text(&text, 800, 120);
        let b = chunk_text(&text, 800, 120);
        assert_eq!(a, b);
    }

    #[test]
    fn respects_max_chunks_cap() {
        let text: String = "x".repeat(MAX_CHUNKS_PER_FILE * 1000);
        let chunks = chunk_text(&text, 800, 120);
        assert!(chunks.len() <= MAX_CHUNKS_PER_FILE);
    }
}
