//! Deterministic sentence-based text chunking.
//!
//! Text is normalized, split into sentences, and the sentences are packed
//! greedily into chunks of at most `chunk_size` characters. Consecutive
//! chunks share a suffix of whole sentences worth up to `chunk_overlap`
//! characters so that context survives the chunk boundary. Sentences longer
//! than `chunk_size` are hard-split into fixed windows.
//!
//! All lengths are measured in chars. The overlap seed accumulates raw
//! sentence lengths while the size check uses the same running sum, not the
//! space-joined content length; callers must keep `chunk_overlap` smaller
//! than `chunk_size`.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub index: usize,
    pub word_count: usize,
}

static NEWLINE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Split text into overlapping chunks suitable for embedding.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<TextChunk> {
    let text = clean_text(text);
    if text.is_empty() {
        return Vec::new();
    }

    let sentences = split_into_sentences(&text);

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let sentence_len = sentence.chars().count();

        // A sentence that cannot fit in any chunk is split hard. It is
        // emitted window by window and never enters the sentence buffer.
        if sentence_len > chunk_size {
            if !current.is_empty() {
                flush(&mut chunks, &current);
                current.clear();
                current_len = 0;
            }
            hard_split(&mut chunks, &sentence, chunk_size, chunk_overlap);
            continue;
        }

        if current_len + sentence_len > chunk_size && !current.is_empty() {
            flush(&mut chunks, &current);

            // Seed the next chunk with trailing whole sentences of the one
            // just flushed, up to chunk_overlap chars.
            let mut overlap: Vec<String> = Vec::new();
            let mut overlap_len = 0usize;
            for prev in current.iter().rev() {
                let prev_len = prev.chars().count();
                if overlap_len + prev_len <= chunk_overlap {
                    overlap.insert(0, prev.clone());
                    overlap_len += prev_len;
                } else {
                    break;
                }
            }
            current = overlap;
            current_len = overlap_len;
        }

        current_len += sentence_len;
        current.push(sentence);
    }

    if !current.is_empty() {
        flush(&mut chunks, &current);
    }

    chunks
}

/// Remove control characters and collapse excessive whitespace.
pub fn clean_text(text: &str) -> String {
    let text = text.replace('\0', "");
    let text = NEWLINE_RUNS.replace_all(&text, "\n\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}

/// Split on sentence-ending punctuation followed by whitespace. The
/// whitespace run is consumed; empty fragments are dropped.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|next| next.is_whitespace()) {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

fn flush(chunks: &mut Vec<TextChunk>, sentences: &[String]) {
    let content = sentences.join(" ");
    chunks.push(TextChunk {
        index: chunks.len(),
        word_count: content.split_whitespace().count(),
        content,
    });
}

fn hard_split(chunks: &mut Vec<TextChunk>, sentence: &str, chunk_size: usize, chunk_overlap: usize) {
    // Misconfigured overlap >= size degenerates to one-char steps rather
    // than looping forever.
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let chars: Vec<char> = sentence.chars().collect();

    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            chunks.push(TextChunk {
                index: chunks.len(),
                word_count: piece.split_whitespace().count(),
                content: piece,
            });
        }
        start += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_yields_single_chunk() {
        let text = "The quick brown fox jumps over the lazy dog. \
                    A second sentence follows here. And a third one closes it.";
        let chunks = chunk_text(text, 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].word_count, chunks[0].content.split_whitespace().count());
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("   \n\n\t  ", 1000, 200).is_empty());
        assert!(chunk_text("\0\0", 1000, 200).is_empty());
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        let cleaned = clean_text("a\0b\n\n\n\n\nc   d\t\te  ");
        assert_eq!(cleaned, "ab\n\nc d e");
    }

    #[test]
    fn sentences_split_on_terminators_followed_by_whitespace() {
        let sentences = split_into_sentences("One. Two! Three? No.split Four.");
        assert_eq!(
            sentences,
            vec!["One.", "Two!", "Three?", "No.split Four."]
        );
    }

    #[test]
    fn indices_are_dense_across_hard_splits() {
        // One unbreakable 250-char "sentence" between two normal ones.
        let long = "x".repeat(250);
        let text = format!("Short lead sentence here. {long} Short tail sentence here.");
        let chunks = chunk_text(&text, 100, 20);

        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
        }
        // Windows advance by size - overlap = 80 chars: 0, 80, 160, 240.
        assert!(chunks.len() >= 5);
    }

    #[test]
    fn oversized_sentence_is_windowed_with_overlap() {
        let long: String = ('a'..='z').cycle().take(250).collect();
        let chunks = chunk_text(&format!("{long}."), 100, 20);

        assert_eq!(chunks[0].content.chars().count(), 100);
        // Each following window restarts 20 chars before the previous end.
        let first: Vec<char> = chunks[0].content.chars().collect();
        let second: Vec<char> = chunks[1].content.chars().collect();
        assert_eq!(&first[80..], &second[..20]);
    }

    #[test]
    fn overlap_repeats_trailing_sentences_by_design() {
        // Four ~30-char sentences, chunk_size fits two of them.
        let text = "Alpha sentence number one aa. Beta sentence number two bb. \
                    Gamma sentence number three c. Delta sentence number four d.";
        let chunks = chunk_text(text, 60, 30);
        assert!(chunks.len() >= 2);

        // The sentence that closed the first chunk re-opens the second.
        let first_tail = chunks[0].content.rsplit(". ").next().unwrap();
        assert!(
            chunks[1].content.starts_with(first_tail.trim_end_matches('.'))
                || chunks[1].content.starts_with(first_tail)
        );
    }

    #[test]
    fn all_sentences_survive_chunking_in_order() {
        let sentences: Vec<String> = (0..20)
            .map(|i| format!("Sentence number {i} carries some distinctive payload."))
            .collect();
        let text = sentences.join(" ");
        let chunks = chunk_text(&text, 120, 40);

        let joined: String = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mut search_from = 0;
        for sentence in &sentences {
            let found = joined[search_from..]
                .find(sentence.as_str())
                .unwrap_or_else(|| panic!("missing or out of order: {sentence}"));
            search_from += found;
        }

        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
        }
    }

    #[test]
    fn degenerate_overlap_still_terminates() {
        let text = "y".repeat(50);
        let chunks = chunk_text(&text, 10, 10);
        assert!(!chunks.is_empty());
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
        }
    }

    #[test]
    fn word_count_matches_content() {
        let chunks = chunk_text("Count these five words now.", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].word_count, 5);
    }
}
