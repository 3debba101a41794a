//! Visible text extraction and chunking

use crate::page::TextChunk;
use ego_tree::NodeRef;
use scraper::{Html, Node, Selector};

/// Target chunk size in bytes
const CHUNK_SIZE: usize = 1000;
/// Overlap carried into the next chunk
const CHUNK_OVERLAP: usize = 100;
/// Chunks are never cut shorter than this
const MIN_CHUNK_SIZE: usize = 200;

/// Elements whose text is never visible
const INVISIBLE_TAGS: &[&str] = &["script", "style", "img", "noscript", "template"];

/// Concatenates the page's visible text, one text node per line
///
/// Drops `<script>`, `<style>`, `<img>` and friends, walks the body (the
/// head holds no rendered text), and joins what remains with line breaks.
pub fn visible_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next());

    let mut lines: Vec<String> = Vec::new();
    match root {
        Some(body) => collect_visible(*body, &mut lines),
        None => collect_visible(document.tree.root(), &mut lines),
    }

    lines.join("\n")
}

fn collect_visible(node: NodeRef<'_, Node>, lines: &mut Vec<String>) {
    for descendant in node.descendants() {
        if let Some(text) = descendant.value().as_text() {
            if under_invisible_tag(&descendant) {
                continue;
            }
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
    }
}

fn under_invisible_tag(node: &NodeRef<'_, Node>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if let Some(element) = parent.value().as_element() {
            if INVISIBLE_TAGS.contains(&element.name()) {
                return true;
            }
        }
        current = parent.parent();
    }
    false
}

/// Splits visible text into overlapping chunks
///
/// Aims for [`CHUNK_SIZE`] bytes with [`CHUNK_OVERLAP`] carried over,
/// breaking preferentially at a paragraph boundary, then a sentence end,
/// then any whitespace. No chunk is cut shorter than [`MIN_CHUNK_SIZE`];
/// text that fits in one chunk is returned whole.
pub fn chunk_text(text: &str) -> Vec<TextChunk> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= CHUNK_SIZE {
        return vec![TextChunk {
            offset: 0,
            text: text.to_string(),
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let hard_end = char_floor(text, (start + CHUNK_SIZE).min(text.len()));

        let end = if hard_end == text.len() {
            hard_end
        } else {
            best_break(text, start + MIN_CHUNK_SIZE, hard_end).unwrap_or(hard_end)
        };

        let slice = text[start..end].trim_end();
        if !slice.is_empty() {
            chunks.push(TextChunk {
                offset: start,
                text: slice.to_string(),
            });
        }

        if end >= text.len() {
            break;
        }
        // Step back for overlap, but always move forward
        let next = end.saturating_sub(CHUNK_OVERLAP).max(start + 1);
        start = char_ceil(text, next);
    }

    chunks
}

/// Picks the best break position in `[min_end, max_end]`: paragraph break,
/// then sentence break, then whitespace. Returns the position after the
/// break so separators stay with the preceding chunk.
fn best_break(text: &str, min_end: usize, max_end: usize) -> Option<usize> {
    let min_end = char_ceil(text, min_end.min(max_end));
    if min_end >= max_end {
        return None;
    }
    let window = &text[min_end..max_end];

    if let Some(pos) = window.rfind("\n\n") {
        return Some(min_end + pos + 2);
    }
    for pattern in [". ", ".\n", "! ", "? "] {
        if let Some(pos) = window.rfind(pattern) {
            return Some(min_end + pos + pattern.len());
        }
    }
    window
        .rfind(|c: char| c.is_whitespace())
        // rfind reports the char's start; snap past multibyte whitespace
        .map(|pos| char_ceil(text, min_end + pos + 1))
}

/// Largest char boundary at or below `index`.
fn char_floor(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest char boundary at or above `index`.
fn char_ceil(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(html: &str) -> String {
        visible_text(&Html::parse_document(html))
    }

    #[test]
    fn test_visible_text_joins_with_newlines() {
        let text = text_of("<body><p>First</p><p>Second</p></body>");
        assert_eq!(text, "First\nSecond");
    }

    #[test]
    fn test_script_and_style_stripped() {
        let text = text_of(
            "<body><script>var x = 1;</script><style>p { color: red }</style><p>Kept</p></body>",
        );
        assert_eq!(text, "Kept");
    }

    #[test]
    fn test_head_title_not_visible() {
        let text = text_of("<html><head><title>Title</title></head><body><p>Body</p></body></html>");
        assert_eq!(text, "Body");
    }

    #[test]
    fn test_nested_invisible_content() {
        let text = text_of("<body><noscript><p>fallback</p></noscript><p>real</p></body>");
        assert_eq!(text, "real");
    }

    #[test]
    fn test_chunk_short_text_is_single_chunk() {
        let chunks = chunk_text("A short paragraph.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].text, "A short paragraph.");
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("   \n  ").is_empty());
    }

    #[test]
    fn test_chunks_cover_long_text_with_overlap() {
        let sentence = "Some words that make a sentence of reasonable length. ";
        let text = sentence.repeat(60); // ~3300 bytes
        let chunks = chunk_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
            assert!(chunk.text.len() <= CHUNK_SIZE);
        }
        // Only the final remainder may dip under the minimum
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.len() >= MIN_CHUNK_SIZE - CHUNK_OVERLAP);
        }
        // Consecutive chunks overlap
        for pair in chunks.windows(2) {
            assert!(pair[1].offset < pair[0].offset + pair[0].text.len() + 1);
        }
        // Last chunk reaches the end of the text
        let last = chunks.last().unwrap();
        assert_eq!(last.offset + last.text.len(), text.trim_end().len());
    }

    #[test]
    fn test_chunk_prefers_paragraph_break() {
        let first = "x".repeat(600);
        let second = "y".repeat(900);
        let text = format!("{}\n\n{}", first, second);
        let chunks = chunk_text(&text);
        assert!(chunks[0].text.ends_with('x'));
    }

    #[test]
    fn test_chunk_prefers_sentence_break_over_whitespace() {
        let body = format!("{}. {}", "a".repeat(700), "b c d ".repeat(100));
        let chunks = chunk_text(&body);
        assert!(chunks[0].text.ends_with("a."));
    }

    #[test]
    fn test_chunk_multibyte_safety() {
        let text = "é".repeat(1500);
        let chunks = chunk_text(&text);
        assert!(!chunks.is_empty());
        for chunk in chunks {
            assert!(chunk.text.chars().all(|c| c == 'é'));
        }
    }
}
