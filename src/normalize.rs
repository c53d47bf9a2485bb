/// Normalized transcripts shorter than this are treated as a failed fetch.
pub const MIN_TRANSCRIPT_CHARS: usize = 50;

/// Collapse line breaks and whitespace runs into single spaces and trim the ends.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
