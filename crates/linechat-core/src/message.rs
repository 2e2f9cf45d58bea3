//! Message text normalisation.

/// Maximum length of a broadcast or whisper body, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 512;

/// Strips trailing line terminators and truncates to [`MAX_MESSAGE_BYTES`].
///
/// Returns `None` if nothing is left once the terminators are removed.
/// Other whitespace is preserved.
pub fn clean_message(text: &str) -> Option<&str> {
    let trimmed = text.trim_end_matches(&['\r', '\n'][..]);
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_to_bytes(trimmed, MAX_MESSAGE_BYTES))
}

/// Cuts `text` to at most `max` bytes without splitting a UTF-8 character.
pub fn truncate_to_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.get(..end).unwrap_or_default()
}
