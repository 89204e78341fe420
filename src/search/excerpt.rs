//! Listing excerpts
//!
//! Post bodies in search results are cut to a fixed number of characters.

/// Maximum body length, in characters, shown in a listing
pub const MAX_EXCERPT_CHARS: usize = 128;

/// Marker appended to a cut body
pub const ELLIPSIS: &str = "...";

/// Cut `text` to its first [`MAX_EXCERPT_CHARS`] characters plus `"..."`.
/// Shorter bodies come back unchanged.
pub fn excerpt(text: String) -> String {
    match text.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((cut, _)) => {
            let mut short = text;
            short.truncate(cut);
            short.push_str(ELLIPSIS);
            short
        }
        None => text,
    }
}
