//! Query tokenizer
//!
//! Splits a raw search string into a title phrase and a list of tag names.
//! Tokens starting with `#` are tags; everything else is rejoined, in order,
//! into the phrase matched against post titles.

/// Prefix marking a token as a tag name
pub const TAG_MARKER: char = '#';

/// Raw search string split into its title and tag parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Non-tag tokens joined with single spaces; empty when there are none
    pub title: String,
    /// Tag names with the marker stripped, in input order, duplicates kept
    pub tags: Vec<String>,
}

/// Tokenize a raw search string. Never fails.
///
/// A bare `#` has no name once the marker is stripped and is dropped.
pub fn tokenize(raw: &str) -> ParsedQuery {
    let mut title_words = Vec::new();
    let mut tags = Vec::new();

    for token in raw.split_whitespace() {
        match token.strip_prefix(TAG_MARKER) {
            Some("") => {}
            Some(tag) => tags.push(tag.to_string()),
            None => title_words.push(token),
        }
    }

    ParsedQuery {
        title: title_words.join(" "),
        tags,
    }
}
