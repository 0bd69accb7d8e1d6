use crate::constants::prompt::{DEFAULT_TERMINATOR, HASHTAG_PREFIX, TERMINATORS};

/// Append a `.` unless the text already ends in `?`, `!` or `.`.
pub fn normalize(text: &str) -> String {
    let mut normalized = text.to_string();
    if !normalized.ends_with(TERMINATORS) {
        normalized.push(DEFAULT_TERMINATOR);
    }
    normalized
}

/// The first `#word` in `text`, without its `#`.
///
/// Only the first hashtag word counts: a bare `#` yields `None` rather than
/// moving on to a later one.
pub fn find_hashtag(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find_map(|word| word.strip_prefix(HASHTAG_PREFIX))
        .filter(|tag| !tag.is_empty())
}

/// A hashtag with the sentence terminator added by [`normalize`] removed.
pub fn strip_terminator(tag: &str) -> &str {
    let stripped = tag.trim_end_matches(TERMINATORS);
    if stripped.is_empty() {
        tag
    } else {
        stripped
    }
}
