//! Display-name and handle normalization.
//!
//! Names are drawn with plain text fonts that have no emoji glyphs, so
//! pictographs are removed before the name is measured or truncated.

/// Default maximum number of characters kept from a display name.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 15;

/// Appended to names cut at the maximum length.
pub const ELLIPSIS: &str = "...";

/// Code point ranges removed by [`strip_emoji`].
///
/// Covers pictographs, emoticons, transport symbols and the supplemental
/// symbols block, regional indicators (flags), misc symbols and dingbats.
const EMOJI_RANGES: [(char, char); 4] = [
    ('\u{1F300}', '\u{1F9FF}'),
    ('\u{1F1E0}', '\u{1F1FF}'),
    ('\u{2600}', '\u{26FF}'),
    ('\u{2700}', '\u{27BF}'),
];

fn is_emoji(c: char) -> bool {
    EMOJI_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&c))
}

/// Removes emoji, collapses whitespace runs to one space and trims.
pub fn strip_emoji(name: &str) -> String {
    let stripped: String = name.chars().filter(|&c| !is_emoji(c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `name` to `max_len` characters and appends [`ELLIPSIS`] if it was longer.
///
/// Lengths are counted in Unicode scalar values.
pub fn truncate_name(name: &str, max_len: usize) -> String {
    match name.char_indices().nth(max_len) {
        None => name.to_string(),
        Some((cut, _)) => format!("{}{}", &name[..cut], ELLIPSIS),
    }
}

/// Strips emoji from a display name, then truncates it.
pub fn normalize_name(name: &str, max_len: usize) -> String {
    truncate_name(&strip_emoji(name), max_len)
}

/// Ensures a non-empty handle starts with `@`.
pub fn normalize_handle(handle: &str) -> String {
    if handle.is_empty() || handle.starts_with('@') {
        handle.to_string()
    } else {
        format!("@{handle}")
    }
}
