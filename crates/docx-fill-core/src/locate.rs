//! Literal keyword search over logical text.

/// One occurrence of a search target, in logical byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub target: String,
    pub replacement: String,
    pub logical_start: usize,
    pub logical_end: usize,
}

/// All non-overlapping occurrences of `target`, left to right.
///
/// Case-sensitive and literal. An empty target matches nothing.
pub fn locate(text: &str, target: &str, replacement: &str) -> Vec<Match> {
    if target.is_empty() {
        return Vec::new();
    }
    text.match_indices(target)
        .map(|(start, found)| Match {
            target: target.to_string(),
            replacement: replacement.to_string(),
            logical_start: start,
            logical_end: start + found.len(),
        })
        .collect()
}

/// First occurrence of `target` starting at or after byte offset `from`.
pub fn locate_from(text: &str, target: &str, replacement: &str, from: usize) -> Option<Match> {
    if target.is_empty() || from > text.len() || !text.is_char_boundary(from) {
        return None;
    }
    text[from..].find(target).map(|offset| Match {
        target: target.to_string(),
        replacement: replacement.to_string(),
        logical_start: from + offset,
        logical_end: from + offset + target.len(),
    })
}
