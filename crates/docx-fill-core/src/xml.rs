//! Text escaping for element content, on top of `quick_xml::escape`.

use quick_xml::escape::{escape, partial_escape};

/// Decode the predefined entities and numeric character references.
///
/// Text with a reference XML cannot resolve on its own (a DTD entity such
/// as `&nbsp;`, or a bare `&`) is returned as written.
pub fn unescape(raw: &str) -> String {
    match quick_xml::escape::unescape(raw) {
        Ok(text) => text.into_owned(),
        Err(e) => {
            tracing::debug!("Keeping undecodable text as written: {}", e);
            raw.to_string()
        }
    }
}

/// Encode text for element content (`&`, `<` and `>` only).
pub fn escape_text(text: &str) -> String {
    partial_escape(text).into_owned()
}

/// Encode text for a double-quoted attribute value.
pub fn escape_attr(text: &str) -> String {
    escape(text).into_owned()
}
