use std::sync::OnceLock;

use regex::Regex;

use super::{Ledger, LedgerStore};
use crate::error::{FillError, Result};
use crate::package::Package;

const MARKER_OPEN: &str = "<!-- docx-fill-ledger:";
const MARKER_CLOSE: &str = " -->";

fn body_open() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<w:body(?:\s[^>]*)?>").expect("static body pattern"))
}

/// Stores the ledger as an XML comment right after `<w:body>`.
///
/// The payload is hex-encoded JSON, so it never contains `--` and never
/// reaches a text leaf.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyMarkerStore;

impl BodyMarkerStore {
    fn find_marker(xml: &str, from: usize) -> Option<(usize, usize)> {
        let start = from + xml[from..].find(MARKER_OPEN)?;
        let payload_start = start + MARKER_OPEN.len();
        let end =
            payload_start + xml[payload_start..].find(MARKER_CLOSE)? + MARKER_CLOSE.len();
        Some((start, end))
    }

    fn strip_markers(xml: &str) -> String {
        let mut out = String::with_capacity(xml.len());
        let mut cursor = 0;
        while let Some((start, end)) = Self::find_marker(xml, cursor) {
            out.push_str(&xml[cursor..start]);
            cursor = end;
        }
        out.push_str(&xml[cursor..]);
        out
    }
}

impl LedgerStore for BodyMarkerStore {
    fn name(&self) -> &'static str {
        "body_marker"
    }

    fn load(&self, package: &dyn Package, body_part: &str) -> Result<Option<Ledger>> {
        let Some(xml) = package.read_text(body_part)? else {
            return Err(FillError::ArchivePartMissing(body_part.to_string()));
        };
        let Some((start, end)) = Self::find_marker(&xml, 0) else {
            return Ok(None);
        };
        let encoded = &xml[start + MARKER_OPEN.len()..end - MARKER_CLOSE.len()];
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| FillError::LedgerDecode(format!("ledger marker is not hex: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| FillError::LedgerDecode(format!("ledger marker is not UTF-8: {}", e)))?;
        Ledger::from_json(&json).map(Some)
    }

    fn save(&self, ledger: &Ledger, package: &mut dyn Package, body_part: &str) -> Result<()> {
        let Some(xml) = package.read_text(body_part)? else {
            return Err(FillError::ArchivePartMissing(body_part.to_string()));
        };
        let mut updated = Self::strip_markers(&xml);

        let Some(open) = body_open().find(&updated) else {
            return Err(FillError::malformed(
                body_part,
                "no <w:body> element to carry the ledger",
            ));
        };
        let marker = format!(
            "{}{}{}",
            MARKER_OPEN,
            hex::encode(ledger.to_json()?),
            MARKER_CLOSE
        );
        updated.insert_str(open.end(), &marker);

        package.write_part(body_part, updated.into_bytes());
        Ok(())
    }
}
