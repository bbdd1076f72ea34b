//! Stack-based open/close balance check for word-processing markup.
//!
//! Only a fixed set of structural tags is tracked. A repeated open of a tag
//! that is still open in the current scope is read as a sibling, so the open
//! one is closed first. Close tags are only ever inserted for elements that
//! were opened; stray closes are counted and left alone.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

const TRACKED: &[&str] = &[
    "w:document",
    "w:body",
    "w:hdr",
    "w:ftr",
    "w:txbxContent",
    "w:tbl",
    "w:tr",
    "w:tc",
    "w:p",
    "w:r",
    "w:t",
];

const SCOPES: &[&str] = &["w:body", "w:hdr", "w:ftr", "w:txbxContent", "w:tc"];

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let names = TRACKED.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|");
        Regex::new(&format!(r"<(/)?({})(?:\s[^>]*?)?(/)?>", names))
            .expect("tracked tag names form a valid pattern")
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub xml: String,
    /// Close tags added, in the order they were written.
    pub inserted: Vec<String>,
    pub stray_closes: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.inserted.is_empty() && self.stray_closes == 0
    }
}

/// Balance the tracked tags of `xml`.
pub fn repair(xml: &str) -> RepairReport {
    let mut out = String::with_capacity(xml.len());
    let mut stack: Vec<&str> = Vec::new();
    let mut report = RepairReport::default();
    let mut cursor = 0;

    for caps in tag_pattern().captures_iter(xml) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let name = name.as_str();
        let closing = caps.get(1).is_some();
        let self_closing = caps.get(3).is_some();
        if self_closing && !closing {
            continue;
        }

        out.push_str(&xml[cursor..whole.start()]);
        cursor = whole.start();

        if closing {
            match stack.iter().rposition(|open| *open == name) {
                Some(depth) => {
                    close_above(&mut stack, depth + 1, &mut out, &mut report);
                    stack.pop();
                }
                None => {
                    debug!("Stray </{}> at byte {}", name, whole.start());
                    report.stray_closes += 1;
                }
            }
        } else {
            if let Some(depth) = open_sibling(&stack, name) {
                close_above(&mut stack, depth, &mut out, &mut report);
            }
            stack.push(name);
        }
    }
    out.push_str(&xml[cursor..]);
    close_above(&mut stack, 0, &mut out, &mut report);

    report.xml = out;
    report
}

/// Depth of a still-open `name` in the innermost scope, if any.
fn open_sibling(stack: &[&str], name: &str) -> Option<usize> {
    for (depth, open) in stack.iter().enumerate().rev() {
        if *open == name {
            return Some(depth);
        }
        if SCOPES.contains(open) {
            return None;
        }
    }
    None
}

fn close_above(stack: &mut Vec<&str>, depth: usize, out: &mut String, report: &mut RepairReport) {
    while stack.len() > depth {
        let Some(name) = stack.pop() else { break };
        let close = format!("</{}>", name);
        out.push_str(&close);
        report.inserted.push(close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::simple("<w:body><w:p><w:r><w:t>x</w:t></w:r></w:p></w:body>")]
    #[case::attributes(
        r#"<w:p w:rsidR="00AB"><w:r><w:t xml:space="preserve"> x </w:t></w:r></w:p>"#
    )]
    #[case::self_closing("<w:p><w:r><w:t/><w:tab/></w:r></w:p><w:p/>")]
    #[case::similar_names(
        "<w:tbl><w:tblPr><w:tblW/></w:tblPr><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>"
    )]
    #[case::textbox(concat!(
        "<w:p><w:r><w:txbxContent>",
        "<w:p><w:r><w:t>in</w:t></w:r></w:p>",
        "</w:txbxContent></w:r></w:p>",
    ))]
    fn test_balanced_input_is_untouched(#[case] xml: &str) {
        let report = repair(xml);
        assert!(report.is_clean());
        assert_eq!(report.xml, xml);
    }

    #[test]
    fn test_missing_closes_are_added_at_end() {
        let report = repair("<w:body><w:p><w:r><w:t>x</w:t>");
        assert_eq!(report.xml, "<w:body><w:p><w:r><w:t>x</w:t></w:r></w:p></w:body>");
        assert_eq!(report.inserted, vec!["</w:r>", "</w:p>", "</w:body>"]);
    }

    #[test]
    fn test_repeated_open_is_a_sibling() {
        let report =
            repair("<w:body><w:p><w:r><w:t>a</w:t><w:p><w:r><w:t>b</w:t></w:r></w:p></w:body>");
        assert_eq!(
            report.xml,
            concat!(
                "<w:body><w:p><w:r><w:t>a</w:t></w:r></w:p>",
                "<w:p><w:r><w:t>b</w:t></w:r></w:p></w:body>",
            )
        );
    }

    #[test]
    fn test_scope_allows_nesting_same_tag() {
        let xml = concat!(
            "<w:body><w:tbl><w:tr><w:tc>",
            "<w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>",
            "</w:tc></w:tr></w:tbl></w:body>",
        );
        assert_eq!(repair(xml).xml, xml);
    }

    #[test]
    fn test_close_of_parent_closes_children_first() {
        let report = repair("<w:p><w:r><w:t>x</w:t></w:p>");
        assert_eq!(report.xml, "<w:p><w:r><w:t>x</w:t></w:r></w:p>");
        assert_eq!(report.inserted, vec!["</w:r>"]);
    }

    #[test]
    fn test_stray_close_is_reported_not_removed() {
        let report = repair("<w:p></w:r></w:p>");
        assert_eq!(report.xml, "<w:p></w:r></w:p>");
        assert_eq!(report.stray_closes, 1);
        assert!(report.inserted.is_empty());
        assert!(!report.is_clean());
    }
}
