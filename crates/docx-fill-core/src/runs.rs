//! Splitting a flow-text part into addressable text runs.
//!
//! Only text leaves (`<w:t ...>text</w:t>` with no child elements) become
//! [`Run`]s. Everything else, including leaves that carry child nodes, stays
//! in the verbatim gap markup between runs, so an untouched [`BodyBuffer`]
//! serializes back to exactly the bytes it was built from.
//!
//! Each run carries a block number. Runs share a block when nothing between
//! them starts or ends a paragraph or breaks the line (`w:tab`, `w:br`,
//! `w:cr`), so a placeholder is only ever matched within one block.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{FillError, Result};
use crate::xml;

/// One text leaf: its open tag, decoded text and close tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    tag_open: String,
    text: String,
    tag_close: String,
    /// Original encoded text, kept until the run is rewritten.
    raw: Option<String>,
    block: usize,
}

impl Run {
    pub fn new(
        tag_open: impl Into<String>,
        text: impl Into<String>,
        tag_close: impl Into<String>,
    ) -> Self {
        Self {
            tag_open: tag_open.into(),
            text: text.into(),
            tag_close: tag_close.into(),
            raw: None,
            block: 0,
        }
    }

    /// Same run, placed in another block.
    pub fn in_block(mut self, block: usize) -> Self {
        self.block = block;
        self
    }

    pub fn tag_open(&self) -> &str {
        &self.tag_open
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tag_close(&self) -> &str {
        &self.tag_close
    }

    pub fn block(&self) -> usize {
        self.block
    }

    pub(crate) fn set_text(&mut self, text: String) {
        if text != self.text {
            self.text = text;
            self.raw = None;
        }
    }

    /// Add `xml:space="preserve"` to the open tag when the text has
    /// significant edge whitespace and the attribute is missing.
    pub(crate) fn ensure_space_preserve(&mut self) {
        let edge_ws =
            self.text.starts_with(char::is_whitespace) || self.text.ends_with(char::is_whitespace);
        if !edge_ws || self.tag_open.contains("xml:space") {
            return;
        }
        if let Some(stripped) = self.tag_open.strip_suffix('>') {
            self.tag_open = format!("{} xml:space=\"preserve\">", stripped);
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.tag_open);
        match &self.raw {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&xml::escape_text(&self.text)),
        }
        out.push_str(&self.tag_close);
    }
}

/// The runs of one part plus the markup between them.
///
/// `gaps.len() == runs.len() + 1` at all times; run count never changes
/// after extraction.
#[derive(Debug, Clone)]
pub struct BodyBuffer {
    part: String,
    gaps: Vec<String>,
    runs: Vec<Run>,
}

impl BodyBuffer {
    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub(crate) fn runs_mut(&mut self) -> &mut [Run] {
        &mut self.runs
    }

    pub fn to_xml(&self) -> String {
        let capacity = self.gaps.iter().map(String::len).sum::<usize>()
            + self
                .runs
                .iter()
                .map(|r| r.tag_open.len() + r.text.len() + r.tag_close.len())
                .sum::<usize>();
        let mut out = String::with_capacity(capacity);
        out.push_str(&self.gaps[0]);
        for (run, gap) in self.runs.iter().zip(self.gaps.iter().skip(1)) {
            run.write_to(&mut out);
            out.push_str(gap);
        }
        out
    }
}

fn block_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<(?:/?w:p|w:tab|w:br|w:cr)[\s/>]").expect("static block boundary pattern")
    })
}

/// Extracts text leaves of one element name (`w:t` by default).
#[derive(Debug, Clone)]
pub struct RunExtractor {
    open_re: Regex,
    close_tag: String,
}

impl Default for RunExtractor {
    fn default() -> Self {
        Self::new("w:t")
    }
}

impl RunExtractor {
    pub fn new(text_tag: &str) -> Self {
        let pattern = format!(r"<{}(?:\s[^>]*)?>", regex::escape(text_tag));
        Self {
            open_re: Regex::new(&pattern).expect("escaped tag name is a valid pattern"),
            close_tag: format!("</{}>", text_tag),
        }
    }

    pub fn extract(&self, part: &str, markup: &str) -> Result<BodyBuffer> {
        let mut gaps = Vec::new();
        let mut runs = Vec::new();
        let mut gap_start = 0usize;
        let mut cursor = 0usize;
        let mut block = 0usize;

        while let Some(open) = self.open_re.find_at(markup, cursor) {
            if open.as_str().ends_with("/>") {
                cursor = open.end();
                continue;
            }
            let body_start = open.end();
            let Some(next_lt) = markup[body_start..].find('<').map(|i| body_start + i) else {
                return Err(FillError::malformed(
                    part,
                    format!("text element opened at byte {} is never closed", open.start()),
                ));
            };

            if markup[next_lt..].starts_with(&self.close_tag) {
                let raw = &markup[body_start..next_lt];
                let gap = &markup[gap_start..open.start()];
                if block_boundary().is_match(gap) {
                    block += 1;
                }
                gaps.push(gap.to_string());
                runs.push(Run {
                    tag_open: open.as_str().to_string(),
                    text: xml::unescape(raw),
                    tag_close: self.close_tag.clone(),
                    raw: Some(raw.to_string()),
                    block,
                });
                cursor = next_lt + self.close_tag.len();
                gap_start = cursor;
            } else {
                // Leaf with child nodes: left in the gap, not addressable.
                let Some(close) = markup[next_lt..].find(&self.close_tag) else {
                    return Err(FillError::malformed(
                        part,
                        format!("text element opened at byte {} is never closed", open.start()),
                    ));
                };
                cursor = next_lt + close + self.close_tag.len();
            }
        }
        gaps.push(markup[gap_start..].to_string());

        Ok(BodyBuffer {
            part: part.to_string(),
            gaps,
            runs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PARA: &str = concat!(
        r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>#NA</w:t></w:r>"#,
        r#"<w:r><w:t xml:space="preserve">ME# &amp; co</w:t></w:r><w:r><w:tab/></w:r></w:p>"#,
    );

    #[test]
    fn test_extracts_text_leaves_in_order() {
        let body = RunExtractor::default().extract("word/document.xml", PARA).unwrap();
        let texts: Vec<&str> = body.runs().iter().map(Run::text).collect();
        assert_eq!(texts, vec!["#NA", "ME# & co"]);
        assert_eq!(body.runs()[1].tag_open(), r#"<w:t xml:space="preserve">"#);
    }

    #[test]
    fn test_untouched_buffer_serializes_identically() {
        let body = RunExtractor::default().extract("word/document.xml", PARA).unwrap();
        assert_eq!(body.to_xml(), PARA);
    }

    #[test]
    fn test_does_not_confuse_similar_tag_names() {
        let xml = concat!(
            "<w:tbl><w:tr><w:tc>",
            "<w:p><w:r><w:tab/><w:t>x</w:t></w:r></w:p>",
            "</w:tc></w:tr></w:tbl>",
        );
        let body = RunExtractor::default().extract("p", xml).unwrap();
        assert_eq!(body.runs().len(), 1);
        assert_eq!(body.runs()[0].text(), "x");
    }

    #[test]
    fn test_self_closing_and_empty_leaves() {
        let xml = "<w:r><w:t/><w:t></w:t></w:r>";
        let body = RunExtractor::default().extract("p", xml).unwrap();
        assert_eq!(body.runs().len(), 1);
        assert_eq!(body.runs()[0].text(), "");
        assert_eq!(body.to_xml(), xml);
    }

    #[test]
    fn test_leaf_with_children_passes_through() {
        let xml = "<w:r><w:t>a<w:x/>b</w:t><w:t>c</w:t></w:r>";
        let body = RunExtractor::default().extract("p", xml).unwrap();
        assert_eq!(body.runs().len(), 1);
        assert_eq!(body.runs()[0].text(), "c");
        assert_eq!(body.to_xml(), xml);
    }

    #[test]
    fn test_blocks_split_at_paragraphs_and_breaks() {
        let xml = concat!(
            r#"<w:p><w:pPr><w:tabs/></w:pPr><w:r><w:t>a</w:t><w:t>b</w:t></w:r>"#,
            r#"<w:r><w:tab/><w:t>c</w:t><w:br/><w:t>d</w:t></w:r></w:p>"#,
            r#"<w:p w:rsidR="01"><w:r><w:t>e</w:t></w:r></w:p>"#,
        );
        let body = RunExtractor::default().extract("p", xml).unwrap();
        let blocks: Vec<usize> = body.runs().iter().map(Run::block).collect();
        assert_eq!(blocks, vec![1, 1, 2, 3, 4]);
        assert_eq!(body.to_xml(), xml);
    }

    #[test]
    fn test_unclosed_leaf_is_malformed() {
        let err = RunExtractor::default()
            .extract("word/document.xml", "<w:r><w:t>oops")
            .unwrap_err();
        assert!(matches!(err, FillError::MalformedMarkup { .. }));
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn test_space_preserve_added_once() {
        let mut run = Run::new("<w:t>", "x", "</w:t>");
        run.set_text(" padded ".to_string());
        run.ensure_space_preserve();
        run.ensure_space_preserve();
        assert_eq!(run.tag_open(), r#"<w:t xml:space="preserve">"#);
    }

    #[test]
    fn test_rewritten_text_is_escaped() {
        let mut body = RunExtractor::default().extract("p", "<w:t>a</w:t>").unwrap();
        body.runs_mut()[0].set_text("<b> & c".to_string());
        assert_eq!(body.to_xml(), "<w:t>&lt;b&gt; &amp; c</w:t>");
    }
}
