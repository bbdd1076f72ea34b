#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use docx_fill_core::xml::escape_text;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

pub const CONTENT_TYPES: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" "#,
    r#"ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" "#,
    r#"ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml."#,
    r#"document.main+xml"/>"#,
    r#"</Types>"#,
);

pub const PACKAGE_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" "#,
    r#"Type="http://schemas.openxmlformats.org/officeDocument/2006/"#,
    r#"relationships/officeDocument" "#,
    r#"Target="word/document.xml"/></Relationships>"#,
);

pub const STYLES: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:docDefaults/></w:styles>"#,
);

/// One paragraph per inner slice, one run per string, alternating bold so
/// neighbouring runs carry distinct formatting.
pub fn body(paragraphs: &[&[&str]]) -> String {
    let mut xml = String::from(DECLARATION);
    xml.push_str(concat!(
        r#"<w:document "#,
        r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        "<w:body>",
    ));
    for runs in paragraphs {
        xml.push_str("<w:p>");
        for (i, text) in runs.iter().enumerate() {
            let props = if i % 2 == 1 { "<w:rPr><w:b/></w:rPr>" } else { "" };
            xml.push_str(&format!(
                r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
                props,
                escape_text(text)
            ));
        }
        xml.push_str("</w:p>");
    }
    xml.push_str(r#"<w:sectPr/></w:body></w:document>"#);
    xml
}

/// Build a package from `(name, content)` pairs, in order.
pub fn package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        let method = if name.ends_with(".rels") {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        writer
            .start_file(*name, SimpleFileOptions::default().compression_method(method))
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal document whose body holds `paragraphs`.
pub fn docx(paragraphs: &[&[&str]]) -> Vec<u8> {
    let document = body(paragraphs);
    package(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/document.xml", &document),
        ("word/styles.xml", STYLES),
    ])
}

pub fn read_part(document: &[u8], name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(document)).unwrap();
    let mut entry = archive.by_name(name).ok()?;
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    Some(text)
}

pub fn part_names(document: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(document)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Concatenated text of every `<w:t>` leaf in the body.
pub fn visible_text(document: &[u8]) -> String {
    texts(document).concat()
}

/// Text of each `<w:t>` leaf of the body, in order.
pub fn texts(document: &[u8]) -> Vec<String> {
    let xml = read_part(document, "word/document.xml").unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "t")
        .map(|n| n.text().unwrap_or_default().to_string())
        .collect()
}
