use roxmltree::{Document, Node};
use tracing::debug;

use super::{Ledger, LedgerStore};
use crate::error::{FillError, Result};
use crate::package::{register_package_part, Package};
use crate::xml;

pub const CUSTOM_PROPS_PART: &str = "docProps/custom.xml";
pub const LEDGER_PROPERTY: &str = "DocxFillLedger";

const FMTID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";
const CUSTOM_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties";
const VT_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes";
const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.custom-properties+xml";
const REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/custom-properties";

/// Stores the ledger as a string custom document property.
///
/// Other properties in `docProps/custom.xml` are spliced around, never
/// regenerated, so their bytes survive untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomPropertyStore;

impl LedgerStore for CustomPropertyStore {
    fn name(&self) -> &'static str {
        "custom_property"
    }

    fn load(&self, package: &dyn Package, _body_part: &str) -> Result<Option<Ledger>> {
        let Some(xml) = package
            .read_text(CUSTOM_PROPS_PART)
            .map_err(|e| FillError::LedgerDecode(e.to_string()))?
        else {
            return Ok(None);
        };
        let doc = Document::parse(&xml)
            .map_err(|e| FillError::LedgerDecode(format!("{}: {}", CUSTOM_PROPS_PART, e)))?;
        let Some(property) = ledger_property(&doc) else {
            return Ok(None);
        };
        let value = property
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "lpwstr")
            .map(|n| n.text().unwrap_or_default())
            .ok_or_else(|| {
                FillError::LedgerDecode(format!("{} is not a string property", LEDGER_PROPERTY))
            })?;
        Ledger::from_json(value).map(Some)
    }

    fn save(&self, ledger: &Ledger, package: &mut dyn Package, _body_part: &str) -> Result<()> {
        let json = ledger.to_json()?;
        let existing = package.read_text(CUSTOM_PROPS_PART).ok().flatten();
        let updated = match existing.as_deref().and_then(|xml| splice_ledger(xml, &json)) {
            Some(xml) => xml,
            None => {
                debug!("Creating {}", CUSTOM_PROPS_PART);
                fresh_document(&json)
            }
        };
        package.write_part(CUSTOM_PROPS_PART, updated.into_bytes());
        register_package_part(package, CUSTOM_PROPS_PART, CONTENT_TYPE, REL_TYPE)?;
        Ok(())
    }
}

fn ledger_property<'a, 'input>(doc: &'a Document<'input>) -> Option<Node<'a, 'input>> {
    doc.root_element().children().find(|n| {
        n.is_element()
            && n.tag_name().name() == "property"
            && n.attribute("name") == Some(LEDGER_PROPERTY)
    })
}

/// Qualified element name as written in the source.
fn source_qname<'s>(xml: &'s str, node: &Node) -> &'s str {
    let rest = &xml[node.range().start + 1..];
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(rest.len());
    &rest[..end]
}

fn lpwstr_markup(root: &Node, json: &str) -> String {
    let escaped = xml::escape_text(json);
    match root.lookup_prefix(VT_NS) {
        Some(prefix) if !prefix.is_empty() => {
            format!("<{p}:lpwstr>{}</{p}:lpwstr>", escaped, p = prefix)
        }
        _ => format!("<vt:lpwstr xmlns:vt=\"{}\">{}</vt:lpwstr>", VT_NS, escaped),
    }
}

fn property_markup(element: &str, pid: u32, value: &str) -> String {
    format!(
        "<{e} fmtid=\"{}\" pid=\"{}\" name=\"{}\">{}</{e}>",
        FMTID,
        pid,
        xml::escape_attr(LEDGER_PROPERTY),
        value,
        e = element
    )
}

/// Write `json` into an existing custom properties part. `None` when the
/// part cannot be parsed and has to be recreated.
fn splice_ledger(source: &str, json: &str) -> Option<String> {
    let doc = Document::parse(source).ok()?;
    let root = doc.root_element();
    let root_qname = source_qname(source, &root);
    let property_element = match root_qname.split_once(':') {
        Some((prefix, _)) => format!("{}:property", prefix),
        None => "property".to_string(),
    };
    let value = lpwstr_markup(&root, json);

    let mut out = source.to_string();
    if let Some(property) = ledger_property(&doc) {
        let lpwstr = property
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "lpwstr");
        match lpwstr {
            Some(node) => out.replace_range(node.range(), &value),
            None => {
                let pid = property.attribute("pid").and_then(|p| p.parse().ok()).unwrap_or(2);
                let markup = property_markup(&property_element, pid, &value);
                out.replace_range(property.range(), &markup);
            }
        }
        return Some(out);
    }

    let pid = root
        .children()
        .filter(|n| n.is_element())
        .filter_map(|n| n.attribute("pid")?.parse::<u32>().ok())
        .max()
        .map_or(2, |max| (max + 1).max(2));
    let property = property_markup(&property_element, pid, &value);

    let range = root.range();
    let root_source = &source[range.clone()];
    if root_source.ends_with("/>") {
        let open = &root_source[..root_source.len() - 2];
        out.replace_range(range, &format!("{}>{}</{}>", open, property, root_qname));
    } else {
        let close = root_source.rfind("</")?;
        out.insert_str(range.start + close, &property);
    }
    Some(out)
}

fn fresh_document(json: &str) -> String {
    let value = format!("<vt:lpwstr>{}</vt:lpwstr>", xml::escape_text(json));
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
            "<Properties xmlns=\"{}\" xmlns:vt=\"{}\">{}</Properties>",
        ),
        CUSTOM_NS,
        VT_NS,
        property_markup("property", 2, &value)
    )
}
