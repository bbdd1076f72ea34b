//! OOXML package access.
//!
//! [`Package`] is the archive abstraction the filler consumes; [`ZipPackage`]
//! implements it over an in-memory zip archive, keeping entry order and each
//! entry's compression method so untouched parts round-trip unchanged.

use std::io::{Cursor, Read as _, Write as _};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{FillError, Result};

pub const DEFAULT_MAIN_PART: &str = "word/document.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";

const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// Enumerate, read and write the parts of a package.
pub trait Package {
    fn part_names(&self) -> Vec<String>;

    fn read_part(&self, name: &str) -> Option<&[u8]>;

    fn write_part(&mut self, name: &str, data: Vec<u8>);

    fn remove_part(&mut self, name: &str) -> bool;

    fn has_part(&self, name: &str) -> bool {
        self.read_part(name).is_some()
    }

    /// Read a part as UTF-8 text. `Ok(None)` when the part is absent.
    fn read_text(&self, name: &str) -> Result<Option<String>> {
        match self.read_part(name) {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|source| FillError::Encoding {
                    part: name.to_string(),
                    source,
                }),
        }
    }
}

#[derive(Debug, Clone)]
struct PackagePart {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// A zip-backed package held fully in memory.
#[derive(Debug, Clone, Default)]
pub struct ZipPackage {
    parts: Vec<PackagePart>,
}

impl ZipPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push(PackagePart {
                name: entry.name().to_string(),
                compression: entry.compression(),
                is_dir: entry.is_dir(),
                data,
            });
        }
        debug!("Read package with {} parts", parts.len());
        Ok(Self { parts })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for part in &self.parts {
            let method = match part.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if part.is_dir {
                writer.add_directory(part.name.as_str(), options)?;
            } else {
                writer.start_file(part.name.as_str(), options)?;
                writer.write_all(&part.data)?;
            }
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Package for ZipPackage {
    fn part_names(&self) -> Vec<String> {
        self.parts.iter().filter(|p| !p.is_dir).map(|p| p.name.clone()).collect()
    }

    fn read_part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| !p.is_dir && p.name == name)
            .map(|p| p.data.as_slice())
    }

    fn write_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| !p.is_dir && p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(PackagePart {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }

    fn remove_part(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|p| p.name != name);
        before != self.parts.len()
    }
}

/// Resolve the main document part through the package relationships,
/// falling back to `word/document.xml`.
pub fn main_document_part(package: &dyn Package) -> Result<String> {
    let from_rels = package
        .read_text(PACKAGE_RELS_PART)?
        .and_then(|xml| office_document_target(&xml))
        .filter(|target| package.has_part(target));

    let part = from_rels.unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());
    if package.has_part(&part) {
        Ok(part)
    } else {
        Err(FillError::ArchivePartMissing(part))
    }
}

fn office_document_target(rels_xml: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(rels_xml).ok()?;
    doc.descendants()
        .filter(|node| node.tag_name().name() == "Relationship")
        .find(|node| {
            node.attribute("Type")
                .is_some_and(|t| t.ends_with(OFFICE_DOCUMENT_REL))
        })
        .and_then(|node| node.attribute("Target"))
        .map(|target| target.trim_start_matches('/').to_string())
}

/// Header and footer parts, in package order.
pub fn header_footer_parts(package: &dyn Package) -> Vec<String> {
    package
        .part_names()
        .into_iter()
        .filter(|name| {
            (name.starts_with("word/header") || name.starts_with("word/footer"))
                && name.ends_with(".xml")
        })
        .collect()
}

/// Make sure a part is declared in `[Content_Types].xml` and, when it is a
/// package-level part, related from `_rels/.rels`. Already-registered parts
/// are left alone. Returns whether anything changed.
pub fn register_package_part(
    package: &mut dyn Package,
    part: &str,
    content_type: &str,
    relationship_type: &str,
) -> Result<bool> {
    let mut changed = false;

    if let Some(types) = package.read_text(CONTENT_TYPES_PART)? {
        let part_name = format!("PartName=\"/{}\"", part);
        if !types.contains(&part_name) {
            if let Some(close) = types.rfind("</Types>") {
                let mut updated = types.clone();
                updated.insert_str(
                    close,
                    &format!("<Override {} ContentType=\"{}\"/>", part_name, content_type),
                );
                package.write_part(CONTENT_TYPES_PART, updated.into_bytes());
                changed = true;
            }
        }
    }

    if let Some(rels) = package.read_text(PACKAGE_RELS_PART)? {
        let already_related = rels.contains(&format!("Target=\"{}\"", part))
            || rels.contains(&format!("Target=\"/{}\"", part));
        if !already_related {
            if let Some(close) = rels.rfind("</Relationships>") {
                let id = next_relationship_id(&rels);
                let mut updated = rels.clone();
                updated.insert_str(
                    close,
                    &format!(
                        "<Relationship Id=\"rId{}\" Type=\"{}\" Target=\"{}\"/>",
                        id, relationship_type, part
                    ),
                );
                package.write_part(PACKAGE_RELS_PART, updated.into_bytes());
                changed = true;
            }
        }
    }

    if changed {
        debug!("Registered package part {}", part);
    }
    Ok(changed)
}

fn next_relationship_id(rels_xml: &str) -> u32 {
    let max = roxmltree::Document::parse(rels_xml)
        .ok()
        .map(|doc| {
            doc.descendants()
                .filter_map(|node| node.attribute("Id"))
                .filter_map(|id| id.strip_prefix("rId")?.parse::<u32>().ok())
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    max + 1
}
