//! The document filler: one package, its text buffers and its ledger.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{FillError, Result};
use crate::ledger::{Ledger, LedgerBackend, LedgerStore};
use crate::locate::locate_from;
use crate::logical::LogicalText;
use crate::options::FillOptions;
use crate::package::{header_footer_parts, main_document_part, Package, ZipPackage};
use crate::repair::repair;
use crate::rewrite::rewrite;
use crate::runs::{BodyBuffer, RunExtractor};

/// A key whose substitution was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyError {
    pub key: String,
    pub message: String,
}

/// Outcome of one [`DocumentFiller::substitute`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Keys with at least one replaced occurrence, in processing order.
    pub substituted_keys: Vec<String>,
    pub occurrences: BTreeMap<String, usize>,
    pub key_errors: Vec<KeyError>,
    pub removed_orphans: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Output of the one-shot [`substitute`] entry point.
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub report: FillReport,
}

struct TextPart {
    buffer: BodyBuffer,
    dirty: bool,
}

pub struct DocumentFiller {
    package: ZipPackage,
    options: FillOptions,
    store: Box<dyn LedgerStore>,
    body_part: String,
    parts: Vec<TextPart>,
    ledger: Ledger,
    ledger_dirty: bool,
    diagnostics: Diagnostics,
}

impl DocumentFiller {
    pub fn open(document: &[u8]) -> Result<Self> {
        Self::open_with(document, FillOptions::default())
    }

    #[instrument(
        skip(document, options),
        level = "debug",
        fields(document_len = document.len())
    )]
    pub fn open_with(document: &[u8], options: FillOptions) -> Result<Self> {
        let package = ZipPackage::from_bytes(document)?;
        let body_part = main_document_part(&package)?;

        let mut names = vec![body_part.clone()];
        if options.include_headers_footers {
            names.extend(header_footer_parts(&package));
        }

        let extractor = RunExtractor::new(&options.text_tag);
        let mut parts = Vec::with_capacity(names.len());
        for name in &names {
            let markup = package
                .read_text(name)?
                .ok_or_else(|| FillError::ArchivePartMissing(name.clone()))?;
            let buffer = extractor.extract(name, &markup)?;
            debug!("Extracted {} runs from {}", buffer.runs().len(), name);
            parts.push(TextPart { buffer, dirty: false });
        }

        let mut diagnostics = Diagnostics::default();
        let store = options.ledger_backend.store();
        let ledger = match store.load(&package, &body_part) {
            Ok(Some(ledger)) => {
                diagnostics.info(format!(
                    "Loaded ledger with {} entries from {}",
                    ledger.len(),
                    store.name()
                ));
                ledger
            }
            Ok(None) => Ledger::new(),
            Err(e) if !e.is_fatal() => {
                diagnostics.warn(format!("Ignoring unreadable ledger, starting empty: {}", e));
                Ledger::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            package,
            options,
            store,
            body_part,
            parts,
            ledger,
            ledger_dirty: false,
            diagnostics,
        })
    }

    pub fn body_part(&self) -> &str {
        &self.body_part
    }

    pub fn options(&self) -> &FillOptions {
        &self.options
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn list_tracked_keys(&self) -> Vec<String> {
        self.ledger.keys()
    }

    pub fn last_value(&self, key: &str) -> Option<&str> {
        self.ledger.get(key).map(|entry| entry.current_value.as_str())
    }

    /// Replace every key of `values` with its value.
    ///
    /// Keys are processed in ascending order. A key that was substituted
    /// before is searched by its last recorded value. Integrity problems
    /// skip the key and are reported; markup or archive problems abort.
    #[instrument(skip_all, level = "debug", fields(keys = values.len()))]
    pub fn substitute(&mut self, values: &BTreeMap<String, String>) -> Result<FillReport> {
        let mut report = FillReport::default();

        for (key, value) in values {
            if value.is_empty() {
                self.skip_key(&mut report, key, "empty value would leave nothing to find later");
                continue;
            }
            let target = self.ledger.resolve_search_target(key).to_string();
            if target.is_empty() {
                self.skip_key(&mut report, key, "the text to search for is empty");
                continue;
            }

            match self.replace_everywhere(&target, value) {
                Ok(0) => {
                    self.diagnostics
                        .warn(format!("{} not found (searched for {:?})", key, target));
                }
                Ok(count) => {
                    self.ledger.record(key, value);
                    self.ledger_dirty = true;
                    self.diagnostics
                        .info(format!("Replaced {} occurrence(s) of {}", count, key));
                    report.substituted_keys.push(key.clone());
                    report.occurrences.insert(key.clone(), count);
                }
                Err(e) if !e.is_fatal() => self.skip_key(&mut report, key, e),
                Err(e) => return Err(e),
            }
        }

        if self.options.cleanup_orphans {
            report.removed_orphans = self.cleanup_orphans(values.keys());
        }

        self.flush()?;
        report.diagnostics = self.diagnostics.take();
        Ok(report)
    }

    /// Drop ledger entries for keys not in `active_keys`. The change is
    /// persisted by the next [`substitute`](Self::substitute) or
    /// [`finish`](Self::finish).
    pub fn cleanup_orphans<I, S>(&mut self, active_keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = self.ledger.cleanup_orphans(active_keys);
        if !removed.is_empty() {
            self.ledger_dirty = true;
            self.diagnostics
                .info(format!("Removed orphaned ledger entries: {}", removed.join(", ")));
        }
        removed
    }

    /// Diagnostics raised outside a `substitute` call, such as a ledger that
    /// could not be read at open.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    /// Serialize the package with all pending changes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.flush()?;
        self.package.to_bytes()
    }

    fn skip_key(&mut self, report: &mut FillReport, key: &str, reason: impl ToString) {
        let message = reason.to_string();
        self.diagnostics.warn(format!("Skipping {}: {}", key, message));
        report.key_errors.push(KeyError {
            key: key.to_string(),
            message,
        });
    }

    /// Apply one key to every text part. All parts change or none do.
    fn replace_everywhere(&mut self, target: &str, value: &str) -> Result<usize> {
        let mut staged: Vec<(usize, BodyBuffer, usize)> = Vec::new();
        for (index, part) in self.parts.iter().enumerate() {
            let mut buffer = part.buffer.clone();
            let count = replace_all(&mut buffer, target, value)?;
            if count > 0 {
                staged.push((index, buffer, count));
            }
        }

        let mut total = 0;
        for (index, buffer, count) in staged {
            self.parts[index] = TextPart { buffer, dirty: true };
            total += count;
        }
        Ok(total)
    }

    fn flush(&mut self) -> Result<()> {
        for part in self.parts.iter_mut().filter(|p| p.dirty) {
            let mut xml = part.buffer.to_xml();
            if self.options.verify_balance {
                let repaired = repair(&xml);
                if !repaired.is_clean() {
                    self.diagnostics.warn(format!(
                        "Balance repair on {}: inserted {:?}, {} stray close tag(s)",
                        part.buffer.part(),
                        repaired.inserted,
                        repaired.stray_closes
                    ));
                    xml = repaired.xml;
                }
            }
            self.package.write_part(part.buffer.part(), xml.into_bytes());
            part.dirty = false;
        }

        if self.ledger_dirty {
            self.store.save(&self.ledger, &mut self.package, &self.body_part)?;
            self.ledger_dirty = false;
            debug!(
                "Saved ledger with {} entries via {}",
                self.ledger.len(),
                self.store.name()
            );
        }
        Ok(())
    }
}

/// Replace every occurrence of `target` in one buffer. The search resumes
/// after each inserted value, so a value that contains its own target is
/// inserted once per original occurrence. Text that only reads as `target`
/// across a paragraph or line break is left alone.
fn replace_all(buffer: &mut BodyBuffer, target: &str, value: &str) -> Result<usize> {
    let mut count = 0;
    let mut from = 0;
    let mut logical = LogicalText::assemble(buffer.runs());
    while let Some(m) = locate_from(logical.as_str(), target, value, from) {
        if !logical.is_single_block(m.logical_start, m.logical_end) {
            debug!("Ignoring {:?} across a block boundary at {}", target, m.logical_start);
            from = m.logical_start
                + logical.as_str()[m.logical_start..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
            continue;
        }
        rewrite(buffer.runs_mut(), &logical, &m)?;
        from = m.logical_start + value.len();
        count += 1;
        logical = LogicalText::assemble(buffer.runs());
    }
    Ok(count)
}

/// Fill `document` with `values` using default options.
pub fn substitute(document: &[u8], values: &BTreeMap<String, String>) -> Result<FilledDocument> {
    substitute_with(document, values, FillOptions::default())
}

pub fn substitute_with(
    document: &[u8],
    values: &BTreeMap<String, String>,
    options: FillOptions,
) -> Result<FilledDocument> {
    let mut filler = DocumentFiller::open_with(document, options)?;
    let report = filler.substitute(values)?;
    let bytes = filler.finish()?;
    Ok(FilledDocument { bytes, report })
}

/// Read the ledger a document carries, without modifying it.
pub fn inspect(document: &[u8], backend: LedgerBackend) -> Result<Ledger> {
    let package = ZipPackage::from_bytes(document)?;
    let body_part = main_document_part(&package)?;
    Ok(backend.store().load(&package, &body_part)?.unwrap_or_default())
}
