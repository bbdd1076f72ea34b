//! Filling one file or a whole directory tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docx_fill_core::{DocumentFiller, FillOptions, FillReport, Level};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Office writes `~$name.docx` lock files next to open documents.
const LOCK_FILE_PREFIX: &str = "~$";

/// What to apply to each document of a run.
#[derive(Debug, Clone, Default)]
pub struct FillPlan {
    /// Enabled keywords, wrapped key -> value.
    pub values: BTreeMap<String, String>,
    /// Every key of the keyword file. Orphan cleanup keeps these.
    pub known_keys: Vec<String>,
    pub options: FillOptions,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<FillReport>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

fn is_document(path: &Path) -> bool {
    let has_docx_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
    let is_lock_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(LOCK_FILE_PREFIX));
    has_docx_extension && !is_lock_file
}

/// Every fillable document under `root`, sorted.
pub fn collect_documents(root: &Path) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_document(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    documents.sort();
    documents
}

/// Fill one document and write the result to `output` unless the plan is
/// a dry run.
///
/// Orphan cleanup runs against [`FillPlan::known_keys`] rather than the
/// enabled values, so disabling a keyword keeps its history.
pub fn fill_file(input: &Path, output: &Path, plan: &FillPlan) -> Result<FillReport> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let options = FillOptions {
        cleanup_orphans: false,
        ..plan.options.clone()
    };
    let fill = || -> docx_fill_core::Result<(Vec<u8>, FillReport)> {
        let mut filler = DocumentFiller::open_with(&bytes, options)?;
        let mut report = filler.substitute(&plan.values)?;
        if plan.options.cleanup_orphans {
            report.removed_orphans = filler.cleanup_orphans(&plan.known_keys);
            report.diagnostics.extend(filler.take_diagnostics());
        }
        Ok((filler.finish()?, report))
    };
    let (filled, report) = fill().with_context(|| format!("Failed to fill {}", input.display()))?;

    if plan.dry_run {
        debug!("Dry run, not writing {}", output.display());
    } else {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(output, &filled)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }
    Ok(report)
}

/// Fill `input` (a file or a directory) into `output`.
///
/// A directory input is mirrored under `output`. One failing document
/// never stops the others.
pub fn run(input: &Path, output: &Path, plan: &FillPlan) -> Result<BatchSummary> {
    let jobs: Vec<(PathBuf, PathBuf)> = if input.is_dir() {
        collect_documents(input)
            .into_iter()
            .map(|file| {
                let relative = file.strip_prefix(input).unwrap_or(&file).to_path_buf();
                (file, output.join(relative))
            })
            .collect()
    } else if input.is_file() {
        let target = match input.file_name() {
            Some(name) if output.is_dir() => output.join(name),
            _ => output.to_path_buf(),
        };
        vec![(input.to_path_buf(), target)]
    } else {
        anyhow::bail!("Input {} does not exist", input.display());
    };

    info!("Filling {} document(s) with {} key(s)", jobs.len(), plan.values.len());
    let mut summary = BatchSummary::default();
    for (input, output) in jobs {
        let result = fill_file(&input, &output, plan);
        match &result {
            Ok(report) => {
                let warnings = report
                    .diagnostics
                    .iter()
                    .filter(|d| d.level == Level::Warning)
                    .count();
                info!(
                    "{} -> {}: {} key(s) substituted, {} skipped, {} warning(s)",
                    input.display(),
                    output.display(),
                    report.substituted_keys.len(),
                    report.key_errors.len(),
                    warnings
                );
            }
            Err(e) => error!("{:#}", e),
        }
        summary.outcomes.push(FileOutcome { input, output, result });
    }
    Ok(summary)
}
