//! Placeholder substitution for OOXML word-processing packages.
//!
//! Placeholders such as `#NAME#` are found in the logical text of a part
//! even when the authoring tool split them across several formatted runs.
//! Each substitution is recorded in a ledger stored inside the package, so
//! a filled document can be filled again with new values for the same keys.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//!
//! # fn main() -> docx_fill_core::Result<()> {
//! let template = std::fs::read("letter.docx")?;
//! let values = BTreeMap::from([("#NAME#".to_string(), "Ann".to_string())]);
//! let filled = docx_fill_core::substitute(&template, &values)?;
//! std::fs::write("letter-ann.docx", filled.bytes)?;
//! # Ok(())
//! # }
//! ```

mod diagnostics;
mod error;
mod filler;
mod options;

pub mod ledger;
pub mod locate;
pub mod logical;
pub mod package;
pub mod repair;
pub mod rewrite;
pub mod runs;
pub mod xml;

pub use diagnostics::{Diagnostic, Level};
pub use error::{FillError, Result};
pub use filler::{
    inspect, substitute, substitute_with, DocumentFiller, FillReport, FilledDocument, KeyError,
};
pub use ledger::{Ledger, LedgerBackend, LedgerEntry, LedgerStore};
pub use options::FillOptions;
pub use package::{Package, ZipPackage};
pub use repair::{repair, RepairReport};
