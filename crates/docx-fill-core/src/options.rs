use serde::{Deserialize, Serialize};

use crate::ledger::LedgerBackend;

/// Engine configuration for one [`DocumentFiller`](crate::DocumentFiller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    /// Qualified name of the text leaf element.
    pub text_tag: String,
    pub ledger_backend: LedgerBackend,
    /// Also fill `word/header*.xml` and `word/footer*.xml`.
    pub include_headers_footers: bool,
    /// Drop ledger entries for keys absent from the substitution map.
    pub cleanup_orphans: bool,
    /// Run the balance repairer over every rewritten part.
    pub verify_balance: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            text_tag: "w:t".to_string(),
            ledger_backend: LedgerBackend::default(),
            include_headers_footers: false,
            cleanup_orphans: false,
            verify_balance: false,
        }
    }
}
