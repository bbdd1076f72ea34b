use thiserror::Error;

/// Errors raised while filling a document.
///
/// `MalformedMarkup`, `ArchivePartMissing` and the I/O variants abort the
/// document. `Integrity` and `LedgerDecode` are recoverable: the filler turns
/// them into per-key errors or warnings and carries on.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Malformed markup in {part}: {reason}")]
    MalformedMarkup { part: String, reason: String },

    #[error("Integrity error: range {start}..{end} does not map to contiguous runs ({reason})")]
    Integrity {
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("Ledger decode error: {0}")]
    LedgerDecode(String),

    #[error("Part '{0}' not found in package")]
    ArchivePartMissing(String),

    #[error("Part '{part}' is not valid UTF-8")]
    Encoding {
        part: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FillError {
    pub(crate) fn integrity(start: usize, end: usize, reason: impl Into<String>) -> Self {
        Self::Integrity {
            start,
            end,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(part: &str, reason: impl Into<String>) -> Self {
        Self::MalformedMarkup {
            part: part.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the whole document rather than a single key.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Integrity { .. } | Self::LedgerDecode(_))
    }
}

pub type Result<T> = std::result::Result<T, FillError>;
