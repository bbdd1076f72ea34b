//! JSON keyword files.
//!
//! ```json
//! {
//!   "project_name": "Letters",
//!   "keywords": [
//!     { "key": "NAME", "value": "Ann", "category": "client" },
//!     { "key": "#DATE#", "value": "2024-05-01", "enabled": false }
//!   ],
//!   "options": { "ledger_backend": "body_marker" }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use docx_fill_core::FillOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordFile {
    pub project_name: String,
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub options: Option<FillOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub key: String,
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub category: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

/// Wrap a bare key in `#` delimiters. Keys already wrapped are kept.
pub fn wrap_key(key: &str) -> String {
    let key = key.trim();
    if key.len() > 2 && key.starts_with('#') && key.ends_with('#') {
        key.to_string()
    } else {
        format!("#{}#", key)
    }
}

impl KeywordFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read keyword file {}", path.display()))?;
        let file: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse keyword file {}", path.display()))?;
        file.validate()
            .with_context(|| format!("Invalid keyword file {}", path.display()))?;
        debug!("Loaded {} keywords for project {}", file.keywords.len(), file.project_name);
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            bail!("project_name is empty");
        }
        if self.keywords.is_empty() {
            bail!("no keywords defined");
        }
        let mut seen = HashSet::new();
        for (index, keyword) in self.keywords.iter().enumerate() {
            if keyword.key.trim().trim_matches('#').is_empty() {
                bail!("keyword #{} has an empty key", index + 1);
            }
            let wrapped = wrap_key(&keyword.key);
            if !seen.insert(wrapped.clone()) {
                bail!("duplicate key {}", wrapped);
            }
        }
        Ok(())
    }

    /// Enabled keywords as wrapped key -> value.
    pub fn values(&self) -> BTreeMap<String, String> {
        self.keywords
            .iter()
            .filter(|k| k.enabled)
            .map(|k| (wrap_key(&k.key), k.value.clone()))
            .collect()
    }

    /// Every wrapped key, disabled ones included. A disabled keyword is
    /// paused, so its ledger entry is not an orphan.
    pub fn known_keys(&self) -> Vec<String> {
        self.keywords.iter().map(|k| wrap_key(&k.key)).collect()
    }

    pub fn options(&self) -> FillOptions {
        self.options.clone().unwrap_or_default()
    }
}
