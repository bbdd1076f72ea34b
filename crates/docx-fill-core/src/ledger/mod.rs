//! Replacement ledger: which keys were substituted, and with what.
//!
//! A document that has been filled once no longer contains its placeholders,
//! so re-filling it must search for the last inserted value instead. The
//! ledger records that value per key and travels inside the package.

mod body_marker;
mod custom_props;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FillError, Result};
use crate::package::Package;

pub use body_marker::BodyMarkerStore;
pub use custom_props::CustomPropertyStore;

/// Current on-disk payload format.
const LEDGER_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: String,
    pub original_text: String,
    pub current_value: String,
    pub version: u32,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerPayload {
    format: u32,
    entries: Vec<LedgerEntry>,
}

/// Key -> last substitution. At most one entry per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text to search for when substituting `key`: its last recorded
    /// value if any, else the key itself.
    pub fn resolve_search_target<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries
            .get(key)
            .map(|entry| entry.current_value.as_str())
            .unwrap_or(key)
    }

    /// Create or update the entry for `key`. Versions only ever go up.
    pub fn record(&mut self, key: &str, new_value: &str) -> &LedgerEntry {
        self.record_at(key, new_value, Utc::now())
    }

    pub(crate) fn record_at(
        &mut self,
        key: &str,
        new_value: &str,
        now: DateTime<Utc>,
    ) -> &LedgerEntry {
        self.entries
            .entry(key.to_string())
            .and_modify(|entry| {
                entry.current_value = new_value.to_string();
                entry.version += 1;
                entry.last_modified = now;
            })
            .or_insert_with(|| LedgerEntry {
                key: key.to_string(),
                original_text: key.to_string(),
                current_value: new_value.to_string(),
                version: 1,
                last_modified: now,
            })
    }

    /// Drop entries whose key is not in `active_keys`. Returns the removed keys.
    pub fn cleanup_orphans<I, S>(&mut self, active_keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let active: HashSet<String> =
            active_keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        let orphans: Vec<String> = self
            .entries
            .keys()
            .filter(|key| !active.contains(key.as_str()))
            .cloned()
            .collect();
        for key in &orphans {
            self.entries.remove(key);
        }
        orphans
    }

    pub fn get(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        let payload = LedgerPayload {
            format: LEDGER_FORMAT,
            entries: self.entries.values().cloned().collect(),
        };
        Ok(serde_json::to_string(&payload)?)
    }

    /// Parse a stored payload. Any problem is a [`FillError::LedgerDecode`].
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: LedgerPayload = serde_json::from_str(json)
            .map_err(|e| FillError::LedgerDecode(format!("invalid payload: {}", e)))?;
        if payload.format != LEDGER_FORMAT {
            return Err(FillError::LedgerDecode(format!(
                "unsupported ledger format {}",
                payload.format
            )));
        }
        let mut entries: BTreeMap<String, LedgerEntry> = BTreeMap::new();
        for entry in payload.entries {
            let superseded = entries
                .get(&entry.key)
                .is_some_and(|existing| existing.version >= entry.version);
            if !superseded {
                entries.insert(entry.key.clone(), entry);
            }
        }
        Ok(Self { entries })
    }
}

/// Which persistence backend a filler uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    #[default]
    CustomProperty,
    BodyMarker,
}

impl LedgerBackend {
    pub fn store(self) -> Box<dyn LedgerStore> {
        match self {
            Self::CustomProperty => Box::new(CustomPropertyStore),
            Self::BodyMarker => Box::new(BodyMarkerStore),
        }
    }
}

/// Persists a [`Ledger`] inside a package without touching visible text.
pub trait LedgerStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the package carries no ledger yet. A ledger that is
    /// present but unreadable is a [`FillError::LedgerDecode`].
    fn load(&self, package: &dyn Package, body_part: &str) -> Result<Option<Ledger>>;

    fn save(&self, ledger: &Ledger, package: &mut dyn Package, body_part: &str) -> Result<()>;
}
