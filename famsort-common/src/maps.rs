//! Name and manual identifier maps
//!
//! Both maps are append-only during a run and persisted as two-column CSV
//! files so reversal can happen later, possibly in another process.
//!
//! | Map        | File                    | Header                        |
//! |------------|-------------------------|-------------------------------|
//! | [`NameMap`]   | `name_to_uuid_map.csv`  | `Name,UUID`                   |
//! | [`ManualMap`] | `manual_uuid_map.csv`   | `Original Text,Manual UUID`   |

use crate::identifier::{self, Identifier};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default file name of a persisted [`NameMap`]
pub const NAME_MAP_FILE: &str = "name_to_uuid_map.csv";

/// Default file name of a persisted [`ManualMap`]
pub const MANUAL_MAP_FILE: &str = "manual_uuid_map.csv";

/// Normalize a respondent name for matching
///
/// Trims, lowercases and joins whitespace-separated words with `_`, so
/// `"Jane Doe"` and `" jane  doe "` both become `jane_doe`.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Serialize, Deserialize)]
struct NameRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "UUID")]
    uuid: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManualRecord {
    #[serde(rename = "Original Text")]
    original_text: String,
    #[serde(rename = "Manual UUID")]
    manual_uuid: String,
}

fn parse_persisted_id(raw: &str, path: &Path) -> Result<Identifier> {
    Identifier::parse(raw).ok_or_else(|| {
        Error::InvalidInput(format!(
            "Not an identifier in {}: '{}'",
            path.display(),
            raw
        ))
    })
}

// ============================================================================
// Name Map
// ============================================================================

/// Bidirectional normalized-name ↔ name-identifier association
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    entries: Vec<(String, Identifier)>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<Identifier, usize>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier for a normalized name, minting one on first sight
    pub fn get_or_mint(&mut self, normalized_name: &str) -> Identifier {
        if let Some(id) = self.get_id(normalized_name) {
            return id.clone();
        }
        let id = identifier::mint();
        self.push(normalized_name.to_string(), id.clone());
        id
    }

    pub fn get_id(&self, normalized_name: &str) -> Option<&Identifier> {
        self.by_name
            .get(normalized_name)
            .map(|&i| &self.entries[i].1)
    }

    pub fn get_name(&self, id: &str) -> Option<&str> {
        let id = Identifier::parse(id)?;
        self.by_id.get(&id).map(|&i| self.entries[i].0.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in minting order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Identifier)> {
        self.entries.iter().map(|(n, id)| (n.as_str(), id))
    }

    fn push(&mut self, name: String, id: Identifier) {
        let idx = self.entries.len();
        self.by_name.entry(name.clone()).or_insert(idx);
        self.by_id.entry(id.clone()).or_insert(idx);
        self.entries.push((name, id));
    }

    /// Write as `Name,UUID` CSV
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (name, id) in self.iter() {
            writer.serialize(NameRecord {
                name: name.to_string(),
                uuid: id.to_string(),
            })?;
        }
        writer.flush()?;
        tracing::debug!(path = %path.display(), entries = self.len(), "Saved name map");
        Ok(())
    }

    /// Read a map previously written by [`NameMap::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut map = Self::new();
        for record in reader.deserialize::<NameRecord>() {
            let record = record?;
            let id = parse_persisted_id(&record.uuid, path)?;
            map.push(record.name, id);
        }
        Ok(map)
    }
}

// ============================================================================
// Manual Map
// ============================================================================

/// Bidirectional original-text ↔ manual-identifier association
///
/// Owned by the caller and threaded through each translation call; the same
/// text always resolves to the identifier it was first given.
#[derive(Debug, Clone, Default)]
pub struct ManualMap {
    entries: Vec<(String, Identifier)>,
    by_text: HashMap<String, usize>,
    by_id: HashMap<Identifier, usize>,
}

impl ManualMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manual identifier for `text`, minting one on first sight
    pub fn get_or_mint(&mut self, text: &str) -> Identifier {
        if let Some(id) = self.get_id(text) {
            return id.clone();
        }
        let id = identifier::mint_manual();
        self.push(text.to_string(), id.clone());
        id
    }

    pub fn get_id(&self, text: &str) -> Option<&Identifier> {
        self.by_text.get(text).map(|&i| &self.entries[i].1)
    }

    pub fn get_text(&self, id: &str) -> Option<&str> {
        let id = Identifier::parse(id)?;
        self.by_id.get(&id).map(|&i| self.entries[i].0.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in minting order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Identifier)> {
        self.entries.iter().map(|(t, id)| (t.as_str(), id))
    }

    /// Absorb another map's entries
    ///
    /// Every identifier of `other` stays resolvable. When both maps hold the
    /// same text, lookups by text keep returning this map's identifier.
    pub fn merge(&mut self, other: ManualMap) {
        for (text, id) in other.entries {
            if !self.by_id.contains_key(&id) {
                self.push(text, id);
            }
        }
    }

    fn push(&mut self, text: String, id: Identifier) {
        let idx = self.entries.len();
        self.by_text.entry(text.clone()).or_insert(idx);
        self.by_id.entry(id.clone()).or_insert(idx);
        self.entries.push((text, id));
    }

    /// Write as `Original Text,Manual UUID` CSV
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (text, id) in self.iter() {
            writer.serialize(ManualRecord {
                original_text: text.to_string(),
                manual_uuid: id.to_string(),
            })?;
        }
        writer.flush()?;
        tracing::debug!(path = %path.display(), entries = self.len(), "Saved manual map");
        Ok(())
    }

    /// Read a map previously written by [`ManualMap::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut map = Self::new();
        for record in reader.deserialize::<ManualRecord>() {
            let record = record?;
            let id = parse_persisted_id(&record.manual_uuid, path)?;
            map.push(record.original_text, id);
        }
        Ok(map)
    }
}
