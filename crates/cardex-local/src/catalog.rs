//! The card catalog: one record per name, newest printing wins.
//!
//! The catalog is built once (from the on-disk store or a remote source) and
//! then shared read-only behind an `Arc`; a reload produces a fresh snapshot
//! that the owner swaps in atomically. Nothing here mutates after load.

use cardex_core::{CardRecord, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_name: BTreeMap<String, CardRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I: IntoIterator<Item = CardRecord>>(records: I) -> Self {
        let mut catalog = Self::new();
        for rec in records {
            catalog.insert(rec);
        }
        catalog
    }

    /// Insert a printing. Returns `true` when the record was kept.
    ///
    /// Records without an image are dropped entirely. When a name is already
    /// present, the printing with the greater `release_date` wins; ties keep
    /// the existing entry.
    pub fn insert(&mut self, rec: CardRecord) -> bool {
        if !rec.has_image() {
            return false;
        }
        match self.by_name.get(&rec.name) {
            Some(existing) if existing.release_date >= rec.release_date => false,
            _ => {
                self.by_name.insert(rec.name.clone(), rec);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&CardRecord> {
        self.by_name.get(name)
    }

    /// Iterate records sorted by name. The ranker's tie-break leans on this
    /// order being stable across calls.
    pub fn iter(&self) -> impl Iterator<Item = &CardRecord> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedCatalog {
    schema_version: u32,
    version: String,
    cards: Vec<CardRecord>,
}

/// Versioned on-disk catalog store: `cards_<version>.json` files in a data
/// directory, newest version loaded at startup, refreshed only when the
/// remote catalog version moves.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    dir: PathBuf,
}

impl CatalogStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Newest catalog version present on disk, by numeric version order.
    pub fn newest_version(&self) -> Option<String> {
        let entries = fs::read_dir(&self.dir).ok()?;
        let mut best: Option<(Vec<u64>, String)> = None;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(version) = catalog_file_version(name) else {
                continue;
            };
            let Some(key) = version_key(&version) else {
                continue;
            };
            if best.as_ref().map(|(k, _)| key > *k).unwrap_or(true) {
                best = Some((key, version));
            }
        }
        best.map(|(_, v)| v)
    }

    /// Load the newest on-disk catalog, if any.
    pub fn load_newest(&self) -> Result<Option<(String, Catalog)>> {
        let Some(version) = self.newest_version() else {
            return Ok(None);
        };
        let catalog = self.load(&version)?;
        Ok(Some((version, catalog)))
    }

    pub fn load(&self, version: &str) -> Result<Catalog> {
        let path = self.path_for(version);
        let bytes = fs::read(&path).map_err(|e| Error::Store(e.to_string()))?;
        let persisted: PersistedCatalog =
            serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?;
        Ok(Catalog::from_records(persisted.cards))
    }

    /// Atomic save: write to a tmp file, then rename into place, so a crash
    /// mid-write never leaves a torn catalog behind.
    pub fn save(&self, version: &str, catalog: &Catalog) -> Result<()> {
        if version_key(version).is_none() {
            return Err(Error::Store(format!("invalid catalog version: {version}")));
        }
        fs::create_dir_all(&self.dir).map_err(|e| Error::Store(e.to_string()))?;
        let persisted = PersistedCatalog {
            schema_version: 1,
            version: version.to_string(),
            cards: catalog.iter().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&persisted).map_err(|e| Error::Store(e.to_string()))?;
        let tmp = self.dir.join(format!("cards_{version}.json.tmp"));
        fs::write(&tmp, bytes).map_err(|e| Error::Store(e.to_string()))?;
        fs::rename(&tmp, self.path_for(version)).map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    fn path_for(&self, version: &str) -> PathBuf {
        self.dir.join(format!("cards_{version}.json"))
    }
}

/// `cards_4.5.1.json` -> `4.5.1`
fn catalog_file_version(file_name: &str) -> Option<String> {
    let version = file_name
        .strip_prefix("cards_")?
        .strip_suffix(".json")?
        .to_string();
    version_key(&version).map(|_| version)
}

/// Numeric version key for ordering; `None` for anything that is not
/// dot-separated decimal segments.
pub(crate) fn version_key(version: &str) -> Option<Vec<u64>> {
    if version.is_empty() {
        return None;
    }
    version
        .split('.')
        .map(|seg| seg.parse::<u64>().ok())
        .collect()
}
