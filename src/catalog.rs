//! Catalog entries and immutable catalog snapshots.
//!
//! The catalog store is an external collaborator: it hands over
//! [`CatalogRecord`]s (path plus optionally precomputed word sets). Records
//! become [`CatalogEntry`]s, and a [`CatalogSnapshot`] bundles the entries with
//! their [`WordIndex`]. Snapshots are never mutated; a catalog change builds a
//! new one.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::index::{IndexOptions, WordIndex};
use crate::normalize::{NormalizeOptions, Normalizer};
use crate::words::{extract_words_with, file_name_of, file_stem, tokenize, WordSet};

/// Catalog identifier (SQLite rowid in the store).
pub type EntryId = i64;

/// Raw record from the catalog source. Word sets are optional: older
/// catalogs were never enriched with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRecord {
    pub id: EntryId,
    pub path: String,
    pub file_name: Option<String>,
    pub folder_words: Option<Vec<String>>,
    pub file_words: Option<Vec<String>>,
    pub parentheses_words: Option<Vec<String>>,
}

impl CatalogRecord {
    pub fn from_path(id: EntryId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            ..Self::default()
        }
    }

    /// True when every word set was precomputed.
    pub fn is_enriched(&self) -> bool {
        self.folder_words.is_some() && self.file_words.is_some() && self.parentheses_words.is_some()
    }
}

/// Indexed catalog file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: EntryId,
    pub path: String,
    pub file_name: String,
    /// Compact key of the filename stem (no spaces, folded, lowercase).
    pub normalized_file_name: String,
    pub words: WordSet,
}

impl CatalogEntry {
    /// Build an entry, deriving every word set from the path.
    pub fn from_path(id: EntryId, path: &str, normalizer: &Normalizer) -> Self {
        let file_name = file_name_of(path).to_string();
        let words = extract_words_with(normalizer, &file_name, path);
        Self::assemble(id, path.to_string(), file_name, words, normalizer)
    }

    /// Build an entry from a store record. Returns `true` as the second value
    /// when any word set had to be derived from the path.
    pub fn from_record(record: CatalogRecord, normalizer: &Normalizer) -> (Self, bool) {
        let derived = !record.is_enriched();
        let file_name = record
            .file_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| file_name_of(&record.path).to_string());

        let words = if derived {
            let fallback = extract_words_with(normalizer, &file_name, &record.path);
            WordSet {
                folder_words: match record.folder_words {
                    Some(words) => renormalize(normalizer, &words).collect(),
                    None => fallback.folder_words,
                },
                file_words: match record.file_words {
                    Some(words) => renormalize(normalizer, &words).collect(),
                    None => fallback.file_words,
                },
                parentheses_words: match record.parentheses_words {
                    Some(words) => renormalize(normalizer, &words).collect(),
                    None => fallback.parentheses_words,
                },
            }
        } else {
            WordSet {
                folder_words: renormalize(normalizer, &record.folder_words.unwrap_or_default()).collect(),
                file_words: renormalize(normalizer, &record.file_words.unwrap_or_default()).collect(),
                parentheses_words: renormalize(normalizer, &record.parentheses_words.unwrap_or_default())
                    .collect(),
            }
        };

        (
            Self::assemble(record.id, record.path, file_name, words, normalizer),
            derived,
        )
    }

    fn assemble(
        id: EntryId,
        path: String,
        file_name: String,
        words: WordSet,
        normalizer: &Normalizer,
    ) -> Self {
        let normalized_file_name = normalizer.normalize(file_stem(&file_name), NormalizeOptions::COMPACT);
        Self {
            id,
            path,
            file_name,
            normalized_file_name,
            words,
        }
    }
}

/// Precomputed words are keyed like extracted ones: normalized, split, empties dropped.
fn renormalize<'a>(normalizer: &'a Normalizer, words: &'a [String]) -> impl Iterator<Item = String> + 'a {
    words.iter().flat_map(move |w| tokenize(normalizer, w))
}

/// Records whose word sets were derived on demand during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub derived_ids: Vec<EntryId>,
}

impl EnrichmentReport {
    pub fn derived(&self) -> usize {
        self.derived_ids.len()
    }
}

/// Entries plus their word index, built once and shared read-only.
#[derive(Debug)]
pub struct CatalogSnapshot {
    entries: Vec<CatalogEntry>,
    positions: FxHashMap<EntryId, usize>,
    index: WordIndex,
}

impl CatalogSnapshot {
    /// Build a snapshot from store records (in parallel).
    pub fn build(
        records: Vec<CatalogRecord>,
        normalizer: &Normalizer,
        options: IndexOptions,
    ) -> Result<(Self, EnrichmentReport)> {
        let built: Vec<(CatalogEntry, bool)> = records
            .into_par_iter()
            .map(|record| CatalogEntry::from_record(record, normalizer))
            .collect();

        let mut report = EnrichmentReport::default();
        let mut entries = Vec::with_capacity(built.len());
        for (entry, derived) in built {
            if derived {
                report.derived_ids.push(entry.id);
            }
            entries.push(entry);
        }

        Ok((Self::from_entries(entries, options)?, report))
    }

    /// Build a snapshot from ready entries. Ids must be unique.
    pub fn from_entries(entries: Vec<CatalogEntry>, options: IndexOptions) -> Result<Self> {
        let mut positions = FxHashMap::default();
        for (i, entry) in entries.iter().enumerate() {
            if positions.insert(entry.id, i).is_some() {
                return Err(Error::InvalidInput(format!(
                    "duplicate catalog id {} ({})",
                    entry.id, entry.path
                )));
            }
        }
        let index = WordIndex::build(&entries, options);
        Ok(Self {
            entries,
            positions,
            index,
        })
    }

    pub fn get(&self, id: EntryId) -> Option<&CatalogEntry> {
        self.positions.get(&id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn index(&self) -> &WordIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::default_normalizer;

    #[test]
    fn test_entry_from_path() {
        let entry = CatalogEntry::from_path(7, "/music/Pop/Sarı Sarı (Remix).m4a", default_normalizer());
        assert_eq!(entry.file_name, "Sarı Sarı (Remix).m4a");
        assert_eq!(entry.normalized_file_name, "sarisariremix");
        assert_eq!(entry.words.file_words, vec!["sari", "sari"]);
        assert!(entry.words.parentheses_words.contains("remix"));
        assert!(entry.words.folder_words.contains("pop"));
    }

    #[test]
    fn test_record_missing_words_is_derived() {
        let record = CatalogRecord::from_path(1, "/music/Tarkan - Şımarık.mp3");
        let (entry, derived) = CatalogEntry::from_record(record, default_normalizer());
        assert!(derived);
        assert_eq!(entry.words.file_words, vec!["tarkan", "simarik"]);
    }

    #[test]
    fn test_record_precomputed_words_are_kept() {
        let record = CatalogRecord {
            id: 2,
            path: "/music/whatever.mp3".to_string(),
            file_name: Some("whatever.mp3".to_string()),
            folder_words: Some(vec!["music".to_string()]),
            file_words: Some(vec!["tarkan".to_string(), "".to_string(), "kuzu".to_string()]),
            parentheses_words: Some(vec![]),
        };
        let (entry, derived) = CatalogEntry::from_record(record, default_normalizer());
        assert!(!derived);
        assert_eq!(entry.words.file_words, vec!["tarkan", "kuzu"]);
    }

    #[test]
    fn test_precomputed_words_are_normalized() {
        let record = CatalogRecord {
            id: 4,
            path: "/music/x.m4a".to_string(),
            file_name: None,
            folder_words: Some(vec!["Türkçe Pop".to_string()]),
            file_words: Some(vec![
                "Sarı".to_string(),
                "Sarı".to_string(),
                "Mahsun".to_string(),
                "Kırmızıgül".to_string(),
            ]),
            parentheses_words: Some(vec!["REMIX!".to_string(), " ".to_string()]),
        };
        let (entry, derived) = CatalogEntry::from_record(record, default_normalizer());
        assert!(!derived);
        assert_eq!(entry.words.file_words, vec!["sari", "sari", "mahsun", "kirmizigul"]);
        assert_eq!(entry.words.sorted_folder_words(), vec!["pop", "turkce"]);
        assert_eq!(entry.words.sorted_parentheses_words(), vec!["remix"]);

        let snapshot = CatalogSnapshot::from_entries(vec![entry], IndexOptions::default()).unwrap();
        assert_eq!(snapshot.index().lookup("sari").len(), 2);
        assert!(snapshot.index().lookup("Sarı").is_empty());
    }

    #[test]
    fn test_partially_enriched_record() {
        let record = CatalogRecord {
            id: 3,
            path: "/music/Dinle (Live).mp3".to_string(),
            file_words: Some(vec!["dinle".to_string()]),
            ..CatalogRecord::default()
        };
        let (entry, derived) = CatalogEntry::from_record(record, default_normalizer());
        assert!(derived);
        assert_eq!(entry.words.file_words, vec!["dinle"]);
        assert!(entry.words.parentheses_words.contains("live"));
    }

    #[test]
    fn test_snapshot_build_reports_gaps() {
        let records = vec![
            CatalogRecord::from_path(1, "/m/Dinle.m4a"),
            CatalogRecord {
                id: 2,
                path: "/m/Gelin.m4a".to_string(),
                file_name: None,
                folder_words: Some(vec!["m".to_string()]),
                file_words: Some(vec!["gelin".to_string()]),
                parentheses_words: Some(vec![]),
            },
        ];
        let (snapshot, report) =
            CatalogSnapshot::build(records, default_normalizer(), IndexOptions::default()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(report.derived_ids, vec![1]);
        assert_eq!(snapshot.get(2).map(|e| e.file_name.as_str()), Some("Gelin.m4a"));
        assert!(snapshot.get(99).is_none());
        assert_eq!(snapshot.index().lookup("gelin").len(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let records = vec![
            CatalogRecord::from_path(1, "/m/a.mp3"),
            CatalogRecord::from_path(1, "/m/b.mp3"),
        ];
        let result = CatalogSnapshot::build(records, default_normalizer(), IndexOptions::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
