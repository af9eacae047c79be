//! Inverted word index over catalog entries.
//!
//! Maps each normalized word to the postings of every catalog entry that
//! contains it. Resolution only scores entries reachable through a shared
//! word, so disjoint names never reach the distance computations.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::sync::Arc;

use crate::catalog::{CatalogEntry, EntryId};
use crate::words::WordSet;

/// Which word set a posting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordField {
    File,
    Folder,
}

/// One occurrence of a word in one entry. Repeated words produce repeated
/// postings (positions preserved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPosting {
    pub word: Arc<str>,
    pub entry: EntryId,
    /// Ordinal within `file_words`; for folder words, within the sorted folder set.
    pub position: usize,
    pub field: WordField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Also post folder words (and look up query folder words).
    pub include_folder_words: bool,
    /// Distinct words an entry must share with the query to become a candidate.
    pub min_shared_words: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            include_folder_words: false,
            min_shared_words: 1,
        }
    }
}

/// Immutable after [`WordIndex::build`]. Catalog changes build a new index.
#[derive(Debug, Default)]
pub struct WordIndex {
    postings: FxHashMap<Arc<str>, Vec<WordPosting>>,
    options: IndexOptions,
    posting_count: usize,
}

impl WordIndex {
    pub fn build<'a, I>(entries: I, options: IndexOptions) -> Self
    where
        I: IntoIterator<Item = &'a CatalogEntry>,
    {
        let mut index = Self {
            postings: FxHashMap::default(),
            options,
            posting_count: 0,
        };

        for entry in entries {
            for (position, word) in entry.words.file_words.iter().enumerate() {
                index.post(word, entry.id, position, WordField::File);
            }
            if options.include_folder_words {
                for (position, word) in entry.words.sorted_folder_words().iter().enumerate() {
                    index.post(word, entry.id, position, WordField::Folder);
                }
            }
        }

        index
    }

    fn post(&mut self, word: &str, entry: EntryId, position: usize, field: WordField) {
        if word.is_empty() {
            return;
        }
        // Reuse the key's Arc so every posting of a word shares one allocation
        let key = match self.postings.get_key_value(word) {
            Some((k, _)) => Arc::clone(k),
            None => Arc::from(word),
        };
        self.postings
            .entry(Arc::clone(&key))
            .or_default()
            .push(WordPosting {
                word: key,
                entry,
                position,
                field,
            });
        self.posting_count += 1;
    }

    /// Postings for a normalized word (empty when the word is unknown).
    pub fn lookup(&self, word: &str) -> &[WordPosting] {
        self.postings.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entries sharing at least `min_shared_words` distinct words with the query.
    pub fn candidates_for(&self, query: &WordSet, min_shared_words: usize) -> FxHashSet<EntryId> {
        let required = min_shared_words.max(1);

        let mut query_words: FxHashSet<&str> =
            query.file_words.iter().map(String::as_str).collect();
        if self.options.include_folder_words {
            query_words.extend(query.folder_words.iter().map(String::as_str));
        }

        let mut shared: FxHashMap<EntryId, usize> = FxHashMap::default();
        let mut seen_for_word: FxHashSet<EntryId> = FxHashSet::default();
        for word in query_words {
            seen_for_word.clear();
            for posting in self.lookup(word) {
                if seen_for_word.insert(posting.entry) {
                    *shared.entry(posting.entry).or_insert(0) += 1;
                }
            }
        }

        shared
            .into_iter()
            .filter(|&(_, count)| count >= required)
            .map(|(entry, _)| entry)
            .collect()
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    /// Distinct words in the index.
    pub fn vocabulary_len(&self) -> usize {
        self.postings.len()
    }

    pub fn posting_count(&self) -> usize {
        self.posting_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::normalize::default_normalizer;
    use crate::words::extract_path_words;

    fn entries(paths: &[&str]) -> Vec<CatalogEntry> {
        paths
            .iter()
            .enumerate()
            .map(|(i, p)| CatalogEntry::from_path(i as EntryId + 1, p, default_normalizer()))
            .collect()
    }

    fn query(path: &str) -> WordSet {
        extract_path_words(default_normalizer(), path)
    }

    #[test]
    fn test_repeated_words_keep_every_posting() {
        let catalog = entries(&["/m/Sarı Sarı - Mahsun Kırmızıgül.m4a"]);
        let index = WordIndex::build(&catalog, IndexOptions::default());

        let postings = index.lookup("sari");
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].position, 0);
        assert_eq!(postings[1].position, 1);
        assert!(postings.iter().all(|p| p.entry == 1 && p.field == WordField::File));
        assert_eq!(&*postings[0].word, "sari");
        assert_eq!(index.lookup("mahsun")[0].position, 2);
        assert!(index.lookup("missing").is_empty());
    }

    #[test]
    fn test_folder_words_optional() {
        let catalog = entries(&["/Arabesk/Dinle.m4a"]);

        let plain = WordIndex::build(&catalog, IndexOptions::default());
        assert!(plain.lookup("arabesk").is_empty());

        let with_folders = WordIndex::build(
            &catalog,
            IndexOptions {
                include_folder_words: true,
                ..IndexOptions::default()
            },
        );
        assert_eq!(with_folders.lookup("arabesk")[0].field, WordField::Folder);
    }

    #[test]
    fn test_candidates_recall_matches_brute_force() {
        let catalog = entries(&[
            "/m/Sarı Sarı - Mahsun Kırmızıgül.m4a",
            "/m/Mahsun Kırmızıgül - Dinle.m4a",
            "/m/Tarkan - Şımarık.mp3",
            "/m/Sezen Aksu - Gülümse.mp3",
            "/m/01 Dinle (Remix).mp3",
        ]);
        let index = WordIndex::build(&catalog, IndexOptions::default());

        for q in [
            "/x/Mahsun Kırmızıgül - Sarı Sarı.m4a",
            "/x/Dinle.mp3",
            "/x/Tarkan.mp3",
            "/x/Nothing Shared Here.mp3",
        ] {
            let words = query(q);
            let got = index.candidates_for(&words, 1);
            for entry in &catalog {
                let shares = entry
                    .words
                    .file_words
                    .iter()
                    .any(|w| words.file_words.contains(w));
                assert_eq!(got.contains(&entry.id), shares, "query {q}, entry {}", entry.path);
            }
        }
    }

    #[test]
    fn test_min_shared_words() {
        let catalog = entries(&[
            "/m/Mahsun Kırmızıgül - Dinle.m4a",
            "/m/Mahsun - Başka.m4a",
        ]);
        let index = WordIndex::build(&catalog, IndexOptions::default());
        let words = query("/q/Mahsun Kırmızıgül - Sarı Sarı.m4a");

        assert_eq!(index.candidates_for(&words, 1).len(), 2);
        let strict = index.candidates_for(&words, 2);
        assert_eq!(strict.len(), 1);
        assert!(strict.contains(&1));
        // A repeated word counts once
        let repeat = query("/q/Mahsun Mahsun.m4a");
        assert!(index.candidates_for(&repeat, 2).is_empty());
    }

    #[test]
    fn test_empty_query_has_no_candidates() {
        let catalog = entries(&["/m/Dinle.m4a"]);
        let index = WordIndex::build(&catalog, IndexOptions::default());
        assert!(index.candidates_for(&WordSet::default(), 1).is_empty());
    }

    #[test]
    fn test_counts() {
        let catalog = entries(&["/m/Sarı Sarı.m4a", "/m/Sarı Gelin.m4a"]);
        let index = WordIndex::build(&catalog, IndexOptions::default());
        assert_eq!(index.vocabulary_len(), 2);
        assert_eq!(index.posting_count(), 4);
    }
}
