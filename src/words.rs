//! Word extraction from filenames and their folder paths.
//!
//! A path becomes three word sets:
//! - `file_words`: ordered tokens of the filename (order matters for context scoring)
//! - `folder_words`: unordered tokens of every folder above the file
//! - `parentheses_words`: unordered tokens from `(...)` / `[...]` groups, kept
//!   apart so remix/version tags don't pollute the title words

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::normalize::{default_normalizer, NormalizeOptions, Normalizer};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Trailing audio file extension: "Song.m4a", "Track.FLAC". Other dotted
/// suffixes ("feat.Bob") are part of the name.
pub static FILE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(mp3|m4a|m4b|mp4|aac|flac|alac|wav|aiff?|ogg|oga|opus|wma|ape|wv|mka|mpc|dsf|dff)$")
        .unwrap()
});

/// Purely numeric leading token: "01 Song", "01. Song", "03 - Song", "07_Song"
pub static LEADING_TRACK_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+(?:\s*[-–—._)]\s*|\s+)").unwrap());

/// Parenthetical or bracketed group (innermost, no nesting).
pub static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\(\[]([^\(\)\[\]]*)[\)\]]").unwrap());

// ============================================================================
// WORD SETS
// ============================================================================

/// Words derived from one path. Used both for catalog entries and for queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordSet {
    pub folder_words: FxHashSet<String>,
    pub file_words: Vec<String>,
    pub parentheses_words: FxHashSet<String>,
}

impl WordSet {
    /// A query with no filename words cannot match anything.
    pub fn is_empty(&self) -> bool {
        self.file_words.is_empty()
    }

    /// Parentheses words in a stable order (sets have none).
    pub fn sorted_parentheses_words(&self) -> Vec<String> {
        let mut words: Vec<String> = self.parentheses_words.iter().cloned().collect();
        words.sort_unstable();
        words
    }

    /// Folder words in a stable order.
    pub fn sorted_folder_words(&self) -> Vec<String> {
        let mut words: Vec<String> = self.folder_words.iter().cloned().collect();
        words.sort_unstable();
        words
    }
}

// ============================================================================
// PATH HELPERS
// ============================================================================

/// Split a path on both separator styles, dropping empty segments.
pub fn path_segments(full_path: &str) -> Vec<&str> {
    full_path
        .split(['/', '\\'])
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Last segment of a path ("" for an empty path).
pub fn file_name_of(full_path: &str) -> &str {
    path_segments(full_path).last().copied().unwrap_or("")
}

/// Filename without its extension.
pub fn file_stem(file_name: &str) -> &str {
    match FILE_EXTENSION.find(file_name) {
        // Keep names that are nothing but an extension-like suffix (".hidden")
        Some(m) if m.start() > 0 => &file_name[..m.start()],
        _ => file_name,
    }
}

fn is_drive_specifier(segment: &str) -> bool {
    segment.len() == 2 && segment.ends_with(':')
}

/// Normalize `text` and split it into words.
pub fn tokenize(normalizer: &Normalizer, text: &str) -> Vec<String> {
    normalizer
        .normalize(&text.replace('_', " "), NormalizeOptions::WORDS)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract word sets from a filename and the full path it lives at.
pub fn extract_words_with(normalizer: &Normalizer, file_name: &str, full_path: &str) -> WordSet {
    let mut name = file_stem(file_name).to_string();

    // Track number prefix, but never strip a name down to nothing ("1979.mp3")
    if let Some(m) = LEADING_TRACK_NUMBER.find(&name) {
        if !name[m.end()..].trim().is_empty() {
            name = name[m.end()..].to_string();
        }
    }

    let mut parentheses_words = FxHashSet::default();
    for caps in PARENTHETICAL.captures_iter(&name) {
        if let Some(inner) = caps.get(1) {
            parentheses_words.extend(tokenize(normalizer, inner.as_str()));
        }
    }
    let name = PARENTHETICAL.replace_all(&name, " ");

    let file_words = tokenize(normalizer, &name);

    let segments = path_segments(full_path);
    let folders = segments.split_last().map(|(_, f)| f).unwrap_or(&[]);
    let folder_words = folders
        .iter()
        .filter(|s| !is_drive_specifier(s))
        .flat_map(|s| tokenize(normalizer, s))
        .collect();

    WordSet {
        folder_words,
        file_words,
        parentheses_words,
    }
}

/// Extract word sets from a full path, taking the filename from its last segment.
pub fn extract_path_words(normalizer: &Normalizer, full_path: &str) -> WordSet {
    extract_words_with(normalizer, file_name_of(full_path), full_path)
}

/// Extract word sets with the default normalization table.
pub fn extract_words(file_name: &str, full_path: &str) -> WordSet {
    extract_words_with(default_normalizer(), file_name, full_path)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> FxHashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_basic_extraction() {
        let words = extract_words(
            "Mahsun Kırmızıgül - Sarı Sarı.m4a",
            "/music/Türkçe Pop/Mahsun Kırmızıgül - Sarı Sarı.m4a",
        );
        assert_eq!(words.file_words, vec!["mahsun", "kirmizigul", "sari", "sari"]);
        assert_eq!(words.folder_words, set(&["music", "turkce", "pop"]));
        assert!(words.parentheses_words.is_empty());
    }

    #[test]
    fn test_track_number_stripped() {
        assert_eq!(extract_words("01 Dinle.mp3", "").file_words, vec!["dinle"]);
        assert_eq!(extract_words("03 - Dinle.mp3", "").file_words, vec!["dinle"]);
        assert_eq!(extract_words("12. Dinle.mp3", "").file_words, vec!["dinle"]);
        assert_eq!(extract_words("07_Dinle.mp3", "").file_words, vec!["dinle"]);
        // Not purely numeric
        assert_eq!(extract_words("2Pac - Changes.mp3", "").file_words, vec!["2pac", "changes"]);
        // Nothing left after the number: keep it
        assert_eq!(extract_words("1979.mp3", "").file_words, vec!["1979"]);
    }

    #[test]
    fn test_parentheses_separated() {
        let words = extract_words("Sarı Sarı (Remix) [Live 2004].flac", "");
        assert_eq!(words.file_words, vec!["sari", "sari"]);
        assert_eq!(words.parentheses_words, set(&["remix", "live", "2004"]));
    }

    #[test]
    fn test_extension_stripped_only_at_end() {
        let words = extract_words("Mr. Brightside.mp3", "");
        assert_eq!(words.file_words, vec!["mr", "brightside"]);
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem(".mp3"), ".mp3");
    }

    #[test]
    fn test_dotted_name_without_extension_keeps_last_word() {
        assert_eq!(file_stem("Artist feat.Bob"), "Artist feat.Bob");
        assert_eq!(file_stem("Artist feat.Bob.MP3"), "Artist feat.Bob");
        let words = extract_words("Artist feat.Bob", "/music/Artist feat.Bob");
        assert_eq!(words.file_words, vec!["artist", "featbob"]);
    }

    #[test]
    fn test_order_and_repeats_preserved() {
        let words = extract_words("Sari Mahsun Sari.mp3", "");
        assert_eq!(words.file_words, vec!["sari", "mahsun", "sari"]);
    }

    #[test]
    fn test_windows_paths() {
        let words = extract_path_words(
            default_normalizer(),
            r"C:\Users\Ali\Müzik\Tarkan - Şımarık.mp3",
        );
        assert_eq!(words.file_words, vec!["tarkan", "simarik"]);
        assert_eq!(words.folder_words, set(&["users", "ali", "muzik"]));
    }

    #[test]
    fn test_underscores_separate_words() {
        let words = extract_words("Sezen_Aksu_-_Gulumse.mp3", "");
        assert_eq!(words.file_words, vec!["sezen", "aksu", "gulumse"]);
    }

    #[test]
    fn test_symbol_only_name_is_empty() {
        let words = extract_words("---.mp3", "/music/---.mp3");
        assert!(words.is_empty());
        assert_eq!(words.folder_words, set(&["music"]));
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("/a/b/c.mp3"), "c.mp3");
        assert_eq!(file_name_of(r"a\b\c.mp3"), "c.mp3");
        assert_eq!(file_name_of("c.mp3"), "c.mp3");
        assert_eq!(file_name_of(""), "");
    }
}
