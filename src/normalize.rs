//! Text normalization for filename matching.
//!
//! Every string that reaches the word index or the scorer goes through
//! [`Normalizer::normalize`]. The pipeline is fixed:
//!
//! 1. NFKC composition (so `u` + U+0308 becomes `ü` before folding)
//! 2. Character folding through a [`NormalizationTable`]
//! 3. Lowercasing
//! 4. Stripping everything outside `[a-zA-Z0-9\s]`
//! 5. Whitespace collapse (or removal for compact keys)
//!
//! Stage 5 must run after stage 4: stripping the hyphen in `"gül - Sarı"`
//! leaves two adjacent spaces.
//!
//! CRITICAL: normalization output is stored in catalog word sets. Changing a
//! stage or the default table requires re-indexing the catalog.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Anything that is not an ASCII letter, digit or whitespace.
pub static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").unwrap());

/// Runs of whitespace (Unicode-aware).
pub static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ============================================================================
// FOLDING TABLE
// ============================================================================

/// Default character folds: Turkish letters (case-paired) and Latin-extended.
const DEFAULT_FOLDS: &[(char, &str)] = &[
    // Turkish
    ('ğ', "g"), ('Ğ', "G"),
    ('ı', "i"), ('İ', "I"),
    ('ş', "s"), ('Ş', "S"),
    ('ç', "c"), ('Ç', "C"),
    ('ü', "u"), ('Ü', "U"),
    ('ö', "o"), ('Ö', "O"),
    // Latin-extended
    ('à', "a"), ('á', "a"), ('â', "a"), ('ã', "a"), ('ä', "a"), ('å', "a"),
    ('À', "A"), ('Á', "A"), ('Â', "A"), ('Ã', "A"), ('Ä', "A"), ('Å', "A"),
    ('æ', "ae"), ('Æ', "AE"),
    ('è', "e"), ('é', "e"), ('ê', "e"), ('ë', "e"),
    ('È', "E"), ('É', "E"), ('Ê', "E"), ('Ë', "E"),
    ('ì', "i"), ('í', "i"), ('î', "i"), ('ï', "i"),
    ('Ì', "I"), ('Í', "I"), ('Î', "I"), ('Ï', "I"),
    ('ò', "o"), ('ó', "o"), ('ô', "o"), ('õ', "o"), ('ø', "o"),
    ('Ò', "O"), ('Ó', "O"), ('Ô', "O"), ('Õ', "O"), ('Ø', "O"),
    ('ù', "u"), ('ú', "u"), ('û', "u"),
    ('Ù', "U"), ('Ú', "U"), ('Û', "U"),
    ('ý', "y"), ('ÿ', "y"), ('Ý', "Y"), ('Ÿ', "Y"),
    ('þ', "th"), ('Þ', "TH"),
    ('ß', "ss"), ('ẞ', "SS"),
    ('ð', "d"), ('Ð', "D"),
    ('ñ', "n"), ('Ñ', "N"),
];

/// Explicit character folding table.
///
/// One table is built at startup (default folds plus any configured extras) and
/// handed to the [`Normalizer`]; nothing else keeps its own character map.
#[derive(Debug, Clone)]
pub struct NormalizationTable {
    folds: FxHashMap<char, String>,
}

impl NormalizationTable {
    /// A table with no folds at all.
    pub fn empty() -> Self {
        Self {
            folds: FxHashMap::default(),
        }
    }

    /// Add or replace a fold. ASCII sources are rejected: folding ASCII would
    /// break idempotence (`normalize(normalize(x)) == normalize(x)`).
    pub fn with_fold(mut self, from: char, to: impl Into<String>) -> Result<Self> {
        if from.is_ascii() {
            return Err(Error::InvalidConfig(format!(
                "fold source {from:?} is ASCII; only non-ASCII characters can be folded"
            )));
        }
        self.folds.insert(from, to.into());
        Ok(self)
    }

    /// Add every fold from `extra`, in order.
    pub fn extended<I, S>(self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        extra
            .into_iter()
            .try_fold(self, |table, (from, to)| table.with_fold(from, to))
    }

    pub fn get(&self, c: char) -> Option<&str> {
        self.folds.get(&c).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    /// Apply the table character by character. Unmapped characters pass through.
    pub fn fold(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match self.folds.get(&c) {
                Some(replacement) => out.push_str(replacement),
                None => out.push(c),
            }
        }
        out
    }
}

impl Default for NormalizationTable {
    fn default() -> Self {
        let folds = DEFAULT_FOLDS
            .iter()
            .map(|&(from, to)| (from, to.to_string()))
            .collect();
        Self { folds }
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Per-call switches. Every flag defaults to `false`, meaning the stage runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Collapse whitespace to single spaces instead of removing it.
    pub keep_spaces: bool,
    pub keep_special_chars: bool,
    pub keep_case: bool,
    pub keep_diacritics: bool,
}

impl NormalizeOptions {
    /// Compact key: no spaces, no punctuation, folded, lowercase.
    pub const COMPACT: Self = Self {
        keep_spaces: false,
        keep_special_chars: false,
        keep_case: false,
        keep_diacritics: false,
    };

    /// Tokenizable form used by the word extractor.
    pub const WORDS: Self = Self {
        keep_spaces: true,
        keep_special_chars: false,
        keep_case: false,
        keep_diacritics: false,
    };
}

/// Pipeline passes allowed when special characters are kept.
const MAX_PASSES: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    table: NormalizationTable,
}

impl Normalizer {
    pub fn new(table: NormalizationTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &NormalizationTable {
        &self.table
    }

    /// Run the normalization pipeline. Output may be empty.
    pub fn normalize(&self, text: &str, options: NormalizeOptions) -> String {
        let mut result = self.normalize_pass(text, options);
        if options.keep_special_chars {
            // Kept combining marks can recompose once adjacent spaces are gone
            for _ in 1..MAX_PASSES {
                let next = self.normalize_pass(&result, options);
                if next == result {
                    break;
                }
                result = next;
            }
        }
        result
    }

    fn normalize_pass(&self, text: &str, options: NormalizeOptions) -> String {
        let mut result: String = text.nfkc().collect();

        if !options.keep_diacritics {
            result = self.table.fold(&result);
        }

        if !options.keep_case {
            result = result.to_lowercase();
        }

        if !options.keep_special_chars {
            result = NON_ALPHANUMERIC.replace_all(&result, "").into_owned();
        }

        if options.keep_spaces {
            WHITESPACE_RUN.replace_all(&result, " ").trim().to_string()
        } else {
            WHITESPACE_RUN.replace_all(&result, "").into_owned()
        }
    }

    /// Normalize raw bytes. Non-UTF-8 input is an error, never coerced.
    pub fn normalize_bytes(&self, bytes: &[u8], options: NormalizeOptions) -> Result<String> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            Error::InvalidInput(format!("text is not valid UTF-8 (at byte {})", e.valid_up_to()))
        })?;
        Ok(self.normalize(text, options))
    }
}

static DEFAULT_NORMALIZER: Lazy<Normalizer> = Lazy::new(Normalizer::default);

/// Shared normalizer with the default table.
pub fn default_normalizer() -> &'static Normalizer {
    &DEFAULT_NORMALIZER
}

/// Normalize with the default table.
pub fn normalize(text: &str, options: NormalizeOptions) -> String {
    DEFAULT_NORMALIZER.normalize(text, options)
}

/// Normalize raw bytes with the default table.
pub fn normalize_bytes(bytes: &[u8], options: NormalizeOptions) -> Result<String> {
    DEFAULT_NORMALIZER.normalize_bytes(bytes, options)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_turkish_folding() {
        assert_eq!(
            normalize("Mahsun Kırmızıgül", NormalizeOptions::default()),
            normalize("Mahsun Kirmizigul", NormalizeOptions::default())
        );
        assert_eq!(
            normalize("Mahsun Kırmızıgül", NormalizeOptions::WORDS),
            "mahsun kirmizigul"
        );
        assert_eq!(normalize("İSTANBUL Şarkısı", NormalizeOptions::WORDS), "istanbul sarkisi");
    }

    #[test]
    fn test_latin_folding() {
        assert_eq!(normalize("Björk", NormalizeOptions::WORDS), "bjork");
        assert_eq!(normalize("Beyoncé", NormalizeOptions::WORDS), "beyonce");
        assert_eq!(normalize("Straße", NormalizeOptions::WORDS), "strasse");
        assert_eq!(normalize("Þór Æon", NormalizeOptions::WORDS), "thor aeon");
    }

    #[test]
    fn test_combining_marks_compose_before_folding() {
        // "u" + combining diaeresis must fold like the precomposed "ü"
        assert_eq!(normalize("gu\u{0308}l", NormalizeOptions::WORDS), "gul");
    }

    #[test]
    fn test_hyphen_strip_collapses_spaces() {
        let out = normalize("gül - Sarı", NormalizeOptions::WORDS);
        assert!(!out.contains("  "));
        assert_eq!(out, "gul sari");
    }

    #[test]
    fn test_compact_removes_spaces() {
        assert_eq!(normalize("  Sarı  Sarı - Live ", NormalizeOptions::COMPACT), "sarisarilive");
    }

    #[test]
    fn test_keep_flags() {
        let keep_case = NormalizeOptions {
            keep_case: true,
            ..NormalizeOptions::WORDS
        };
        assert_eq!(normalize("Sarı Sarı", keep_case), "Sari Sari");

        let keep_special = NormalizeOptions {
            keep_special_chars: true,
            ..NormalizeOptions::WORDS
        };
        assert_eq!(normalize("AC/DC - T.N.T.", keep_special), "ac/dc - t.n.t.");

        // Without folding, non-ASCII letters are stripped by stage 4
        let keep_diacritics = NormalizeOptions {
            keep_diacritics: true,
            ..NormalizeOptions::WORDS
        };
        assert_eq!(normalize("Sarı", keep_diacritics), "sar");
    }

    #[test]
    fn test_unmapped_characters_pass_through_folding() {
        let table = NormalizationTable::default();
        assert_eq!(table.fold("łódź"), "łodź");
    }

    #[test]
    fn test_injected_table() {
        let table = NormalizationTable::default().with_fold('ł', "l").unwrap();
        let normalizer = Normalizer::new(table);
        assert_eq!(normalizer.normalize("Łukasz ł", NormalizeOptions::WORDS), "ukasz l");

        let empty = Normalizer::new(NormalizationTable::empty());
        assert_eq!(empty.normalize("Sarı", NormalizeOptions::WORDS), "sar");
    }

    #[test]
    fn test_ascii_fold_rejected() {
        let result = NormalizationTable::default().with_fold('a', "b");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        assert_eq!(normalize("", NormalizeOptions::WORDS), "");
        assert_eq!(normalize(" - !!! ()", NormalizeOptions::WORDS), "");
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let result = normalize_bytes(&[0x66, 0x6f, 0xff, 0x6f], NormalizeOptions::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let ok = normalize_bytes("Sarı".as_bytes(), NormalizeOptions::default()).unwrap();
        assert_eq!(ok, "sari");
    }

    #[test]
    fn test_idempotent_fixtures() {
        for s in ["Mahsun Kırmızıgül - Sarı Sarı.m4a", "gül - Sarı", "  ", "ÆØÅ (Remix) [2001]"] {
            for opts in [NormalizeOptions::COMPACT, NormalizeOptions::WORDS] {
                let once = normalize(s, opts);
                assert_eq!(normalize(&once, opts), once);
            }
        }
    }

    fn all_options() -> impl Iterator<Item = NormalizeOptions> {
        (0u8..16).map(|bits| NormalizeOptions {
            keep_spaces: bits & 1 != 0,
            keep_special_chars: bits & 2 != 0,
            keep_case: bits & 4 != 0,
            keep_diacritics: bits & 8 != 0,
        })
    }

    #[test]
    fn test_capital_sharp_s_folds() {
        let opts = NormalizeOptions {
            keep_special_chars: true,
            ..NormalizeOptions::WORDS
        };
        let once = normalize("STRAẞE", opts);
        assert_eq!(once, "strasse");
        assert_eq!(normalize(&once, opts), once);
        assert_eq!(normalize("STRAẞE", NormalizeOptions::COMPACT), "strasse");
    }

    #[test]
    fn test_spacing_marks_idempotent_with_special_chars() {
        for s in ["A˘b", "A˚b ˛", "x ´ y", "A\u{344}b"] {
            for opts in all_options() {
                let once = normalize(s, opts);
                assert_eq!(normalize(&once, opts), once, "{s:?} {opts:?}");
            }
        }
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "\\PC*") {
            for opts in all_options() {
                let once = normalize(&s, opts);
                prop_assert_eq!(normalize(&once, opts), once.clone(), "{:?}", opts);
            }
        }
    }
}
