//! Multi-signal scoring of a query word set against a catalog entry.
//!
//! Five independent signals, each roughly 0.0 to 1.0:
//! - exact: shared words, with a bonus for repeated shared words (can exceed 1)
//! - fuzzy: greedy word alignment on character similarity
//! - context: preserved word adjacency, penalized for much longer targets
//! - special: agreement on marker tokens (remix, live, cover, ...)
//! - parentheses: similarity of the bracketed version/remix tags
//!
//! The final score is a weighted sum clamped to [0, 1]. Weights and formula
//! parameters live in [`ScoringConfig`].

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::distance::{GreedyAligner, WordAligner, WORD_MATCH_THRESHOLD};
use crate::error::{Error, Result};
use crate::words::WordSet;

// ============================================================================
// Defaults
// ============================================================================

/// Bonus per matched occurrence of a word beyond the first.
pub const REPEAT_BONUS: f64 = 0.5;

/// Target/query length ratio above which the context signal is scaled down.
pub const MAX_LENGTH_RATIO: f64 = 1.5;

/// Parentheses score when only one side has bracketed tags.
pub const MISSING_PARENTHESES_SCORE: f64 = 0.5;

/// Marker tokens that identify a version rather than the song itself.
pub const SPECIAL_TOKENS: &[&str] = &[
    "live",
    "acoustic",
    "unplugged",
    "remix",
    "remixed",
    "mix",
    "cover",
    "tribute",
    "karaoke",
    "instrumental",
    "demo",
    "outtake",
    "alternate",
    "bootleg",
    "medley",
    "edit",
    "extended",
    "remaster",
    "remastered",
    "version",
];

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub exact: f64,
    pub fuzzy: f64,
    pub context: f64,
    pub special: f64,
    pub parentheses: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            exact: 0.35,
            fuzzy: 0.25,
            context: 0.20,
            special: 0.10,
            parentheses: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub repeat_bonus: f64,
    pub fuzzy_threshold: f64,
    pub max_length_ratio: f64,
    pub missing_parentheses: f64,
    pub special_tokens: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            repeat_bonus: REPEAT_BONUS,
            fuzzy_threshold: WORD_MATCH_THRESHOLD,
            max_length_ratio: MAX_LENGTH_RATIO,
            missing_parentheses: MISSING_PARENTHESES_SCORE,
            special_tokens: SPECIAL_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        let weights = [w.exact, w.fuzzy, w.context, w.special, w.parentheses];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::InvalidConfig(format!(
                "scoring weights must be finite and non-negative: {w:?}"
            )));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::InvalidConfig("scoring weights sum to zero".to_string()));
        }
        if !(self.repeat_bonus.is_finite() && self.repeat_bonus >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "repeat_bonus must be non-negative, got {}",
                self.repeat_bonus
            )));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(Error::InvalidConfig(format!(
                "fuzzy_threshold must be within [0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        if !(self.max_length_ratio.is_finite() && self.max_length_ratio >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_length_ratio must be at least 1, got {}",
                self.max_length_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.missing_parentheses) {
            return Err(Error::InvalidConfig(format!(
                "missing_parentheses must be within [0, 1], got {}",
                self.missing_parentheses
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Score Models
// ============================================================================

/// Per-signal breakdown, kept for diagnostics alongside the final score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalScores {
    #[serde(rename = "exactScore")]
    pub exact: f64,
    #[serde(rename = "fuzzyScore")]
    pub fuzzy: f64,
    #[serde(rename = "contextScore")]
    pub context: f64,
    #[serde(rename = "specialScore")]
    pub special: f64,
    #[serde(rename = "parenthesesScore")]
    pub parentheses: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub signals: SignalScores,
    /// Weighted sum clamped to [0, 1].
    pub final_score: f64,
}

/// A scored catalog entry. Lives for one resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<'a> {
    pub entry: &'a CatalogEntry,
    pub scores: SignalScores,
    pub final_score: f64,
}

// ============================================================================
// Scorer Interface
// ============================================================================

pub trait MatchScorer: Send + Sync {
    /// Score two word sets.
    fn score_words(&self, query: &WordSet, target: &WordSet) -> ScoreBreakdown;

    /// Score a query against a catalog entry.
    fn score<'a>(&self, query: &WordSet, entry: &'a CatalogEntry) -> MatchCandidate<'a> {
        let breakdown = self.score_words(query, &entry.words);
        MatchCandidate {
            entry,
            scores: breakdown.signals,
            final_score: breakdown.final_score,
        }
    }
}

/// Default scorer combining the five signals.
#[derive(Debug, Clone)]
pub struct MultiSignalScorer<A: WordAligner = GreedyAligner> {
    config: ScoringConfig,
    aligner: A,
    special_tokens: FxHashSet<String>,
}

impl MultiSignalScorer<GreedyAligner> {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        let aligner = GreedyAligner {
            threshold: config.fuzzy_threshold,
        };
        Self::with_aligner(config, aligner)
    }
}

impl Default for MultiSignalScorer<GreedyAligner> {
    fn default() -> Self {
        let config = ScoringConfig::default();
        let special_tokens = config.special_tokens.iter().cloned().collect();
        Self {
            config,
            aligner: GreedyAligner::default(),
            special_tokens,
        }
    }
}

impl<A: WordAligner> MultiSignalScorer<A> {
    /// Use a different word alignment strategy for the fuzzy and parentheses signals.
    pub fn with_aligner(config: ScoringConfig, aligner: A) -> Result<Self> {
        config.validate()?;
        let special_tokens = config
            .special_tokens
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(Self {
            config,
            aligner,
            special_tokens,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn signals(&self, query: &WordSet, target: &WordSet) -> SignalScores {
        SignalScores {
            exact: exact_score(&query.file_words, &target.file_words, self.config.repeat_bonus),
            fuzzy: self.aligner.align(&query.file_words, &target.file_words),
            context: context_score(
                &query.file_words,
                &target.file_words,
                self.config.max_length_ratio,
            ),
            special: special_score(query, target, &self.special_tokens),
            parentheses: parentheses_score(
                query,
                target,
                &self.aligner,
                self.config.missing_parentheses,
            ),
        }
    }

    pub fn combine(&self, signals: &SignalScores) -> f64 {
        let w = &self.config.weights;
        let raw = w.exact * signals.exact
            + w.fuzzy * signals.fuzzy
            + w.context * signals.context
            + w.special * signals.special
            + w.parentheses * signals.parentheses;
        raw.clamp(0.0, 1.0)
    }
}

impl<A: WordAligner> MatchScorer for MultiSignalScorer<A> {
    fn score_words(&self, query: &WordSet, target: &WordSet) -> ScoreBreakdown {
        let signals = self.signals(query, target);
        ScoreBreakdown {
            final_score: self.combine(&signals),
            signals,
        }
    }
}

static DEFAULT_SCORER: Lazy<MultiSignalScorer> = Lazy::new(MultiSignalScorer::default);

/// Score two word sets with the default configuration.
pub fn score(query: &WordSet, target: &WordSet) -> ScoreBreakdown {
    DEFAULT_SCORER.score_words(query, target)
}

// ============================================================================
// Signals
// ============================================================================

fn word_counts(words: &[String]) -> FxHashMap<&str, usize> {
    let mut counts = FxHashMap::default();
    for w in words {
        *counts.entry(w.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Shared-word score. A word matched `m` times contributes
/// `m + repeat_bonus * (m - 1)`; the total is divided by the query length and
/// deliberately not clamped.
pub fn exact_score(query: &[String], target: &[String], repeat_bonus: f64) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let target_counts = word_counts(target);

    let total: f64 = word_counts(query)
        .into_iter()
        .map(|(word, query_count)| {
            let matched = query_count.min(target_counts.get(word).copied().unwrap_or(0));
            if matched == 0 {
                0.0
            } else {
                matched as f64 + repeat_bonus * (matched - 1) as f64
            }
        })
        .sum();

    total / query.len() as f64
}

/// Fraction of adjacent query word pairs that stay adjacent, in order, in the target.
pub fn context_score(query: &[String], target: &[String], max_length_ratio: f64) -> f64 {
    if query.is_empty() || target.is_empty() {
        return 0.0;
    }

    let base = if query.len() == 1 {
        if target.contains(&query[0]) {
            1.0
        } else {
            0.0
        }
    } else {
        let target_pairs: FxHashSet<(&str, &str)> = target
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        let preserved = query
            .windows(2)
            .filter(|w| target_pairs.contains(&(w[0].as_str(), w[1].as_str())))
            .count();
        preserved as f64 / (query.len() - 1) as f64
    };

    // Much longer targets look like compilations/mashups rather than the same track
    let ratio = target.len() as f64 / query.len() as f64;
    if ratio > max_length_ratio {
        base * max_length_ratio / ratio
    } else {
        base
    }
}

fn markers<'a>(words: &'a WordSet, tokens: &FxHashSet<String>) -> FxHashSet<&'a str> {
    words
        .file_words
        .iter()
        .chain(words.parentheses_words.iter())
        .filter(|w| tokens.contains(w.as_str()))
        .map(String::as_str)
        .collect()
}

/// Agreement on marker tokens: 1.0 when neither side has any, otherwise
/// shared / union.
pub fn special_score(query: &WordSet, target: &WordSet, tokens: &FxHashSet<String>) -> f64 {
    let q = markers(query, tokens);
    let t = markers(target, tokens);
    if q.is_empty() && t.is_empty() {
        return 1.0;
    }
    let shared = q.intersection(&t).count();
    let union = q.union(&t).count();
    shared as f64 / union as f64
}

/// Similarity of the bracketed tags only.
pub fn parentheses_score<A: WordAligner + ?Sized>(
    query: &WordSet,
    target: &WordSet,
    aligner: &A,
    missing: f64,
) -> f64 {
    match (query.parentheses_words.is_empty(), target.parentheses_words.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => missing,
        (false, false) => aligner.align(
            &query.sorted_parentheses_words(),
            &target.sorted_parentheses_words(),
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
