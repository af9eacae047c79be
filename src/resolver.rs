//! Query resolution: retrieve candidates through the word index, score them,
//! filter by threshold, rank, and truncate.
//!
//! A [`Resolver`] holds an `Arc<CatalogSnapshot>`. Queries only ever read the
//! snapshot, so many run in parallel (see [`Resolver::resolve_batch`]); a
//! catalog change builds a new snapshot and swaps it in.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use crate::catalog::{CatalogRecord, CatalogSnapshot, EnrichmentReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::normalize::Normalizer;
use crate::scoring::{MatchCandidate, MatchScorer, MultiSignalScorer, SignalScores};
use crate::words::{extract_path_words, WordSet};

/// Default minimum final score for a match.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Default number of ranked matches returned per query.
pub const DEFAULT_LIMIT: usize = 5;

// ============================================================================
// Options & Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    pub threshold: f64,
    pub limit: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl MatchOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.limit == 0 {
            return Err(Error::InvalidConfig("limit must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Public match record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub path: String,
    pub name: String,
    pub similarity: f64,
    pub debug: SignalScores,
}

impl From<&MatchCandidate<'_>> for MatchResult {
    fn from(candidate: &MatchCandidate<'_>) -> Self {
        Self {
            path: candidate.entry.path.clone(),
            name: candidate.entry.file_name.clone(),
            similarity: candidate.final_score,
            debug: candidate.scores,
        }
    }
}

/// Why a query produced no match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Nothing left after normalization.
    EmptyQuery,
    /// No catalog entry shares a word with the query.
    NoCandidates,
    /// Candidates were scored but none reached the threshold.
    BelowThreshold,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::EmptyQuery => "empty_query",
            FailureReason::NoCandidates => "no_candidates",
            FailureReason::BelowThreshold => "below_threshold",
        }
    }
}

/// Ranked outcome of one query. Borrows entries from the resolver's snapshot.
#[derive(Debug, Clone)]
pub struct SearchOutcome<'a> {
    pub found: bool,
    pub matches: Vec<MatchCandidate<'a>>,
    pub candidates_scored: usize,
    pub empty_query: bool,
}

impl SearchOutcome<'_> {
    fn empty() -> Self {
        Self {
            found: false,
            matches: Vec::new(),
            candidates_scored: 0,
            empty_query: true,
        }
    }

    pub fn to_results(&self) -> Vec<MatchResult> {
        self.matches.iter().map(MatchResult::from).collect()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        if self.found {
            None
        } else if self.empty_query {
            Some(FailureReason::EmptyQuery)
        } else if self.candidates_scored == 0 {
            Some(FailureReason::NoCandidates)
        } else {
            Some(FailureReason::BelowThreshold)
        }
    }
}

/// Owned outcome of one query in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResolution {
    pub query: String,
    pub matches: Vec<MatchResult>,
    pub candidates_scored: usize,
    pub failure: Option<FailureReason>,
}

impl BatchResolution {
    pub fn found(&self) -> bool {
        self.failure.is_none()
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct Resolver<S: MatchScorer = MultiSignalScorer> {
    snapshot: Arc<CatalogSnapshot>,
    normalizer: Arc<Normalizer>,
    scorer: S,
}

impl Resolver<MultiSignalScorer> {
    /// Validate the configuration, build a snapshot from store records, and
    /// wire the configured normalizer and scorer.
    pub fn from_config(records: Vec<CatalogRecord>, config: &Config) -> Result<(Self, EnrichmentReport)> {
        config.validate()?;
        let normalizer = Arc::new(config.normalizer()?);
        let (snapshot, report) = CatalogSnapshot::build(records, &normalizer, config.index)?;
        let scorer = MultiSignalScorer::new(config.scoring.clone())?;
        Ok((Self::new(Arc::new(snapshot), normalizer, scorer), report))
    }
}

impl<S: MatchScorer> Resolver<S> {
    pub fn new(snapshot: Arc<CatalogSnapshot>, normalizer: Arc<Normalizer>, scorer: S) -> Self {
        Self {
            snapshot,
            normalizer,
            scorer,
        }
    }

    pub fn snapshot(&self) -> &Arc<CatalogSnapshot> {
        &self.snapshot
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Replace the catalog snapshot, returning the previous one. In-flight
    /// readers holding the old `Arc` keep a consistent view.
    pub fn swap_snapshot(&mut self, snapshot: Arc<CatalogSnapshot>) -> Arc<CatalogSnapshot> {
        std::mem::replace(&mut self.snapshot, snapshot)
    }

    /// Resolve one query path (either separator style).
    pub fn search_match(&self, query: &str, options: &MatchOptions) -> Result<SearchOutcome<'_>> {
        options.validate()?;
        let words = extract_path_words(&self.normalizer, query);
        Ok(self.rank(&words, options))
    }

    /// Resolve a filesystem path. Paths that are not valid UTF-8 are rejected.
    pub fn search_path(&self, path: &Path, options: &MatchOptions) -> Result<SearchOutcome<'_>> {
        let query = path.to_str().ok_or_else(|| {
            Error::InvalidInput(format!("path is not valid UTF-8: {}", path.display()))
        })?;
        self.search_match(query, options)
    }

    /// Resolve already-extracted query words.
    pub fn search_words(&self, words: &WordSet, options: &MatchOptions) -> Result<SearchOutcome<'_>> {
        options.validate()?;
        Ok(self.rank(words, options))
    }

    /// Resolve many queries in parallel against the current snapshot.
    pub fn resolve_batch(&self, queries: &[String], options: &MatchOptions) -> Result<Vec<BatchResolution>> {
        options.validate()?;
        Ok(queries
            .par_iter()
            .map(|query| {
                let words = extract_path_words(&self.normalizer, query);
                let outcome = self.rank(&words, options);
                BatchResolution {
                    query: query.clone(),
                    matches: outcome.to_results(),
                    candidates_scored: outcome.candidates_scored,
                    failure: outcome.failure_reason(),
                }
            })
            .collect())
    }

    fn rank(&self, words: &WordSet, options: &MatchOptions) -> SearchOutcome<'_> {
        if words.is_empty() {
            return SearchOutcome::empty();
        }

        let index = self.snapshot.index();
        let candidate_ids = index.candidates_for(words, index.options().min_shared_words);

        let mut matches: Vec<MatchCandidate<'_>> = candidate_ids
            .iter()
            .filter_map(|&id| self.snapshot.get(id))
            .map(|entry| self.scorer.score(words, entry))
            .filter(|c| c.final_score >= options.threshold)
            .collect();

        matches.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.entry
                        .words
                        .file_words
                        .len()
                        .cmp(&b.entry.words.file_words.len())
                })
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        matches.truncate(options.limit);

        SearchOutcome {
            found: !matches.is_empty(),
            matches,
            candidates_scored: candidate_ids.len(),
            empty_query: false,
        }
    }
}
