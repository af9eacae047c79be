//! Per-run counters, logged and optionally written as JSON.

use serde::Serialize;

use crate::resolver::{BatchResolution, FailureReason};

#[derive(Default, Debug, Clone, Serialize)]
pub struct ResolveStats {
    // Catalog
    pub catalog_files: usize,
    pub enrichment_gaps: usize, // Records whose words were derived from the path
    pub vocabulary: usize,
    pub postings: usize,

    // Queries
    pub queries: usize,
    pub found: usize,
    pub not_found: usize,
    pub empty_queries: usize,
    pub no_candidates: usize,
    pub below_threshold: usize,
    pub invalid_queries: usize, // Lines in the query file that were not UTF-8
    pub candidates_scored: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl ResolveStats {
    pub fn record(&mut self, resolution: &BatchResolution) {
        self.queries += 1;
        self.candidates_scored += resolution.candidates_scored;
        match resolution.failure {
            None => self.found += 1,
            Some(reason) => {
                self.not_found += 1;
                match reason {
                    FailureReason::EmptyQuery => self.empty_queries += 1,
                    FailureReason::NoCandidates => self.no_candidates += 1,
                    FailureReason::BelowThreshold => self.below_threshold += 1,
                }
            }
        }
    }

    /// Found queries as a percentage of all queries.
    pub fn match_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            100.0 * self.found as f64 / self.queries as f64
        }
    }

    /// Average candidates scored per query
    pub fn avg_candidates(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.candidates_scored as f64 / self.queries as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
