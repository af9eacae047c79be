//! Edit distance and the similarity functions built on it.

/// Minimum character similarity for two words to count as the same word.
pub const WORD_MATCH_THRESHOLD: f64 = 0.6;

/// Case-insensitive Levenshtein distance (unit costs, counted in chars).
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Similarity ratio (0.0 to 1.0): `1 - distance / longer length`.
/// Two empty strings are identical.
pub fn char_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(&a, &b) as f64 / max_len as f64
}

/// [`char_similarity`] for values that may be absent. Missing input scores 0.
pub fn char_similarity_opt(a: Option<&str>, b: Option<&str>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => char_similarity(a, b),
        _ => 0.0,
    }
}

// ============================================================================
// Word Alignment
// ============================================================================

/// Aligns a query word list against a target word list and returns the
/// fraction of query words that found a partner (0.0 to 1.0).
pub trait WordAligner: Send + Sync {
    fn align(&self, query: &[String], target: &[String]) -> f64;
}

/// Greedy one-to-one alignment.
///
/// Query words are taken in order; each claims the unclaimed target word with
/// the highest similarity at or above `threshold` (first wins on ties). This
/// is not a minimum-cost assignment: an early query word can take the partner
/// a later word needed. Results depend on which side is the query.
#[derive(Debug, Clone, Copy)]
pub struct GreedyAligner {
    pub threshold: f64,
}

impl Default for GreedyAligner {
    fn default() -> Self {
        Self {
            threshold: WORD_MATCH_THRESHOLD,
        }
    }
}

impl WordAligner for GreedyAligner {
    fn align(&self, query: &[String], target: &[String]) -> f64 {
        if query.is_empty() {
            return 0.0;
        }

        let mut used = vec![false; target.len()];
        let mut matched = 0usize;

        for word in query {
            let mut best: Option<(usize, f64)> = None;
            for (j, candidate) in target.iter().enumerate() {
                if used[j] {
                    continue;
                }
                let sim = char_similarity(word, candidate);
                if sim >= self.threshold && best.map_or(true, |(_, b)| sim > b) {
                    best = Some((j, sim));
                    if sim >= 1.0 {
                        break;
                    }
                }
            }
            if let Some((j, _)) = best {
                used[j] = true;
                matched += 1;
            }
        }

        matched as f64 / query.len() as f64
    }
}

/// Greedy word similarity with the default threshold.
pub fn word_similarity(words1: &[String], words2: &[String]) -> f64 {
    GreedyAligner::default().align(words1, words2)
}
