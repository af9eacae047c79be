//! Music file path reconciliation: resolve a query path to the catalog files
//! that most likely hold the same track.

pub mod catalog;
pub mod config;
pub mod distance;
pub mod error;
pub mod index;
pub mod normalize;
pub mod progress;
pub mod resolver;
pub mod safety;
pub mod scoring;
pub mod stats;
pub mod store;
pub mod words;

pub use distance::levenshtein;
pub use error::{Error, Result};
pub use scoring::score;
pub use words::extract_words;
