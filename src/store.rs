//! SQLite catalog source and match output.
//!
//! Catalog table `catalog_files`: word columns hold JSON string arrays and
//! are NULL when the catalog was never enriched.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::catalog::CatalogRecord;
use crate::progress::{create_progress_bar, log_progress};
use crate::resolver::BatchResolution;

const WRITE_BATCH_SIZE: usize = 10_000;

// ============================================================================
// Catalog
// ============================================================================

pub fn create_catalog_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS catalog_files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL,
            file_name TEXT,
            folder_words TEXT,
            file_words TEXT,
            parentheses_words TEXT
        );",
    )
    .context("Failed to create catalog_files table")?;
    Ok(())
}

fn encode_words(words: &Option<Vec<String>>) -> Result<Option<String>> {
    words
        .as_ref()
        .map(|w| serde_json::to_string(w).context("Failed to encode word list"))
        .transpose()
}

/// Insert (or replace) catalog records in one transaction.
pub fn insert_catalog_records(conn: &mut Connection, records: &[CatalogRecord]) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO catalog_files
                (id, path, file_name, folder_words, file_words, parentheses_words)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for r in records {
            stmt.execute(params![
                r.id,
                r.path,
                r.file_name,
                encode_words(&r.folder_words)?,
                encode_words(&r.file_words)?,
                encode_words(&r.parentheses_words)?,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Decode a JSON word column. Malformed values are treated as missing so the
/// words get derived from the path instead.
fn decode_words(id: i64, column: &str, raw: Option<String>) -> Option<Vec<String>> {
    let raw = raw?;
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(words) => Some(words),
        Err(e) => {
            eprintln!("[WARN] catalog id {}: malformed {} ({}), deriving from path", id, column, e);
            None
        }
    }
}

/// Read every catalog record, ordered by id.
pub fn read_catalog(conn: &Connection) -> Result<Vec<CatalogRecord>> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM catalog_files", [], |row| row.get(0))
        .context("Failed to count catalog_files")?;

    let pb = create_progress_bar(count as u64, "Phase 1: Reading catalog");

    let mut stmt = conn.prepare(
        "SELECT id, path, file_name, folder_words, file_words, parentheses_words
         FROM catalog_files
         ORDER BY id",
    )?;

    let mut records = Vec::with_capacity(count as usize);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        records.push(CatalogRecord {
            id,
            path: row.get(1)?,
            file_name: row.get(2)?,
            folder_words: decode_words(id, "folder_words", row.get(3)?),
            file_words: decode_words(id, "file_words", row.get(4)?),
            parentheses_words: decode_words(id, "parentheses_words", row.get(5)?),
        });
        pb.inc(1);
        log_progress("READ", records.len() as u64, count as u64, 50_000);
    }

    pb.finish_with_message(format!("Phase 1: Read {} catalog files", records.len()));
    Ok(records)
}

// ============================================================================
// Matches
// ============================================================================

pub fn create_matches_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;

        CREATE TABLE IF NOT EXISTS matches (
            query TEXT NOT NULL,
            rank INTEGER NOT NULL,
            path TEXT NOT NULL,
            name TEXT NOT NULL,
            similarity REAL NOT NULL,
            exact_score REAL NOT NULL,
            fuzzy_score REAL NOT NULL,
            context_score REAL NOT NULL,
            special_score REAL NOT NULL,
            parentheses_score REAL NOT NULL,
            PRIMARY KEY (query, rank)
        );

        CREATE TABLE IF NOT EXISTS match_failures (
            query TEXT PRIMARY KEY,
            reason TEXT NOT NULL,
            candidates_scored INTEGER NOT NULL
        );",
    )
    .context("Failed to create matches tables")?;
    Ok(())
}

/// Write resolved queries in transactions of up to `WRITE_BATCH_SIZE` queries.
/// Re-resolving a query replaces its previous rows.
pub fn write_matches(conn: &mut Connection, resolutions: &[BatchResolution]) -> Result<()> {
    for chunk in resolutions.chunks(WRITE_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut clear_matches = tx.prepare_cached("DELETE FROM matches WHERE query = ?1")?;
            let mut clear_failure = tx.prepare_cached("DELETE FROM match_failures WHERE query = ?1")?;
            let mut insert_match = tx.prepare_cached(
                "INSERT INTO matches (query, rank, path, name, similarity,
                    exact_score, fuzzy_score, context_score, special_score, parentheses_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            let mut insert_failure = tx.prepare_cached(
                "INSERT INTO match_failures (query, reason, candidates_scored) VALUES (?1, ?2, ?3)",
            )?;

            for res in chunk {
                clear_matches.execute([&res.query])?;
                clear_failure.execute([&res.query])?;

                if let Some(reason) = res.failure {
                    insert_failure.execute(params![
                        res.query,
                        reason.as_str(),
                        res.candidates_scored as i64
                    ])?;
                    continue;
                }

                for (rank, m) in res.matches.iter().enumerate() {
                    insert_match.execute(params![
                        res.query,
                        (rank + 1) as i64,
                        m.path,
                        m.name,
                        m.similarity,
                        m.debug.exact,
                        m.debug.fuzzy,
                        m.debug.context,
                        m.debug.special,
                        m.debug.parentheses,
                    ])?;
                }
            }
        }
        tx.commit()?;
    }
    Ok(())
}

/// Best stored match for a query, if any.
pub fn best_match(conn: &Connection, query: &str) -> Result<Option<(String, f64)>> {
    let row = conn
        .query_row(
            "SELECT path, similarity FROM matches WHERE query = ?1 ORDER BY rank LIMIT 1",
            [query],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row)
}
