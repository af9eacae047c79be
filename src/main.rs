use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use track_reconcile::catalog::CatalogRecord;
use track_reconcile::config::Config;
use track_reconcile::progress::{self, create_progress_bar, create_spinner, format_duration, log_progress};
use track_reconcile::resolver::{BatchResolution, FailureReason, MatchOptions, MatchResult, Resolver};
use track_reconcile::safety::{validate_output_path, OUTPUT_PATTERN};
use track_reconcile::stats::ResolveStats;
use track_reconcile::store;

#[derive(Parser)]
#[command(name = "track-reconcile")]
#[command(about = "Resolve music file paths against a catalog of known files")]
struct Args {
    /// Catalog database (table catalog_files)
    catalog: PathBuf,

    /// Query file: one path per line
    queries: PathBuf,

    /// Output database; filename must contain "matches". Without it,
    /// results are printed to stdout as JSON lines.
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum final score (overrides config)
    #[arg(long)]
    threshold: Option<f64>,

    /// Matches kept per query (overrides config)
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars; print periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Resolve a single query and print its ranked breakdown
    #[arg(long)]
    test: Option<String>,
}

const QUERY_CHUNK_SIZE: usize = 2_000;
const CHANNEL_CAPACITY: usize = 8_192;
const FLUSH_SIZE: usize = 1_000;

#[derive(Serialize)]
struct JsonLine<'a> {
    query: &'a str,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReason>,
    matches: &'a [MatchResult],
}

// ============================================================================
// Query Input
// ============================================================================

/// Read query lines. Blank lines are skipped; lines that are not UTF-8 are
/// reported and counted, never coerced.
fn read_queries(path: &Path, stats: &mut ResolveStats) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read queries {}", path.display()))?;

    let mut queries = Vec::new();
    for (line_no, line) in bytes.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match std::str::from_utf8(line) {
            Ok(text) if text.trim().is_empty() => {}
            Ok(text) => queries.push(text.trim().to_string()),
            Err(e) => {
                stats.invalid_queries += 1;
                eprintln!(
                    "[WARN] {}:{}: not valid UTF-8 (at byte {}), skipped",
                    path.display(),
                    line_no + 1,
                    e.valid_up_to()
                );
            }
        }
    }
    Ok(queries)
}

// ============================================================================
// Match Writer
// ============================================================================

fn db_writer_loop(conn: &mut Connection, rx: Receiver<BatchResolution>) -> Result<()> {
    let mut batch: Vec<BatchResolution> = Vec::with_capacity(FLUSH_SIZE);
    let mut last_flush = Instant::now();
    let flush_every = Duration::from_millis(750);

    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(resolution) => {
                batch.push(resolution);
                if batch.len() >= FLUSH_SIZE || last_flush.elapsed() >= flush_every {
                    flush_batch(conn, &mut batch)?;
                    last_flush = Instant::now();
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !batch.is_empty() && last_flush.elapsed() >= flush_every {
                    flush_batch(conn, &mut batch)?;
                    last_flush = Instant::now();
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if !batch.is_empty() {
                    flush_batch(conn, &mut batch)?;
                }
                break;
            }
        }
    }
    Ok(())
}

fn flush_batch(conn: &mut Connection, batch: &mut Vec<BatchResolution>) -> Result<()> {
    store::write_matches(conn, batch)?;
    batch.clear();
    Ok(())
}

// ============================================================================
// Phases
// ============================================================================

fn build_resolver(records: Vec<CatalogRecord>, config: &Config, stats: &mut ResolveStats) -> Result<Resolver> {
    let spinner = create_spinner("Phase 2: Building catalog snapshot");
    let (resolver, report) = Resolver::from_config(records, config)?;

    let snapshot = resolver.snapshot();
    stats.catalog_files = snapshot.len();
    stats.enrichment_gaps = report.derived();
    stats.vocabulary = snapshot.index().vocabulary_len();
    stats.postings = snapshot.index().posting_count();

    spinner.finish_with_message(format!(
        "Phase 2: Indexed {} files ({} words, {} postings)",
        stats.catalog_files, stats.vocabulary, stats.postings
    ));

    if report.derived() > 0 {
        let sample: Vec<String> = report.derived_ids.iter().take(10).map(|id| id.to_string()).collect();
        eprintln!(
            "[WARN] {} catalog records had no precomputed words; derived from path (ids: {}{})",
            report.derived(),
            sample.join(", "),
            if report.derived() > sample.len() { ", ..." } else { "" }
        );
    }

    Ok(resolver)
}

fn test_query(resolver: &Resolver, query: &str, options: &MatchOptions) -> Result<()> {
    let outcome = resolver.search_match(query, options)?;

    println!("\nMatches for '{}':", query);
    println!("{:-<80}", "");

    for (rank, m) in outcome.matches.iter().enumerate() {
        println!(
            "#{} {:.3} {}\n    exact={:.3} fuzzy={:.3} context={:.3} special={:.3} parentheses={:.3}",
            rank + 1,
            m.final_score,
            m.entry.path,
            m.scores.exact,
            m.scores.fuzzy,
            m.scores.context,
            m.scores.special,
            m.scores.parentheses
        );
    }

    if let Some(reason) = outcome.failure_reason() {
        println!(
            "No match ({}, {} candidates scored).",
            reason.as_str(),
            outcome.candidates_scored
        );
    }

    Ok(())
}

fn resolve_to_db(
    resolver: &Resolver,
    queries: &[String],
    options: &MatchOptions,
    output: &Path,
    stats: &mut ResolveStats,
) -> Result<()> {
    if output.exists() {
        std::fs::remove_file(output).context("Failed to remove existing output file")?;
    }
    println!("Creating output database: {:?}", output);
    {
        let conn = Connection::open(output).context("Failed to create output database")?;
        store::create_matches_schema(&conn)?;
    }

    let (tx, rx) = bounded::<BatchResolution>(CHANNEL_CAPACITY);
    let db_writer = {
        let output = output.to_path_buf();
        std::thread::spawn(move || -> Result<()> {
            let mut conn = Connection::open(&output)
                .with_context(|| format!("Open db {}", output.display()))?;
            db_writer_loop(&mut conn, rx)
        })
    };

    let pb = create_progress_bar(queries.len() as u64, "Phase 3: Resolving queries");
    let mut done = 0u64;
    'chunks: for chunk in queries.chunks(QUERY_CHUNK_SIZE) {
        for resolution in resolver.resolve_batch(chunk, options)? {
            stats.record(&resolution);
            if tx.send(resolution).is_err() {
                // Writer exited early; its error surfaces on join
                break 'chunks;
            }
        }
        done += chunk.len() as u64;
        pb.set_position(done);
        log_progress("RESOLVE", done, queries.len() as u64, QUERY_CHUNK_SIZE as u64);
    }
    drop(tx);

    db_writer
        .join()
        .map_err(|_| anyhow!("Match writer thread panicked"))??;
    pb.finish_with_message(format!("Phase 3: Resolved {} queries", stats.queries));
    Ok(())
}

fn resolve_to_stdout(
    resolver: &Resolver,
    queries: &[String],
    options: &MatchOptions,
    stats: &mut ResolveStats,
) -> Result<()> {
    let mut done = 0u64;
    for chunk in queries.chunks(QUERY_CHUNK_SIZE) {
        for resolution in resolver.resolve_batch(chunk, options)? {
            stats.record(&resolution);
            let line = JsonLine {
                query: &resolution.query,
                found: resolution.found(),
                failure: resolution.failure,
                matches: &resolution.matches,
            };
            println!("{}", serde_json::to_string(&line)?);
        }
        done += chunk.len() as u64;
        log_progress("RESOLVE", done, queries.len() as u64, QUERY_CHUNK_SIZE as u64);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    progress::set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(threshold) = args.threshold {
        config.matching.threshold = threshold;
    }
    if let Some(limit) = args.limit {
        config.matching.limit = limit;
    }
    config.validate()?;

    if let Some(output) = &args.output {
        validate_output_path(output, OUTPUT_PATTERN, &[&args.catalog, &args.queries])?;
    }

    let mut stats = ResolveStats::default();

    // JSON-lines mode keeps stdout clean for the results
    let json_lines = args.output.is_none() && args.test.is_none();
    if !json_lines {
        println!("Opening catalog database: {:?}", args.catalog);
    }
    let catalog_conn = Connection::open(&args.catalog).context("Failed to open catalog database")?;
    let records = store::read_catalog(&catalog_conn)?;
    drop(catalog_conn);

    let resolver = build_resolver(records, &config, &mut stats)?;
    let options = config.matching;

    if let Some(query) = &args.test {
        return test_query(&resolver, query, &options);
    }

    let queries = read_queries(&args.queries, &mut stats)?;

    match &args.output {
        Some(output) => resolve_to_db(&resolver, &queries, &options, output, &mut stats)?,
        None => resolve_to_stdout(&resolver, &queries, &options, &mut stats)?,
    }

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    if args.log_only {
        stats.log_phase("final");
    }
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats {}", path.display()))?;
    }

    eprintln!("\n{:=<60}", "");
    eprintln!("Resolution complete!");
    eprintln!("  Catalog files: {}", stats.catalog_files);
    eprintln!("  Queries: {}", stats.queries);
    eprintln!("  Found: {} ({:.1}%)", stats.found, stats.match_rate());
    eprintln!(
        "  Not found: {} (empty {}, no candidates {}, below threshold {})",
        stats.not_found, stats.empty_queries, stats.no_candidates, stats.below_threshold
    );
    if stats.invalid_queries > 0 {
        eprintln!("  Invalid query lines: {}", stats.invalid_queries);
    }
    eprintln!("  Avg candidates scored: {:.1}", stats.avg_candidates());
    eprintln!("  Elapsed: {}", format_duration(start.elapsed()));
    eprintln!("{:=<60}", "");

    Ok(())
}
