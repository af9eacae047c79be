//! Guards against overwriting the catalog with match output.
//!
//! The CLI deletes and recreates its output database, so the output path is
//! checked before anything is removed.

use anyhow::{bail, Result};
use std::path::Path;

/// Pattern every output database name must contain.
pub const OUTPUT_PATTERN: &str = "matches";

/// Validate that `output` is safe to delete and recreate.
///
/// - its filename contains `required_pattern`
/// - it is not one of `source_paths` (compared canonically when both exist)
/// - it is not a SQLite sidecar of a source (`-wal`, `-shm`, `-journal`)
pub fn validate_output_path(output: &Path, required_pattern: &str, source_paths: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if same_file(output, source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }

        let source_name = source.file_name().and_then(|n| n.to_str()).unwrap_or("");
        for suffix in ["-wal", "-shm", "-journal"] {
            if !source_name.is_empty() && output_name == format!("{source_name}{suffix}") {
                bail!(
                    "Safety check failed: output '{}' is a SQLite sidecar of source '{}'",
                    output.display(),
                    source.display()
                );
            }
        }
    }

    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
