use std::fs::File;
use std::io;
use std::path::Path;

use rayon::prelude::*;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::data::repository;
use crate::error::AppError;
use crate::models::reports::DuplicateGroup;

/// Blake3 digest over the full file content.
pub fn hash_file(path: &Path) -> Result<String, AppError> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hashes every record that has no cached digest.
///
/// The cache key is the scanner's `(size, mtime)` dirtiness: a changed file
/// gets its hash cleared on rescan and recomputed here. A file edited
/// without moving size or mtime keeps its stale digest — accepted tradeoff
/// for avoiding a full-tree rehash on every scan. File reads fan out across
/// the rayon pool; index writes happen serially afterwards. A file that
/// vanished or turned unreadable mid-hash is skipped, not fatal.
pub fn ensure_hashes(conn: &Connection) -> Result<usize, AppError> {
    let pending = repository::unhashed_files(conn)?;
    if pending.is_empty() {
        return Ok(0);
    }
    debug!(count = pending.len(), "hashing unhashed files");

    let digests: Vec<(String, Option<String>)> = pending
        .par_iter()
        .map(|record| {
            let digest = hash_file(Path::new(&record.path)).ok();
            (record.path.clone(), digest)
        })
        .collect();

    let mut hashed = 0usize;
    conn.execute_batch("BEGIN")?;
    for (path, digest) in digests {
        match digest {
            Some(digest) => {
                repository::set_content_hash(conn, &path, &digest)?;
                hashed += 1;
            }
            None => warn!("could not hash {path}, skipping"),
        }
    }
    conn.execute_batch("COMMIT")?;
    Ok(hashed)
}

/// Groups indexed files by content hash. Only groups with two or more
/// members are returned; members are ordered by path. Detection never
/// deletes anything.
pub fn find_duplicates(conn: &Connection) -> Result<Vec<DuplicateGroup>, AppError> {
    ensure_hashes(conn)?;
    repository::duplicate_groups(conn)
}

/// Number of "extra" copies: hashed files minus distinct digests.
pub fn duplicate_count(conn: &Connection) -> Result<i64, AppError> {
    ensure_hashes(conn)?;
    let (hashed, distinct) = repository::hash_counts(conn)?;
    Ok(hashed - distinct)
}
