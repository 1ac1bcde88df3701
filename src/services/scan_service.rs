use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::data::repository::{self, UpsertKind};
use crate::error::AppError;
use crate::models::file_record::FileRecord;
use crate::models::reports::ScanReport;
use crate::models::settings::Settings;

const COMMIT_EVERY: usize = 50;

/// Builds an index record from a live file. Returns None when the file
/// vanished or cannot be stat'ed.
pub fn record_from_path(path: &Path, scan_id: &str) -> Option<FileRecord> {
    let metadata = path.metadata().ok()?;
    let name = path.file_name()?.to_string_lossy().to_string();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    let mime_type = extension
        .as_ref()
        .and_then(|ext| mime_guess::from_ext(ext).first())
        .map(|m| m.to_string());

    Some(FileRecord {
        path: path.to_string_lossy().to_string(),
        name: name.clone(),
        extension,
        mime_type,
        size_bytes: metadata.len() as i64,
        content_hash: None,
        category: None,
        created_at: metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()),
        modified_at: metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()),
        is_organized: false,
        original_name: name,
        new_name: None,
        last_seen_scan_id: Some(scan_id.to_string()),
    })
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Walks the downloads root and reconciles the index with what is on disk.
///
/// Non-destructive: never moves or deletes files. Oversize and unsupported
/// files are counted but not indexed. Symlinks are not followed. A set
/// cancel flag stops the walk between entries; whatever was upserted so far
/// is committed and the purge pass is skipped.
pub fn scan(
    conn: &Connection,
    settings: &Settings,
    cancel: &AtomicBool,
) -> Result<ScanReport, AppError> {
    let root = Path::new(&settings.downloads_path);
    if !root.is_dir() {
        return Err(AppError::NotFound(format!(
            "downloads path is not a directory: {}",
            settings.downloads_path
        )));
    }

    let scan_id = uuid::Uuid::new_v4().to_string();
    let max_bytes = settings.max_file_size_bytes();
    let mut report = ScanReport::default();
    let mut processed = 0usize;

    conn.execute_batch("BEGIN")?;

    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        if cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("scan: skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(record) = record_from_path(entry.path(), &scan_id) else {
            continue;
        };

        if record.size_bytes > max_bytes {
            report.skipped_oversize += 1;
            continue;
        }
        if !settings.extension_supported(record.extension.as_deref()) {
            report.skipped_unsupported += 1;
            continue;
        }

        match repository::upsert_scanned(conn, &record)? {
            UpsertKind::Added => report.added += 1,
            UpsertKind::Updated => report.updated += 1,
            UpsertKind::Unchanged => {}
        }
        report.files_found += 1;

        processed += 1;
        if processed % COMMIT_EVERY == 0 {
            conn.execute_batch("COMMIT")?;
            conn.execute_batch("BEGIN")?;
        }
    }

    conn.execute_batch("COMMIT")?;

    if !report.cancelled {
        report.removed = repository::purge_not_seen(conn, &scan_id)?;
    }

    info!(
        files_found = report.files_found,
        added = report.added,
        updated = report.updated,
        removed = report.removed,
        skipped_oversize = report.skipped_oversize,
        skipped_unsupported = report.skipped_unsupported,
        cancelled = report.cancelled,
        "scan finished"
    );
    Ok(report)
}
