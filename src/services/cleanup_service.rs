use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::data::repository;
use crate::error::AppError;
use crate::models::file_record::FileRecord;
use crate::models::reports::{CleanupOutcome, MoveAction, SkippedFile};
use crate::models::rules::{Category, OrganizationRules};
use crate::models::settings::Settings;
use crate::services::classify_service;
use crate::services::organize_service::{move_file, resolve_collision};

/// Extensions treated as leftovers from downloads and installers.
const TEMP_EXTENSIONS: &[&str] = &["tmp", "temp", "part", "crdownload", "cache", "log"];

pub(crate) const ARCHIVE_DIR: &str = "archive";

fn is_temp_extension(extension: Option<&str>) -> bool {
    extension.is_some_and(|ext| TEMP_EXTENSIONS.contains(&ext))
}

/// Age in whole days, from the indexed creation time (modification time when
/// creation is unavailable). Records with no usable timestamp never age.
fn age_days(record: &FileRecord, now: DateTime<Utc>) -> Option<i64> {
    let stamp = record.created_at.as_deref().or(record.modified_at.as_deref())?;
    let parsed = DateTime::parse_from_rfc3339(stamp).ok()?;
    Some((now - parsed.with_timezone(&Utc)).num_days())
}

struct CleanupPlan {
    /// Temp files old enough to delete: `(path, name, category)`.
    delete: Vec<(String, String, Category)>,
    /// Old files to park under the archive tree.
    archive: Vec<(String, String, Category, PathBuf)>,
}

fn plan(
    conn: &Connection,
    settings: &Settings,
    rules: &OrganizationRules,
) -> Result<CleanupPlan, AppError> {
    let now = Utc::now();
    let downloads = Path::new(&settings.downloads_path);
    let archive_root = downloads.join(ARCHIVE_DIR);

    let mut delete = Vec::new();
    let mut archive = Vec::new();
    let mut claimed = std::collections::HashSet::new();

    for record in repository::list_all(conn)? {
        let Some(age) = age_days(&record, now) else {
            continue;
        };
        let category = classify_service::classify_record(&record, rules);

        // deletion wins for temp files; those not yet stale enough still
        // fall through to the independent archival pass
        if is_temp_extension(record.extension.as_deref())
            && age >= settings.cleanup_temp_files_days
        {
            delete.push((record.path.clone(), record.name.clone(), category));
            continue;
        }

        if age >= settings.cleanup_old_files_days
            && !Path::new(&record.path).starts_with(&archive_root)
        {
            let desired = archive_root.join(category.as_str()).join(&record.name);
            let target = resolve_collision(desired, &claimed);
            claimed.insert(target.clone());
            archive.push((record.path.clone(), record.name.clone(), category, target));
        }
    }
    Ok(CleanupPlan { delete, archive })
}

/// Runs a cleanup pass: deletes stale temp files, then archives files past
/// the age threshold into `archive/<Category>/`. A temp file eligible for
/// both is deleted; one not yet stale enough to delete can still be
/// archived.
///
/// Dry run reports both candidate lists and mutates nothing. On apply each
/// file is handled independently; a failure lands in `skipped` and the pass
/// continues. A temp file already gone from disk still has its record and a
/// deletion entry written, since the intended end state holds either way.
pub fn cleanup(
    conn: &Connection,
    settings: &Settings,
    rules: &OrganizationRules,
    dry_run: bool,
) -> Result<CleanupOutcome, AppError> {
    let plan = plan(conn, settings, rules)?;

    if dry_run {
        return Ok(CleanupOutcome {
            dry_run: true,
            deleted_count: plan.delete.len(),
            archived_count: plan.archive.len(),
            deleted: plan.delete.into_iter().map(|(path, _, _)| path).collect(),
            archived: plan
                .archive
                .into_iter()
                .map(|(from, _, _, to)| MoveAction {
                    from,
                    to: to.to_string_lossy().to_string(),
                })
                .collect(),
            skipped: Vec::new(),
        });
    }

    let mut deleted = Vec::new();
    let mut archived = Vec::new();
    let mut skipped: Vec<SkippedFile> = Vec::new();

    for (path, name, category) in &plan.delete {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("cleanup: could not delete {path}: {e}");
                skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        }
        conn.execute_batch("BEGIN")?;
        let recorded = repository::delete_by_path(conn, path).and_then(|_| {
            repository::append_activity(conn, name, None, category.as_str(), false)
        });
        match recorded {
            Ok(_) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
        deleted.push(path.clone());
    }

    for (from, name, category, to) in &plan.archive {
        if let Err(e) = move_file(Path::new(from), to) {
            warn!("cleanup: could not archive {from}: {e}");
            skipped.push(SkippedFile {
                path: from.clone(),
                reason: e.to_string(),
            });
            continue;
        }
        let to_name = to
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        conn.execute_batch("BEGIN")?;
        let recorded = repository::update_path(conn, from, &to.to_string_lossy(), &to_name)
            .and_then(|_| {
                repository::append_activity(conn, name, None, category.as_str(), false)
            });
        match recorded {
            Ok(_) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
        archived.push(MoveAction {
            from: from.clone(),
            to: to.to_string_lossy().to_string(),
        });
    }

    info!(
        deleted = deleted.len(),
        archived = archived.len(),
        skipped = skipped.len(),
        "cleanup pass finished"
    );
    Ok(CleanupOutcome {
        dry_run: false,
        deleted_count: deleted.len(),
        archived_count: archived.len(),
        deleted,
        archived,
        skipped,
    })
}
