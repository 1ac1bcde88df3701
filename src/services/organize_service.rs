use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::data::repository;
use crate::error::AppError;
use crate::models::reports::{MoveAction, OrganizeOutcome, SkippedFile};
use crate::models::rules::{Category, OrganizationRules};
use crate::models::settings::Settings;
use crate::services::classify_service;
use crate::services::cleanup_service::ARCHIVE_DIR;

/// One computed move. The plan is a pure function of the index, the
/// settings and the rules: recomputing it against unchanged state yields an
/// identical list, which is what makes the dry-run preview trustworthy.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMove {
    pub from: PathBuf,
    pub to: PathBuf,
    pub category: Category,
    pub original_name: String,
}

#[derive(Debug, Default)]
pub struct OrganizePlan {
    pub moves: Vec<PlannedMove>,
    /// Unorganized records already sitting at their target path; they get
    /// flagged organized on apply without producing an action.
    pub in_place: Vec<(String, String, Category)>,
}

fn suffixed_name(name: &str, n: u32) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    }
}

/// Picks the first free destination: the desired path itself, then
/// `stem_1.ext`, `stem_2.ext`, ... probing both the filesystem and paths
/// already claimed by earlier moves in the same plan. Never overwrites.
pub fn resolve_collision(desired: PathBuf, claimed: &HashSet<PathBuf>) -> PathBuf {
    if !desired.exists() && !claimed.contains(&desired) {
        return desired;
    }
    let dir = desired
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = desired
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = dir.join(suffixed_name(&name, n));
        if !candidate.exists() && !claimed.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Moves a file, preferring an atomic rename. When rename fails (typically a
/// cross-volume target) the move degrades to copy, verify the byte count,
/// then delete the source — the source is only removed after the copy
/// checked out, so a crash can leave a duplicate but never a half-moved
/// file.
pub fn move_file(from: &Path, to: &Path) -> Result<(), AppError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !from.exists() {
                return Err(rename_err.into());
            }
            let copied = fs::copy(from, to)?;
            let expected = from.metadata()?.len();
            if copied != expected {
                let _ = fs::remove_file(to);
                return Err(AppError::General(format!(
                    "copy verification failed for {}: wrote {copied} of {expected} bytes",
                    from.display()
                )));
            }
            fs::remove_file(from)?;
            Ok(())
        }
    }
}

/// Computes the move plan for every unorganized record, in path order.
/// Reads the index and the filesystem; mutates neither.
pub fn plan(
    conn: &Connection,
    settings: &Settings,
    rules: &OrganizationRules,
) -> Result<OrganizePlan, AppError> {
    let downloads = Path::new(&settings.downloads_path);
    let archive_root = downloads.join(ARCHIVE_DIR);
    let mut out = OrganizePlan::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for record in repository::unorganized_files(conn)? {
        // archived files stay archived; cleanup owns that tree
        if Path::new(&record.path).starts_with(&archive_root) {
            continue;
        }
        let category = classify_service::classify_record(&record, rules);
        let desired = downloads.join(category.as_str()).join(&record.name);

        if desired == Path::new(&record.path) {
            out.in_place
                .push((record.path.clone(), record.name.clone(), category));
            continue;
        }

        let target = resolve_collision(desired, &claimed);
        claimed.insert(target.clone());
        out.moves.push(PlannedMove {
            from: PathBuf::from(&record.path),
            to: target,
            category,
            original_name: record.name.clone(),
        });
    }
    Ok(out)
}

/// Runs an organize pass.
///
/// Dry run returns the plan and mutates nothing. Apply executes move by
/// move; a per-file failure lands in `skipped` with its reason and the rest
/// of the batch continues. Each successful move updates the record and
/// appends an activity entry in one transaction, so the index never
/// disagrees with the filesystem about a completed move. Records that are
/// already organized are excluded up front, which makes a second apply a
/// no-op.
pub fn organize(
    conn: &Connection,
    settings: &Settings,
    rules: &OrganizationRules,
    dry_run: bool,
) -> Result<OrganizeOutcome, AppError> {
    let plan = plan(conn, settings, rules)?;

    let mut actions = Vec::with_capacity(plan.moves.len());
    let mut skipped: Vec<SkippedFile> = Vec::new();

    if dry_run {
        for mv in &plan.moves {
            actions.push(MoveAction {
                from: mv.from.to_string_lossy().to_string(),
                to: mv.to.to_string_lossy().to_string(),
            });
        }
        return Ok(OrganizeOutcome {
            dry_run: true,
            organized_count: actions.len(),
            actions,
            skipped,
        });
    }

    for mv in &plan.moves {
        if let Err(e) = move_file(&mv.from, &mv.to) {
            warn!("organize: could not move {}: {e}", mv.from.display());
            skipped.push(SkippedFile {
                path: mv.from.to_string_lossy().to_string(),
                reason: e.to_string(),
            });
            continue;
        }

        let to_name = mv
            .to
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let renamed = (to_name != mv.original_name).then_some(to_name.as_str());

        conn.execute_batch("BEGIN")?;
        let recorded = repository::mark_organized(
            conn,
            &mv.from.to_string_lossy(),
            &mv.to.to_string_lossy(),
            &to_name,
            renamed,
            mv.category,
        )
        .and_then(|_| {
            repository::append_activity(
                conn,
                &mv.original_name,
                renamed,
                mv.category.as_str(),
                true,
            )
        });
        match recorded {
            Ok(_) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }

        actions.push(MoveAction {
            from: mv.from.to_string_lossy().to_string(),
            to: mv.to.to_string_lossy().to_string(),
        });
    }

    for (path, name, category) in &plan.in_place {
        repository::mark_organized(conn, path, path, name, None, *category)?;
    }

    info!(
        organized = actions.len(),
        skipped = skipped.len(),
        "organize pass finished"
    );
    Ok(OrganizeOutcome {
        dry_run: false,
        organized_count: actions.len(),
        actions,
        skipped,
    })
}
