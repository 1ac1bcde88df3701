use std::collections::HashMap;

use chrono::{Duration, Utc};
use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::models::reports::{CategoryStat, DashboardStats, FileListing, StorageInfo};
use crate::models::rules::{Category, OrganizationRules};
use crate::services::classify_service;

const BYTES_PER_MB: f64 = 1_000_000.0;
const BYTES_PER_GB: f64 = 1_000_000_000.0;

/// Per-category counts over the whole index. Records without a stored
/// category are resolved in memory against the current rules; nothing is
/// written back, so stats stay a pure read. Categories with zero files are
/// omitted; ordering is count descending, name ascending on ties.
fn category_stats(
    conn: &Connection,
    rules: &OrganizationRules,
) -> Result<Vec<CategoryStat>, AppError> {
    let mut counts: HashMap<Category, i64> = HashMap::new();
    for (stored, extension) in repository::category_rows(conn)? {
        let category = stored
            .and_then(|c| c.parse::<Category>().ok())
            .unwrap_or_else(|| classify_service::classify(extension.as_deref(), rules));
        *counts.entry(category).or_insert(0) += 1;
    }

    let mut stats: Vec<CategoryStat> = counts
        .into_iter()
        .map(|(category, count)| CategoryStat {
            category: category.as_str().to_string(),
            count,
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));
    Ok(stats)
}

pub fn dashboard_stats(
    conn: &Connection,
    rules: &OrganizationRules,
) -> Result<DashboardStats, AppError> {
    let cutoff = (Utc::now() - Duration::hours(24)).to_rfc3339();
    Ok(DashboardStats {
        total_files: repository::count_files(conn)?,
        total_size_mb: repository::total_size_bytes(conn)? as f64 / BYTES_PER_MB,
        recent_files: repository::recent_count(conn, &cutoff)?,
        duplicate_count: crate::services::duplicate_service::duplicate_count(conn)?,
        category_stats: category_stats(conn, rules)?,
    })
}

pub fn storage_info(conn: &Connection) -> Result<StorageInfo, AppError> {
    let total_size_bytes = repository::total_size_bytes(conn)?;
    Ok(StorageInfo {
        total_size_bytes,
        total_size_mb: total_size_bytes as f64 / BYTES_PER_MB,
        total_size_gb: total_size_bytes as f64 / BYTES_PER_GB,
        file_count: repository::count_files(conn)?,
    })
}

/// Lists indexed files, optionally narrowed by category and a name search.
/// Returned records carry their effective category so callers see the same
/// classification the organizer would use.
pub fn list_files(
    conn: &Connection,
    category: Option<Category>,
    search: Option<&str>,
    rules: &OrganizationRules,
) -> Result<FileListing, AppError> {
    let mut files = repository::search_files(conn, search)?;
    for record in &mut files {
        record.category = Some(classify_service::classify_record(record, rules));
    }
    if let Some(wanted) = category {
        files.retain(|record| record.category == Some(wanted));
    }
    let total = files.len();
    Ok(FileListing { files, total })
}
