use serde::{Deserialize, Serialize};

use super::file_record::FileRecord;

/// Outcome of one scan pass over the downloads root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    /// Files on disk that passed the size and extension filters.
    pub files_found: usize,
    pub added: usize,
    pub updated: usize,
    /// Index rows purged because no matching file exists anymore.
    pub removed: usize,
    pub skipped_oversize: usize,
    pub skipped_unsupported: usize,
    /// True when the walk was cancelled; the purge pass is skipped so no
    /// record is wrongly removed.
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAction {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Result of an organize pass. Both the plan (dry run) and the apply report
/// successes and itemized failures; partial success is never reported as
/// full success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeOutcome {
    pub dry_run: bool,
    pub organized_count: usize,
    pub actions: Vec<MoveAction>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub dry_run: bool,
    pub deleted_count: usize,
    pub archived_count: usize,
    pub deleted: Vec<String>,
    pub archived: Vec<MoveAction>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_files: i64,
    pub total_size_mb: f64,
    /// Files created within the last 24 hours.
    pub recent_files: i64,
    pub duplicate_count: i64,
    /// Only categories with at least one file, descending by count.
    pub category_stats: Vec<CategoryStat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    pub total_size_bytes: i64,
    pub total_size_mb: f64,
    pub total_size_gb: f64,
    pub file_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListing {
    pub files: Vec<FileRecord>,
    pub total: usize,
}

/// Files sharing one content hash. Detection never deletes; which copy to
/// keep is an explicit follow-up decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub content_hash: String,
    pub files: Vec<FileRecord>,
}
