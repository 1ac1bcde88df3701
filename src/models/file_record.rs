use serde::{Deserialize, Serialize};

use super::rules::Category;

/// One indexed file. `path` uniquely identifies a live filesystem entry;
/// records with no matching file after a completed scan are purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    /// Blake3 hex digest over the full content. Computed lazily; cleared by
    /// the scanner when size or modified time changes.
    pub content_hash: Option<String>,
    /// Cleared alongside the hash; recomputed from the rules on demand.
    pub category: Option<Category>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub is_organized: bool,
    pub original_name: String,
    pub new_name: Option<String>,
    pub last_seen_scan_id: Option<String>,
}
