use serde::{Deserialize, Serialize};

/// Append-only record of an organize or cleanup action. Entries are never
/// edited or deleted; ids are monotonic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub original_name: String,
    /// None when the file kept its name (no collision suffix was needed).
    pub new_name: Option<String>,
    pub category: String,
    pub created_at: String,
    /// True for organize moves, false for cleanup deletions and archival.
    pub is_organized: bool,
}
