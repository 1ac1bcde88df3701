use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::activity::ActivityEntry;
use crate::models::file_record::FileRecord;
use crate::models::reports::DuplicateGroup;
use crate::models::rules::{Category, OrganizationRules};
use crate::models::settings::Settings;

const FILE_COLUMNS: &str = "path, name, extension, mime_type, size_bytes, content_hash, category,
     created_at, modified_at, is_organized, original_name, new_name, last_seen_scan_id";

fn map_file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let category: Option<String> = row.get(6)?;
    Ok(FileRecord {
        path: row.get(0)?,
        name: row.get(1)?,
        extension: row.get(2)?,
        mime_type: row.get(3)?,
        size_bytes: row.get(4)?,
        content_hash: row.get(5)?,
        category: category.and_then(|c| c.parse::<Category>().ok()),
        created_at: row.get(7)?,
        modified_at: row.get(8)?,
        is_organized: row.get(9)?,
        original_name: row.get(10)?,
        new_name: row.get(11)?,
        last_seen_scan_id: row.get(12)?,
    })
}

/// What an upsert during a scan did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Added,
    Updated,
    Unchanged,
}

/// Upserts a scanned file by path.
///
/// When `(size_bytes, modified_at)` matches the stored row, only the scan id
/// is refreshed and the lazily computed fields (hash, category) plus the
/// organization state survive. Otherwise the row is marked dirty: hash and
/// category are cleared for recomputation.
pub fn upsert_scanned(conn: &Connection, entry: &FileRecord) -> Result<UpsertKind, AppError> {
    let existing = get_by_path(conn, &entry.path)?;
    match existing {
        None => {
            conn.execute(
                "INSERT INTO files (path, name, extension, mime_type, size_bytes, content_hash,
                     category, created_at, modified_at, is_organized, original_name, new_name,
                     last_seen_scan_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?7, ?8, ?9, NULL, ?10)",
                params![
                    entry.path,
                    entry.name,
                    entry.extension,
                    entry.mime_type,
                    entry.size_bytes,
                    entry.created_at,
                    entry.modified_at,
                    entry.is_organized,
                    entry.original_name,
                    entry.last_seen_scan_id,
                ],
            )?;
            Ok(UpsertKind::Added)
        }
        Some(prev)
            if prev.size_bytes == entry.size_bytes && prev.modified_at == entry.modified_at =>
        {
            conn.execute(
                "UPDATE files SET last_seen_scan_id = ?1 WHERE path = ?2",
                params![entry.last_seen_scan_id, entry.path],
            )?;
            Ok(UpsertKind::Unchanged)
        }
        Some(_) => {
            conn.execute(
                "UPDATE files SET name = ?1, extension = ?2, mime_type = ?3, size_bytes = ?4,
                     content_hash = NULL, category = NULL, created_at = ?5, modified_at = ?6,
                     last_seen_scan_id = ?7
                 WHERE path = ?8",
                params![
                    entry.name,
                    entry.extension,
                    entry.mime_type,
                    entry.size_bytes,
                    entry.created_at,
                    entry.modified_at,
                    entry.last_seen_scan_id,
                    entry.path,
                ],
            )?;
            Ok(UpsertKind::Updated)
        }
    }
}

pub fn get_by_path(conn: &Connection, path: &str) -> Result<Option<FileRecord>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"
    ))?;
    let entry = stmt.query_row(params![path], map_file_row).optional()?;
    Ok(entry)
}

pub fn delete_by_path(conn: &Connection, path: &str) -> Result<usize, AppError> {
    let count = conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
    Ok(count)
}

/// Removes rows the given scan did not see. Only called after a scan walked
/// the whole tree; a cancelled scan must skip this.
pub fn purge_not_seen(conn: &Connection, scan_id: &str) -> Result<usize, AppError> {
    let count = conn.execute(
        "DELETE FROM files WHERE last_seen_scan_id IS NULL OR last_seen_scan_id != ?1",
        params![scan_id],
    )?;
    Ok(count)
}

pub fn list_all(conn: &Connection) -> Result<Vec<FileRecord>, AppError> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files ORDER BY path"))?;
    let entries = stmt
        .query_map([], map_file_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn search_files(conn: &Connection, search: Option<&str>) -> Result<Vec<FileRecord>, AppError> {
    match search {
        Some(term) if !term.trim().is_empty() => {
            let pattern = format!("%{}%", term.trim());
            let mut stmt = conn.prepare(&format!(
                "SELECT {FILE_COLUMNS} FROM files WHERE name LIKE ?1 ORDER BY path"
            ))?;
            let entries = stmt
                .query_map(params![pattern], map_file_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        }
        _ => list_all(conn),
    }
}

/// Records not yet organized, in deterministic (path) order — the plan order.
pub fn unorganized_files(conn: &Connection) -> Result<Vec<FileRecord>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE is_organized = 0 ORDER BY path"
    ))?;
    let entries = stmt
        .query_map([], map_file_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn unhashed_files(conn: &Connection) -> Result<Vec<FileRecord>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE content_hash IS NULL ORDER BY path"
    ))?;
    let entries = stmt
        .query_map([], map_file_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn set_content_hash(conn: &Connection, path: &str, hash: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE files SET content_hash = ?1 WHERE path = ?2",
        params![hash, path],
    )?;
    Ok(())
}

/// Finalizes an organize move: the record follows the file to its new path.
pub fn mark_organized(
    conn: &Connection,
    old_path: &str,
    new_path: &str,
    new_file_name: &str,
    renamed_to: Option<&str>,
    category: Category,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE files SET path = ?1, name = ?2, new_name = ?3, category = ?4, is_organized = 1
         WHERE path = ?5",
        params![new_path, new_file_name, renamed_to, category.as_str(), old_path],
    )?;
    Ok(())
}

/// Follows an archival move without touching the organization flag.
pub fn update_path(
    conn: &Connection,
    old_path: &str,
    new_path: &str,
    new_file_name: &str,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE files SET path = ?1, name = ?2 WHERE path = ?3",
        params![new_path, new_file_name, old_path],
    )?;
    Ok(())
}

pub fn count_files(conn: &Connection) -> Result<i64, AppError> {
    let count = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
    Ok(count)
}

pub fn total_size_bytes(conn: &Connection) -> Result<i64, AppError> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(size_bytes), 0) FROM files",
        [],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Files created at or after the cutoff (RFC 3339; lexical compare is safe
/// because every stored timestamp uses the same UTC format).
pub fn recent_count(conn: &Connection, cutoff_rfc3339: &str) -> Result<i64, AppError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM files WHERE created_at >= ?1",
        params![cutoff_rfc3339],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// `(category, extension)` pairs for in-memory aggregation; NULL categories
/// are resolved lazily by the caller against the current rules.
pub fn category_rows(conn: &Connection) -> Result<Vec<(Option<String>, Option<String>)>, AppError> {
    let mut stmt = conn.prepare("SELECT category, extension FROM files")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `(hashed_files, distinct_hashes)` — the duplicate count is their difference.
pub fn hash_counts(conn: &Connection) -> Result<(i64, i64), AppError> {
    let counts = conn.query_row(
        "SELECT COUNT(content_hash), COUNT(DISTINCT content_hash)
         FROM files WHERE content_hash IS NOT NULL",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(counts)
}

pub fn duplicate_groups(conn: &Connection) -> Result<Vec<DuplicateGroup>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_COLUMNS} FROM files
         WHERE content_hash IN (
             SELECT content_hash FROM files
             WHERE content_hash IS NOT NULL
             GROUP BY content_hash HAVING COUNT(*) > 1
         )
         ORDER BY content_hash, path"
    ))?;
    let entries = stmt
        .query_map([], map_file_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for entry in entries {
        let hash = entry.content_hash.clone().unwrap_or_default();
        match groups.last_mut() {
            Some(group) if group.content_hash == hash => group.files.push(entry),
            _ => groups.push(DuplicateGroup {
                content_hash: hash,
                files: vec![entry],
            }),
        }
    }
    Ok(groups)
}

pub fn append_activity(
    conn: &Connection,
    original_name: &str,
    new_name: Option<&str>,
    category: &str,
    is_organized: bool,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO activity_log (original_name, new_name, category, created_at, is_organized)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            original_name,
            new_name,
            category,
            chrono::Utc::now().to_rfc3339(),
            is_organized,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn recent_activity(conn: &Connection, limit: usize) -> Result<Vec<ActivityEntry>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, original_name, new_name, category, created_at, is_organized
         FROM activity_log ORDER BY id DESC LIMIT ?1",
    )?;
    let entries = stmt
        .query_map(params![limit as i64], |row| {
            Ok(ActivityEntry {
                id: row.get(0)?,
                original_name: row.get(1)?,
                new_name: row.get(2)?,
                category: row.get(3)?,
                created_at: row.get(4)?,
                is_organized: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
    let value = stmt
        .query_row(params![key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn load_settings(conn: &Connection) -> Result<Settings, AppError> {
    let defaults = Settings::default();
    let downloads_path =
        get_setting(conn, "downloads_path")?.unwrap_or(defaults.downloads_path);
    let max_file_size_mb = get_setting(conn, "max_file_size_mb")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.max_file_size_mb);
    let supported_extensions = match get_setting(conn, "supported_extensions")? {
        Some(json) => serde_json::from_str(&json)?,
        None => defaults.supported_extensions,
    };
    let cleanup_temp_files_days = get_setting(conn, "cleanup_temp_files_days")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.cleanup_temp_files_days);
    let cleanup_old_files_days = get_setting(conn, "cleanup_old_files_days")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.cleanup_old_files_days);

    Ok(Settings {
        downloads_path,
        max_file_size_mb,
        supported_extensions,
        cleanup_temp_files_days,
        cleanup_old_files_days,
    })
}

pub fn save_settings(conn: &Connection, settings: &Settings) -> Result<(), AppError> {
    set_setting(conn, "downloads_path", &settings.downloads_path)?;
    set_setting(
        conn,
        "max_file_size_mb",
        &settings.max_file_size_mb.to_string(),
    )?;
    set_setting(
        conn,
        "supported_extensions",
        &serde_json::to_string(&settings.supported_extensions)?,
    )?;
    set_setting(
        conn,
        "cleanup_temp_files_days",
        &settings.cleanup_temp_files_days.to_string(),
    )?;
    set_setting(
        conn,
        "cleanup_old_files_days",
        &settings.cleanup_old_files_days.to_string(),
    )?;
    Ok(())
}

pub fn load_rules(conn: &Connection) -> Result<OrganizationRules, AppError> {
    let mut stmt =
        conn.prepare("SELECT extension, category FROM organization_rules ORDER BY position")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rules = OrganizationRules::new();
    for (extension, category) in rows {
        if let Ok(category) = category.parse::<Category>() {
            rules.insert(&extension, category);
        }
    }
    Ok(rules)
}

pub fn replace_rules(conn: &Connection, rules: &OrganizationRules) -> Result<(), AppError> {
    conn.execute_batch("BEGIN")?;
    let result = (|| -> Result<(), AppError> {
        conn.execute("DELETE FROM organization_rules", [])?;
        for (position, (extension, category)) in rules.entries().enumerate() {
            conn.execute(
                "INSERT INTO organization_rules (extension, category, position)
                 VALUES (?1, ?2, ?3)",
                params![extension, category.as_str(), position as i64],
            )?;
        }
        Ok(())
    })();
    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Seeds the stock rule set on first run; never overwrites edited rules.
pub fn ensure_default_rules(conn: &Connection) -> Result<(), AppError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM organization_rules", [], |row| {
        row.get(0)
    })?;
    if count == 0 {
        replace_rules(conn, &OrganizationRules::defaults())?;
    }
    Ok(())
}

// Needed for rusqlite optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn sample_file(path: &str, size: i64) -> FileRecord {
        let name = path.rsplit('/').next().unwrap().to_string();
        FileRecord {
            path: path.to_string(),
            name: name.clone(),
            extension: name.rsplit_once('.').map(|(_, e)| e.to_lowercase()),
            mime_type: None,
            size_bytes: size,
            content_hash: None,
            category: None,
            created_at: Some("2025-01-01T00:00:00+00:00".to_string()),
            modified_at: Some("2025-01-02T00:00:00+00:00".to_string()),
            is_organized: false,
            original_name: name,
            new_name: None,
            last_seen_scan_id: Some("scan-1".to_string()),
        }
    }

    #[test]
    fn test_upsert_preserves_lazy_fields_when_unchanged() {
        let conn = setup_db();
        let file = sample_file("/dl/report.pdf", 1024);

        assert_eq!(upsert_scanned(&conn, &file).unwrap(), UpsertKind::Added);
        set_content_hash(&conn, &file.path, "abc123").unwrap();

        // same size + mtime, new scan id
        let mut rescan = file.clone();
        rescan.last_seen_scan_id = Some("scan-2".to_string());
        assert_eq!(
            upsert_scanned(&conn, &rescan).unwrap(),
            UpsertKind::Unchanged
        );

        let fetched = get_by_path(&conn, &file.path).unwrap().unwrap();
        assert_eq!(fetched.content_hash.as_deref(), Some("abc123"));
        assert_eq!(fetched.last_seen_scan_id.as_deref(), Some("scan-2"));
    }

    #[test]
    fn test_upsert_clears_hash_on_change() {
        let conn = setup_db();
        let file = sample_file("/dl/report.pdf", 1024);
        upsert_scanned(&conn, &file).unwrap();
        set_content_hash(&conn, &file.path, "abc123").unwrap();

        let mut changed = file.clone();
        changed.size_bytes = 2048;
        changed.last_seen_scan_id = Some("scan-2".to_string());
        assert_eq!(upsert_scanned(&conn, &changed).unwrap(), UpsertKind::Updated);

        let fetched = get_by_path(&conn, &file.path).unwrap().unwrap();
        assert_eq!(fetched.content_hash, None);
        assert_eq!(fetched.size_bytes, 2048);
    }

    #[test]
    fn test_purge_not_seen() {
        let conn = setup_db();
        upsert_scanned(&conn, &sample_file("/dl/a.txt", 1)).unwrap();
        let mut seen = sample_file("/dl/b.txt", 1);
        seen.last_seen_scan_id = Some("scan-2".to_string());
        upsert_scanned(&conn, &seen).unwrap();

        let removed = purge_not_seen(&conn, "scan-2").unwrap();
        assert_eq!(removed, 1);
        assert!(get_by_path(&conn, "/dl/a.txt").unwrap().is_none());
        assert!(get_by_path(&conn, "/dl/b.txt").unwrap().is_some());
    }

    #[test]
    fn test_mark_organized_moves_record() {
        let conn = setup_db();
        let file = sample_file("/dl/cat.jpg", 10);
        upsert_scanned(&conn, &file).unwrap();

        mark_organized(
            &conn,
            "/dl/cat.jpg",
            "/dl/Images/cat.jpg",
            "cat.jpg",
            None,
            Category::Images,
        )
        .unwrap();

        assert!(get_by_path(&conn, "/dl/cat.jpg").unwrap().is_none());
        let moved = get_by_path(&conn, "/dl/Images/cat.jpg").unwrap().unwrap();
        assert!(moved.is_organized);
        assert_eq!(moved.category, Some(Category::Images));
        assert_eq!(moved.new_name, None);
        assert_eq!(moved.original_name, "cat.jpg");
    }

    #[test]
    fn test_duplicate_groups_and_counts() {
        let conn = setup_db();
        for (path, hash) in [
            ("/dl/a.bin", "h1"),
            ("/dl/b.bin", "h1"),
            ("/dl/c.bin", "h1"),
            ("/dl/d.bin", "h2"),
        ] {
            upsert_scanned(&conn, &sample_file(path, 5)).unwrap();
            set_content_hash(&conn, path, hash).unwrap();
        }

        let (hashed, distinct) = hash_counts(&conn).unwrap();
        assert_eq!(hashed - distinct, 2);

        let groups = duplicate_groups(&conn).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].content_hash, "h1");
        assert_eq!(groups[0].files.len(), 3);
    }

    #[test]
    fn test_activity_append_only_monotonic() {
        let conn = setup_db();
        let a = append_activity(&conn, "a.pdf", None, "Documents", true).unwrap();
        let b = append_activity(&conn, "b.jpg", Some("b_1.jpg"), "Images", true).unwrap();
        assert!(b > a);

        let recent = recent_activity(&conn, 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].original_name, "b.jpg"); // newest first
        assert_eq!(recent[0].new_name.as_deref(), Some("b_1.jpg"));
    }

    #[test]
    fn test_settings_round_trip() {
        let conn = setup_db();
        let settings = Settings {
            downloads_path: "/dl".to_string(),
            max_file_size_mb: 50,
            supported_extensions: vec!["pdf".to_string(), "jpg".to_string()],
            cleanup_temp_files_days: 3,
            cleanup_old_files_days: 60,
        };
        save_settings(&conn, &settings).unwrap();
        let loaded = load_settings(&conn).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_rules_round_trip_and_seed() {
        let conn = setup_db();
        assert!(load_rules(&conn).unwrap().is_empty());

        ensure_default_rules(&conn).unwrap();
        let loaded = load_rules(&conn).unwrap();
        assert_eq!(loaded, OrganizationRules::defaults());

        // seeding again must not clobber edits
        let mut edited = loaded.clone();
        edited.insert("csv", Category::Other);
        replace_rules(&conn, &edited).unwrap();
        ensure_default_rules(&conn).unwrap();
        assert_eq!(load_rules(&conn).unwrap(), edited);
    }
}
