use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify_debouncer_mini::notify;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use rusqlite::Connection;
use tracing::warn;

use crate::data::repository;
use crate::error::AppError;
use crate::models::settings::Settings;
use crate::services::scan_service;

pub struct WatchHandle {
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Reconciles one changed path with the index, applying the same filters the
/// scanner does. A path that vanished, or no longer passes the filters,
/// loses its record.
pub fn process_event(conn: &Connection, settings: &Settings, path: &Path) {
    let path_str = path.to_string_lossy();
    if is_hidden(path) {
        return;
    }

    if !path.exists() {
        let _ = repository::delete_by_path(conn, &path_str);
        return;
    }
    if !path.is_file() {
        return;
    }

    let scan_id = uuid::Uuid::new_v4().to_string();
    let Some(record) = scan_service::record_from_path(path, &scan_id) else {
        return;
    };
    if record.size_bytes > settings.max_file_size_bytes()
        || !settings.extension_supported(record.extension.as_deref())
    {
        let _ = repository::delete_by_path(conn, &path_str);
        return;
    }
    if let Err(e) = repository::upsert_scanned(conn, &record) {
        warn!("watcher: could not upsert {path_str}: {e}");
    }
}

/// Watches the downloads root and keeps the index in step with filesystem
/// changes, debounced to 500ms. Dropping the handle stops the watcher.
pub fn start_watching(
    db: Arc<Mutex<Connection>>,
    settings: Settings,
) -> Result<WatchHandle, AppError> {
    let root = Path::new(&settings.downloads_path).to_path_buf();
    if !root.is_dir() {
        return Err(AppError::Watcher(format!(
            "not a directory: {}",
            settings.downloads_path
        )));
    }

    let db_clone = db.clone();
    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                let conn = match db_clone.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                for event in events {
                    if matches!(
                        event.kind,
                        DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                    ) {
                        process_event(&conn, &settings, &event.path);
                    }
                }
            }
            Err(e) => {
                warn!("watcher error: {e:?}");
            }
        },
    )
    .map_err(|e| AppError::Watcher(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&root, notify::RecursiveMode::Recursive)
        .map_err(|e| AppError::Watcher(e.to_string()))?;

    Ok(WatchHandle {
        _debouncer: debouncer,
    })
}

pub fn stop_watching(handle: WatchHandle) {
    drop(handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations::run_migrations;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (Arc<Mutex<Connection>>, TempDir, Settings) {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let dir = TempDir::new().unwrap();
        // canonicalize so stored paths match what the watcher reports
        let root = dir.path().canonicalize().unwrap();
        let settings = Settings {
            downloads_path: root.to_string_lossy().to_string(),
            ..Settings::default()
        };
        (Arc::new(Mutex::new(conn)), dir, settings)
    }

    fn poll_until<F>(db: &Arc<Mutex<Connection>>, timeout_ms: u64, check: F) -> bool
    where
        F: Fn(&Connection) -> bool,
    {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        while start.elapsed() < timeout {
            {
                let conn = db.lock().unwrap();
                if check(&conn) {
                    return true;
                }
            }
            thread::sleep(Duration::from_millis(100));
        }
        false
    }

    #[test]
    fn test_process_event_indexes_new_file() {
        let (db, dir, settings) = setup();
        let path = dir.path().join("new.pdf");
        fs::write(&path, b"doc").unwrap();

        let conn = db.lock().unwrap();
        process_event(&conn, &settings, &path);
        let record = repository::get_by_path(&conn, &path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(record.name, "new.pdf");
        assert!(!record.is_organized);
    }

    #[test]
    fn test_process_event_removes_vanished_file() {
        let (db, dir, settings) = setup();
        let path = dir.path().join("gone.pdf");
        fs::write(&path, b"doc").unwrap();

        let conn = db.lock().unwrap();
        process_event(&conn, &settings, &path);
        fs::remove_file(&path).unwrap();
        process_event(&conn, &settings, &path);

        assert!(repository::get_by_path(&conn, &path.to_string_lossy())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_process_event_honors_filters() {
        let (db, dir, mut settings) = setup();
        settings.supported_extensions = vec!["pdf".to_string()];
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"vid").unwrap();

        let conn = db.lock().unwrap();
        process_event(&conn, &settings, &path);
        assert!(repository::get_by_path(&conn, &path.to_string_lossy())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_watcher_detects_file_create() {
        let (db, _dir, settings) = setup();
        let root = Path::new(&settings.downloads_path).to_path_buf();
        let handle = start_watching(db.clone(), settings).unwrap();

        let path = root.join("watched.txt");
        fs::write(&path, b"hello").unwrap();

        let path_str = path.to_string_lossy().to_string();
        let found = poll_until(&db, 5000, |conn| {
            repository::get_by_path(conn, &path_str).unwrap().is_some()
        });

        stop_watching(handle);
        assert!(found, "watcher should index the created file");
    }

    #[test]
    fn test_watcher_invalid_directory() {
        let (db, _dir, mut settings) = setup();
        settings.downloads_path = "/nonexistent/downsort_watch".to_string();
        assert!(matches!(
            start_watching(db, settings),
            Err(AppError::Watcher(_))
        ));
    }
}
