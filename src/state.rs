use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use rusqlite::Connection;

use crate::data::{migrations, repository};
use crate::error::AppError;
use crate::services::watch_service::WatchHandle;

/// Shared handles for one open index.
///
/// All index access goes through the single connection behind `db`. Mutating
/// passes (scan, organize apply, cleanup apply) additionally take
/// `apply_lock` so at most one runs at a time; dry runs and reads don't.
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub db_path: PathBuf,
    apply_lock: Mutex<()>,
    pub scan_cancel: Arc<AtomicBool>,
    pub watcher: Mutex<Option<WatchHandle>>,
}

impl AppState {
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::run_migrations(&conn)?;
        repository::ensure_default_rules(&conn)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
            apply_lock: Mutex::new(()),
            scan_cancel: Arc::new(AtomicBool::new(false)),
            watcher: Mutex::new(None),
        })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        repository::ensure_default_rules(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
            apply_lock: Mutex::new(()),
            scan_cancel: Arc::new(AtomicBool::new(false)),
            watcher: Mutex::new(None),
        })
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.db.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claims the exclusive right to mutate. Fails fast instead of queueing:
    /// a second mutating pass reports what is already running.
    pub fn try_apply_lock(&self, what: &str) -> Result<MutexGuard<'_, ()>, AppError> {
        match self.apply_lock.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(AppError::OperationInFlight(format!(
                "another mutating operation is running, cannot start {what}"
            ))),
        }
    }
}
