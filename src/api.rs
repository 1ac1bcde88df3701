//! Operations facade: every entry point a front end (here, the CLI) calls.
//! Each operation snapshots settings and rules at entry, so edits made while
//! a pass runs take effect on the next pass, not mid-flight.

use std::sync::atomic::Ordering;

use crate::data::repository;
use crate::error::AppError;
use crate::models::activity::ActivityEntry;
use crate::models::reports::{
    CleanupOutcome, DashboardStats, DuplicateGroup, FileListing, OrganizeOutcome, ScanReport,
    StorageInfo,
};
use crate::models::rules::{Category, OrganizationRules};
use crate::models::settings::Settings;
use crate::services::{
    cleanup_service, duplicate_service, organize_service, scan_service, stats_service,
    watch_service,
};
use crate::state::AppState;

pub fn get_dashboard_stats(state: &AppState) -> Result<DashboardStats, AppError> {
    let conn = state.conn();
    let rules = repository::load_rules(&conn)?;
    stats_service::dashboard_stats(&conn, &rules)
}

pub fn get_storage_info(state: &AppState) -> Result<StorageInfo, AppError> {
    stats_service::storage_info(&state.conn())
}

pub fn get_recent_activity(state: &AppState, limit: usize) -> Result<Vec<ActivityEntry>, AppError> {
    repository::recent_activity(&state.conn(), limit)
}

pub fn get_files(
    state: &AppState,
    category: Option<Category>,
    search: Option<&str>,
) -> Result<FileListing, AppError> {
    let conn = state.conn();
    let rules = repository::load_rules(&conn)?;
    stats_service::list_files(&conn, category, search, &rules)
}

/// Walks the downloads root and refreshes the index. Mutating: excluded
/// against organize apply and cleanup apply.
pub fn scan_files(state: &AppState) -> Result<ScanReport, AppError> {
    let _guard = state.try_apply_lock("scan")?;
    state.scan_cancel.store(false, Ordering::Relaxed);
    let conn = state.conn();
    let settings = repository::load_settings(&conn)?;
    scan_service::scan(&conn, &settings, &state.scan_cancel)
}

/// Asks a running scan to stop at the next entry boundary.
pub fn cancel_scan(state: &AppState) {
    state.scan_cancel.store(true, Ordering::Relaxed);
}

pub fn organize_files(state: &AppState, dry_run: bool) -> Result<OrganizeOutcome, AppError> {
    let _guard = if dry_run {
        None
    } else {
        Some(state.try_apply_lock("organize")?)
    };
    let conn = state.conn();
    let settings = repository::load_settings(&conn)?;
    let rules = repository::load_rules(&conn)?;
    organize_service::organize(&conn, &settings, &rules, dry_run)
}

pub fn run_cleanup(state: &AppState, dry_run: bool) -> Result<CleanupOutcome, AppError> {
    let _guard = if dry_run {
        None
    } else {
        Some(state.try_apply_lock("cleanup")?)
    };
    let conn = state.conn();
    let settings = repository::load_settings(&conn)?;
    let rules = repository::load_rules(&conn)?;
    cleanup_service::cleanup(&conn, &settings, &rules, dry_run)
}

pub fn find_duplicates(state: &AppState) -> Result<Vec<DuplicateGroup>, AppError> {
    duplicate_service::find_duplicates(&state.conn())
}

pub fn get_settings(state: &AppState) -> Result<Settings, AppError> {
    repository::load_settings(&state.conn())
}

pub fn update_settings(state: &AppState, settings: &Settings) -> Result<(), AppError> {
    settings.validate()?;
    repository::save_settings(&state.conn(), settings)
}

pub fn get_organization_rules(state: &AppState) -> Result<OrganizationRules, AppError> {
    repository::load_rules(&state.conn())
}

pub fn replace_organization_rules(
    state: &AppState,
    rules: &OrganizationRules,
) -> Result<(), AppError> {
    repository::replace_rules(&state.conn(), rules)
}

/// Starts the downloads watcher. At most one watcher per state.
pub fn start_watching(state: &AppState) -> Result<(), AppError> {
    let mut slot = match state.watcher.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if slot.is_some() {
        return Err(AppError::OperationInFlight(
            "watcher already running".to_string(),
        ));
    }
    let settings = repository::load_settings(&state.conn())?;
    let handle = watch_service::start_watching(state.db.clone(), settings)?;
    *slot = Some(handle);
    Ok(())
}

pub fn stop_watching(state: &AppState) {
    let mut slot = match state.watcher.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(handle) = slot.take() {
        watch_service::stop_watching(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &[u8])]) -> (AppState, TempDir) {
        let state = AppState::open_in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let settings = Settings {
            downloads_path: dir.path().to_string_lossy().to_string(),
            ..Settings::default()
        };
        update_settings(&state, &settings).unwrap();
        (state, dir)
    }

    #[test]
    fn test_scan_then_organize_end_to_end() {
        let (state, dir) = setup(&[("a.jpg", b"img"), ("b.pdf", b"doc")]);

        let report = scan_files(&state).unwrap();
        assert_eq!(report.files_found, 2);

        let preview = organize_files(&state, true).unwrap();
        assert_eq!(preview.organized_count, 2);
        assert!(dir.path().join("a.jpg").exists());

        let applied = organize_files(&state, false).unwrap();
        assert_eq!(applied.organized_count, 2);
        assert!(dir.path().join("Images/a.jpg").exists());
        assert!(dir.path().join("Documents/b.pdf").exists());

        let activity = get_recent_activity(&state, 10).unwrap();
        assert_eq!(activity.len(), 2);
    }

    #[test]
    fn test_stats_and_duplicates() {
        let (state, _dir) = setup(&[("a.bin", b"same"), ("b.bin", b"same")]);
        scan_files(&state).unwrap();

        let stats = get_dashboard_stats(&state).unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.duplicate_count, 1);

        let groups = find_duplicates(&state).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_update_settings_validates() {
        let (state, _dir) = setup(&[]);
        let mut bad = get_settings(&state).unwrap();
        bad.max_file_size_mb = 0;
        assert!(matches!(
            update_settings(&state, &bad),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_rules_edits_take_effect_next_pass() {
        let (state, dir) = setup(&[("notes.xyz", b"x")]);
        scan_files(&state).unwrap();

        let mut rules = get_organization_rules(&state).unwrap();
        rules.insert("xyz", Category::Documents);
        replace_organization_rules(&state, &rules).unwrap();

        organize_files(&state, false).unwrap();
        assert!(dir.path().join("Documents/notes.xyz").exists());
    }

    #[test]
    fn test_dry_run_does_not_take_apply_lock() {
        let (state, _dir) = setup(&[("a.jpg", b"1")]);
        scan_files(&state).unwrap();

        let _held = state.try_apply_lock("organize").unwrap();
        assert!(organize_files(&state, true).is_ok());
        assert!(matches!(
            organize_files(&state, false),
            Err(AppError::OperationInFlight(_))
        ));
    }
}
