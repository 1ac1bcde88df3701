use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Engine configuration. Loaded from the settings table and snapshotted at
/// the start of each operation; an in-flight scan or organize pass keeps the
/// settings version it started with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub downloads_path: String,
    /// Files larger than this are skipped by the scanner.
    pub max_file_size_mb: i64,
    /// Extension allow-list (lower-cased, no dot). Empty means all.
    pub supported_extensions: Vec<String>,
    pub cleanup_temp_files_days: i64,
    pub cleanup_old_files_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        let downloads_path = dirs::download_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        Self {
            downloads_path,
            max_file_size_mb: 100,
            supported_extensions: Vec::new(),
            cleanup_temp_files_days: 7,
            cleanup_old_files_days: 30,
        }
    }
}

impl Settings {
    /// Rejects invalid values outright; nothing is clamped.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.downloads_path.trim().is_empty() {
            return Err(AppError::Config("downloads_path must not be empty".into()));
        }
        if self.max_file_size_mb <= 0 {
            return Err(AppError::Config(format!(
                "max_file_size_mb must be positive, got {}",
                self.max_file_size_mb
            )));
        }
        if self.cleanup_temp_files_days < 0 {
            return Err(AppError::Config(format!(
                "cleanup_temp_files_days must not be negative, got {}",
                self.cleanup_temp_files_days
            )));
        }
        if self.cleanup_old_files_days < 0 {
            return Err(AppError::Config(format!(
                "cleanup_old_files_days must not be negative, got {}",
                self.cleanup_old_files_days
            )));
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> i64 {
        self.max_file_size_mb * 1_000_000
    }

    /// True when the extension passes the allow-list.
    pub fn extension_supported(&self, extension: Option<&str>) -> bool {
        if self.supported_extensions.is_empty() {
            return true;
        }
        match extension {
            Some(ext) => {
                let ext = ext.to_lowercase();
                self.supported_extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}
