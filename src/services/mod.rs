pub mod classify_service;
pub mod cleanup_service;
pub mod duplicate_service;
pub mod organize_service;
pub mod scan_service;
pub mod stats_service;
pub mod watch_service;
