pub mod activity;
pub mod file_record;
pub mod reports;
pub mod rules;
pub mod settings;
