pub mod api;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use error::AppError;
pub use state::AppState;
