pub mod analytics;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use db::Database;
pub use error::{JournalError, Result};
