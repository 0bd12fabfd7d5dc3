pub mod portfolios;
pub mod reports;
pub mod tags;
pub mod trades;

use std::sync::MutexGuard;

use rusqlite::Connection;

use crate::db::Database;
use crate::error::{JournalError, Result};

pub(crate) fn lock(db: &Database) -> Result<MutexGuard<'_, Connection>> {
    db.conn.lock().map_err(|_| JournalError::LockPoisoned)
}
