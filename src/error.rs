use thiserror::Error;

/// Failures surfaced by the service layer. Aggregation over an empty trade
/// set is never an error; empty inputs resolve to zeroed results.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("cannot delete portfolio with {count} assigned trade(s); reassign or delete them first")]
    PortfolioNotEmpty { count: i64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, JournalError>;
