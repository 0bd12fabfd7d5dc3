use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Real,
    Demo,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Real => "REAL",
            AccountType::Demo => "DEMO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "REAL" => Some(AccountType::Real),
            "DEMO" => Some(AccountType::Demo),
            _ => None,
        }
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| AccountType::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

/// Currency is a display label only; no conversion is ever applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub initial_balance: f64,
    pub currency: String,
    pub account_type: AccountType,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Portfolio with figures recomputed from the trade ledger on every read.
/// `current_balance` is never served from a stored column, so it cannot
/// drift from the trades that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    pub current_balance: f64,
    pub trade_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePortfolioInput {
    pub name: String,
    pub description: Option<String>,
    pub initial_balance: f64,
    pub currency: Option<String>,
    pub account_type: Option<AccountType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePortfolioInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub initial_balance: Option<f64>,
    pub currency: Option<String>,
    pub account_type: Option<AccountType>,
}

/// Result of a bulk reassignment. `count == 0` is a valid outcome, not an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMoveResult {
    pub message: String,
    pub count: i64,
}
