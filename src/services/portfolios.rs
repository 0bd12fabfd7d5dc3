use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::analytics::{self, Statistics};
use crate::db::Database;
use crate::error::{JournalError, Result};
use crate::models::{
    AccountType, BulkMoveResult, CreatePortfolioInput, Portfolio, PortfolioSummary,
    UpdatePortfolioInput,
};
use crate::services::{lock, trades};

const PORTFOLIO_COLUMNS: &str =
    "id, user_id, name, description, initial_balance, currency, account_type, created_at, updated_at";

fn map_row_to_portfolio(row: &rusqlite::Row) -> rusqlite::Result<Portfolio> {
    Ok(Portfolio {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        initial_balance: row.get(4)?,
        currency: row.get(5)?,
        account_type: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Fetches a portfolio and enforces ownership, mirroring the trade lookup.
pub(crate) fn find_owned(conn: &Connection, user_id: &str, id: &str) -> Result<Portfolio> {
    let portfolio = conn
        .query_row(
            &format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE id = ?"),
            [id],
            map_row_to_portfolio,
        )
        .optional()?
        .ok_or(JournalError::NotFound("portfolio"))?;

    if portfolio.user_id != user_id {
        return Err(JournalError::Forbidden(
            "you do not have access to this portfolio".to_string(),
        ));
    }

    Ok(portfolio)
}

fn assigned_trade_count(conn: &Connection, portfolio_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trades WHERE portfolio_id = ?",
        [portfolio_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Balance and trade count are always derived from the ledger, never read
/// back from a stored column.
fn summarize_portfolio(conn: &Connection, portfolio: Portfolio) -> Result<PortfolioSummary> {
    let closed = trades::fetch_closed_valued(conn, &portfolio.user_id, Some(&portfolio.id))?;
    let current_balance = analytics::current_balance(portfolio.initial_balance, &closed);
    let trade_count = assigned_trade_count(conn, &portfolio.id)?;

    Ok(PortfolioSummary {
        portfolio,
        current_balance,
        trade_count,
    })
}

pub fn create_portfolio(
    db: &Database,
    user_id: &str,
    input: CreatePortfolioInput,
) -> Result<Portfolio> {
    if input.initial_balance < 0.0 {
        return Err(JournalError::InvalidInput(
            "initial balance cannot be negative".to_string(),
        ));
    }

    let conn = lock(db)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    conn.execute(
        "INSERT INTO portfolios (id, user_id, name, description, initial_balance, currency, account_type, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            user_id,
            input.name,
            input.description,
            input.initial_balance,
            input.currency.unwrap_or_else(|| "USD".to_string()),
            input.account_type.unwrap_or(AccountType::Demo),
            now,
            now
        ],
    )?;

    find_owned(&conn, user_id, &id)
}

pub fn get_portfolio(db: &Database, user_id: &str, id: &str) -> Result<PortfolioSummary> {
    let conn = lock(db)?;
    let portfolio = find_owned(&conn, user_id, id)?;
    summarize_portfolio(&conn, portfolio)
}

pub fn list_portfolios(
    db: &Database,
    user_id: &str,
    account_type: Option<AccountType>,
) -> Result<Vec<PortfolioSummary>> {
    let conn = lock(db)?;

    let mut query = format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE user_id = ?");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(at) = account_type {
        query.push_str(" AND account_type = ?");
        params.push(Box::new(at));
    }

    query.push_str(" ORDER BY created_at DESC");

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query)?;
    let portfolios = stmt
        .query_map(param_refs.as_slice(), map_row_to_portfolio)?
        .collect::<rusqlite::Result<Vec<Portfolio>>>()?;

    portfolios
        .into_iter()
        .map(|p| summarize_portfolio(&conn, p))
        .collect()
}

pub fn update_portfolio(
    db: &Database,
    user_id: &str,
    id: &str,
    patch: UpdatePortfolioInput,
) -> Result<Portfolio> {
    if matches!(patch.initial_balance, Some(b) if b < 0.0) {
        return Err(JournalError::InvalidInput(
            "initial balance cannot be negative".to_string(),
        ));
    }

    let conn = lock(db)?;
    find_owned(&conn, user_id, id)?;

    let mut updates = vec!["updated_at = ?"];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(Utc::now().timestamp())];

    if let Some(v) = &patch.name {
        updates.push("name = ?");
        values.push(Box::new(v.clone()));
    }
    if let Some(v) = &patch.description {
        updates.push("description = ?");
        values.push(Box::new(v.clone()));
    }
    if let Some(v) = patch.initial_balance {
        updates.push("initial_balance = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = &patch.currency {
        updates.push("currency = ?");
        values.push(Box::new(v.clone()));
    }
    if let Some(v) = patch.account_type {
        updates.push("account_type = ?");
        values.push(Box::new(v));
    }

    let query = format!("UPDATE portfolios SET {} WHERE id = ?", updates.join(", "));
    values.push(Box::new(id.to_string()));

    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&query, params.as_slice())?;

    find_owned(&conn, user_id, id)
}

/// Deleting a portfolio that still holds trades would silently orphan
/// financial records, so it fails with the offending count instead.
pub fn delete_portfolio(db: &Database, user_id: &str, id: &str) -> Result<()> {
    let conn = lock(db)?;
    find_owned(&conn, user_id, id)?;

    let count = assigned_trade_count(&conn, id)?;
    if count > 0 {
        return Err(JournalError::PortfolioNotEmpty { count });
    }

    conn.execute("DELETE FROM portfolios WHERE id = ?", [id])?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioStats {
    pub portfolio: PortfolioSummary,
    pub stats: Statistics,
}

pub fn portfolio_stats(db: &Database, user_id: &str, id: &str) -> Result<PortfolioStats> {
    let conn = lock(db)?;
    let portfolio = find_owned(&conn, user_id, id)?;
    let closed = trades::fetch_closed_valued(&conn, user_id, Some(id))?;
    let stats = analytics::summarize(&closed);
    let summary = summarize_portfolio(&conn, portfolio)?;

    Ok(PortfolioStats {
        portfolio: summary,
        stats,
    })
}

/// Contract B: relabel every trade in `from_id` to `to_id`. Pure
/// reassignment; no P&L changes. The UPDATE's change count is the returned
/// count, so read and write cannot disagree within one call.
pub fn move_trades(
    db: &Database,
    user_id: &str,
    from_id: &str,
    to_id: &str,
) -> Result<BulkMoveResult> {
    if from_id == to_id {
        return Err(JournalError::InvalidInput(
            "source and target portfolios are the same".to_string(),
        ));
    }

    let conn = lock(db)?;
    let from = find_owned(&conn, user_id, from_id)?;
    let to = find_owned(&conn, user_id, to_id)?;

    let moved = conn.execute(
        "UPDATE trades SET portfolio_id = ?, updated_at = ? WHERE user_id = ? AND portfolio_id = ?",
        rusqlite::params![to_id, Utc::now().timestamp(), user_id, from_id],
    )?;

    let message = if moved == 0 {
        "No trades to move".to_string()
    } else {
        format!("Moved {} trade(s) from {} to {}", moved, from.name, to.name)
    };

    log::info!(
        "moved {} trade(s) from portfolio {} to {}",
        moved,
        from_id,
        to_id
    );

    Ok(BulkMoveResult {
        message,
        count: moved as i64,
    })
}

/// Contract C: same as [`move_trades`] with "no portfolio" as the source.
pub fn assign_unassigned(db: &Database, user_id: &str, portfolio_id: &str) -> Result<BulkMoveResult> {
    let conn = lock(db)?;
    let portfolio = find_owned(&conn, user_id, portfolio_id)?;

    let assigned = conn.execute(
        "UPDATE trades SET portfolio_id = ?, updated_at = ? WHERE user_id = ? AND portfolio_id IS NULL",
        rusqlite::params![portfolio_id, Utc::now().timestamp(), user_id],
    )?;

    let message = if assigned == 0 {
        "No unassigned trades found".to_string()
    } else {
        format!("Assigned {} trade(s) to {}", assigned, portfolio.name)
    };

    Ok(BulkMoveResult {
        message,
        count: assigned as i64,
    })
}

pub fn unassigned_count(db: &Database, user_id: &str) -> Result<i64> {
    let conn = lock(db)?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trades WHERE user_id = ? AND portfolio_id IS NULL",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
