use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::analytics::{self, valuation::PnlInputs, Statistics};
use crate::db::Database;
use crate::error::{JournalError, Result};
use crate::models::{
    CreateTradeInput, Profitability, Trade, TradeFilters, TradeStatus, UpdateTradeInput,
};
use crate::services::{lock, portfolios, tags};

const TRADE_COLUMNS: &str = "id, user_id, portfolio_id, symbol, side, status, entry_price, \
     exit_price, quantity, stop_loss, take_profit, commission, swap, entry_date, exit_date, \
     gross_pnl, net_pnl, notes, strategy, timeframe, created_at, updated_at";

fn map_row_to_trade(row: &rusqlite::Row) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        user_id: row.get(1)?,
        portfolio_id: row.get(2)?,
        symbol: row.get(3)?,
        side: row.get(4)?,
        status: row.get(5)?,
        entry_price: row.get(6)?,
        exit_price: row.get(7)?,
        quantity: row.get(8)?,
        stop_loss: row.get(9)?,
        take_profit: row.get(10)?,
        commission: row.get(11)?,
        swap: row.get(12)?,
        entry_date: row.get(13)?,
        exit_date: row.get(14)?,
        gross_pnl: row.get(15)?,
        net_pnl: row.get(16)?,
        notes: row.get(17)?,
        strategy: row.get(18)?,
        timeframe: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

/// Fetches a trade and enforces ownership: a missing row is `NotFound`, a
/// row belonging to someone else is `Forbidden`.
pub(crate) fn get_by_id(conn: &Connection, user_id: &str, id: &str) -> Result<Trade> {
    let trade = conn
        .query_row(
            &format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = ?"),
            [id],
            map_row_to_trade,
        )
        .optional()?
        .ok_or(JournalError::NotFound("trade"))?;

    if trade.user_id != user_id {
        return Err(JournalError::Forbidden(
            "you do not have access to this trade".to_string(),
        ));
    }

    Ok(trade)
}

/// The snapshot every aggregate runs on: the user's closed trades with a
/// cached net P&L, optionally narrowed to one portfolio.
pub(crate) fn fetch_closed_valued(
    conn: &Connection,
    user_id: &str,
    portfolio_id: Option<&str>,
) -> Result<Vec<Trade>> {
    let mut query = format!(
        "SELECT {TRADE_COLUMNS} FROM trades \
         WHERE user_id = ? AND status = 'CLOSED' AND net_pnl IS NOT NULL"
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(pid) = portfolio_id {
        query.push_str(" AND portfolio_id = ?");
        params.push(Box::new(pid.to_string()));
    }

    query.push_str(" ORDER BY exit_date ASC, id ASC");

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query)?;
    let trades = stmt
        .query_map(param_refs.as_slice(), map_row_to_trade)?
        .collect::<rusqlite::Result<Vec<Trade>>>()?;

    Ok(trades)
}

pub fn create_trade(db: &Database, user_id: &str, input: CreateTradeInput) -> Result<Trade> {
    if input.quantity <= 0.0 {
        return Err(JournalError::InvalidInput(
            "quantity must be positive".to_string(),
        ));
    }
    if input.entry_price <= 0.0 {
        return Err(JournalError::InvalidInput(
            "entry price must be positive".to_string(),
        ));
    }

    // Aggregates key closed trades on exit_date; a closed trade without one
    // would count in totals but vanish from every time series.
    let status = input.status.unwrap_or(TradeStatus::Open);
    if status == TradeStatus::Closed && input.exit_date.is_none() {
        return Err(JournalError::InvalidInput(
            "a closed trade requires an exit date".to_string(),
        ));
    }

    let conn = lock(db)?;

    if let Some(pid) = &input.portfolio_id {
        portfolios::find_owned(&conn, user_id, pid)?;
    }

    // P&L is cached at write time so aggregate reads never redo arithmetic
    let valuation = analytics::valuate(&PnlInputs {
        side: input.side,
        entry_price: input.entry_price,
        exit_price: input.exit_price,
        quantity: input.quantity,
        commission: input.commission.unwrap_or(0.0),
        swap: input.swap.unwrap_or(0.0),
        broker_net: input.net_pnl,
        broker_gross: input.gross_pnl,
    });

    let id = format!(
        "TRADE-{}-{}",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4()
    );
    let now = Utc::now().timestamp();

    conn.execute(
        "INSERT INTO trades (
            id, user_id, portfolio_id, symbol, side, status,
            entry_price, exit_price, quantity, stop_loss, take_profit,
            commission, swap, entry_date, exit_date, gross_pnl, net_pnl,
            notes, strategy, timeframe, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            user_id,
            input.portfolio_id,
            input.symbol,
            input.side,
            status,
            input.entry_price,
            input.exit_price,
            input.quantity,
            input.stop_loss,
            input.take_profit,
            input.commission.unwrap_or(0.0),
            input.swap.unwrap_or(0.0),
            input.entry_date,
            input.exit_date,
            valuation.map(|v| v.gross_pnl),
            valuation.map(|v| v.net_pnl),
            input.notes.unwrap_or_default(),
            input.strategy,
            input.timeframe,
            now,
            now
        ],
    )?;

    if let Some(tag_ids) = &input.tag_ids {
        tags::set_for_trade(&conn, user_id, &id, tag_ids)?;
    }

    get_by_id(&conn, user_id, &id)
}

pub fn get_trade(db: &Database, user_id: &str, id: &str) -> Result<Trade> {
    let conn = lock(db)?;
    get_by_id(&conn, user_id, id)
}

pub fn list_trades(db: &Database, user_id: &str, filters: &TradeFilters) -> Result<Vec<Trade>> {
    let conn = lock(db)?;

    let mut query = format!("SELECT {TRADE_COLUMNS} FROM trades WHERE user_id = ?");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(symbol) = &filters.symbol {
        query.push_str(" AND symbol LIKE ?");
        params.push(Box::new(format!("%{}%", symbol)));
    }
    if let Some(side) = filters.side {
        query.push_str(" AND side = ?");
        params.push(Box::new(side));
    }
    if let Some(status) = filters.status {
        query.push_str(" AND status = ?");
        params.push(Box::new(status));
    }
    if let Some(pid) = &filters.portfolio_id {
        query.push_str(" AND portfolio_id = ?");
        params.push(Box::new(pid.clone()));
    }
    match filters.profitability {
        Some(Profitability::Winning) => query.push_str(" AND net_pnl > 0"),
        Some(Profitability::Losing) => query.push_str(" AND net_pnl < 0"),
        None => {}
    }
    if let Some(start_date) = filters.start_date {
        query.push_str(" AND entry_date >= ?");
        params.push(Box::new(start_date));
    }
    if let Some(end_date) = filters.end_date {
        query.push_str(" AND entry_date <= ?");
        params.push(Box::new(end_date));
    }

    query.push_str(" ORDER BY entry_date DESC");

    if let (Some(page), Some(limit)) = (filters.page, filters.limit) {
        let offset = (page.max(1) - 1) * limit;
        query.push_str(" LIMIT ? OFFSET ?");
        params.push(Box::new(limit));
        params.push(Box::new(offset));
    }

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query)?;
    let trades = stmt
        .query_map(param_refs.as_slice(), map_row_to_trade)?
        .collect::<rusqlite::Result<Vec<Trade>>>()?;

    Ok(trades)
}

pub fn update_trade(
    db: &Database,
    user_id: &str,
    id: &str,
    patch: UpdateTradeInput,
) -> Result<Trade> {
    if matches!(patch.quantity, Some(q) if q <= 0.0) {
        return Err(JournalError::InvalidInput(
            "quantity must be positive".to_string(),
        ));
    }
    if matches!(patch.entry_price, Some(p) if p <= 0.0) {
        return Err(JournalError::InvalidInput(
            "entry price must be positive".to_string(),
        ));
    }

    let conn = lock(db)?;
    let current = get_by_id(&conn, user_id, id)?;

    let status = patch.status.unwrap_or(current.status);
    if status == TradeStatus::Closed && patch.exit_date.or(current.exit_date).is_none() {
        return Err(JournalError::InvalidInput(
            "a closed trade requires an exit date".to_string(),
        ));
    }

    if let Some(Some(pid)) = &patch.portfolio_id {
        portfolios::find_owned(&conn, user_id, pid)?;
    }

    let revalue = patch.side.is_some()
        || patch.entry_price.is_some()
        || patch.exit_price.is_some()
        || patch.quantity.is_some()
        || patch.commission.is_some()
        || patch.swap.is_some()
        || patch.net_pnl.is_some()
        || patch.gross_pnl.is_some();

    let mut updates = vec!["updated_at = ?"];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(Utc::now().timestamp())];

    if let Some(v) = &patch.symbol {
        updates.push("symbol = ?");
        values.push(Box::new(v.clone()));
    }
    if let Some(v) = patch.side {
        updates.push("side = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.status {
        updates.push("status = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.entry_price {
        updates.push("entry_price = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.entry_date {
        updates.push("entry_date = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.quantity {
        updates.push("quantity = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.exit_price {
        updates.push("exit_price = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.exit_date {
        updates.push("exit_date = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.stop_loss {
        updates.push("stop_loss = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.take_profit {
        updates.push("take_profit = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.commission {
        updates.push("commission = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = patch.swap {
        updates.push("swap = ?");
        values.push(Box::new(v));
    }
    if let Some(v) = &patch.notes {
        updates.push("notes = ?");
        values.push(Box::new(v.clone()));
    }
    if let Some(v) = &patch.strategy {
        updates.push("strategy = ?");
        values.push(Box::new(v.clone()));
    }
    if let Some(v) = &patch.timeframe {
        updates.push("timeframe = ?");
        values.push(Box::new(v.clone()));
    }
    if let Some(v) = &patch.portfolio_id {
        // Option<String> binds NULL for a detach
        updates.push("portfolio_id = ?");
        values.push(Box::new(v.clone()));
    }

    if revalue {
        // A partial payload fills its gaps from the stored row. An explicit
        // broker net P&L in the patch wins over the price formula.
        let valuation = analytics::valuate(&PnlInputs {
            side: patch.side.unwrap_or(current.side),
            entry_price: patch.entry_price.unwrap_or(current.entry_price),
            exit_price: patch.exit_price.or(current.exit_price),
            quantity: patch.quantity.unwrap_or(current.quantity),
            commission: patch.commission.unwrap_or(current.commission),
            swap: patch.swap.unwrap_or(current.swap),
            broker_net: patch.net_pnl,
            broker_gross: patch.gross_pnl,
        });

        if let Some(v) = valuation {
            updates.push("gross_pnl = ?");
            values.push(Box::new(v.gross_pnl));
            updates.push("net_pnl = ?");
            values.push(Box::new(v.net_pnl));
        }
    }

    let query = format!("UPDATE trades SET {} WHERE id = ?", updates.join(", "));
    values.push(Box::new(id.to_string()));

    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&query, params.as_slice())?;

    if let Some(tag_ids) = &patch.tag_ids {
        tags::set_for_trade(&conn, user_id, id, tag_ids)?;
    }

    get_by_id(&conn, user_id, id)
}

/// Hard delete. Live balance queries reflect the removal on their next
/// read; nothing is recomputed here.
pub fn delete_trade(db: &Database, user_id: &str, id: &str) -> Result<()> {
    let conn = lock(db)?;
    get_by_id(&conn, user_id, id)?;
    conn.execute("DELETE FROM trades WHERE id = ?", [id])?;
    Ok(())
}

pub fn statistics(
    db: &Database,
    user_id: &str,
    portfolio_id: Option<&str>,
) -> Result<Statistics> {
    let conn = lock(db)?;
    let trades = fetch_closed_valued(&conn, user_id, portfolio_id)?;
    Ok(analytics::summarize(&trades))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeSide;

    fn base_input() -> CreateTradeInput {
        CreateTradeInput {
            symbol: "BTC/USDT".to_string(),
            side: TradeSide::Long,
            status: Some(TradeStatus::Closed),
            entry_price: 45_000.0,
            entry_date: 1_700_000_000,
            quantity: 0.1,
            exit_price: Some(46_500.0),
            exit_date: Some(1_700_050_000),
            stop_loss: None,
            take_profit: None,
            commission: Some(10.0),
            swap: None,
            gross_pnl: None,
            net_pnl: None,
            notes: None,
            strategy: None,
            timeframe: None,
            portfolio_id: None,
            tag_ids: None,
        }
    }

    #[test]
    fn create_caches_pnl_at_write_time() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(&db, "user-1", base_input()).unwrap();
        assert!((trade.gross_pnl.unwrap() - 150.0).abs() < 1e-9);
        assert!((trade.net_pnl.unwrap() - 140.0).abs() < 1e-9);
        assert_eq!(trade.status, TradeStatus::Closed);
    }

    #[test]
    fn open_trade_has_no_pnl() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                status: None,
                exit_price: None,
                exit_date: None,
                commission: None,
                ..base_input()
            },
        )
        .unwrap();
        assert_eq!(trade.status, TradeStatus::Open);
        assert!(trade.gross_pnl.is_none());
        assert!(trade.net_pnl.is_none());
    }

    #[test]
    fn broker_net_overrides_price_formula() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                net_pnl: Some(99.5),
                ..base_input()
            },
        )
        .unwrap();
        assert_eq!(trade.net_pnl, Some(99.5));
        assert_eq!(trade.gross_pnl, Some(99.5));
    }

    #[test]
    fn nonpositive_quantity_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                quantity: 0.0,
                ..base_input()
            },
        )
        .unwrap_err();
        assert!(matches!(err, JournalError::InvalidInput(_)));
    }

    #[test]
    fn closed_trade_without_exit_date_is_rejected() {
        let db = Database::open_in_memory().unwrap();

        // Broker-valued but undated: would count in totals yet vanish from
        // the equity curve.
        let err = create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                exit_price: None,
                exit_date: None,
                net_pnl: Some(100.0),
                ..base_input()
            },
        )
        .unwrap_err();
        assert!(matches!(err, JournalError::InvalidInput(_)));

        // Same rule when closing through an update
        let open = create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                status: None,
                exit_price: None,
                exit_date: None,
                ..base_input()
            },
        )
        .unwrap();
        let err = update_trade(
            &db,
            "user-1",
            &open.id,
            UpdateTradeInput {
                status: Some(TradeStatus::Closed),
                net_pnl: Some(100.0),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, JournalError::InvalidInput(_)));

        // With the exit date supplied the close goes through
        let closed = update_trade(
            &db,
            "user-1",
            &open.id,
            UpdateTradeInput {
                status: Some(TradeStatus::Closed),
                exit_date: Some(1_700_050_000),
                net_pnl: Some(100.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.net_pnl, Some(100.0));
    }

    #[test]
    fn update_can_detach_a_trade_from_its_portfolio() {
        use crate::models::CreatePortfolioInput;
        use crate::services::portfolios::{create_portfolio, delete_portfolio};

        let db = Database::open_in_memory().unwrap();
        let p = create_portfolio(
            &db,
            "user-1",
            CreatePortfolioInput {
                name: "Main".to_string(),
                description: None,
                initial_balance: 0.0,
                currency: None,
                account_type: None,
            },
        )
        .unwrap();

        let trade = create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                portfolio_id: Some(p.id.clone()),
                ..base_input()
            },
        )
        .unwrap();
        assert_eq!(trade.portfolio_id.as_deref(), Some(p.id.as_str()));

        let detached = update_trade(
            &db,
            "user-1",
            &trade.id,
            UpdateTradeInput {
                portfolio_id: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(detached.portfolio_id.is_none());

        // Emptied by the detach, so the delete guard no longer fires
        delete_portfolio(&db, "user-1", &p.id).unwrap();
    }

    #[test]
    fn other_users_trades_are_forbidden() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(&db, "user-1", base_input()).unwrap();
        assert!(matches!(
            get_trade(&db, "user-2", &trade.id),
            Err(JournalError::Forbidden(_))
        ));
        assert!(matches!(
            get_trade(&db, "user-1", "TRADE-missing"),
            Err(JournalError::NotFound(_))
        ));
    }

    #[test]
    fn partial_update_revalues_from_stored_fields() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(&db, "user-1", base_input()).unwrap();

        // Only the exit price changes; entry/quantity/commission come from
        // the stored row.
        let updated = update_trade(
            &db,
            "user-1",
            &trade.id,
            UpdateTradeInput {
                exit_price: Some(44_000.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert!((updated.gross_pnl.unwrap() - -100.0).abs() < 1e-9);
        assert!((updated.net_pnl.unwrap() - -110.0).abs() < 1e-9);
    }

    #[test]
    fn update_with_broker_net_skips_price_formula() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(&db, "user-1", base_input()).unwrap();
        let updated = update_trade(
            &db,
            "user-1",
            &trade.id,
            UpdateTradeInput {
                net_pnl: Some(1_234.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.net_pnl, Some(1_234.0));
    }

    #[test]
    fn non_pnl_update_leaves_valuation_alone() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(&db, "user-1", base_input()).unwrap();
        let updated = update_trade(
            &db,
            "user-1",
            &trade.id,
            UpdateTradeInput {
                notes: Some("late entry".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.net_pnl, trade.net_pnl);
        assert_eq!(updated.notes, "late entry");
    }

    #[test]
    fn filters_narrow_the_listing() {
        let db = Database::open_in_memory().unwrap();
        create_trade(&db, "user-1", base_input()).unwrap();
        create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                symbol: "ETH/USDT".to_string(),
                side: TradeSide::Short,
                exit_price: Some(46_000.0),
                ..base_input()
            },
        )
        .unwrap();

        let all = list_trades(&db, "user-1", &TradeFilters::default()).unwrap();
        assert_eq!(all.len(), 2);

        let eth = list_trades(
            &db,
            "user-1",
            &TradeFilters {
                symbol: Some("ETH".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(eth.len(), 1);
        assert_eq!(eth[0].symbol, "ETH/USDT");

        let winners = list_trades(
            &db,
            "user-1",
            &TradeFilters {
                profitability: Some(Profitability::Winning),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].side, TradeSide::Long);

        let none = list_trades(&db, "user-2", &TradeFilters::default()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn statistics_cover_only_closed_valued_trades() {
        let db = Database::open_in_memory().unwrap();
        create_trade(&db, "user-1", base_input()).unwrap();
        create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                status: None,
                exit_price: None,
                exit_date: None,
                ..base_input()
            },
        )
        .unwrap();

        let stats = statistics(&db, "user-1", None).unwrap();
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.winning_trades, 1);
        assert!((stats.total_profit_loss - 140.0).abs() < 1e-9);
    }

    #[test]
    fn delete_removes_the_row() {
        let db = Database::open_in_memory().unwrap();
        let trade = create_trade(&db, "user-1", base_input()).unwrap();
        delete_trade(&db, "user-1", &trade.id).unwrap();
        assert!(matches!(
            get_trade(&db, "user-1", &trade.id),
            Err(JournalError::NotFound(_))
        ));
    }
}
