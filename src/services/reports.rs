use chrono::TimeZone;

use crate::analytics::{
    self, DailyEquityPoint, EquityPoint, HourBucket, MonthlyPerformance, PeriodBucket, Statistics,
    WeekdayBucket,
};
use crate::db::Database;
use crate::error::Result;
use crate::models::Trade;
use crate::services::{lock, trades};

/// Every report runs on one snapshot of the user's closed, valued trades,
/// optionally narrowed to a portfolio, then delegates to the pure
/// aggregation routines.
fn snapshot(db: &Database, user_id: &str, portfolio_id: Option<&str>) -> Result<Vec<Trade>> {
    let conn = lock(db)?;
    trades::fetch_closed_valued(&conn, user_id, portfolio_id)
}

pub fn overview(db: &Database, user_id: &str, portfolio_id: Option<&str>) -> Result<Statistics> {
    Ok(analytics::summarize(&snapshot(db, user_id, portfolio_id)?))
}

/// The per-trade equity curve, chronological by exit date.
pub fn performance_chart(
    db: &Database,
    user_id: &str,
    portfolio_id: Option<&str>,
) -> Result<Vec<EquityPoint>> {
    Ok(analytics::equity::cumulative_series(&snapshot(
        db,
        user_id,
        portfolio_id,
    )?))
}

pub fn daily_equity<Tz: TimeZone>(
    db: &Database,
    user_id: &str,
    portfolio_id: Option<&str>,
    tz: &Tz,
) -> Result<Vec<DailyEquityPoint>> {
    Ok(analytics::equity::daily_series(
        &snapshot(db, user_id, portfolio_id)?,
        tz,
    ))
}

pub fn monthly_performance<Tz: TimeZone>(
    db: &Database,
    user_id: &str,
    portfolio_id: Option<&str>,
    tz: &Tz,
) -> Result<Vec<MonthlyPerformance>> {
    Ok(analytics::buckets::monthly_performance(
        &snapshot(db, user_id, portfolio_id)?,
        tz,
    ))
}

pub fn daily_pnl<Tz: TimeZone>(
    db: &Database,
    user_id: &str,
    portfolio_id: Option<&str>,
    tz: &Tz,
) -> Result<Vec<PeriodBucket>> {
    Ok(analytics::buckets::daily_pnl(
        &snapshot(db, user_id, portfolio_id)?,
        tz,
    ))
}

pub fn hour_of_day<Tz: TimeZone>(
    db: &Database,
    user_id: &str,
    portfolio_id: Option<&str>,
    tz: &Tz,
) -> Result<Vec<HourBucket>> {
    Ok(analytics::buckets::hour_of_day(
        &snapshot(db, user_id, portfolio_id)?,
        tz,
    ))
}

pub fn day_of_week<Tz: TimeZone>(
    db: &Database,
    user_id: &str,
    portfolio_id: Option<&str>,
    tz: &Tz,
) -> Result<Vec<WeekdayBucket>> {
    Ok(analytics::buckets::day_of_week(
        &snapshot(db, user_id, portfolio_id)?,
        tz,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{CreateTradeInput, TradeSide, TradeStatus};
    use crate::services::trades::create_trade;

    fn seed(db: &Database, user: &str, entry_date: i64, exit_date: i64, net: f64) {
        create_trade(
            db,
            user,
            CreateTradeInput {
                symbol: "XAU/USD".to_string(),
                side: TradeSide::Long,
                status: Some(TradeStatus::Closed),
                entry_price: 2_000.0,
                entry_date,
                quantity: 1.0,
                exit_price: Some(2_000.0 + net),
                exit_date: Some(exit_date),
                stop_loss: None,
                take_profit: None,
                commission: None,
                swap: None,
                gross_pnl: None,
                net_pnl: None,
                notes: None,
                strategy: None,
                timeframe: None,
                portfolio_id: None,
                tag_ids: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn chart_accumulates_in_exit_order() {
        let db = Database::open_in_memory().unwrap();
        let base = 1_700_000_000;
        seed(&db, "user-1", base, base + 200, 30.0);
        seed(&db, "user-1", base, base + 100, -10.0);

        let chart = performance_chart(&db, "user-1", None).unwrap();
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].trade_pnl, -10.0);
        assert!((chart[1].cumulative_pnl - 20.0).abs() < 1e-9);
    }

    #[test]
    fn chart_endpoint_matches_overview_total() {
        let db = Database::open_in_memory().unwrap();
        let base = 1_700_000_000;
        seed(&db, "user-1", base, base + 100, 40.0);

        // Broker-valued close with no exit price; it must land in the chart
        // with the same weight it carries in the totals.
        create_trade(
            &db,
            "user-1",
            CreateTradeInput {
                symbol: "US30".to_string(),
                side: TradeSide::Long,
                status: Some(TradeStatus::Closed),
                entry_price: 35_000.0,
                entry_date: base,
                quantity: 1.0,
                exit_price: None,
                exit_date: Some(base + 200),
                stop_loss: None,
                take_profit: None,
                commission: None,
                swap: None,
                gross_pnl: None,
                net_pnl: Some(100.0),
                notes: None,
                strategy: None,
                timeframe: None,
                portfolio_id: None,
                tag_ids: None,
            },
        )
        .unwrap();

        let stats = overview(&db, "user-1", None).unwrap();
        let chart = performance_chart(&db, "user-1", None).unwrap();
        assert_eq!(chart.len() as i64, stats.total_trades);
        assert!(
            (chart.last().unwrap().cumulative_pnl - stats.total_profit_loss).abs() < 1e-9
        );
        assert!((stats.total_profit_loss - 140.0).abs() < 1e-9);
    }

    #[test]
    fn reports_are_scoped_per_user() {
        let db = Database::open_in_memory().unwrap();
        let base = 1_700_000_000;
        seed(&db, "user-1", base, base + 100, 50.0);
        seed(&db, "user-2", base, base + 100, 75.0);

        let stats = overview(&db, "user-1", None).unwrap();
        assert_eq!(stats.total_trades, 1);
        assert!((stats.total_profit_loss - 50.0).abs() < 1e-9);
    }

    #[test]
    fn hour_grid_is_complete_even_with_no_trades() {
        let db = Database::open_in_memory().unwrap();
        let hours = hour_of_day(&db, "user-1", None, &Utc).unwrap();
        assert_eq!(hours.len(), 24);
        assert!(hours.iter().all(|h| h.trades == 0));
    }

    #[test]
    fn monthly_report_groups_by_exit_month() {
        let db = Database::open_in_memory().unwrap();
        // 2024-01-15 and 2024-02-15 UTC
        seed(&db, "user-1", 1_705_300_000, 1_705_320_000, 100.0);
        seed(&db, "user-1", 1_707_980_000, 1_708_000_000, -40.0);

        let months = monthly_performance(&db, "user-1", None, &Utc).unwrap();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2024-01");
        assert_eq!(months[1].month, "2024-02");
        assert_eq!(months[1].losses, 1);
    }
}
