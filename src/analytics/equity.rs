use std::collections::BTreeMap;

use chrono::{Datelike, TimeZone};
use serde::Serialize;

use super::{closed_valued, to_local};
use crate::models::Trade;

/// One point of the equity curve: the trade's exit timestamp, the running
/// cumulative net P&L after that trade, and the trade's own contribution
/// (for per-point tooltips).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: i64,
    pub cumulative_pnl: f64,
    pub trade_pnl: f64,
}

/// Daily rollup of the same curve, one point per local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEquityPoint {
    pub date: String,
    pub daily_pnl: f64,
    pub cumulative_pnl: f64,
    pub trade_count: i64,
}

/// Orders closed trades by exit date (stable, so same-timestamp trades keep
/// their input order) and scans left to right accumulating net P&L. Pure
/// and recomputed from scratch on every call; a user's full history is
/// thousands of trades at most.
pub fn cumulative_series(trades: &[Trade]) -> Vec<EquityPoint> {
    let mut valued: Vec<(i64, f64)> = closed_valued(trades)
        .filter_map(|(t, pnl)| t.exit_date.map(|d| (d, pnl)))
        .collect();
    valued.sort_by_key(|&(date, _)| date);

    let mut cumulative_pnl = 0.0;
    valued
        .into_iter()
        .map(|(date, trade_pnl)| {
            cumulative_pnl += trade_pnl;
            EquityPoint {
                date,
                cumulative_pnl,
                trade_pnl,
            }
        })
        .collect()
}

/// The equity curve grouped by the exit date's local calendar day.
pub fn daily_series<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> Vec<DailyEquityPoint> {
    let mut days: BTreeMap<String, (f64, i64)> = BTreeMap::new();

    for (trade, pnl) in closed_valued(trades) {
        let Some(local) = trade.exit_date.and_then(|ts| to_local(ts, tz)) else {
            continue;
        };
        let key = format!("{:04}-{:02}-{:02}", local.year(), local.month(), local.day());
        let entry = days.entry(key).or_insert((0.0, 0));
        entry.0 += pnl;
        entry.1 += 1;
    }

    let mut cumulative_pnl = 0.0;
    days.into_iter()
        .map(|(date, (daily_pnl, trade_count))| {
            cumulative_pnl += daily_pnl;
            DailyEquityPoint {
                date,
                daily_pnl,
                cumulative_pnl,
                trade_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{closed, open};

    #[test]
    fn series_is_sorted_regardless_of_input_order() {
        let trades = vec![
            closed(30.0, 0, 300),
            closed(-10.0, 0, 100),
            closed(20.0, 0, 200),
        ];
        let series = cumulative_series(&trades);
        assert_eq!(series.len(), 3);
        for window in series.windows(2) {
            assert!(window[0].date <= window[1].date);
        }
        assert_eq!(series[0].trade_pnl, -10.0);
        assert!((series[0].cumulative_pnl - -10.0).abs() < 1e-9);
        assert!((series[1].cumulative_pnl - 10.0).abs() < 1e-9);
        assert!((series[2].cumulative_pnl - 40.0).abs() < 1e-9);
    }

    #[test]
    fn last_point_equals_total_pnl() {
        let trades = vec![
            closed(5.0, 0, 9),
            closed(-3.0, 0, 2),
            closed(11.0, 0, 7),
            closed(-1.0, 0, 4),
        ];
        let series = cumulative_series(&trades);
        let total: f64 = trades.iter().filter_map(|t| t.net_pnl).sum();
        assert!((series.last().unwrap().cumulative_pnl - total).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut a = closed(1.0, 0, 100);
        a.id = "first".to_string();
        let mut b = closed(2.0, 0, 100);
        b.id = "second".to_string();
        let series = cumulative_series(&[a, b]);
        assert_eq!(series[0].trade_pnl, 1.0);
        assert_eq!(series[1].trade_pnl, 2.0);
    }

    #[test]
    fn open_trades_do_not_appear() {
        let series = cumulative_series(&[open(1), closed(4.0, 0, 2)]);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn daily_series_groups_and_accumulates() {
        use chrono::Utc;
        let day1 = 1_700_000_000; // within one UTC day
        let day2 = day1 + 86_400;
        let trades = vec![
            closed(10.0, 0, day1),
            closed(-4.0, 0, day1 + 60),
            closed(7.0, 0, day2),
        ];
        let series = daily_series(&trades, &Utc);
        assert_eq!(series.len(), 2);
        assert!((series[0].daily_pnl - 6.0).abs() < 1e-9);
        assert_eq!(series[0].trade_count, 2);
        assert!((series[1].cumulative_pnl - 13.0).abs() < 1e-9);
    }
}
