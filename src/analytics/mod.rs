//! Pure P&L computation over an in-memory trade set. Nothing here touches
//! storage; the service layer fetches a snapshot and hands it in by value.

pub mod buckets;
pub mod equity;
pub mod stats;
pub mod valuation;

pub use buckets::{HourBucket, MonthlyPerformance, PeriodBucket, WeekdayBucket};
pub use equity::{DailyEquityPoint, EquityPoint};
pub use stats::{current_balance, summarize, Statistics};
pub use valuation::{valuate, PnlInputs, Valuation};

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Trade, TradeStatus};

/// Trades that actually contribute to aggregates: closed, with a cached net
/// P&L. Callers are expected to pre-filter; this is the defensive backstop.
pub(crate) fn closed_valued(trades: &[Trade]) -> impl Iterator<Item = (&Trade, f64)> {
    trades.iter().filter_map(|t| match (t.status, t.net_pnl) {
        (TradeStatus::Closed, Some(pnl)) => Some((t, pnl)),
        _ => None,
    })
}

/// Epoch seconds as a wall-clock instant in the caller's timezone. `None`
/// only for timestamps outside chrono's representable range.
pub(crate) fn to_local<Tz: TimeZone>(ts: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.with_timezone(tz))
}
