use std::collections::BTreeMap;

use chrono::{Datelike, TimeZone, Timelike};
use serde::Serialize;

use super::{closed_valued, to_local};
use crate::models::Trade;

/// Calendar bucket keyed by a `YYYY-MM-DD` (or `YYYY-MM`) string; keys are
/// zero-padded so lexicographic order is chronological order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub period: String,
    pub trades: i64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPerformance {
    pub month: String,
    pub pnl: f64,
    pub trades: i64,
    pub wins: i64,
    pub losses: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourBucket {
    pub hour: u32,
    pub trades: i64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayBucket {
    /// 0 = Sunday .. 6 = Saturday.
    pub day_index: u32,
    pub day: String,
    pub trades: i64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
}

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Per-month P&L with win/loss counts, keyed on the exit date (P&L is
/// realized at close). Sorted chronologically.
pub fn monthly_performance<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> Vec<MonthlyPerformance> {
    let mut months: BTreeMap<String, (f64, i64, i64, i64)> = BTreeMap::new();

    for (trade, pnl) in closed_valued(trades) {
        let Some(local) = trade.exit_date.and_then(|ts| to_local(ts, tz)) else {
            continue;
        };
        let key = format!("{:04}-{:02}", local.year(), local.month());
        let entry = months.entry(key).or_insert((0.0, 0, 0, 0));
        entry.0 += pnl;
        entry.1 += 1;
        entry.2 += i64::from(pnl > 0.0);
        entry.3 += i64::from(pnl < 0.0);
    }

    months
        .into_iter()
        .map(|(month, (pnl, trades, wins, losses))| MonthlyPerformance {
            month,
            pnl,
            trades,
            wins,
            losses,
        })
        .collect()
}

/// Per-day P&L keyed on the exit date's calendar day *in the given
/// timezone*, so a trade closed at 23:30 local time is not attributed to
/// the next UTC day. Sorted chronologically.
pub fn daily_pnl<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> Vec<PeriodBucket> {
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

    days.into_iter()
        .map(|(period, (total_pnl, trades))| PeriodBucket {
            period,
            total_pnl,
            avg_pnl: total_pnl / trades as f64,
            trades,
        })
        .collect()
}

/// P&L by the local hour the position was *opened* (behavioral analysis is
/// keyed to when the trader acted, not when the position closed). All 24
/// buckets are always present, empty ones included, so a fixed heatmap grid
/// can render directly from the output.
pub fn hour_of_day<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> Vec<HourBucket> {
    let mut sums = [(0.0f64, 0i64); 24];

    for (trade, pnl) in closed_valued(trades) {
        let Some(local) = to_local(trade.entry_date, tz) else {
            continue;
        };
        let slot = &mut sums[local.hour() as usize];
        slot.0 += pnl;
        slot.1 += 1;
    }

    sums.iter()
        .enumerate()
        .map(|(hour, &(total_pnl, trades))| HourBucket {
            hour: hour as u32,
            trades,
            total_pnl,
            avg_pnl: if trades > 0 {
                total_pnl / trades as f64
            } else {
                0.0
            },
        })
        .collect()
}

/// P&L by local weekday the position was opened, Sunday first. Days with no
/// trades are omitted (unlike the hour grid, the weekday chart only draws
/// bars that exist).
pub fn day_of_week<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> Vec<WeekdayBucket> {
    let mut days: BTreeMap<u32, (f64, i64)> = BTreeMap::new();

    for (trade, pnl) in closed_valued(trades) {
        let Some(local) = to_local(trade.entry_date, tz) else {
            continue;
        };
        let entry = days
            .entry(local.weekday().num_days_from_sunday())
            .or_insert((0.0, 0));
        entry.0 += pnl;
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(day_index, (total_pnl, trades))| WeekdayBucket {
            day_index,
            day: DAY_NAMES[day_index as usize].to_string(),
            trades,
            total_pnl,
            avg_pnl: total_pnl / trades as f64,
        })
        .collect()
}
