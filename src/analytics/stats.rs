use serde::Serialize;

use super::closed_valued;
use crate::models::Trade;

/// Aggregate statistics over a set of closed trades. All monetary fields are
/// in the account currency; `win_rate` is a percentage; `total_losses` and
/// `average_loss` are magnitudes while `largest_loss` keeps its sign (the
/// most negative net P&L observed).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_trades: i64,
    pub winning_trades: i64,
    pub losing_trades: i64,
    pub win_rate: f64,
    pub total_profit_loss: f64,
    pub total_wins: f64,
    pub total_losses: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

/// Running sums carried through the fold. Breakeven trades (net P&L exactly
/// 0) count toward the total but are neither wins nor losses.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    total: i64,
    wins: i64,
    losses: i64,
    pnl_sum: f64,
    win_sum: f64,
    loss_sum: f64,
    largest_win: f64,
    largest_loss: f64,
}

impl Tally {
    fn add(self, pnl: f64) -> Self {
        Tally {
            total: self.total + 1,
            wins: self.wins + i64::from(pnl > 0.0),
            losses: self.losses + i64::from(pnl < 0.0),
            pnl_sum: self.pnl_sum + pnl,
            win_sum: self.win_sum + if pnl > 0.0 { pnl } else { 0.0 },
            loss_sum: self.loss_sum + if pnl < 0.0 { pnl } else { 0.0 },
            largest_win: self.largest_win.max(pnl),
            largest_loss: self.largest_loss.min(pnl),
        }
    }
}

/// Rolls a trade set up into [`Statistics`]. Trades that are not closed or
/// not valued are skipped. An empty input yields the all-zero record.
///
/// Profit factor policy: `total_wins / total_losses` when losses exist,
/// `f64::INFINITY` for a record with wins and no losses, and `0.0` when
/// there are neither. Infinity deliberately distinguishes a flawless record
/// from "no edge".
pub fn summarize(trades: &[Trade]) -> Statistics {
    let tally = closed_valued(trades).fold(Tally::default(), |acc, (_, pnl)| acc.add(pnl));

    if tally.total == 0 {
        return Statistics::default();
    }

    let total_losses = tally.loss_sum.abs();
    let profit_factor = if total_losses > 0.0 {
        tally.win_sum / total_losses
    } else if tally.win_sum > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    Statistics {
        total_trades: tally.total,
        winning_trades: tally.wins,
        losing_trades: tally.losses,
        win_rate: tally.wins as f64 / tally.total as f64 * 100.0,
        total_profit_loss: tally.pnl_sum,
        total_wins: tally.win_sum,
        total_losses,
        average_win: if tally.wins > 0 {
            tally.win_sum / tally.wins as f64
        } else {
            0.0
        },
        average_loss: if tally.losses > 0 {
            total_losses / tally.losses as f64
        } else {
            0.0
        },
        profit_factor,
        largest_win: tally.largest_win,
        largest_loss: tally.largest_loss,
    }
}

/// Contract A of the balance reconciler: initial balance plus the realized
/// net P&L of the assigned closed trades. Recomputed on every read so a
/// stale stored balance can never disagree with the ledger.
pub fn current_balance(initial_balance: f64, trades: &[Trade]) -> f64 {
    initial_balance + closed_valued(trades).map(|(_, pnl)| pnl).sum::<f64>()
}
