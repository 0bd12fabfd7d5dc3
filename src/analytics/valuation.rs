use crate::models::TradeSide;

/// Gross and net P&L for a single trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub gross_pnl: f64,
    pub net_pnl: f64,
}

/// Everything valuation looks at. `broker_net`/`broker_gross` carry figures
/// supplied by an external broker statement; `commission` and `swap` default
/// to 0 upstream and are always subtracted (a negative swap is a credit and
/// increases net P&L).
#[derive(Debug, Clone, Copy)]
pub struct PnlInputs {
    pub side: TradeSide,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: f64,
    pub commission: f64,
    pub swap: f64,
    pub broker_net: Option<f64>,
    pub broker_gross: Option<f64>,
}

/// Derives gross/net P&L, or `None` when the trade has not reached a
/// valuation point (no exit price and no broker figure - an open trade).
///
/// Priority: a broker-supplied net P&L wins over the price formula, because
/// the broker's figure already accounts for contract size and pip value
/// conventions this journal cannot re-derive. Broker feeds often omit the
/// gross figure, in which case net stands in for it.
pub fn valuate(inputs: &PnlInputs) -> Option<Valuation> {
    match (inputs.broker_net, inputs.exit_price) {
        (Some(net), _) => Some(Valuation {
            gross_pnl: inputs.broker_gross.unwrap_or(net),
            net_pnl: net,
        }),
        (None, Some(exit_price)) => {
            let price_diff = match inputs.side {
                TradeSide::Long => exit_price - inputs.entry_price,
                TradeSide::Short => inputs.entry_price - exit_price,
            };
            let gross_pnl = price_diff * inputs.quantity;
            Some(Valuation {
                gross_pnl,
                net_pnl: gross_pnl - inputs.commission - inputs.swap,
            })
        }
        (None, None) => None,
    }
}
