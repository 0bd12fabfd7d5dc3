use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Long => "LONG",
            TradeSide::Short => "SHORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LONG" => Some(TradeSide::Long),
            "SHORT" => Some(TradeSide::Short),
            _ => None,
        }
    }
}

impl ToSql for TradeSide {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TradeSide {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| TradeSide::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

/// Trade lifecycle. `Cancelled` exists in the schema but is excluded from
/// every aggregate; only `Closed` trades with a defined net P&L count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Open,
    Closed,
    Cancelled,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
            TradeStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(TradeStatus::Open),
            "CLOSED" => Some(TradeStatus::Closed),
            "CANCELLED" => Some(TradeStatus::Cancelled),
            _ => None,
        }
    }
}

impl ToSql for TradeStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TradeStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| TradeStatus::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

/// A journaled trade. `gross_pnl`/`net_pnl` are cached at write time so
/// aggregate queries never redo per-trade arithmetic; both are set iff the
/// trade has reached a valuation point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub portfolio_id: Option<String>,
    pub symbol: String,
    pub side: TradeSide,
    pub status: TradeStatus,

    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub commission: f64,
    pub swap: f64,

    pub entry_date: i64,
    pub exit_date: Option<i64>,

    pub gross_pnl: Option<f64>,
    pub net_pnl: Option<f64>,

    pub notes: String,
    pub strategy: Option<String>,
    pub timeframe: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTradeInput {
    pub symbol: String,
    pub side: TradeSide,
    pub status: Option<TradeStatus>,
    pub entry_price: f64,
    pub entry_date: i64,
    pub quantity: f64,
    pub exit_price: Option<f64>,
    pub exit_date: Option<i64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub commission: Option<f64>,
    pub swap: Option<f64>,
    /// Broker-supplied figures. When `net_pnl` is present it wins over the
    /// price-derived computation (the broker already applied contract size
    /// and pip conventions this journal cannot reconstruct).
    pub gross_pnl: Option<f64>,
    pub net_pnl: Option<f64>,
    pub notes: Option<String>,
    pub strategy: Option<String>,
    pub timeframe: Option<String>,
    pub portfolio_id: Option<String>,
    pub tag_ids: Option<Vec<String>>,
}

/// Partial update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTradeInput {
    pub symbol: Option<String>,
    pub side: Option<TradeSide>,
    pub status: Option<TradeStatus>,
    pub entry_price: Option<f64>,
    pub entry_date: Option<i64>,
    pub quantity: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_date: Option<i64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub commission: Option<f64>,
    pub swap: Option<f64>,
    pub net_pnl: Option<f64>,
    pub gross_pnl: Option<f64>,
    pub notes: Option<String>,
    pub strategy: Option<String>,
    pub timeframe: Option<String>,
    /// `None` leaves the assignment unchanged; `Some(None)` detaches the
    /// trade from its portfolio; `Some(Some(id))` reassigns it.
    pub portfolio_id: Option<Option<String>>,
    pub tag_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profitability {
    Winning,
    Losing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilters {
    pub symbol: Option<String>,
    pub side: Option<TradeSide>,
    pub status: Option<TradeStatus>,
    pub portfolio_id: Option<String>,
    pub profitability: Option<Profitability>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
