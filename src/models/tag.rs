use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagKind {
    Strategy,
    Market,
    Setup,
    Timeframe,
    Other,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Strategy => "STRATEGY",
            TagKind::Market => "MARKET",
            TagKind::Setup => "SETUP",
            TagKind::Timeframe => "TIMEFRAME",
            TagKind::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STRATEGY" => Some(TagKind::Strategy),
            "MARKET" => Some(TagKind::Market),
            "SETUP" => Some(TagKind::Setup),
            "TIMEFRAME" => Some(TagKind::Timeframe),
            "OTHER" => Some(TagKind::Other),
            _ => None,
        }
    }
}

impl ToSql for TagKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TagKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| TagKind::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: TagKind,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTagInput {
    pub name: String,
    pub kind: Option<TagKind>,
}
