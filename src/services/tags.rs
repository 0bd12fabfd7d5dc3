use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::db::Database;
use crate::error::{JournalError, Result};
use crate::models::{CreateTagInput, Tag, TagKind};
use crate::services::{lock, trades};

fn map_row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn find_owned(conn: &Connection, user_id: &str, id: &str) -> Result<Tag> {
    let tag = conn
        .query_row(
            "SELECT id, user_id, name, kind, created_at FROM tags WHERE id = ?",
            [id],
            map_row_to_tag,
        )
        .optional()?
        .ok_or(JournalError::NotFound("tag"))?;

    if tag.user_id != user_id {
        return Err(JournalError::Forbidden(
            "you do not have access to this tag".to_string(),
        ));
    }

    Ok(tag)
}

pub fn create_tag(db: &Database, user_id: &str, input: CreateTagInput) -> Result<Tag> {
    if input.name.trim().is_empty() {
        return Err(JournalError::InvalidInput(
            "tag name cannot be empty".to_string(),
        ));
    }

    let conn = lock(db)?;

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE user_id = ? AND name = ?)",
        rusqlite::params![user_id, input.name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(JournalError::InvalidInput(format!(
            "tag '{}' already exists",
            input.name
        )));
    }

    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO tags (id, user_id, name, kind, created_at) VALUES (?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            user_id,
            input.name,
            input.kind.unwrap_or(TagKind::Other),
            Utc::now().timestamp()
        ],
    )?;

    find_owned(&conn, user_id, &id)
}

pub fn list_tags(db: &Database, user_id: &str) -> Result<Vec<Tag>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, kind, created_at FROM tags WHERE user_id = ? ORDER BY name ASC",
    )?;
    let tags = stmt
        .query_map([user_id], map_row_to_tag)?
        .collect::<rusqlite::Result<Vec<Tag>>>()?;
    Ok(tags)
}

pub fn delete_tag(db: &Database, user_id: &str, id: &str) -> Result<()> {
    let conn = lock(db)?;
    find_owned(&conn, user_id, id)?;
    conn.execute("DELETE FROM tags WHERE id = ?", [id])?;
    Ok(())
}

/// Replaces a trade's tag set. Every tag must belong to the same user as
/// the trade; the caller has already checked the trade itself.
pub(crate) fn set_for_trade(
    conn: &Connection,
    user_id: &str,
    trade_id: &str,
    tag_ids: &[String],
) -> Result<()> {
    for tag_id in tag_ids {
        find_owned(conn, user_id, tag_id)?;
    }

    conn.execute("DELETE FROM trade_tags WHERE trade_id = ?", [trade_id])?;
    for tag_id in tag_ids {
        conn.execute(
            "INSERT INTO trade_tags (trade_id, tag_id) VALUES (?, ?)",
            rusqlite::params![trade_id, tag_id],
        )?;
    }

    Ok(())
}

pub fn tags_for_trade(db: &Database, user_id: &str, trade_id: &str) -> Result<Vec<Tag>> {
    let conn = lock(db)?;
    trades::get_by_id(&conn, user_id, trade_id)?;

    let mut stmt = conn.prepare(
        "SELECT t.id, t.user_id, t.name, t.kind, t.created_at
         FROM tags t JOIN trade_tags tt ON tt.tag_id = t.id
         WHERE tt.trade_id = ? ORDER BY t.name ASC",
    )?;
    let tags = stmt
        .query_map([trade_id], map_row_to_tag)?
        .collect::<rusqlite::Result<Vec<Tag>>>()?;
    Ok(tags)
}
