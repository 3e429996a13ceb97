//! Meme lookups

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AttributionError;

/// Meme row from database, with contributing id arrays decoded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemeRow {
    pub id: String,
    pub created_at: String,
    pub positive_contributing_ids: Vec<String>,
    pub negative_contributing_ids: Vec<String>,
}

/// Input for inserting a meme (seeding only)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMemeInput {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub positive_contributing_ids: Vec<String>,
    #[serde(default)]
    pub negative_contributing_ids: Vec<String>,
}

/// Get a meme by ID
pub fn get_meme(conn: &Connection, id: &str) -> Result<Option<MemeRow>, AttributionError> {
    let raw = conn
        .query_row(
            "SELECT id, created_at, positive_contributing_ids, negative_contributing_ids
             FROM memes WHERE id = ?",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((id, created_at, positive, negative)) = raw else {
        return Ok(None);
    };

    Ok(Some(MemeRow {
        positive_contributing_ids: parse_id_array(&id, positive.as_deref())?,
        negative_contributing_ids: parse_id_array(&id, negative.as_deref())?,
        id,
        created_at,
    }))
}

/// Decode a JSON id array column.
///
/// Ids written by the generation pipeline may be strings or integers;
/// both come back as strings. NULL and blank columns mean no ids.
fn parse_id_array(meme_id: &str, raw: Option<&str>) -> Result<Vec<String>, AttributionError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(vec![]),
        Some(raw) => raw,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| {
        AttributionError::Parse(format!("meme {}: contributing ids are not JSON: {}", meme_id, e))
    })?;

    let items = match value {
        Value::Null => return Ok(vec![]),
        Value::Array(items) => items,
        other => {
            return Err(AttributionError::Parse(format!(
                "meme {}: contributing ids must be an array, got {}",
                meme_id, other
            )))
        }
    };

    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => ids.push(s),
            Value::Number(n) => ids.push(n.to_string()),
            other => {
                return Err(AttributionError::Parse(format!(
                    "meme {}: unexpected contributing id {}",
                    meme_id, other
                )))
            }
        }
    }

    Ok(ids)
}

/// Insert a meme. Returns false if the id already exists.
pub fn insert_meme(conn: &Connection, input: &CreateMemeInput) -> Result<bool, AttributionError> {
    let created_at = input.created_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    let changes = conn.execute(
        "INSERT OR IGNORE INTO memes (id, created_at, positive_contributing_ids, negative_contributing_ids)
         VALUES (?, ?, ?, ?)",
        params![
            input.id,
            created_at,
            serde_json::to_string(&input.positive_contributing_ids)?,
            serde_json::to_string(&input.negative_contributing_ids)?,
        ],
    )?;

    Ok(changes > 0)
}
