//! Interaction store queries
//!
//! Counting is done in SQL so each pass is a single read against a
//! consistent snapshot of the table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AttributionError;

/// Meme ids bound per statement, well under SQLite's host parameter limit
const IDS_PER_QUERY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Like,
    Dislike,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Like => "like",
            InteractionType::Dislike => "dislike",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(InteractionType::Like),
            "dislike" => Ok(InteractionType::Dislike),
            other => Err(AttributionError::InvalidInput(format!(
                "Invalid interaction type: {}",
                other
            ))),
        }
    }
}

/// Input for recording an interaction (seeding only)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInteractionInput {
    pub user_id: String,
    pub meme_id: String,
    pub interaction_type: InteractionType,
    /// Missing on backfilled data
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Record an interaction. A user interacts with a meme at most once, so a
/// second write for the same pair is ignored and returns false.
pub fn record_interaction(
    conn: &Connection,
    input: &CreateInteractionInput,
) -> Result<bool, AttributionError> {
    let created_at = input
        .created_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));

    let changes = conn.execute(
        "INSERT OR IGNORE INTO interactions (user_id, meme_id, interaction_type, created_at)
         VALUES (?, ?, ?, ?)",
        params![input.user_id, input.meme_id, input.interaction_type.as_str(), created_at],
    )?;

    Ok(changes > 0)
}

/// Count, per user, the distinct memes in `meme_ids` they liked or disliked.
///
/// With `before` set, only interactions whose timestamp is strictly earlier
/// count. Rows with a NULL or unparseable timestamp never satisfy that
/// filter, since `julianday()` yields NULL for them.
pub fn count_distinct_interactions(
    conn: &Connection,
    meme_ids: &BTreeSet<String>,
    before: Option<&str>,
) -> Result<BTreeMap<String, u32>, AttributionError> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    if meme_ids.is_empty() {
        return Ok(counts);
    }

    let ids: Vec<&String> = meme_ids.iter().collect();

    // Chunks partition the id set, so per-chunk distinct counts add up exactly
    for chunk in ids.chunks(IDS_PER_QUERY) {
        let placeholders: Vec<_> = chunk.iter().map(|_| "?").collect();
        let mut sql = format!(
            "SELECT user_id, COUNT(DISTINCT meme_id) FROM interactions WHERE meme_id IN ({})",
            placeholders.join(", ")
        );

        let mut params: Vec<&dyn rusqlite::ToSql> =
            chunk.iter().map(|id| *id as &dyn rusqlite::ToSql).collect();

        if let Some(ref cutoff) = before {
            sql.push_str(" AND created_at IS NOT NULL AND julianday(created_at) < julianday(?)");
            params.push(cutoff as &dyn rusqlite::ToSql);
        }

        sql.push_str(" GROUP BY user_id");

        debug!("Executing query: {}", sql);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        for row in rows {
            let (user_id, count) = row?;
            *counts.entry(user_id).or_insert(0) += count;
        }
    }

    Ok(counts)
}
