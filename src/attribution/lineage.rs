//! Lineage resolution

use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::db::memes;
use crate::error::AttributionError;

/// The memes that fed into a target meme
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lineage {
    pub meme_id: String,
    /// Union of positive and negative contributing ids
    pub contributing_ids: BTreeSet<String>,
    pub total_count: u32,
    pub created_at: String,
}

impl Lineage {
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// Resolve the lineage of a meme.
///
/// A meme with no recorded contributors resolves to an empty lineage,
/// which is a valid result. A missing meme is `NotFound`.
pub fn resolve_lineage(conn: &Connection, meme_id: &str) -> Result<Lineage, AttributionError> {
    let meme = memes::get_meme(conn, meme_id)?
        .ok_or_else(|| AttributionError::NotFound(meme_id.to_string()))?;

    let contributing_ids: BTreeSet<String> = meme
        .positive_contributing_ids
        .into_iter()
        .chain(meme.negative_contributing_ids)
        .filter(|id| !id.trim().is_empty())
        .collect();

    let total_count = u32::try_from(contributing_ids.len()).map_err(|_| {
        AttributionError::InvalidInput(format!("meme {} has an unbounded lineage", meme_id))
    })?;

    debug!(meme_id, total_count, "Resolved lineage");

    Ok(Lineage {
        meme_id: meme.id,
        contributing_ids,
        total_count,
        created_at: meme.created_at,
    })
}
