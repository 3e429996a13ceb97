//! Raw attribution: who interacted with a meme's lineage, and how much.
//!
//! Two independent passes count each user's distinct interactions with the
//! contributing memes. The primary pass only accepts interactions made
//! before the target meme existed, since only those could have shaped its
//! generation. The fallback pass drops the time filter and exists for
//! cold-start data whose timestamps are missing or inconsistent.
//! [`select_pass`] is the only place that decides between them.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use super::lineage::Lineage;
use crate::db::interactions::count_distinct_interactions;
use crate::error::AttributionError;

/// Distinct contributing memes interacted with, keyed by user id
pub type PassCounts = BTreeMap<String, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionPass {
    Primary,
    Fallback,
}

/// Outcome of choosing between the two passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Primary(PassCounts),
    Fallback(PassCounts),
    Empty,
}

impl Selection {
    pub fn pass(&self) -> Option<AttributionPass> {
        match self {
            Selection::Primary(_) => Some(AttributionPass::Primary),
            Selection::Fallback(_) => Some(AttributionPass::Fallback),
            Selection::Empty => None,
        }
    }

    pub fn into_counts(self) -> PassCounts {
        match self {
            Selection::Primary(counts) | Selection::Fallback(counts) => counts,
            Selection::Empty => PassCounts::new(),
        }
    }
}

/// One user's credit for a meme
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionRecord {
    pub user_id: String,
    /// Distinct contributing memes this user interacted with
    pub contributed_count: u32,
    /// Size of the lineage; the shared denominator
    pub total_count: u32,
    /// `contributed_count / total_count`, informational only.
    /// Normalization works on the integer counts.
    pub raw_proportion: f64,
}

/// Raw attribution for one meme
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub meme_id: String,
    /// Which pass produced the records; None when nobody qualified
    pub pass: Option<AttributionPass>,
    pub total_count: u32,
    /// Sorted by user id
    pub records: Vec<AttributionRecord>,
}

/// Interactions made strictly before the target meme was created
pub fn primary_pass(conn: &Connection, lineage: &Lineage) -> Result<PassCounts, AttributionError> {
    if lineage.is_empty() {
        return Ok(PassCounts::new());
    }
    count_distinct_interactions(conn, &lineage.contributing_ids, Some(lineage.created_at.as_str()))
}

/// Interactions regardless of when they happened
pub fn fallback_pass(conn: &Connection, lineage: &Lineage) -> Result<PassCounts, AttributionError> {
    if lineage.is_empty() {
        return Ok(PassCounts::new());
    }
    count_distinct_interactions(conn, &lineage.contributing_ids, None)
}

/// Primary results win whenever they are non-empty. The fallback is only
/// evaluated otherwise, and the two are never merged.
pub fn select_pass<F>(primary: PassCounts, fallback: F) -> Result<Selection, AttributionError>
where
    F: FnOnce() -> Result<PassCounts, AttributionError>,
{
    let primary: PassCounts = primary.into_iter().filter(|(_, n)| *n > 0).collect();
    if !primary.is_empty() {
        return Ok(Selection::Primary(primary));
    }

    let fallback: PassCounts = fallback()?.into_iter().filter(|(_, n)| *n > 0).collect();
    if !fallback.is_empty() {
        return Ok(Selection::Fallback(fallback));
    }

    Ok(Selection::Empty)
}

/// Compute each qualifying user's raw share of a meme's lineage
pub fn compute_raw_proportions(
    conn: &Connection,
    lineage: &Lineage,
) -> Result<Attribution, AttributionError> {
    if lineage.is_empty() {
        info!(meme_id = %lineage.meme_id, "Meme has no lineage, nothing to attribute");
        return Ok(Attribution {
            meme_id: lineage.meme_id.clone(),
            pass: None,
            total_count: 0,
            records: vec![],
        });
    }

    let primary = primary_pass(conn, lineage)?;
    debug!(meme_id = %lineage.meme_id, users = primary.len(), "Primary pass complete");

    let selection = select_pass(primary, || fallback_pass(conn, lineage))?;
    let pass = selection.pass();

    match pass {
        Some(AttributionPass::Fallback) => info!(
            meme_id = %lineage.meme_id,
            "No interactions precede the meme, using untimed fallback"
        ),
        None => info!(meme_id = %lineage.meme_id, "No qualifying contributors"),
        Some(AttributionPass::Primary) => {}
    }

    let total_count = lineage.total_count;
    let records = selection
        .into_counts()
        .into_iter()
        .map(|(user_id, contributed_count)| AttributionRecord {
            raw_proportion: f64::from(contributed_count) / f64::from(total_count),
            user_id,
            contributed_count,
            total_count,
        })
        .collect();

    Ok(Attribution {
        meme_id: lineage.meme_id.clone(),
        pass,
        total_count,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u32)]) -> PassCounts {
        pairs.iter().map(|(u, n)| (u.to_string(), *n)).collect()
    }

    #[test]
    fn test_primary_wins_without_touching_fallback() {
        let selection = select_pass(counts(&[("alice", 1)]), || {
            panic!("fallback must not run when the primary pass has results")
        })
        .unwrap();

        assert_eq!(selection, Selection::Primary(counts(&[("alice", 1)])));
    }

    #[test]
    fn test_fallback_used_when_primary_empty() {
        let selection = select_pass(PassCounts::new(), || Ok(counts(&[("bob", 2)]))).unwrap();
        assert_eq!(selection.pass(), Some(AttributionPass::Fallback));
        assert_eq!(selection.into_counts(), counts(&[("bob", 2)]));
    }

    #[test]
    fn test_zero_counts_do_not_qualify() {
        let selection = select_pass(counts(&[("ghost", 0)]), || Ok(counts(&[("bob", 1)]))).unwrap();
        assert_eq!(selection.pass(), Some(AttributionPass::Fallback));
    }

    #[test]
    fn test_both_empty() {
        let selection = select_pass(PassCounts::new(), || Ok(PassCounts::new())).unwrap();
        assert_eq!(selection, Selection::Empty);
        assert!(selection.into_counts().is_empty());
    }

    #[test]
    fn test_fallback_errors_propagate() {
        let result = select_pass(PassCounts::new(), || {
            Err(AttributionError::Internal("db gone".into()))
        });
        assert!(result.is_err());
    }
}
