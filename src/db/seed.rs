//! Fixture loading for local databases and tests

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::interactions::{record_interaction, CreateInteractionInput};
use super::memes::{insert_meme, CreateMemeInput};
use super::users::{upsert_user, CreateUserInput};
use crate::error::AttributionError;

/// Contents of a seed file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFixture {
    #[serde(default)]
    pub memes: Vec<CreateMemeInput>,
    #[serde(default)]
    pub interactions: Vec<CreateInteractionInput>,
    #[serde(default)]
    pub users: Vec<CreateUserInput>,
}

/// Result of a seed run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeedResult {
    pub memes_inserted: u64,
    pub memes_skipped: u64,
    pub interactions_inserted: u64,
    pub interactions_skipped: u64,
    pub users_upserted: u64,
}

/// Load a fixture in a single transaction
pub fn seed(conn: &mut Connection, fixture: &SeedFixture) -> Result<SeedResult, AttributionError> {
    let tx = conn.transaction()?;
    let mut result = SeedResult::default();

    for meme in &fixture.memes {
        if insert_meme(&tx, meme)? {
            result.memes_inserted += 1;
        } else {
            result.memes_skipped += 1;
        }
    }

    for interaction in &fixture.interactions {
        if record_interaction(&tx, interaction)? {
            result.interactions_inserted += 1;
        } else {
            result.interactions_skipped += 1;
        }
    }

    for user in &fixture.users {
        upsert_user(&tx, user)?;
        result.users_upserted += 1;
    }

    tx.commit()?;

    info!(
        memes = result.memes_inserted,
        interactions = result.interactions_inserted,
        users = result.users_upserted,
        "Seed fixture loaded"
    );

    Ok(result)
}
