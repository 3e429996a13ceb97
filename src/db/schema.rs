//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::AttributionError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), AttributionError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(TABLES_SCHEMA)?;
        conn.execute_batch(INDEXES_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, AttributionError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), AttributionError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

const TABLES_SCHEMA: &str = r#"
-- Memes. Contributing id arrays are written once by the generation
-- pipeline and never mutated afterwards.
CREATE TABLE IF NOT EXISTS memes (
    id TEXT PRIMARY KEY NOT NULL,
    created_at TEXT NOT NULL,
    positive_contributing_ids TEXT NOT NULL DEFAULT '[]',
    negative_contributing_ids TEXT NOT NULL DEFAULT '[]'
);

-- Likes and dislikes. Append-only, one per (user, meme).
-- created_at may be NULL on backfilled rows.
CREATE TABLE IF NOT EXISTS interactions (
    user_id TEXT NOT NULL,
    meme_id TEXT NOT NULL,
    interaction_type TEXT NOT NULL CHECK (interaction_type IN ('like', 'dislike')),
    created_at TEXT,
    PRIMARY KEY (user_id, meme_id)
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    address TEXT
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_interactions_meme_id ON interactions(meme_id);
CREATE INDEX IF NOT EXISTS idx_memes_created_at ON memes(created_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_interaction_type_is_constrained() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO interactions (user_id, meme_id, interaction_type) VALUES ('u', 'm', 'superlike')",
            [],
        );
        assert!(result.is_err());
    }
}
