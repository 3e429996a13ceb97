//! User to wallet address lookups

use std::collections::HashMap;

use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::error::AttributionError;

/// Ids bound per statement
const IDS_PER_QUERY: usize = 500;

/// Input for inserting or updating a user (seeding only)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Insert a user, replacing the stored address if the user exists
pub fn upsert_user(conn: &Connection, input: &CreateUserInput) -> Result<(), AttributionError> {
    conn.execute(
        "INSERT INTO users (id, address) VALUES (?, ?)
         ON CONFLICT(id) DO UPDATE SET address = excluded.address",
        params![input.id, input.address],
    )?;
    Ok(())
}

/// Fetch stored addresses for the given users.
///
/// Users that don't exist or have a NULL address are simply absent from
/// the returned map. Whether an address is usable is decided by the caller.
pub fn get_addresses(
    conn: &Connection,
    user_ids: &[String],
) -> Result<HashMap<String, String>, AttributionError> {
    let mut addresses = HashMap::with_capacity(user_ids.len());

    for chunk in user_ids.chunks(IDS_PER_QUERY) {
        let placeholders: Vec<_> = chunk.iter().map(|_| "?").collect();
        let sql = format!(
            "SELECT id, address FROM users WHERE address IS NOT NULL AND id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (id, address) = row?;
            addresses.insert(id, address);
        }
    }

    Ok(addresses)
}
