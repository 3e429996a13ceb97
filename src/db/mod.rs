//! SQLite access to the platform tables the engine reads
//!
//! The engine itself only ever reads. Writes exist for schema setup and
//! fixture seeding, which the operator CLI and the tests use.
//!
//! ## Tables
//!
//! - `memes` - id, creation time, positive/negative contributing ids (JSON arrays)
//! - `interactions` - one like/dislike per (user, meme), with timestamp
//! - `users` - user id to wallet address

pub mod schema;
pub mod memes;
pub mod interactions;
pub mod users;
pub mod seed;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::AttributionError;

/// SQLite database holding memes, interactions and users
pub struct MemeDb {
    conn: Mutex<Connection>,
}

impl MemeDb {
    /// Open or create the database and make sure the schema exists
    pub fn open(db_path: &Path) -> Result<Self, AttributionError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // WAL lets the engine read while the application keeps appending
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Open an existing database without write access.
    ///
    /// This is how the attribution engine should be pointed at production data.
    pub fn open_read_only(db_path: &Path) -> Result<Self, AttributionError> {
        info!("Opening SQLite database read-only at {:?}", db_path);

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, AttributionError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), AttributionError> {
        self.with_conn(schema::init_schema)
    }

    /// Run a closure against the shared connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, AttributionError>
    where
        F: FnOnce(&Connection) -> Result<T, AttributionError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| AttributionError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a closure with exclusive access (transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, AttributionError>
    where
        F: FnOnce(&mut Connection) -> Result<T, AttributionError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| AttributionError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, AttributionError> {
        self.with_conn(|conn| {
            let meme_count: i64 = conn.query_row("SELECT COUNT(*) FROM memes", [], |row| row.get(0))?;
            let interaction_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;
            let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

            Ok(DbStats {
                meme_count: meme_count as u64,
                interaction_count: interaction_count as u64,
                user_count: user_count as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub meme_count: u64,
    pub interaction_count: u64,
    pub user_count: u64,
}

// Re-exports
pub use memes::{MemeRow, CreateMemeInput};
pub use interactions::{InteractionType, CreateInteractionInput};
pub use users::CreateUserInput;
pub use seed::{SeedFixture, SeedResult};
