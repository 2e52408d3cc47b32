//! Database connection manager backed by a pooled rusqlite connection.

use std::path::{Path, PathBuf};

use contendo_domain::Result;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Shared connection pool type.
pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
/// A checked-out pooled connection.
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database manager that owns the pool and bootstraps the schema.
pub struct DbManager {
    pool: DbPool,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size, applying the schema.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });

        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(InfraError::from)?;

        let db = Self { pool, path };
        db.apply_schema()?;

        info!(db_path = %db.path.display(), max_connections = pool_size.max(1), "sqlite pool initialised");
        Ok(db)
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get(&self) -> Result<DbConnection> {
        self.pool.get().map_err(|e| InfraError::from(e).into())
    }

    /// Database file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn apply_schema(&self) -> Result<()> {
        let conn = self.get()?;
        conn.execute_batch(SCHEMA_SQL).map_err(InfraError::from)?;

        let stored: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(InfraError::from(other)),
            })?;

        match stored {
            None => {
                conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![
                    SCHEMA_VERSION
                ])
                .map_err(InfraError::from)?;
            }
            Some(version) if version != SCHEMA_VERSION => {
                conn.execute("UPDATE schema_version SET version = ?1", params![SCHEMA_VERSION])
                    .map_err(InfraError::from)?;
                info!(from = version, to = SCHEMA_VERSION, "schema version updated");
            }
            Some(_) => {}
        }
        Ok(())
    }
}
