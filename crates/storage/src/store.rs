//! SQLite-backed weather store using sqlx.

use std::path::Path;
use std::str::FromStr;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use tokio::sync::Mutex;
use tracing::info;

use weather_common::{EtlError, EtlResult};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS weather_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    source TEXT NOT NULL,
    temperature REAL NOT NULL,
    precipitation REAL NOT NULL DEFAULT 0.0,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_weather_key
    ON weather_data(timestamp, lat, lon, source);

CREATE INDEX IF NOT EXISTS idx_weather_timestamp ON weather_data(timestamp);

CREATE TABLE IF NOT EXISTS consensus_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    weighted_temperature REAL NOT NULL,
    source_count INTEGER NOT NULL,
    computed_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_consensus_key
    ON consensus_data(timestamp, lat, lon);

CREATE INDEX IF NOT EXISTS idx_consensus_timestamp ON consensus_data(timestamp)
"#;

pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> EtlError {
    move |e| EtlError::PersistenceFailure(format!("{}: {}", context, e))
}

/// Persisted observations and consensus values.
///
/// The store is the only writer of both tables. Write batches are
/// serialized through `write_lock`, each inside one transaction.
pub struct WeatherStore {
    pool: SqlitePool,
    pub(crate) write_lock: Mutex<()>,
}

impl WeatherStore {
    /// Connect using a database URL such as `sqlite://weather.db`.
    pub async fn connect(database_url: &str) -> EtlResult<Self> {
        if database_url.contains(":memory:") {
            return Self::open_memory().await;
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_error("Invalid database URL"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("Connection failed"))?;

        let store = Self::from_pool(pool);
        store.migrate().await?;

        info!(url = %database_url, "Opened weather database");
        Ok(store)
    }

    /// Open or create the database at the given path.
    pub async fn open(path: &Path) -> EtlResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EtlError::PersistenceFailure(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to open SQLite database"))?;

        let store = Self::from_pool(pool);
        store.migrate().await?;

        info!(path = %path.display(), "Opened weather database");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    ///
    /// Limited to one connection that is never recycled, since every
    /// SQLite memory connection is its own database.
    pub async fn open_memory() -> EtlResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to open in-memory database"))?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Create tables and indexes if missing.
    pub async fn migrate(&self) -> EtlResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(db_error("Migration failed"))?;
            }
        }

        Ok(())
    }

    /// Acquire a scoped session. The connection returns to the pool when
    /// the handle is dropped, on every exit path.
    pub async fn session(&self) -> EtlResult<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire session"))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for sessions to be released.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
