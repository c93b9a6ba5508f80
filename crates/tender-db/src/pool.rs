//! # Connection Pool
//!
//! Opens the SQLite document store and hands out repositories over it.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Store startup                                  │
//! │                                                                         │
//! │  Settings::db_config()  /  DbConfig::in_memory() in tests              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config)                                                 │
//! │       ├── StoreLocation::File   → WAL journal, NORMAL sync, create     │
//! │       ├── StoreLocation::Memory → one private connection               │
//! │       ├── SqlitePool (min..=max connections)                           │
//! │       └── embedded migrations, unless disabled                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.tenders(server_id)  → TenderRepository sharing the pool            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! File stores run with a WAL journal so reads of one tender never wait on
//! the save of another.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::TenderRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the document store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Private to the pool's single connection; gone when the pool closes.
    Memory,
}

impl StoreLocation {
    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match self {
            StoreLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?,
            StoreLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true),
        };
        Ok(options.foreign_keys(true))
    }
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "{}", path.display()),
            StoreLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// Pool settings for [`Database::new`].
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/tenders/tenders.db")
///     .max_connections(10)
///     .acquire_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: StoreLocation,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    /// Apply embedded migrations while connecting.
    pub migrate: bool,
}

impl DbConfig {
    /// A file store at `path`, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: StoreLocation::File(path.into()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            migrate: true,
        }
    }

    /// An isolated in-memory store for tests.
    ///
    /// Every SQLite connection to `:memory:` opens its own database, so the
    /// pool is pinned to one connection that never idles out.
    pub fn in_memory() -> Self {
        DbConfig {
            location: StoreLocation::Memory,
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: None,
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the document store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects and, when `config.migrate` is set, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(location = %config.location, "Opening tender store");

        let options = config.location.connect_options()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Pool ready"
        );

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Tender repository; `server_id` suffixes every tenderID it issues.
    pub fn tenders(&self, server_id: Option<&str>) -> TenderRepository {
        TenderRepository::new(self.pool.clone()).with_server_id(server_id)
    }

    /// Closes every connection. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing tender store");
        self.pool.close().await;
    }

    /// True when the store answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
