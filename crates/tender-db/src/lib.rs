//! # tender-db: Document Store for Tenders
//!
//! Persists tender documents in SQLite through sqlx, with optimistic
//! revisions, a recorded change history and daily tenderID counters.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tender Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (PATCH /tenders/{id})                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tender-core: validate_patch_tender_data ──► guards                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tender-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repository   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (tender.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ save_tender   │    │ 001_tenders  │  │   │
//! │  │   │ WAL mode      │    │ extract       │    │    .sql      │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐                                            │   │
//! │  │   │   Settings    │  settings.toml + TENDER_* environment      │   │
//! │  │   └───────────────┘                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and their client responses
//! - [`repository`] - The tender document repository
//! - [`settings`] - Settings file and environment overrides
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tender_db::{Database, SaveContext, Settings};
//!
//! let settings = Settings::load(None)?;
//! let db = Database::new(settings.db_config()).await?;
//! let tenders = db.tenders(settings.core.server_id.as_deref());
//!
//! let previous = tenders.load(&id).await?;
//! let mut tender = previous.to_tender()?;
//! // ... apply the validated patch ...
//! let ctx = SaveContext { author: "broker", now, config: &settings.core };
//! tenders.save_tender(&mut tender, Some(&previous), &ctx).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settings;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, StoreLocation};
pub use repository::{SaveContext, StoredDocument, TenderRepository};
pub use settings::{DatabaseSettings, Settings};
