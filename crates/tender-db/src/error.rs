//! # Store Errors
//!
//! What can go wrong between a validated tender and the SQLite row.
//!
//! ## Propagation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    From cause to client                                 │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)         tender-core (CoreError)            │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────── DbError::Invalid                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::to_response() ← 404 / 410 / 422 envelopes for the client     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Anything else is a server error; nothing here is retried              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tender_core::{CoreError, ErrorResponse, Location};
use thiserror::Error;

/// Failures of the tender store.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: String, id: String },

    /// The tender is kept for history only; reads answer 410.
    #[error("tender {id} is archived")]
    Archived { id: String },

    /// The document moved past the revision the caller based its save on.
    ///
    /// ## When This Occurs
    /// - two requests loaded the same rev and the other one saved first
    /// - a new tender reused an id that is already stored
    #[error("tender {id} was modified concurrently (based on {expected})")]
    RevisionConflict { id: String, expected: String },

    /// A unique index other than the document id rejected the row.
    #[error("{field} '{value}' is already taken")]
    UniqueViolation { field: String, value: String },

    #[error("cannot open tender store: {0}")]
    ConnectionFailed(String),

    #[error("schema migration failed: {0}")]
    MigrationFailed(String),

    #[error("query rejected: {0}")]
    QueryFailed(String),

    /// A stored document is not valid tender JSON, or a tender could not be
    /// written as JSON.
    #[error("document encoding: {0}")]
    Serialization(String),

    /// The tender failed domain validation; nothing was written.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// Settings file or environment override could not be read.
    #[error("settings: {0}")]
    Config(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("no free store connection")]
    PoolExhausted,

    #[error("tender store failure: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The envelope a client sees, `None` for failures on our side.
    ///
    /// ```text
    /// NotFound             404  url/tender_id  "Not Found"
    /// Archived             410  url/tender_id  "Archived"
    /// Invalid(Validation)  422  one entry per field
    /// Invalid(Request)     the envelope as raised
    /// Invalid(Operation)   403  body/data
    /// ```
    pub fn to_response(&self) -> Option<ErrorResponse> {
        match self {
            DbError::NotFound { .. } => Some(ErrorResponse::not_found(Location::Url, "tender_id")),
            DbError::Archived { .. } => Some(ErrorResponse::archived("tender_id")),
            DbError::Invalid(CoreError::Validation(errors)) => {
                Some(ErrorResponse::from_validation(errors.clone()))
            }
            DbError::Invalid(CoreError::Request(response)) => Some(response.clone()),
            DbError::Invalid(CoreError::Operation(err)) => Some(err.clone().into()),
            _ => None,
        }
    }
}

/// ```text
/// RowNotFound                 → NotFound
/// Database, unique violation  → UniqueViolation { field: "<table>.<column>" }
/// Database, anything else     → QueryFailed
/// PoolTimedOut                → PoolExhausted
/// PoolClosed                  → ConnectionFailed
/// other                       → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("row", "?"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                // SQLite names the column: "UNIQUE constraint failed: tenders.id"
                let field = db_err
                    .message()
                    .rsplit(": ")
                    .next()
                    .unwrap_or_default()
                    .to_string();
                DbError::duplicate(field, "?")
            }
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tender_core::{OperationError, ValidationErrors};

    #[test]
    fn test_client_responses() {
        let response = DbError::not_found("Tender", "abc").to_response().unwrap();
        assert_eq!(response.status_code, 404);
        assert_eq!(response.errors[0].name, "tender_id");

        let response = DbError::Archived { id: "abc".into() }.to_response().unwrap();
        assert_eq!(response.status_code, 410);

        let mut errors = ValidationErrors::new();
        errors.add("title", "This field is required.");
        let response = DbError::Invalid(CoreError::Validation(errors)).to_response().unwrap();
        assert_eq!(response.status_code, 422);
        assert_eq!(response.errors[0].name, "title");

        let err = DbError::Invalid(CoreError::Operation(OperationError::new("nope")));
        assert_eq!(err.to_response().unwrap().status_code, 403);

        assert!(DbError::PoolExhausted.to_response().is_none());
        let conflict = DbError::RevisionConflict {
            id: "abc".into(),
            expected: "1-x".into(),
        };
        assert!(conflict.to_response().is_none());
    }
}
