//! # Error Types
//!
//! Domain-specific error types for tender-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tender-core errors (this file)                                        │
//! │  ├── ValidationErrors - Field errors collected by entity validators     │
//! │  ├── OperationError   - Status/role guard rejections (always 403)       │
//! │  ├── ErrorResponse    - The {status, errors[]} envelope a client sees   │
//! │  └── CoreError        - Everything above plus invariant violations      │
//! │                                                                         │
//! │  tender-db errors (separate crate)                                     │
//! │  └── DbError          - Document store failures                        │
//! │                                                                         │
//! │  Flow: ValidationErrors / OperationError → ErrorResponse → HTTP layer  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Envelope Shape
//! ```text
//! {
//!   "status": "error",
//!   "errors": [
//!     {"description": ["This field is required."], "location": "body", "name": "value"},
//!     {"description": {"startDate": ["period should begin before its end"]},
//!      "location": "body", "name": "tenderPeriod"}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A status or role guard rejected the operation.
    #[error("Operation rejected: {0}")]
    Operation(#[from] OperationError),

    /// The request was rejected with a complete error envelope.
    #[error("Request rejected: {0}")]
    Request(#[from] ErrorResponse),

    /// A nested entity asked for its enclosing tender but has none.
    ///
    /// ## When This Occurs
    /// - A validator that needs tender data runs on a node built without
    ///   a parent (a programming error, never user input)
    #[error("{entity} is not attached to a tender")]
    DetachedNode { entity: &'static str },

    /// The entity has no field set for the requested view.
    #[error("{entity} has no '{view}' view")]
    UnknownView { entity: &'static str, view: String },

    /// procurementMethodType has no registered procedure.
    #[error("Procedure not registered: {0}")]
    UnknownProcedure(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Field Errors
// =============================================================================

/// Description of what went wrong with one field.
///
/// Serializes untagged, so a plain message list renders as `["..."]`,
/// a nested model as `{"field": [...]}` and a list of models as
/// `[{"field": [...]}, ...]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Messages(Vec<String>),
    Fields(BTreeMap<String, ErrorDetail>),
    Items(Vec<ErrorDetail>),
}

impl ErrorDetail {
    /// Returns the messages when this detail is a flat message list.
    pub fn messages(&self) -> Vec<&str> {
        match self {
            ErrorDetail::Message(message) => vec![message.as_str()],
            ErrorDetail::Messages(messages) => messages.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Looks up a nested field detail.
    pub fn field(&self, name: &str) -> Option<&ErrorDetail> {
        match self {
            ErrorDetail::Fields(fields) => fields.get(name),
            _ => None,
        }
    }
}

/// Field errors collected by one validation pass, keyed by field name.
///
/// The first detail recorded for a field wins: once a nested model or list
/// has failed, field-level rules on that same field are not reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(BTreeMap<String, ErrorDetail>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Adds a message to a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        match self.0.get_mut(field) {
            None => {
                self.0
                    .insert(field.to_string(), ErrorDetail::Messages(vec![message.into()]));
            }
            Some(ErrorDetail::Messages(messages)) => messages.push(message.into()),
            Some(_) => {}
        }
    }

    /// Records the errors of a nested model under `field`.
    pub fn nest(&mut self, field: &str, inner: ValidationErrors) {
        if !inner.is_empty() && !self.0.contains_key(field) {
            self.0.insert(field.to_string(), ErrorDetail::Fields(inner.0));
        }
    }

    /// Records per-item errors of a list field. Items without errors are skipped.
    pub fn nest_items(&mut self, field: &str, items: Vec<ValidationErrors>) {
        let failed: Vec<ErrorDetail> = items
            .into_iter()
            .filter(|item| !item.is_empty())
            .map(|item| ErrorDetail::Fields(item.0))
            .collect();
        if !failed.is_empty() && !self.0.contains_key(field) {
            self.0.insert(field.to_string(), ErrorDetail::Items(failed));
        }
    }

    /// Merges another set of errors into this one.
    pub fn extend(&mut self, other: ValidationErrors) {
        for (field, detail) in other.0 {
            self.0.entry(field).or_insert(detail);
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&ErrorDetail> {
        self.0.get(field)
    }

    /// Flat messages recorded for a field (empty when none or nested).
    pub fn messages(&self, field: &str) -> Vec<&str> {
        self.0.get(field).map(ErrorDetail::messages).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Converts into `Ok(())` when empty.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Converts into envelope entries, one per field.
    pub fn into_entries(self, location: Location) -> Vec<ErrorEntry> {
        self.0
            .into_iter()
            .map(|(name, description)| ErrorEntry {
                description,
                location,
                name,
            })
            .collect()
    }
}

// =============================================================================
// Operation Error
// =============================================================================

/// Rejection raised by a status/role guard.
///
/// Always rendered as a 403 with location `body` and name `data`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        OperationError {
            message: message.into(),
        }
    }
}

// =============================================================================
// Error Envelope
// =============================================================================

/// Where the offending value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Body,
    Url,
    Params,
    Header,
    Data,
    ProcuringEntity,
    ProcurementMethodType,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Body => "body",
            Location::Url => "url",
            Location::Params => "params",
            Location::Header => "header",
            Location::Data => "data",
            Location::ProcuringEntity => "procuringEntity",
            Location::ProcurementMethodType => "procurementMethodType",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub description: ErrorDetail,
    pub location: Location,
    pub name: String,
}

/// HTTP status codes used by the error envelope.
pub mod status {
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const GONE: u16 = 410;
    pub const UNSUPPORTED_MEDIA_TYPE: u16 = 415;
    pub const UNPROCESSABLE_ENTITY: u16 = 422;
}

/// The error envelope returned for a rejected request.
///
/// ## Status Mapping
/// ```text
/// accreditation / role / ownership  → 403
/// unknown tender or child id        → 404
/// archived tender                   → 410
/// unknown procurementMethodType     → 415
/// schema, reference, business rule  → 422
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request failed with status {status_code}")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub errors: Vec<ErrorEntry>,
}

impl ErrorResponse {
    /// Creates a response holding a single error.
    pub fn new(
        status_code: u16,
        location: Location,
        name: impl Into<String>,
        description: ErrorDetail,
    ) -> Self {
        ErrorResponse {
            status_code,
            errors: vec![ErrorEntry {
                description,
                location,
                name: name.into(),
            }],
        }
    }

    /// 403 with a plain string description.
    pub fn forbidden(location: Location, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            status::FORBIDDEN,
            location,
            name,
            ErrorDetail::Message(message.into()),
        )
    }

    /// 422 with a plain string description.
    pub fn unprocessable(
        location: Location,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            status::UNPROCESSABLE_ENTITY,
            location,
            name,
            ErrorDetail::Message(message.into()),
        )
    }

    /// 404 "Not Found".
    pub fn not_found(location: Location, name: impl Into<String>) -> Self {
        Self::new(
            status::NOT_FOUND,
            location,
            name,
            ErrorDetail::Message("Not Found".to_string()),
        )
    }

    /// 410 "Archived".
    pub fn archived(name: impl Into<String>) -> Self {
        Self::new(
            status::GONE,
            Location::Url,
            name,
            ErrorDetail::Message("Archived".to_string()),
        )
    }

    /// 422 with one entry per failed body field.
    pub fn from_validation(errors: ValidationErrors) -> Self {
        ErrorResponse {
            status_code: status::UNPROCESSABLE_ENTITY,
            errors: errors.into_entries(Location::Body),
        }
    }

    /// Looks up the first entry for a field name.
    pub fn entry(&self, name: &str) -> Option<&ErrorEntry> {
        self.errors.iter().find(|entry| entry.name == name)
    }
}

impl From<OperationError> for ErrorResponse {
    fn from(err: OperationError) -> Self {
        ErrorResponse::forbidden(Location::Body, "data", err.message)
    }
}

impl From<ValidationErrors> for ErrorResponse {
    fn from(errors: ValidationErrors) -> Self {
        ErrorResponse::from_validation(errors)
    }
}

impl Serialize for ErrorResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Envelope<'a> {
            status: &'static str,
            errors: &'a [ErrorEntry],
        }

        Envelope {
            status: "error",
            errors: &self.errors,
        }
        .serialize(serializer)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
