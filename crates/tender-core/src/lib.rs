//! # tender-core: Domain Logic for the Tender API
//!
//! This crate holds everything the tender API decides without touching a
//! database: the entity models, their field and cross-entity rules, the
//! status/role guards, the ACL and traversal layer, and the request
//! validation entry points the HTTP layer calls.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tender API Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HTTP layer (not in this workspace)           │   │
//! │  │    routes ──► traversal ──► request validators ──► guards       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tender-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  models   │  │ calendar  │  │validation │  │  guards   │  │   │
//! │  │   │  Tender   │  │ business  │  │ features  │  │  status/  │  │   │
//! │  │   │  Bid ...  │  │   days    │  │ contracts │  │   role    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ traversal │  │  request  │  │ registry  │  │ revision  │  │   │
//! │  │   │  ACL/404  │  │ validators│  │procedures │  │   diffs   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO SYSTEM CLOCK • PURE FUNCTIONS      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tender-db (Persistence Layer)                │   │
//! │  │          SQLite documents, revisions, tenderID counters         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`models`] - The tender aggregate and its per-view field tables
//! - [`calendar`] - Business-day arithmetic and auction timing
//! - [`validation`] - Cross-entity rules (features, lot values, contract values)
//! - [`guards`] - Status and role checks raised as operation errors
//! - [`traversal`] - URL resolution, ACLs and authenticated roles
//! - [`request`] - Request validation entry points
//! - [`registry`] - Procedures keyed by `procurementMethodType`
//! - [`revision`] - Revision history as JSON patch operations
//!
//! ## Example Usage
//!
//! ```rust
//! use tender_core::calendar::calc_auction_end_time;
//! use tender_core::time::{format_iso, kyiv_midnight};
//!
//! let start = kyiv_midnight(2017, 10, 7);
//! let end = calc_auction_end_time(3, start);
//! assert_eq!(format_iso(&end), "2017-10-07T00:42:00+03:00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod amount;
pub mod calendar;
pub mod config;
pub mod constants;
pub mod error;
pub mod guards;
pub mod models;
pub mod node;
pub mod registry;
pub mod request;
pub mod revision;
pub mod roles;
pub mod time;
pub mod traversal;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use amount::{Amount, ContractValue, Guarantee, Value};
pub use config::CoreConfig;
pub use error::{
    CoreError, CoreResult, ErrorDetail, ErrorResponse, Location, OperationError, ValidationErrors,
};
pub use models::{Entity, Tender, TenderStatus};
pub use registry::{ProcedureDescriptor, ProcedureRegistry, TenderKind};
pub use request::{Method, RequestContext, Validated};
pub use roles::View;
pub use time::Timestamp;
