//! # Serialization Views
//!
//! Every entity renders and accepts a fixed field set per named view.
//!
//! ## View Table
//! ```text
//! ┌──────────────────┬────────────────────────────────────────────────────┐
//! │ View             │ Used for                                           │
//! ├──────────────────┼────────────────────────────────────────────────────┤
//! │ Plain            │ storage and revision diffs (every field)           │
//! │ View / Embedded  │ public reads, stand-alone and inside the tender    │
//! │ Status(s)        │ tender reads while the tender is in status s       │
//! │ Create           │ write mask for POST bodies                         │
//! │ Edit             │ write mask for PATCH bodies by the owner           │
//! │ EditStatus(s)    │ tender write mask for status s                     │
//! │ Administrator    │ administrative tender edits                        │
//! │ Chronograph      │ status switching by the scheduler                  │
//! │ Contracting      │ contract synchronisation                           │
//! │ Draft .. Satisfy │ complaint workflow write masks                     │
//! │ ViewClaim        │ complaint read while claims are anonymous          │
//! └──────────────────┴────────────────────────────────────────────────────┘
//! ```
//!
//! An entity that has no field set for a view rejects it, which the
//! request layer turns into a 403.

use std::fmt;

use serde_json::{Map, Value as JsonValue};

use crate::models::tender::TenderStatus;

/// A named field subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Plain,
    View,
    Embedded,
    Status(TenderStatus),
    Create,
    Edit,
    EditStatus(TenderStatus),
    Administrator,
    Chronograph,
    Contracting,
    Draft,
    Answer,
    Satisfy,
    Cancellation,
    ViewClaim,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Plain => f.write_str("plain"),
            View::View => f.write_str("view"),
            View::Embedded => f.write_str("embedded"),
            View::Status(status) => f.write_str(status.as_str()),
            View::Create => f.write_str("create"),
            View::Edit => f.write_str("edit"),
            View::EditStatus(status) => write!(f, "edit_{}", status),
            View::Administrator => f.write_str("Administrator"),
            View::Chronograph => f.write_str("chronograph"),
            View::Contracting => f.write_str("contracting"),
            View::Draft => f.write_str("draft"),
            View::Answer => f.write_str("answer"),
            View::Satisfy => f.write_str("satisfy"),
            View::Cancellation => f.write_str("cancellation"),
            View::ViewClaim => f.write_str("view_claim"),
        }
    }
}

/// Which serialized fields a view keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFilter {
    All,
    Only(&'static [&'static str]),
    Except(&'static [&'static str]),
}

impl FieldFilter {
    pub fn allows(&self, field: &str) -> bool {
        match self {
            FieldFilter::All => true,
            FieldFilter::Only(fields) => fields.contains(&field),
            FieldFilter::Except(fields) => !fields.contains(&field),
        }
    }

    /// Drops the keys of a serialized object the filter rejects.
    pub fn apply(&self, object: Map<String, JsonValue>) -> Map<String, JsonValue> {
        if *self == FieldFilter::All {
            return object;
        }
        object
            .into_iter()
            .filter(|(key, _)| self.allows(key))
            .collect()
    }
}

/// Fields only the owner ever sees.
pub const OWNER_FIELDS: &[&str] = &["owner_token", "transfer_token"];
