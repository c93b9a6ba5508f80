//! # Entity Models
//!
//! The tender aggregate and everything nested inside it.
//!
//! ## Aggregate Shape
//! ```text
//! Tender
//! ├── items[]          Item ── classification, additionalClassifications[]
//! ├── lots[]           Lot ── auctionPeriod (derived shouldStartAfter)
//! ├── features[]       Feature ── enum[] FeatureValue
//! ├── bids[]           Bid ── lotValues[], parameters[], documents[]
//! ├── awards[]         Award ── complaints[], documents[]
//! ├── contracts[]      Contract ── documents[]
//! ├── complaints[]     Complaint ── documents[]
//! ├── cancellations[]  Cancellation ── documents[]
//! ├── questions[]      Question
//! └── documents[]      Document
//! ```
//!
//! Every entity implements [`Entity`]: a validator that sees the enclosing
//! tender through a [`Scope`] and a per-view field table used for
//! serialization and write masks.

pub mod award;
pub mod bid;
pub mod cancellation;
pub mod common;
pub mod complaint;
pub mod contract;
pub mod feature;
pub mod lot;
pub mod question;
pub mod tender;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};

pub use award::{Award, AwardStatus};
pub use bid::{Bid, BidStatus, LotValue, Parameter};
pub use cancellation::{Cancellation, CancellationOf, CancellationStatus};
pub use common::{
    Address, Classification, ContactPoint, Document, DocumentOf, Identifier, Item, Organization,
    Period, PeriodEndRequired, ProcuringEntity, ProcuringEntityKind, Unit,
};
pub use complaint::{Complaint, ComplaintRole, ComplaintStatus, ComplaintType, ResolutionType};
pub use contract::{Contract, ContractStatus};
pub use feature::{Feature, FeatureOf, FeatureValue};
pub use lot::{AuctionPeriod, Lot, LotStatus};
pub use question::{Question, QuestionOf};
pub use tender::{Tender, TenderStatus};

pub const REQUIRED: &str = "This field is required.";

// =============================================================================
// Entity Trait
// =============================================================================

/// A node of the tender aggregate.
pub trait Entity: Serialize + DeserializeOwned + Sized {
    /// Name used in diagnostics and scopes.
    const NAME: &'static str;

    /// Runs field and cross-entity rules.
    ///
    /// Returns the accumulated field errors; `Err` only for invariant
    /// violations such as a detached node asking for its tender.
    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors>;

    /// Field set for a view, `None` when the view is not defined.
    fn filter(view: View) -> Option<FieldFilter>;

    /// Serializes the entity through a view.
    fn serialize_view(&self, view: View, _scope: &Scope) -> CoreResult<JsonValue> {
        filtered(self, view)
    }

    /// Fills in generated identifiers before the first save.
    fn assign_ids(&mut self) {}
}

/// Assigns ids to every element of a nested list.
pub(crate) fn assign_list_ids<E: Entity>(values: &mut [E]) {
    for value in values {
        value.assign_ids();
    }
}

/// Serializes a nested list through `view`, one child scope per element.
pub(crate) fn render_list<E: Entity>(
    values: &[E],
    view: View,
    scope: &Scope,
) -> CoreResult<JsonValue> {
    let child = scope.child(E::NAME);
    let rendered = values
        .iter()
        .map(|value| value.serialize_view(view, &child))
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(JsonValue::Array(rendered))
}

/// Serializes `entity` and keeps the fields its view allows.
pub fn filtered<E: Entity>(entity: &E, view: View) -> CoreResult<JsonValue> {
    let filter = E::filter(view).ok_or_else(|| CoreError::UnknownView {
        entity: E::NAME,
        view: view.to_string(),
    })?;
    match serde_json::to_value(entity)? {
        JsonValue::Object(object) => Ok(JsonValue::Object(filter.apply(object))),
        other => Ok(other),
    }
}

// =============================================================================
// Validation Helpers
// =============================================================================

pub(crate) fn require<T>(errors: &mut ValidationErrors, field: &str, value: &Option<T>) {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
}

pub(crate) fn require_str(errors: &mut ValidationErrors, field: &str, value: &Option<String>) {
    if value.as_deref().map_or(true, str::is_empty) {
        errors.add(field, REQUIRED);
    }
}

pub(crate) fn require_list<T>(errors: &mut ValidationErrors, field: &str, values: &[T]) {
    if values.is_empty() {
        errors.add(field, REQUIRED);
    }
}

/// Validates a nested entity and records its errors under `field`.
pub(crate) fn validate_nested<E: Entity>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&E>,
    scope: &Scope,
) -> CoreResult<()> {
    if let Some(value) = value {
        let child = scope.child(E::NAME);
        errors.nest(field, value.validate(&child)?);
    }
    Ok(())
}

/// Validates every element of a nested list.
pub(crate) fn validate_list<E: Entity>(
    errors: &mut ValidationErrors,
    field: &str,
    values: &[E],
    scope: &Scope,
) -> CoreResult<()> {
    let child = scope.child(E::NAME);
    let mut items = Vec::with_capacity(values.len());
    for value in values {
        items.push(value.validate(&child)?);
    }
    errors.nest_items(field, items);
    Ok(())
}

/// Renders a choices error the way clients expect it.
pub fn choices_message(choices: &[&str]) -> String {
    let quoted: Vec<String> = choices.iter().map(|choice| format!("'{}'", choice)).collect();
    format!("Value must be one of [{}].", quoted.join(", "))
}

// =============================================================================
// String Enums
// =============================================================================

/// Declares a closed set of string values.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` and serde impls that
/// reject unknown values with the choices message.
#[macro_export]
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, String> {
                match raw {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::models::choices_message(&[$($text),+])),
                }
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(::serde::de::Error::custom)
            }
        }
    };
}
