//! # Bids
//!
//! A supplier's offer. On a tender without lots the bid carries one
//! `value`; on a lotted tender it carries one `LotValue` per lot it
//! competes for and no top-level value.
//!
//! ## Cross-Entity Rules
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────┐
//! │ Tender shape             │ Bid must                                 │
//! ├──────────────────────────┼──────────────────────────────────────────┤
//! │ lots present             │ omit value and participationUrl          │
//! │                          │ carry lotValues without duplicate lots   │
//! │                          │ answer the features of its lots          │
//! ├──────────────────────────┼──────────────────────────────────────────┤
//! │ no lots                  │ carry value ≤ tender value, same         │
//! │                          │ currency and VAT flag                    │
//! │                          │ answer every feature                     │
//! └──────────────────────────┴──────────────────────────────────────────┘
//! ```
//! These rules only run for bids attached to a tender.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::common::{new_id, Document, Organization};
use super::feature::FeatureOf;
use super::{
    assign_list_ids, filtered, require, require_list, require_str, validate_list, Entity,
};
use crate::amount::Value;
use crate::constants::bid_lot_values_validation_from;
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View, OWNER_FIELDS};
use crate::time::Timestamp;
use crate::traversal::{principal, Ace, Permission, Principal};
use crate::validation::{validate_lot_value, validate_uniqueness};

use super::tender::{Tender, TenderStatus};

const ALL_PARAMETERS: &str = "All features parameters is required.";

crate::string_enum! {
    #[derive(Default)]
    pub enum BidStatus {
        Draft => "draft",
        Pending => "pending",
        #[default]
        Active => "active",
        Invalid => "invalid",
        Unsuccessful => "unsuccessful",
        Deleted => "deleted",
    }
}

// =============================================================================
// Parameter
// =============================================================================

/// The bidder's answer to one feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Parameter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Parameter {
    pub fn new(code: &str, value: f64) -> Self {
        Parameter {
            code: Some(code.to_string()),
            value: Some(value),
        }
    }
}

impl Entity for Parameter {
    const NAME: &'static str = "Parameter";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "code", &self.code);
        require(&mut errors, "value", &self.value);
        if !scope.has_parent() {
            return Ok(errors);
        }

        let tender = scope.enclosing_tender()?;
        if let Some(code) = &self.code {
            match tender.feature(code) {
                None => errors.add("code", "code should be one of feature code."),
                Some(feature) => {
                    if let Some(value) = self.value {
                        if !feature.has_value(value) {
                            errors.add("value", "value should be one of feature value.");
                        }
                    }
                }
            }
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

// =============================================================================
// LotValue
// =============================================================================

/// The bid's price for one lot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct LotValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_lot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date: Option<Timestamp>,
}

impl LotValue {
    pub fn new(related_lot: &str, value: Value) -> Self {
        LotValue {
            value: Some(value),
            related_lot: Some(related_lot.to_string()),
            ..LotValue::default()
        }
    }
}

impl Entity for LotValue {
    const NAME: &'static str = "LotValue";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "value", &self.value);
        require_str(&mut errors, "relatedLot", &self.related_lot);
        if let Some(value) = &self.value {
            errors.nest("value", value.validate());
        }
        if let Some(url) = &self.participation_url {
            super::common::check_url(&mut errors, "participationUrl", url);
        }
        if !scope.has_parent() {
            return Ok(errors);
        }

        let tender = scope.enclosing_tender()?;
        if let Some(related) = &self.related_lot {
            if tender.lot(related).is_none() {
                errors.add("relatedLot", "relatedLot should be one of lots");
            }
            if let Some(value) = &self.value {
                if let Err(message) = validate_lot_value(tender, related, value) {
                    errors.add("value", message);
                }
            }
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

// =============================================================================
// Bid
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Bid {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tenderers: Vec<Organization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lot_values: Vec<LotValue>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date: Option<Timestamp>,
    pub status: BidStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(rename = "owner_token", skip_serializing_if = "Option::is_none")]
    pub owner_token: Option<String>,
    #[serde(rename = "transfer_token", skip_serializing_if = "Option::is_none")]
    pub transfer_token: Option<String>,
}

impl Bid {
    pub fn local_roles(&self) -> BTreeMap<String, &'static str> {
        let owner = principal(self.owner.as_deref(), self.owner_token.as_deref());
        BTreeMap::from([(owner, "bid_owner")])
    }

    pub fn acl(&self) -> Vec<Ace> {
        let owner = principal(self.owner.as_deref(), self.owner_token.as_deref());
        vec![Ace::allow(Principal::named(&owner), Permission::EditBid)]
    }

    /// True when one of the lot values points at `lot_id`.
    pub fn bids_on(&self, lot_id: &str) -> bool {
        self.lot_values
            .iter()
            .any(|lv| lv.related_lot.as_deref() == Some(lot_id))
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().rev().find(|d| d.id.as_deref() == Some(id))
    }

    fn check_lot_values(&self, errors: &mut ValidationErrors, first_revision: Timestamp) {
        if self.lot_values.is_empty() {
            errors.add("lotValues", super::REQUIRED);
            return;
        }
        if first_revision > bid_lot_values_validation_from() {
            let lots: Vec<_> = self.lot_values.iter().map(|lv| lv.related_lot.as_deref()).collect();
            let distinct: BTreeSet<_> = lots.iter().collect();
            if distinct.len() != lots.len() {
                errors.add("lotValues", "bids don't allow duplicated proposals");
            }
        }
    }

    fn check_value(&self, errors: &mut ValidationErrors, tender: &Tender) {
        let Some(value) = &self.value else {
            errors.add("value", super::REQUIRED);
            return;
        };
        let Some(tender_value) = &tender.value else {
            return;
        };
        if tender_value.amount < value.amount {
            errors.add("value", "value of bid should be less than value of tender");
        } else if tender_value.currency != value.currency {
            errors.add("value", "currency of bid should be identical to currency of value of tender");
        } else if tender_value.value_added_tax_included != value.value_added_tax_included {
            errors.add(
                "value",
                "valueAddedTaxIncluded of bid should be identical to valueAddedTaxIncluded of value of tender",
            );
        }
    }

    fn check_parameters(&self, errors: &mut ValidationErrors, tender: &Tender) {
        let given: BTreeSet<&str> = self.parameters.iter().filter_map(|p| p.code.as_deref()).collect();
        if tender.is_lotted() {
            let lots: BTreeSet<&str> = self
                .lot_values
                .iter()
                .filter_map(|lv| lv.related_lot.as_deref())
                .collect();
            let items: BTreeSet<&str> = tender
                .items
                .iter()
                .filter(|item| item.related_lot.as_deref().is_some_and(|lot| lots.contains(lot)))
                .filter_map(|item| item.id.as_deref())
                .collect();
            let expected: BTreeSet<&str> = tender
                .features
                .iter()
                .filter(|feature| {
                    let related = feature.related_item.as_deref();
                    match feature.feature_of {
                        FeatureOf::Tenderer => true,
                        FeatureOf::Lot => related.is_some_and(|id| lots.contains(id)),
                        FeatureOf::Item => related.is_some_and(|id| items.contains(id)),
                    }
                })
                .filter_map(|feature| feature.code.as_deref())
                .collect();
            if given != expected {
                errors.add("parameters", ALL_PARAMETERS);
            }
        } else if self.parameters.is_empty() && !tender.features.is_empty() {
            errors.add("parameters", super::REQUIRED);
        } else {
            let expected: BTreeSet<&str> =
                tender.features.iter().filter_map(|f| f.code.as_deref()).collect();
            if given != expected {
                errors.add("parameters", ALL_PARAMETERS);
            }
        }
    }
}

impl Entity for Bid {
    const NAME: &'static str = "Bid";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_list(&mut errors, "tenderers", &self.tenderers);
        validate_list(&mut errors, "tenderers", &self.tenderers, scope)?;
        validate_list(&mut errors, "parameters", &self.parameters, scope)?;
        validate_list(&mut errors, "lotValues", &self.lot_values, scope)?;
        validate_list(&mut errors, "documents", &self.documents, scope)?;
        if let Some(value) = &self.value {
            errors.nest("value", value.validate());
        }
        if let Some(url) = &self.participation_url {
            super::common::check_url(&mut errors, "participationUrl", url);
        }
        if let Err(message) = validate_uniqueness(
            &self.parameters,
            |p| p.code.clone(),
            "Parameter code should be uniq for all parameters",
        ) {
            errors.add("parameters", message);
        }

        let Some(tender) = scope.parent_tender() else {
            return Ok(errors);
        };
        if tender.is_lotted() {
            if self.participation_url.is_some() {
                errors.add("participationUrl", "url should be posted for each lot of bid");
            }
            if self.value.is_some() {
                errors.add("value", "value should be posted for each lot of bid");
            }
            let first_revision = scope.first_revision_date()?;
            self.check_lot_values(&mut errors, first_revision);
        } else {
            self.check_value(&mut errors, tender);
        }
        self.check_parameters(&mut errors, tender);
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        match view {
            View::Plain => Some(FieldFilter::All),
            View::View | View::Embedded => Some(FieldFilter::Except(OWNER_FIELDS)),
            View::Status(status) => match status {
                TenderStatus::ActiveEnquiries | TenderStatus::ActiveTendering => {
                    Some(FieldFilter::Only(&[]))
                }
                TenderStatus::ActiveAuction => Some(FieldFilter::Only(&["value"])),
                _ => Some(FieldFilter::Except(OWNER_FIELDS)),
            },
            View::Create => Some(FieldFilter::Only(&[
                "value",
                "status",
                "tenderers",
                "parameters",
                "lotValues",
                "documents",
            ])),
            View::Edit => Some(FieldFilter::Only(&[
                "value",
                "status",
                "tenderers",
                "parameters",
                "lotValues",
            ])),
            View::Administrator => Some(FieldFilter::Only(&["tenderers"])),
            _ => None,
        }
    }

    fn serialize_view(&self, view: View, _scope: &Scope) -> CoreResult<JsonValue> {
        let hidden = matches!(self.status, BidStatus::Invalid | BidStatus::Deleted);
        if hidden && !matches!(view, View::Create | View::Plain) {
            let rendered = serde_json::to_value(self)?;
            let object = match rendered {
                JsonValue::Object(object) => FieldFilter::Only(&["id", "status"]).apply(object),
                _ => Default::default(),
            };
            return Ok(JsonValue::Object(object));
        }
        filtered(self, view)
    }

    fn assign_ids(&mut self) {
        if self.id.is_none() {
            self.id = Some(new_id());
        }
        assign_list_ids(&mut self.documents);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
