//! # Lots
//!
//! A lot is rendered with values derived from its tender:
//!
//! ```text
//! ┌────────────────────────────┬─────────────────────────────────────────┐
//! │ Field                      │ Rendered as                             │
//! ├────────────────────────────┼─────────────────────────────────────────┤
//! │ value, minimalStep         │ own amount, tender currency and VAT     │
//! │ guarantee                  │ own amount, tender guarantee currency   │
//! │ numberOfBids               │ active bids with a lotValue on the lot  │
//! │ auctionPeriod.shouldStart… │ estimated earliest auction start        │
//! └────────────────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! The plain view stores what the client sent and nothing derived.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::bid::BidStatus;
use super::common::new_id;
use super::tender::{Tender, TenderStatus};
use super::{filtered, require, require_str, Entity};
use crate::amount::{Guarantee, Value};
use crate::calendar::{calc_auction_end_time, rounding_should_start_after};
use crate::config::CoreConfig;
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::time::{format_iso, Timestamp};

crate::string_enum! {
    #[derive(Default)]
    pub enum LotStatus {
        #[default]
        Active => "active",
        Cancelled => "cancelled",
        Unsuccessful => "unsuccessful",
        Complete => "complete",
    }
}

// =============================================================================
// Auction Period
// =============================================================================

/// Auction window of a tender or a lot.
///
/// `shouldStartAfter` is computed on render; a value sent by a client is
/// accepted and dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct AuctionPeriod {
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub start_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub end_date: Option<Timestamp>,
    #[serde(skip_serializing, deserialize_with = "crate::time::iso_opt::deserialize")]
    pub should_start_after: Option<Timestamp>,
}

impl AuctionPeriod {
    pub fn starting(start_date: Timestamp) -> Self {
        AuctionPeriod {
            start_date: Some(start_date),
            ..AuctionPeriod::default()
        }
    }

    /// Earliest auction start for `number_of_bids` participants.
    ///
    /// Once the estimated auction end has passed, the estimate moves to that
    /// end; otherwise it is the end of the tendering period.
    pub(crate) fn estimate_start(
        &self,
        number_of_bids: i64,
        tender: &Tender,
        now: Timestamp,
        config: &CoreConfig,
    ) -> Option<Timestamp> {
        let auction_end = self
            .start_date
            .map(|start| calc_auction_end_time(number_of_bids, start))
            .filter(|end| now > *end);
        let start_after = match auction_end {
            Some(end) => end,
            None => tender.tender_period.as_ref()?.end_date?,
        };
        Some(rounding_should_start_after(start_after, tender, now, config))
    }

    /// Serializes with the derived `shouldStartAfter` when known.
    pub(crate) fn render(&self, should_start_after: Option<Timestamp>) -> CoreResult<JsonValue> {
        let mut rendered = serde_json::to_value(self)?;
        if let (Some(object), Some(at)) = (rendered.as_object_mut(), should_start_after) {
            object.insert("shouldStartAfter".to_string(), JsonValue::from(format_iso(&at)));
        }
        Ok(rendered)
    }
}

impl Entity for AuctionPeriod {
    const NAME: &'static str = "AuctionPeriod";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                errors.add("startDate", "period should begin before its end");
            }
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

// =============================================================================
// Lot
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Lot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "title_en", skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "description_en", skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal_step: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantee: Option<Guarantee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_period: Option<AuctionPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_url: Option<String>,
    pub status: LotStatus,
    #[serde(skip_serializing, deserialize_with = "ignore_count")]
    pub number_of_bids: Option<i64>,
}

fn ignore_count<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    <Option<i64> as Deserialize>::deserialize(deserializer).map(|_| None)
}

impl Lot {
    /// Active bids with a lot value on this lot.
    pub fn count_bids(&self, tender: &Tender) -> i64 {
        let Some(id) = self.id.as_deref() else {
            return 0;
        };
        tender
            .bids
            .iter()
            .filter(|bid| bid.status == BidStatus::Active && bid.bids_on(id))
            .count() as i64
    }

    /// Lot value in the tender's currency and tax mode.
    pub fn lot_value(&self, tender: &Tender) -> Option<Value> {
        let value = self.value.as_ref()?;
        Some(match &tender.value {
            Some(parent) => value.inherit(parent),
            None => value.clone(),
        })
    }

    pub fn lot_minimal_step(&self, tender: &Tender) -> Option<Value> {
        let step = self.minimal_step.as_ref()?;
        Some(match &tender.minimal_step {
            Some(parent) => step.inherit(parent),
            None => step.clone(),
        })
    }

    pub fn lot_guarantee(&self, tender: &Tender) -> Option<Guarantee> {
        let guarantee = self.guarantee.as_ref()?;
        Some(match &tender.guarantee {
            Some(parent) => guarantee.inherit(parent),
            None => guarantee.clone(),
        })
    }

    /// Derived `auctionPeriod.shouldStartAfter`.
    pub fn should_start_after(
        &self,
        tender: &Tender,
        now: Timestamp,
        config: &CoreConfig,
    ) -> Option<Timestamp> {
        let period = self.auction_period.as_ref()?;
        if period.end_date.is_some() || self.status != LotStatus::Active {
            return None;
        }
        if !matches!(
            tender.status,
            TenderStatus::ActiveTendering | TenderStatus::ActiveAuction
        ) {
            return None;
        }
        let number_of_bids = self.count_bids(tender);
        if tender.status == TenderStatus::ActiveAuction && number_of_bids < 2 {
            return None;
        }
        period.estimate_start(number_of_bids, tender, now, config)
    }
}

impl Entity for Lot {
    const NAME: &'static str = "Lot";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "title", &self.title);
        require(&mut errors, "value", &self.value);
        require(&mut errors, "minimalStep", &self.minimal_step);
        if let Some(value) = &self.value {
            errors.nest("value", value.validate());
        }
        if let Some(step) = &self.minimal_step {
            errors.nest("minimalStep", step.validate());
        }
        if let Some(guarantee) = &self.guarantee {
            errors.nest("guarantee", guarantee.validate());
        }
        super::validate_nested(&mut errors, "auctionPeriod", self.auction_period.as_ref(), scope)?;

        if let (Some(step), Some(value)) = (&self.minimal_step, &self.value) {
            if value.amount < step.amount {
                errors.add("minimalStep", "value should be less than value of lot");
            }
        }
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        match view {
            View::Create => Some(FieldFilter::Except(&["id", "date", "status", "auctionPeriod", "auctionUrl"])),
            View::Edit => Some(FieldFilter::Except(&["id", "date", "status", "auctionPeriod", "auctionUrl"])),
            View::Chronograph => Some(FieldFilter::Only(&["id", "auctionPeriod"])),
            View::Administrator => Some(FieldFilter::Only(&["id", "auctionPeriod", "status"])),
            View::Plain | View::View | View::Embedded | View::Status(_) => Some(FieldFilter::All),
            _ => None,
        }
    }

    fn serialize_view(&self, view: View, scope: &Scope) -> CoreResult<JsonValue> {
        let mut rendered = filtered(self, view)?;
        let derived = !matches!(view, View::Plain | View::Create | View::Edit);
        let (Some(tender), Some(object), true) = (scope.parent_tender(), rendered.as_object_mut(), derived)
        else {
            return Ok(rendered);
        };

        if object.contains_key("value") {
            if let Some(value) = self.lot_value(tender) {
                object.insert("value".to_string(), serde_json::to_value(value)?);
            }
        }
        if object.contains_key("minimalStep") {
            if let Some(step) = self.lot_minimal_step(tender) {
                object.insert("minimalStep".to_string(), serde_json::to_value(step)?);
            }
        }
        if object.contains_key("guarantee") {
            if let Some(guarantee) = self.lot_guarantee(tender) {
                object.insert("guarantee".to_string(), serde_json::to_value(guarantee)?);
            }
        }
        if let (true, Some(period)) = (object.contains_key("auctionPeriod"), &self.auction_period) {
            let should_start_after = self.should_start_after(tender, scope.now(), scope.config());
            object.insert("auctionPeriod".to_string(), period.render(should_start_after)?);
        }
        if Self::filter(view).is_some_and(|filter| filter.allows("numberOfBids")) {
            object.insert("numberOfBids".to_string(), JsonValue::from(self.count_bids(tender)));
        }
        Ok(rendered)
    }

    fn assign_ids(&mut self) {
        if self.id.is_none() {
            self.id = Some(new_id());
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
