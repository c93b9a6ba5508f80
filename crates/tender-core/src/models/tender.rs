//! # Tender
//!
//! The root of the aggregate. A tender owns every nested collection and is
//! the only node that is stored on its own.
//!
//! ## Status Flow
//! ```text
//! draft ──► active.enquiries ──► active.tendering ──► active.auction
//!                                       │                   │
//!                                       ▼                   ▼
//!                     active.pre-qualification     active.qualification
//!                                       │                   │
//!                                       ▼                   ▼
//!                  active.pre-qualification.stand-still  active.awarded ──► complete
//!
//! any active status ──► cancelled | unsuccessful
//! ```
//!
//! ## Write Roles
//! ```text
//! ┌──────────────────┬─────────────────────────────────────────────────┐
//! │ Authenticated as │ Write mask                                      │
//! ├──────────────────┼─────────────────────────────────────────────────┤
//! │ Administrator    │ status, mode, procuringEntity, auctionPeriod,   │
//! │                  │ lots                                            │
//! │ chronograph      │ auctionPeriod, lots                             │
//! │ contracting      │ owner                                           │
//! │ anyone else      │ edit_<status>: owner fields while the tender is │
//! │                  │ draft or open for questions and bids, else none │
//! └──────────────────┴─────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::award::Award;
use super::bid::{Bid, BidStatus};
use super::cancellation::Cancellation;
use super::common::{new_id, Document, Item, Period, PeriodEndRequired, ProcuringEntity};
use super::complaint::{Complaint, ComplaintStatus};
use super::contract::Contract;
use super::feature::{Feature, FeatureOf};
use super::lot::{AuctionPeriod, Lot, LotStatus};
use super::question::{Question, QuestionOf};
use super::{
    assign_list_ids, choices_message, filtered, render_list, require, require_list, require_str,
    validate_list, validate_nested, Entity,
};
use crate::amount::{Guarantee, Value};
use crate::calendar::BusinessContext;
use crate::config::CoreConfig;
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::revision::Revision;
use crate::roles::{FieldFilter, View};
use crate::time::{format_iso, Timestamp};
use crate::traversal::{principal, Ace, Permission, Principal};
use crate::validation::{validate_features_max_sum, validate_items_classification, validate_uniqueness};

crate::string_enum! {
    #[derive(Default)]
    pub enum TenderStatus {
        Draft => "draft",
        #[default]
        ActiveEnquiries => "active.enquiries",
        ActiveTendering => "active.tendering",
        ActivePreQualification => "active.pre-qualification",
        ActivePreQualificationStandStill => "active.pre-qualification.stand-still",
        ActiveAuction => "active.auction",
        ActiveQualification => "active.qualification",
        ActiveAwarded => "active.awarded",
        Complete => "complete",
        Cancelled => "cancelled",
        Unsuccessful => "unsuccessful",
    }
}

impl TenderStatus {
    /// True for statuses a tender never leaves.
    pub fn is_terminated(&self) -> bool {
        matches!(
            self,
            TenderStatus::Complete | TenderStatus::Cancelled | TenderStatus::Unsuccessful
        )
    }
}

crate::string_enum! {
    #[derive(Default)]
    pub enum ProcurementMethod {
        #[default]
        Open => "open",
        Selective => "selective",
        Limited => "limited",
    }
}

crate::string_enum! {
    #[derive(Default)]
    pub enum AwardCriteria {
        #[default]
        LowestCost => "lowestCost",
    }
}

crate::string_enum! {
    #[derive(Default)]
    pub enum SubmissionMethod {
        #[default]
        ElectronicAuction => "electronicAuction",
    }
}

/// Procedure type assumed when a tender does not name one.
pub const DEFAULT_PROCUREMENT_METHOD_TYPE: &str = "belowThreshold";

/// Complaint statuses that hold a tender back by default.
pub const BLOCK_COMPLAINT_STATUSES: &[ComplaintStatus] = &[
    ComplaintStatus::Claim,
    ComplaintStatus::Answered,
    ComplaintStatus::Pending,
];

const TESTING_TITLE: &str = "[ТЕСТУВАННЯ]";
const TESTING_TITLE_EN: &str = "[TESTING]";

// =============================================================================
// Tender
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Tender {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "tenderID", skip_serializing_if = "Option::is_none")]
    pub tender_id: Option<String>,
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
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_modified: Option<Timestamp>,
    pub status: TenderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    pub procurement_method: ProcurementMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procurement_method_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procurement_method_details: Option<String>,
    pub submission_method: SubmissionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_method_details: Option<String>,
    pub award_criteria: AwardCriteria,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub procuring_entity: Option<ProcuringEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantee: Option<Guarantee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal_step: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<Feature>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lots: Vec<Lot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bids: Vec<Bid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub awards: Vec<Award>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contracts: Vec<Contract>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub complaints: Vec<Complaint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cancellations: Vec<Cancellation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enquiry_period: Option<PeriodEndRequired>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tender_period: Option<PeriodEndRequired>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_period: Option<AuctionPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_bids: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(rename = "owner_token", skip_serializing_if = "Option::is_none")]
    pub owner_token: Option<String>,
    #[serde(rename = "transfer_token", skip_serializing_if = "Option::is_none")]
    pub transfer_token: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub revisions: Vec<Revision>,
}

// =============================================================================
// Lookups
// =============================================================================

impl Tender {
    pub fn procurement_method_type(&self) -> &str {
        self.procurement_method_type
            .as_deref()
            .unwrap_or(DEFAULT_PROCUREMENT_METHOD_TYPE)
    }

    pub fn is_lotted(&self) -> bool {
        !self.lots.is_empty()
    }

    pub fn is_test(&self) -> bool {
        self.mode.as_deref() == Some("test")
    }

    /// Date of the first stored revision.
    pub fn first_revision_date(&self) -> Option<Timestamp> {
        self.revisions.first().map(|revision| revision.date)
    }

    pub fn lot(&self, id: &str) -> Option<&Lot> {
        self.lots.iter().find(|lot| lot.id.as_deref() == Some(id))
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id.as_deref() == Some(id))
    }

    pub fn feature(&self, code: &str) -> Option<&Feature> {
        self.features.iter().find(|feature| feature.code.as_deref() == Some(code))
    }

    pub fn bid(&self, id: &str) -> Option<&Bid> {
        self.bids.iter().find(|bid| bid.id.as_deref() == Some(id))
    }

    pub fn award(&self, id: &str) -> Option<&Award> {
        self.awards.iter().find(|award| award.id.as_deref() == Some(id))
    }

    pub fn contract(&self, id: &str) -> Option<&Contract> {
        self.contracts.iter().find(|contract| contract.id.as_deref() == Some(id))
    }

    pub fn complaint(&self, id: &str) -> Option<&Complaint> {
        self.complaints.iter().find(|complaint| complaint.id.as_deref() == Some(id))
    }

    pub fn cancellation(&self, id: &str) -> Option<&Cancellation> {
        self.cancellations
            .iter()
            .find(|cancellation| cancellation.id.as_deref() == Some(id))
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id.as_deref() == Some(id))
    }

    /// Latest version of a tender document.
    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().rev().find(|document| document.id.as_deref() == Some(id))
    }

    fn active_lot_ids(&self) -> BTreeSet<&str> {
        self.lots
            .iter()
            .filter(|lot| lot.status == LotStatus::Active)
            .filter_map(|lot| lot.id.as_deref())
            .collect()
    }
}

// =============================================================================
// Roles and ACL
// =============================================================================

impl Tender {
    /// Write view for a request by `authenticated_role`.
    pub fn get_role(&self, authenticated_role: &str) -> View {
        match authenticated_role {
            "Administrator" => View::Administrator,
            "chronograph" => View::Chronograph,
            "contracting" => View::Contracting,
            _ => View::EditStatus(self.status),
        }
    }

    pub fn owner_principal(&self) -> String {
        principal(self.owner.as_deref(), self.owner_token.as_deref())
    }

    pub fn local_roles(&self) -> BTreeMap<String, &'static str> {
        BTreeMap::from([(self.owner_principal(), "tender_owner")])
    }

    /// Grants derived from bid and tender ownership.
    pub fn acl(&self) -> Vec<Ace> {
        let mut acl: Vec<Ace> = self
            .bids
            .iter()
            .map(|bid| {
                let owner = principal(bid.owner.as_deref(), bid.owner_token.as_deref());
                Ace::allow(Principal::named(&owner), Permission::CreateAwardComplaint)
            })
            .collect();
        let owner = Principal::named(&self.owner_principal());
        acl.push(Ace::allow(owner.clone(), Permission::EditTender));
        acl.push(Ace::allow(owner.clone(), Permission::UploadTenderDocuments));
        acl.push(Ace::allow(owner, Permission::EditComplaint));
        acl
    }
}

// =============================================================================
// Lifecycle Helpers
// =============================================================================

impl Tender {
    /// Fills in dates for a freshly created tender.
    pub fn initialize(&mut self, now: Timestamp) {
        let enquiry = self.enquiry_period.get_or_insert_with(PeriodEndRequired::default);
        if enquiry.start_date.is_none() {
            enquiry.start_date = Some(now);
        }
        let enquiry_end = enquiry.end_date;
        if let Some(tendering) = self.tender_period.as_mut() {
            if tendering.start_date.is_none() {
                tendering.start_date = enquiry_end;
            }
        }
        self.date = Some(now);
        for lot in &mut self.lots {
            lot.date = Some(now);
        }
    }

    /// Marks the titles of a test-mode tender.
    pub fn set_mode_test_titles(&mut self) {
        if !self.title.as_deref().is_some_and(|title| title.contains(TESTING_TITLE)) {
            self.title = Some(format!("{} {}", TESTING_TITLE, self.title.as_deref().unwrap_or("")));
        }
        if !self.title_en.as_deref().is_some_and(|title| title.contains(TESTING_TITLE_EN)) {
            self.title_en = Some(format!(
                "{} {}",
                TESTING_TITLE_EN,
                self.title_en.as_deref().unwrap_or("")
            ));
        }
    }

    /// True when a question on the tender or an active lot has no answer.
    pub fn has_unanswered_questions(&self, filter_cancelled_lots: bool) -> bool {
        let mut unanswered = self.questions.iter().filter(|question| !question.is_answered());
        if !filter_cancelled_lots || !self.is_lotted() {
            return unanswered.next().is_some();
        }
        let active_lots = self.active_lot_ids();
        let active_items: BTreeSet<&str> = self
            .items
            .iter()
            .filter(|item| item.related_lot.as_deref().map_or(true, |lot| active_lots.contains(lot)))
            .filter_map(|item| item.id.as_deref())
            .collect();
        unanswered.any(|question| {
            let related = question.related_item.as_deref().unwrap_or_default();
            match question.question_of {
                QuestionOf::Tender => true,
                QuestionOf::Lot => active_lots.contains(related),
                QuestionOf::Item => active_items.contains(related),
            }
        })
    }

    /// True when a complaint in one of `blocking` concerns the tender or an
    /// active lot.
    pub fn has_unanswered_complaints(
        &self,
        filter_cancelled_lots: bool,
        blocking: &[ComplaintStatus],
    ) -> bool {
        let mut open = self
            .complaints
            .iter()
            .filter(|complaint| blocking.contains(&complaint.status));
        if !filter_cancelled_lots || !self.is_lotted() {
            return open.next().is_some();
        }
        let active_lots = self.active_lot_ids();
        open.any(|complaint| {
            complaint
                .related_lot
                .as_deref()
                .is_some_and(|lot| active_lots.contains(lot))
        })
    }

    /// Strips cancelled lots out of every bid.
    ///
    /// Bids left without lot values are removed.
    pub fn cleanup_bids_for_cancelled_lots(&mut self) {
        let cancelled_lots: BTreeSet<String> = self
            .lots
            .iter()
            .filter(|lot| lot.status == LotStatus::Cancelled)
            .filter_map(|lot| lot.id.clone())
            .collect();
        if cancelled_lots.is_empty() {
            return;
        }
        let cancelled_items: BTreeSet<String> = self
            .items
            .iter()
            .filter(|item| item.related_lot.as_ref().is_some_and(|lot| cancelled_lots.contains(lot)))
            .filter_map(|item| item.id.clone())
            .collect();
        let cancelled_features: BTreeSet<String> = self
            .features
            .iter()
            .filter(|feature| {
                let related = feature.related_item.as_deref().unwrap_or_default();
                match feature.feature_of {
                    FeatureOf::Lot => cancelled_lots.contains(related),
                    FeatureOf::Item => cancelled_items.contains(related),
                    FeatureOf::Tenderer => false,
                }
            })
            .filter_map(|feature| feature.code.clone())
            .collect();

        let in_cancelled_lot =
            |related: &Option<String>| related.as_ref().is_some_and(|id| cancelled_lots.contains(id));
        for bid in &mut self.bids {
            bid.documents.retain(|document| {
                !(document.document_of == super::DocumentOf::Lot && in_cancelled_lot(&document.related_item))
            });
            bid.parameters.retain(|parameter| {
                !parameter.code.as_ref().is_some_and(|code| cancelled_features.contains(code))
            });
            bid.lot_values.retain(|lot_value| !in_cancelled_lot(&lot_value.related_lot));
        }
        let before = self.bids.len();
        self.bids.retain(|bid| !bid.lot_values.is_empty());
        tracing::debug!(
            removed = before - self.bids.len(),
            lots = cancelled_lots.len(),
            "cleaned up bids for cancelled lots"
        );
    }

    /// Drops bids that were never submitted.
    pub fn remove_draft_bids(&mut self) {
        self.bids.retain(|bid| bid.status != BidStatus::Draft);
    }

    /// Derived `auctionPeriod.shouldStartAfter` of an unlotted tender.
    pub fn should_start_after(&self, now: Timestamp, config: &CoreConfig) -> Option<Timestamp> {
        let period = self.auction_period.as_ref()?;
        if period.end_date.is_some() || self.is_lotted() {
            return None;
        }
        if !matches!(
            self.status,
            TenderStatus::ActiveTendering | TenderStatus::ActiveAuction
        ) {
            return None;
        }
        period.estimate_start(self.number_of_bids.unwrap_or(0), self, now, config)
    }

    /// Serializes the tender through `view` as seen at `now`.
    pub fn render(&self, view: View, now: Timestamp, config: &CoreConfig) -> CoreResult<JsonValue> {
        let scope = Scope::root(self, now, config);
        self.serialize_view(view, &scope)
    }

    /// Runs every tender rule as seen at `now`.
    pub fn validate_at(&self, now: Timestamp, config: &CoreConfig) -> CoreResult<ValidationErrors> {
        let scope = Scope::root(self, now, config);
        self.validate(&scope)
    }

    fn check_minimal_step(&self, errors: &mut ValidationErrors) {
        let (Some(step), Some(value)) = (&self.minimal_step, &self.value) else {
            return;
        };
        if value.amount < step.amount {
            errors.add("minimalStep", "value should be less than value of tender");
        } else if value.currency != step.currency {
            errors.add(
                "minimalStep",
                "currency should be identical to currency of value of tender",
            );
        } else if value.value_added_tax_included != step.value_added_tax_included {
            errors.add(
                "minimalStep",
                "valueAddedTaxIncluded should be identical to valueAddedTaxIncluded of value of tender",
            );
        }
    }

    fn check_periods(&self, errors: &mut ValidationErrors) {
        let enquiry_end = self.enquiry_period.as_ref().and_then(|p| p.end_date);
        let tender_start = self.tender_period.as_ref().and_then(|p| p.start_date);
        let tender_end = self.tender_period.as_ref().and_then(|p| p.end_date);
        let auction_start = self.auction_period.as_ref().and_then(|p| p.start_date);
        let auction_end = self.auction_period.as_ref().and_then(|p| p.end_date);
        let award_start = self.award_period.as_ref().and_then(|p| p.start_date);

        if let (Some(start), Some(end)) = (tender_start, enquiry_end) {
            if start < end {
                errors.add("tenderPeriod", "period should begin after enquiryPeriod");
            }
        }
        if let (Some(start), Some(end)) = (auction_start, tender_end) {
            if start < end {
                errors.add("auctionPeriod", "period should begin after tenderPeriod");
            }
        }
        if let Some(start) = award_start {
            if auction_end.is_some_and(|end| start < end) {
                errors.add("awardPeriod", "period should begin after auctionPeriod");
            } else if tender_end.is_some_and(|end| start < end) {
                errors.add("awardPeriod", "period should begin after tenderPeriod");
            }
        }
    }

    fn check_mode(&self, errors: &mut ValidationErrors) {
        if let Some(mode) = self.mode.as_deref() {
            if mode != "test" {
                errors.add("mode", choices_message(&["test"]));
            }
        }
        for (field, details) in [
            ("procurementMethodDetails", &self.procurement_method_details),
            ("submissionMethodDetails", &self.submission_method_details),
        ] {
            if details.is_some() && !self.is_test() {
                errors.add(field, format!("{} should be used with mode test", field));
            }
        }
    }
}

impl BusinessContext for Tender {
    fn procurement_method_details(&self) -> Option<&str> {
        self.procurement_method_details.as_deref()
    }

    fn submission_method_details(&self) -> Option<&str> {
        self.submission_method_details.as_deref()
    }

    fn enquiry_period_start(&self) -> Option<Timestamp> {
        self.enquiry_period.as_ref()?.start_date
    }
}

// =============================================================================
// Entity
// =============================================================================

const CREATE_EXCEPT: &[&str] = &[
    "id",
    "tenderID",
    "date",
    "dateModified",
    "owner",
    "owner_token",
    "transfer_token",
    "revisions",
    "bids",
    "awards",
    "contracts",
    "complaints",
    "cancellations",
    "questions",
    "documents",
    "auctionUrl",
    "auctionPeriod",
    "awardPeriod",
    "numberOfBids",
    "procurementMethod",
    "awardCriteria",
    "submissionMethod",
];

const EDIT_EXCEPT: &[&str] = &[
    "id",
    "tenderID",
    "date",
    "dateModified",
    "owner",
    "owner_token",
    "transfer_token",
    "revisions",
    "bids",
    "awards",
    "contracts",
    "complaints",
    "cancellations",
    "questions",
    "documents",
    "auctionUrl",
    "auctionPeriod",
    "awardPeriod",
    "numberOfBids",
    "procurementMethod",
    "awardCriteria",
    "submissionMethod",
    "mode",
    "procurementMethodType",
];

const PUBLIC_EXCEPT: &[&str] = &["owner_token", "transfer_token", "revisions"];

const SEALED_BIDS_EXCEPT: &[&str] = &[
    "owner_token",
    "transfer_token",
    "revisions",
    "bids",
    "numberOfBids",
];

impl Entity for Tender {
    const NAME: &'static str = "Tender";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "title", &self.title);
        require(&mut errors, "procuringEntity", &self.procuring_entity);
        require(&mut errors, "value", &self.value);
        require(&mut errors, "minimalStep", &self.minimal_step);
        require_list(&mut errors, "items", &self.items);
        require(&mut errors, "tenderPeriod", &self.tender_period);

        validate_nested(&mut errors, "procuringEntity", self.procuring_entity.as_ref(), scope)?;
        validate_nested(&mut errors, "enquiryPeriod", self.enquiry_period.as_ref(), scope)?;
        validate_nested(&mut errors, "tenderPeriod", self.tender_period.as_ref(), scope)?;
        validate_nested(&mut errors, "auctionPeriod", self.auction_period.as_ref(), scope)?;
        validate_nested(&mut errors, "awardPeriod", self.award_period.as_ref(), scope)?;
        if let Some(value) = &self.value {
            errors.nest("value", value.validate());
        }
        if let Some(step) = &self.minimal_step {
            errors.nest("minimalStep", step.validate());
        }
        if let Some(guarantee) = &self.guarantee {
            errors.nest("guarantee", guarantee.validate());
        }
        if let Some(url) = &self.auction_url {
            super::common::check_url(&mut errors, "auctionUrl", url);
        }

        validate_list(&mut errors, "items", &self.items, scope)?;
        validate_list(&mut errors, "features", &self.features, scope)?;
        validate_list(&mut errors, "lots", &self.lots, scope)?;
        validate_list(&mut errors, "bids", &self.bids, scope)?;
        validate_list(&mut errors, "awards", &self.awards, scope)?;
        validate_list(&mut errors, "contracts", &self.contracts, scope)?;
        validate_list(&mut errors, "complaints", &self.complaints, scope)?;
        validate_list(&mut errors, "cancellations", &self.cancellations, scope)?;
        validate_list(&mut errors, "questions", &self.questions, scope)?;
        validate_list(&mut errors, "documents", &self.documents, scope)?;

        if !self.items.is_empty() && !errors.contains("items") {
            let first_revision = self.first_revision_date().unwrap_or(scope.now());
            if let Err(message) = validate_items_classification(&self.items, first_revision) {
                errors.add("items", message);
            }
        }
        if let Err(message) =
            validate_uniqueness(&self.lots, |lot| lot.id.clone(), "Lot id should be uniq for all lots")
        {
            errors.add("lots", message);
        }
        if let Err(message) = validate_uniqueness(
            &self.features,
            |feature| feature.code.clone(),
            "Feature code should be uniq for all features",
        ) {
            errors.add("features", message);
        } else if let Err(message) = validate_features_max_sum(self) {
            errors.add("features", message);
        }

        self.check_minimal_step(&mut errors);
        self.check_periods(&mut errors);
        self.check_mode(&mut errors);

        if !errors.is_empty() {
            tracing::debug!(
                tender_id = self.id.as_deref().unwrap_or("new"),
                fields = errors.len(),
                "tender failed validation"
            );
        }
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        match view {
            View::Plain => Some(FieldFilter::All),
            View::View | View::Embedded => Some(FieldFilter::Except(PUBLIC_EXCEPT)),
            View::Status(status) => match status {
                TenderStatus::ActiveEnquiries | TenderStatus::ActiveTendering => {
                    Some(FieldFilter::Except(SEALED_BIDS_EXCEPT))
                }
                _ => Some(FieldFilter::Except(PUBLIC_EXCEPT)),
            },
            View::Create => Some(FieldFilter::Except(CREATE_EXCEPT)),
            View::EditStatus(status) => match status {
                TenderStatus::Draft | TenderStatus::ActiveEnquiries | TenderStatus::ActiveTendering => {
                    Some(FieldFilter::Except(EDIT_EXCEPT))
                }
                TenderStatus::ActivePreQualification => Some(FieldFilter::Only(&["status"])),
                _ => Some(FieldFilter::Only(&[])),
            },
            View::Administrator => Some(FieldFilter::Only(&[
                "status",
                "mode",
                "procuringEntity",
                "auctionPeriod",
                "lots",
            ])),
            View::Chronograph => Some(FieldFilter::Only(&["auctionPeriod", "lots"])),
            View::Contracting => Some(FieldFilter::Only(&["owner"])),
            _ => None,
        }
    }

    fn serialize_view(&self, view: View, scope: &Scope) -> CoreResult<JsonValue> {
        let mut rendered = filtered(self, view)?;
        if !matches!(view, View::View | View::Embedded | View::Status(_)) {
            return Ok(rendered);
        }
        let Some(object) = rendered.as_object_mut() else {
            return Ok(rendered);
        };

        if let (true, Some(period)) = (object.contains_key("auctionPeriod"), &self.auction_period) {
            let should_start_after = self.should_start_after(scope.now(), scope.config());
            object.insert("auctionPeriod".to_string(), period.render(should_start_after)?);
        }
        if object.contains_key("lots") {
            object.insert("lots".to_string(), render_list(&self.lots, view, scope)?);
        }
        if object.contains_key("bids") {
            object.insert("bids".to_string(), render_list(&self.bids, view, scope)?);
        }
        if object.contains_key("awards") {
            object.insert("awards".to_string(), render_list(&self.awards, view, scope)?);
        }
        if object.contains_key("complaints") {
            let complaints = render_list(&self.complaints, View::View, scope)?;
            object.insert("complaints".to_string(), complaints);
        }
        Ok(rendered)
    }

    fn assign_ids(&mut self) {
        if self.id.is_none() {
            self.id = Some(new_id());
        }
        assign_list_ids(&mut self.items);
        assign_list_ids(&mut self.features);
        assign_list_ids(&mut self.lots);
        assign_list_ids(&mut self.bids);
        assign_list_ids(&mut self.awards);
        assign_list_ids(&mut self.contracts);
        assign_list_ids(&mut self.complaints);
        assign_list_ids(&mut self.cancellations);
        assign_list_ids(&mut self.questions);
        assign_list_ids(&mut self.documents);
    }
}

impl std::fmt::Display for Tender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.id.as_deref().unwrap_or("new");
        match self.date_modified {
            Some(modified) => write!(f, "<Tender:{}@{}>", id, format_iso(&modified)),
            None => write!(f, "<Tender:{}>", id),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::models::bid::LotValue;
    use crate::models::common::Classification;
    use crate::time::kyiv_midnight;
    use chrono::TimeDelta;
    use serde_json::json;

    fn valid_tender() -> Tender {
        serde_json::from_value(json!({
            "title": "футляри до державних нагород",
            "procuringEntity": {
                "name": "Державне управління справами",
                "identifier": {"scheme": "UA-EDR", "id": "00037256"},
                "address": {"countryName": "Україна"},
                "contactPoint": {"name": "Державне управління справами", "telephone": "0440000000"}
            },
            "value": {"amount": 500, "currency": "UAH"},
            "minimalStep": {"amount": 35, "currency": "UAH"},
            "items": [{
                "description": "футляри до державних нагород",
                "classification": {"scheme": "CPV", "id": "44617100-9", "description": "Cartons"},
                "additionalClassifications": [
                    {"scheme": "ДКПП", "id": "17.21.1", "description": "папір і картон гофровані"}
                ]
            }],
            "enquiryPeriod": {"endDate": "2017-10-14T00:00:00+03:00"},
            "tenderPeriod": {"endDate": "2017-10-21T00:00:00+03:00"}
        }))
        .unwrap()
    }

    fn now() -> Timestamp {
        kyiv_midnight(2017, 10, 7)
    }

    #[test]
    fn test_local_roles() {
        let tender = Tender {
            owner: Some("test_owner".to_string()),
            owner_token: Some("test_owner_token".to_string()),
            ..Tender::default()
        };
        assert_eq!(
            tender.local_roles(),
            BTreeMap::from([("test_owner_test_owner_token".to_string(), "tender_owner")])
        );
    }

    #[test]
    fn test_get_role() {
        let mut tender = Tender::default();
        assert_eq!(tender.get_role("Administrator"), View::Administrator);
        assert_eq!(tender.get_role("chronograph"), View::Chronograph);
        assert_eq!(tender.get_role("contracting"), View::Contracting);

        tender.status = TenderStatus::ActiveTendering;
        let role = tender.get_role("broker");
        assert_eq!(role, View::EditStatus(TenderStatus::ActiveTendering));
        assert_eq!(role.to_string(), "edit_active.tendering");
    }

    #[test]
    fn test_acl() {
        let tender = Tender {
            bids: vec![Bid {
                owner: Some("test_owner".to_string()),
                owner_token: Some("owner_token_test".to_string()),
                ..Bid::default()
            }],
            ..Tender::default()
        };
        let acl: Vec<String> = tender.acl().iter().map(ToString::to_string).collect();
        assert_eq!(
            acl,
            vec![
                "Allow test_owner_owner_token_test create_award_complaint",
                "Allow None_None edit_tender",
                "Allow None_None upload_tender_documents",
                "Allow None_None edit_complaint",
            ]
        );
    }

    #[test]
    fn test_valid_tender_has_no_errors() {
        let errors = valid_tender().validate_at(now(), &CoreConfig::default()).unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_required_fields() {
        let errors = Tender::default().validate_at(now(), &CoreConfig::default()).unwrap();
        for field in ["title", "procuringEntity", "value", "minimalStep", "items", "tenderPeriod"] {
            assert_eq!(errors.messages(field), vec!["This field is required."], "{}", field);
        }
    }

    #[test]
    fn test_method_details_require_test_mode() {
        let config = CoreConfig::default();
        let mut tender = valid_tender();
        tender.procurement_method_details = Some("quick, accelerator=1440".to_string());
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(
            errors.messages("procurementMethodDetails"),
            vec!["procurementMethodDetails should be used with mode test"]
        );

        tender.mode = Some("test".to_string());
        assert!(tender.validate_at(now(), &config).unwrap().is_empty());

        tender.mode = Some("prod".to_string());
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(errors.messages("mode"), vec!["Value must be one of ['test']."]);
    }

    #[test]
    fn test_minimal_step_rules() {
        let config = CoreConfig::default();
        let mut tender = valid_tender();
        tender.minimal_step = Some(Value::uah(Amount::from_units(600)));
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(errors.messages("minimalStep"), vec!["value should be less than value of tender"]);

        tender.minimal_step = Some(Value::new(Amount::from_units(5), "USD", true));
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(
            errors.messages("minimalStep"),
            vec!["currency should be identical to currency of value of tender"]
        );

        tender.minimal_step = Some(Value::new(Amount::from_units(5), "UAH", false));
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(
            errors.messages("minimalStep"),
            vec!["valueAddedTaxIncluded should be identical to valueAddedTaxIncluded of value of tender"]
        );
    }

    #[test]
    fn test_period_ordering() {
        let config = CoreConfig::default();
        let mut tender = valid_tender();
        tender.tender_period = Some(PeriodEndRequired::new(
            Some(kyiv_midnight(2017, 10, 10)),
            Some(kyiv_midnight(2017, 10, 21)),
        ));
        tender.auction_period = Some(AuctionPeriod::starting(kyiv_midnight(2017, 10, 20)));
        tender.award_period = Some(Period::new(Some(kyiv_midnight(2017, 10, 20)), None));
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(errors.messages("tenderPeriod"), vec!["period should begin after enquiryPeriod"]);
        assert_eq!(errors.messages("auctionPeriod"), vec!["period should begin after tenderPeriod"]);
        assert_eq!(errors.messages("awardPeriod"), vec!["period should begin after tenderPeriod"]);
    }

    #[test]
    fn test_cpv_class_of_items() {
        let config = CoreConfig::default();
        let mut tender = valid_tender();
        let mut second = tender.items[0].clone();
        second.classification = Some(Classification::new("CPV", "44620000-2", "Tanks"));
        tender.items.push(second);
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(errors.messages("items"), vec!["CPV class of items should be identical"]);

        tender.revisions = vec![Revision::new("broker", kyiv_midnight(2016, 10, 7), Vec::new())];
        let errors = tender.validate_at(now(), &config).unwrap();
        assert!(errors.get("items").is_none(), "{:?}", errors);
    }

    #[test]
    fn test_unique_lots_and_features() {
        let config = CoreConfig::default();
        let lot = |id: &str| Lot {
            id: Some(id.to_string()),
            title: Some("lot".to_string()),
            value: Some(Value::uah(Amount::from_units(500))),
            minimal_step: Some(Value::uah(Amount::from_units(15))),
            ..Lot::default()
        };
        let mut tender = valid_tender();
        tender.lots = vec![lot("1"), lot("1")];
        tender.features = vec![
            Feature::new("OCDS-1", FeatureOf::Tenderer, None, &[0.0, 0.05]),
            Feature::new("OCDS-1", FeatureOf::Tenderer, None, &[0.0, 0.05]),
        ];
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(errors.messages("lots"), vec!["Lot id should be uniq for all lots"]);
        assert_eq!(errors.messages("features"), vec!["Feature code should be uniq for all features"]);
    }

    #[test]
    fn test_features_max_sum() {
        let config = CoreConfig::default();
        let mut tender = valid_tender();
        tender.features = vec![
            Feature::new("OCDS-1", FeatureOf::Tenderer, None, &[0.0, 0.15]),
            Feature::new("OCDS-2", FeatureOf::Tenderer, None, &[0.0, 0.16]),
        ];
        let errors = tender.validate_at(now(), &config).unwrap();
        assert_eq!(
            errors.messages("features"),
            vec!["Sum of max value of all features should be less then or equal to 30%"]
        );

        tender.features[1] = Feature::new("OCDS-2", FeatureOf::Tenderer, None, &[0.0, 0.15]);
        assert!(tender.validate_at(now(), &config).unwrap().is_empty());
    }

    #[test]
    fn test_should_start_after() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7) + TimeDelta::hours(12);
        let mut tender = Tender {
            status: TenderStatus::ActiveEnquiries,
            number_of_bids: Some(2),
            enquiry_period: Some(PeriodEndRequired::new(Some(now), Some(now + TimeDelta::minutes(10)))),
            tender_period: Some(PeriodEndRequired::new(Some(now), Some(now + TimeDelta::minutes(10)))),
            auction_period: Some(AuctionPeriod {
                start_date: Some(now),
                end_date: Some(now + TimeDelta::minutes(5)),
                should_start_after: None,
            }),
            ..Tender::default()
        };
        assert_eq!(tender.should_start_after(now, &config), None);

        tender.auction_period = Some(AuctionPeriod::starting(now));
        assert_eq!(tender.should_start_after(now, &config), None);

        tender.status = TenderStatus::ActiveTendering;
        assert_eq!(tender.should_start_after(now, &config), Some(kyiv_midnight(2017, 10, 8)));

        tender.auction_period = Some(AuctionPeriod::starting(now - TimeDelta::days(1)));
        assert_eq!(tender.should_start_after(now, &config), Some(kyiv_midnight(2017, 10, 7)));

        let rendered = tender.render(View::View, now, &config).unwrap();
        assert_eq!(rendered["auctionPeriod"]["shouldStartAfter"], "2017-10-07T00:00:00+03:00");
        let plain = tender.render(View::Plain, now, &config).unwrap();
        assert!(plain["auctionPeriod"].get("shouldStartAfter").is_none());
    }

    #[test]
    fn test_views_hide_secrets_and_sealed_bids() {
        let config = CoreConfig::default();
        let mut tender = valid_tender();
        tender.owner_token = Some("secret".to_string());
        tender.status = TenderStatus::ActiveTendering;
        tender.bids = vec![Bid {
            value: Some(Value::uah(Amount::from_units(450))),
            ..Bid::default()
        }];

        let view = tender.render(View::Status(TenderStatus::ActiveTendering), now(), &config).unwrap();
        assert!(view.get("owner_token").is_none());
        assert!(view.get("bids").is_none());

        let view = tender.render(View::Status(TenderStatus::ActiveAuction), now(), &config).unwrap();
        assert_eq!(view["bids"], json!([{"value": {"amount": 450.0, "currency": "UAH", "valueAddedTaxIncluded": true}}]));

        let plain = tender.render(View::Plain, now(), &config).unwrap();
        assert_eq!(plain["owner_token"], "secret");
    }

    #[test]
    fn test_edit_masks() {
        assert_eq!(
            Tender::filter(View::EditStatus(TenderStatus::ActiveAwarded)),
            Some(FieldFilter::Only(&[]))
        );
        let editable = Tender::filter(View::EditStatus(TenderStatus::ActiveTendering)).unwrap();
        assert!(editable.allows("title"));
        assert!(!editable.allows("mode"));
        assert!(Tender::filter(View::Create).unwrap().allows("status"));
        assert!(Tender::filter(View::Satisfy).is_none());
    }

    #[test]
    fn test_initialize() {
        let mut tender = valid_tender();
        tender.lots.push(Lot::default());
        tender.initialize(now());
        assert_eq!(tender.enquiry_period.as_ref().unwrap().start_date, Some(now()));
        assert_eq!(
            tender.tender_period.as_ref().unwrap().start_date,
            Some(kyiv_midnight(2017, 10, 14))
        );
        assert_eq!(tender.date, Some(now()));
        assert_eq!(tender.lots[0].date, Some(now()));
    }

    fn populated_tender() -> Tender {
        let organization = json!({
            "name": "Державне управління справами",
            "identifier": {"scheme": "UA-EDR", "id": "00037256"},
            "address": {"countryName": "Україна"},
            "contactPoint": {"name": "Державне управління справами", "telephone": "0440000000"}
        });
        let mut tender = valid_tender();
        tender.status = TenderStatus::ActiveQualification;
        tender.lots = serde_json::from_value(json!([{
            "id": "lot1",
            "title": "lot title",
            "value": {"amount": 500},
            "minimalStep": {"amount": 35},
            "auctionPeriod": {"startDate": "2017-10-22T10:00:00+03:00"}
        }]))
        .unwrap();
        tender.bids = serde_json::from_value(json!([{
            "id": "bid1",
            "status": "active",
            "tenderers": [organization],
            "lotValues": [{"relatedLot": "lot1", "value": {"amount": 450}}]
        }]))
        .unwrap();
        tender.awards = serde_json::from_value(json!([{
            "id": "award1",
            "bid_id": "bid1",
            "lotID": "lot1",
            "status": "pending",
            "value": {"amount": 450},
            "suppliers": [organization]
        }]))
        .unwrap();
        tender.complaints = serde_json::from_value(json!([{
            "id": "complaint1",
            "title": "complaint title",
            "status": "claim",
            "type": "claim",
            "author": organization,
            "relatedLot": "lot1"
        }]))
        .unwrap();
        tender.initialize(now());
        tender.assign_ids();
        tender
    }

    #[test]
    fn test_plain_round_trip() {
        let config = CoreConfig::default();
        let tender = populated_tender();

        let plain = tender.render(View::Plain, now(), &config).unwrap();
        let back: Tender = serde_json::from_value(plain.clone()).unwrap();
        assert_eq!(back, tender);
        assert_eq!(back.render(View::Plain, now(), &config).unwrap(), plain);
    }

    #[test]
    fn test_render_and_validate_idempotent() {
        let config = CoreConfig::default();
        let tender = populated_tender();

        for view in [View::Plain, View::View, View::Status(TenderStatus::ActiveQualification)] {
            assert_eq!(
                tender.render(view, now(), &config).unwrap(),
                tender.render(view, now(), &config).unwrap()
            );
        }

        let first = serde_json::to_value(tender.validate_at(now(), &config).unwrap()).unwrap();
        let second = serde_json::to_value(tender.validate_at(now(), &config).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mode_test_titles() {
        let mut tender = Tender::default();
        tender.set_mode_test_titles();
        assert_eq!(tender.title.as_deref(), Some("[ТЕСТУВАННЯ] "));
        assert_eq!(tender.title_en.as_deref(), Some("[TESTING] "));
        tender.set_mode_test_titles();
        assert_eq!(tender.title_en.as_deref(), Some("[TESTING] "));
    }

    #[test]
    fn test_cleanup_bids_for_cancelled_lots() {
        let mut tender = Tender {
            lots: vec![Lot {
                id: Some("1".to_string()),
                ..Lot::default()
            }],
            bids: vec![Bid {
                lot_values: vec![LotValue::new("1", Value::uah(Amount::from_units(1)))],
                ..Bid::default()
            }],
            ..Tender::default()
        };
        tender.cleanup_bids_for_cancelled_lots();
        assert_eq!(tender.bids.len(), 1);

        tender.lots[0].status = LotStatus::Cancelled;
        tender.cleanup_bids_for_cancelled_lots();
        assert!(tender.bids.is_empty());
    }

    #[test]
    fn test_remove_draft_bids() {
        let bid = |status| Bid {
            status,
            ..Bid::default()
        };
        let mut tender = Tender {
            bids: vec![bid(BidStatus::Draft), bid(BidStatus::Active)],
            ..Tender::default()
        };
        tender.remove_draft_bids();
        assert_eq!(tender.bids.len(), 1);
        assert_eq!(tender.bids[0].status, BidStatus::Active);
    }

    #[test]
    fn test_has_unanswered_questions() {
        let mut tender = Tender::default();
        assert!(!tender.has_unanswered_questions(true));

        tender.questions.push(Question::default());
        assert!(tender.has_unanswered_questions(true));

        tender.lots.push(Lot {
            id: Some("1".to_string()),
            ..Lot::default()
        });
        assert!(tender.has_unanswered_questions(true));

        tender.questions[0].question_of = QuestionOf::Lot;
        tender.questions[0].related_item = Some("1".to_string());
        tender.lots[0].status = LotStatus::Cancelled;
        assert!(!tender.has_unanswered_questions(true));
        assert!(tender.has_unanswered_questions(false));
    }

    #[test]
    fn test_has_unanswered_complaints() {
        let mut tender = Tender::default();
        assert!(!tender.has_unanswered_complaints(true, BLOCK_COMPLAINT_STATUSES));

        tender.complaints.push(Complaint {
            status: ComplaintStatus::Claim,
            ..Complaint::default()
        });
        assert!(tender.has_unanswered_complaints(true, BLOCK_COMPLAINT_STATUSES));

        tender.lots.push(Lot {
            id: Some("1".to_string()),
            ..Lot::default()
        });
        assert!(!tender.has_unanswered_complaints(true, BLOCK_COMPLAINT_STATUSES));
        tender.complaints[0].related_lot = Some("1".to_string());
        assert!(tender.has_unanswered_complaints(true, BLOCK_COMPLAINT_STATUSES));
    }

    #[test]
    fn test_assign_ids() {
        let mut tender = valid_tender();
        tender.assign_ids();
        assert!(tender.id.is_some());
        assert!(tender.items[0].id.is_some());
    }
}
