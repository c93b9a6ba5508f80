//! # Complaints
//!
//! Claims and complaints filed by participants against the tender, a lot
//! or an award decision.
//!
//! ## Workflow
//! ```text
//! draft ──► claim ──► answered ──► resolved / declined / invalid
//!   │         │          │
//!   └─────────┴──────────┴──► cancelled   (by the complaint owner)
//! ```
//!
//! ## Write Roles
//! The PATCH mask depends on who is writing and where the complaint is:
//! ```text
//! ┌─────────────────┬─────────────────────────────────┬──────────────┐
//! │ Role            │ Status                          │ View         │
//! ├─────────────────┼─────────────────────────────────┼──────────────┤
//! │ complaint_owner │ requested or current: cancelled │ cancellation │
//! │ complaint_owner │ current: draft                  │ draft        │
//! │ tender_owner    │ current: claim                  │ answer       │
//! │ complaint_owner │ current: answered               │ satisfy      │
//! │ anything else   │                                 │ invalid      │
//! └─────────────────┴─────────────────────────────────┴──────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::common::{new_id, Document, Organization};
use super::tender::TenderStatus;
use super::{assign_list_ids, filtered, require, require_str, validate_list, validate_nested, Entity};
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::time::Timestamp;
use crate::traversal::{principal, Ace, Permission, Principal};

crate::string_enum! {
    #[derive(Default)]
    pub enum ComplaintStatus {
        #[default]
        Draft => "draft",
        Claim => "claim",
        Answered => "answered",
        Pending => "pending",
        Invalid => "invalid",
        Resolved => "resolved",
        Declined => "declined",
        Cancelled => "cancelled",
        Ignored => "ignored",
    }
}

crate::string_enum! {
    #[derive(Default)]
    pub enum ComplaintType {
        #[default]
        Claim => "claim",
        Complaint => "complaint",
    }
}

crate::string_enum! {
    pub enum ResolutionType {
        Invalid => "invalid",
        Resolved => "resolved",
        Declined => "declined",
    }
}

/// Write role picked for the next complaint transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintRole {
    Cancellation,
    Draft,
    Answer,
    Satisfy,
    Invalid,
}

impl ComplaintRole {
    /// View used as the write mask, `None` for `Invalid`.
    pub fn view(&self) -> Option<View> {
        match self {
            ComplaintRole::Cancellation => Some(View::Cancellation),
            ComplaintRole::Draft => Some(View::Draft),
            ComplaintRole::Answer => Some(View::Answer),
            ComplaintRole::Satisfy => Some(View::Satisfy),
            ComplaintRole::Invalid => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Complaint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Organization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_submitted: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_answered: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_escalated: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_decision: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_canceled: Option<Timestamp>,
    pub status: ComplaintStatus,
    #[serde(rename = "type")]
    pub complaint_type: ComplaintType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_type: Option<ResolutionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_lot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenderer_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub tenderer_action_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(rename = "owner_token", skip_serializing_if = "Option::is_none")]
    pub owner_token: Option<String>,
    #[serde(rename = "transfer_token", skip_serializing_if = "Option::is_none")]
    pub transfer_token: Option<String>,
}

impl Complaint {
    /// Picks the write role for a PATCH by `authenticated_role`.
    ///
    /// `requested_status` is the status in the request body, if any.
    pub fn get_role(
        &self,
        authenticated_role: &str,
        requested_status: Option<ComplaintStatus>,
    ) -> ComplaintRole {
        let target = requested_status.unwrap_or(self.status);
        match (authenticated_role, self.status) {
            ("complaint_owner", _) if target == ComplaintStatus::Cancelled => {
                ComplaintRole::Cancellation
            }
            ("complaint_owner", ComplaintStatus::Draft) => ComplaintRole::Draft,
            ("tender_owner", ComplaintStatus::Claim) => ComplaintRole::Answer,
            ("complaint_owner", ComplaintStatus::Answered) => ComplaintRole::Satisfy,
            _ => ComplaintRole::Invalid,
        }
    }

    pub fn local_roles(&self) -> BTreeMap<String, &'static str> {
        let owner = principal(self.owner.as_deref(), self.owner_token.as_deref());
        BTreeMap::from([(owner, "complaint_owner")])
    }

    pub fn acl(&self) -> Vec<Ace> {
        let owner = principal(self.owner.as_deref(), self.owner_token.as_deref());
        vec![
            Ace::allow(Principal::group("reviewers"), Permission::EditComplaint),
            Ace::allow(Principal::named(&owner), Permission::EditComplaint),
            Ace::allow(Principal::named(&owner), Permission::UploadComplaintDocuments),
        ]
    }

    /// True while the complaint still needs a decision.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.status,
            ComplaintStatus::Claim | ComplaintStatus::Answered | ComplaintStatus::Pending
        )
    }
}

impl Entity for Complaint {
    const NAME: &'static str = "Complaint";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "author", &self.author);
        require_str(&mut errors, "title", &self.title);
        validate_nested(&mut errors, "author", self.author.as_ref(), scope)?;
        validate_list(&mut errors, "documents", &self.documents, scope)?;

        if self.status == ComplaintStatus::Answered {
            require(&mut errors, "resolutionType", &self.resolution_type);
        }
        if self.status == ComplaintStatus::Cancelled {
            require_str(&mut errors, "cancellationReason", &self.cancellation_reason);
        }
        if let Some(related) = &self.related_lot {
            if scope.has_parent() {
                let tender = scope.enclosing_tender()?;
                if tender.lot(related).is_none() {
                    errors.add("relatedLot", "relatedLot should be one of lots");
                }
            }
        }
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        const HIDDEN: &[&str] = &["owner", "owner_token", "transfer_token"];
        match view {
            View::Plain => Some(FieldFilter::All),
            View::View | View::Embedded | View::Status(_) => Some(FieldFilter::Except(HIDDEN)),
            View::ViewClaim => Some(FieldFilter::Except(&[
                "owner",
                "owner_token",
                "transfer_token",
                "author",
            ])),
            View::Create => Some(FieldFilter::Only(&[
                "author",
                "title",
                "description",
                "status",
                "relatedLot",
            ])),
            View::Draft => Some(FieldFilter::Only(&["author", "title", "description", "status"])),
            View::Cancellation => Some(FieldFilter::Only(&["cancellationReason", "status"])),
            View::Satisfy => Some(FieldFilter::Only(&["satisfied", "status"])),
            View::Answer => Some(FieldFilter::Only(&[
                "resolution",
                "resolutionType",
                "status",
                "tendererAction",
            ])),
            _ => None,
        }
    }

    fn serialize_view(&self, view: View, scope: &Scope) -> CoreResult<JsonValue> {
        let anonymous_claims = scope.parent_tender().is_some_and(|tender| {
            matches!(
                tender.status,
                TenderStatus::ActiveEnquiries | TenderStatus::ActiveTendering
            )
        });
        let view = if view == View::View
            && self.complaint_type == ComplaintType::Claim
            && anonymous_claims
        {
            View::ViewClaim
        } else {
            view
        };

        let mut rendered = filtered(self, view)?;
        if self.status == ComplaintStatus::Draft {
            if let Some(object) = rendered.as_object_mut() {
                if object.contains_key("type") {
                    object.insert("type".to_string(), JsonValue::from(ComplaintType::Claim.as_str()));
                }
            }
        }
        Ok(rendered)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::models::lot::Lot;
    use crate::models::tender::Tender;
    use crate::time::kyiv_midnight;
    use serde_json::json;

    fn complaint() -> Complaint {
        serde_json::from_value(json!({
            "title": "test_title_complaint",
            "author": {
                "name": "Державне управління справами",
                "identifier": {"scheme": "UA-EDR", "id": "00037256", "uri": "http://www.dus.gov.ua/"},
                "address": {"countryName": "Україна"},
                "contactPoint": {"name": "Державне управління справами", "telephone": "0440000000"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_serialize_defaults() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let tender = Tender::default();
        let root = Scope::root(&tender, now, &config);
        let scope = root.child("Complaint");

        let rendered = Complaint::default().serialize_view(View::View, &scope).unwrap();
        assert_eq!(rendered["status"], "draft");
        assert_eq!(rendered["type"], "claim");
    }

    #[test]
    fn test_claims_are_anonymous_while_tendering() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let mut tender = Tender {
            status: TenderStatus::ActiveTendering,
            ..Tender::default()
        };
        let root = Scope::root(&tender, now, &config);
        let rendered = complaint().serialize_view(View::View, &root.child("Complaint")).unwrap();
        assert!(rendered.get("author").is_none());

        tender.status = TenderStatus::ActiveQualification;
        let root = Scope::root(&tender, now, &config);
        let rendered = complaint().serialize_view(View::View, &root.child("Complaint")).unwrap();
        assert!(rendered.get("author").is_some());
    }

    #[test]
    fn test_local_roles_and_acl() {
        let model = Complaint {
            owner: Some("test_owner".to_string()),
            owner_token: Some("token".to_string()),
            ..Complaint::default()
        };
        assert_eq!(
            model.local_roles(),
            BTreeMap::from([("test_owner_token".to_string(), "complaint_owner")])
        );

        let acl = Complaint::default().acl();
        let rendered: Vec<String> = acl.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "Allow g:reviewers edit_complaint",
                "Allow None_None edit_complaint",
                "Allow None_None upload_complaint_documents",
            ]
        );
    }

    #[test]
    fn test_get_role() {
        let mut model = Complaint {
            status: ComplaintStatus::Cancelled,
            ..Complaint::default()
        };
        assert_eq!(
            model.get_role("complaint_owner", Some(ComplaintStatus::Cancelled)),
            ComplaintRole::Cancellation
        );

        model.status = ComplaintStatus::Draft;
        assert_eq!(
            model.get_role("complaint_owner", Some(ComplaintStatus::Draft)),
            ComplaintRole::Draft
        );
        assert_eq!(
            model.get_role("complaint_owner", Some(ComplaintStatus::Cancelled)),
            ComplaintRole::Cancellation
        );

        model.status = ComplaintStatus::Claim;
        assert_eq!(model.get_role("tender_owner", None), ComplaintRole::Answer);

        model.status = ComplaintStatus::Answered;
        assert_eq!(model.get_role("complaint_owner", None), ComplaintRole::Satisfy);

        assert_eq!(model.get_role("No_role", None), ComplaintRole::Invalid);
        assert_eq!(ComplaintRole::Invalid.view(), None);
    }

    #[test]
    fn test_validate_status_requirements() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let mut tender = Tender::default();
        let scope = Scope::attached(&tender, "Complaint", now, &config);

        let mut model = complaint();
        assert!(model.validate(&scope).unwrap().is_empty());

        model.status = ComplaintStatus::Answered;
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("resolutionType"), vec!["This field is required."]);

        model.status = ComplaintStatus::Cancelled;
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("cancellationReason"), vec!["This field is required."]);

        tender.lots.push(Lot {
            id: Some("1234_test_lot".to_string()),
            ..Lot::default()
        });
        let scope = Scope::attached(&tender, "Complaint", now, &config);
        model.related_lot = Some("0c4e8f1a".to_string());
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedLot"), vec!["relatedLot should be one of lots"]);
    }
}
