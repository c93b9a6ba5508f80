use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::common::{new_id, Document, Item, Organization, Period};
use super::complaint::Complaint;
use super::{
    assign_list_ids, filtered, render_list, require, require_list, require_str, validate_list,
    validate_nested, Entity,
};
use crate::amount::Value;
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::time::Timestamp;

crate::string_enum! {
    #[derive(Default)]
    pub enum AwardStatus {
        #[default]
        Pending => "pending",
        Unsuccessful => "unsuccessful",
        Active => "active",
        Cancelled => "cancelled",
    }
}

/// Qualification decision for one bid on the tender or a lot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Award {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "bid_id", skip_serializing_if = "Option::is_none")]
    pub bid_id: Option<String>,
    #[serde(rename = "lotID", skip_serializing_if = "Option::is_none")]
    pub lot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "title_en", skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "description_en", skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    pub status: AwardStatus,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppliers: Vec<Organization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub complaints: Vec<Complaint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complaint_period: Option<Period>,
}

impl Award {
    pub fn complaint(&self, id: &str) -> Option<&Complaint> {
        self.complaints.iter().find(|c| c.id.as_deref() == Some(id))
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().rev().find(|d| d.id.as_deref() == Some(id))
    }
}

impl Entity for Award {
    const NAME: &'static str = "Award";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "bid_id", &self.bid_id);
        require_list(&mut errors, "suppliers", &self.suppliers);
        validate_list(&mut errors, "suppliers", &self.suppliers, scope)?;
        validate_list(&mut errors, "documents", &self.documents, scope)?;
        validate_list(&mut errors, "complaints", &self.complaints, scope)?;
        validate_nested(&mut errors, "complaintPeriod", self.complaint_period.as_ref(), scope)?;
        if let Some(value) = &self.value {
            errors.nest("value", value.validate());
        }

        if let Some(tender) = scope.parent_tender() {
            match &self.lot_id {
                None if tender.is_lotted() => require(&mut errors, "lotID", &self.lot_id),
                Some(lot_id) if tender.lot(lot_id).is_none() => {
                    errors.add("lotID", "lotID should be one of lots")
                }
                _ => {}
            }
        }
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        match view {
            View::Create => Some(FieldFilter::Except(&[
                "id",
                "date",
                "documents",
                "complaints",
                "complaintPeriod",
            ])),
            View::Edit => Some(FieldFilter::Only(&[
                "status",
                "title",
                "title_en",
                "description",
                "description_en",
            ])),
            View::Plain | View::View | View::Embedded | View::Status(_) => Some(FieldFilter::All),
            _ => None,
        }
    }

    fn serialize_view(&self, view: View, scope: &Scope) -> CoreResult<JsonValue> {
        let mut rendered = filtered(self, view)?;
        if view != View::Plain && !self.complaints.is_empty() {
            if let Some(object) = rendered.as_object_mut() {
                if object.contains_key("complaints") {
                    let complaints = render_list(&self.complaints, View::Embedded, scope)?;
                    object.insert("complaints".to_string(), complaints);
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
        assign_list_ids(&mut self.complaints);
    }
}
