use serde::{Deserialize, Serialize};

use super::common::{new_id, Document, Item, Organization, Period};
use super::{assign_list_ids, require_str, validate_list, validate_nested, Entity};
use crate::amount::ContractValue;
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::time::{format_iso, Timestamp};

crate::string_enum! {
    #[derive(Default)]
    pub enum ContractStatus {
        #[default]
        Pending => "pending",
        Terminated => "terminated",
        Active => "active",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Contract {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "awardID", skip_serializing_if = "Option::is_none")]
    pub award_id: Option<String>,
    #[serde(rename = "contractID", skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "title_en", skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "description_en", skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    pub status: ContractStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ContractValue>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_signed: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppliers: Vec<Organization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
}

impl Contract {
    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().rev().find(|d| d.id.as_deref() == Some(id))
    }
}

impl Entity for Contract {
    const NAME: &'static str = "Contract";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "awardID", &self.award_id);
        validate_nested(&mut errors, "period", self.period.as_ref(), scope)?;
        validate_list(&mut errors, "items", &self.items, scope)?;
        validate_list(&mut errors, "suppliers", &self.suppliers, scope)?;
        validate_list(&mut errors, "documents", &self.documents, scope)?;
        if let Some(value) = &self.value {
            errors.nest("value", value.validate());
        }

        let Some(tender) = scope.parent_tender() else {
            return Ok(errors);
        };
        let award = self.award_id.as_deref().and_then(|id| tender.award(id));
        if self.award_id.is_some() && award.is_none() {
            errors.add("awardID", "awardID should be one of awards");
        }

        if let (Some(signed), Some(award)) = (self.date_signed, award) {
            let complaint_end = award.complaint_period.as_ref().and_then(|p| p.end_date);
            match complaint_end {
                Some(end) if end >= signed => errors.add(
                    "dateSigned",
                    format!(
                        "Contract signature date should be after award complaint period end date ({})",
                        format_iso(&end)
                    ),
                ),
                _ if signed > scope.now() => {
                    errors.add("dateSigned", "Contract signature date can't be in the future")
                }
                _ => {}
            }
        }
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        match view {
            View::Create => Some(FieldFilter::Except(&["id"])),
            View::Edit => Some(FieldFilter::Except(&[
                "id",
                "documents",
                "date",
                "awardID",
                "suppliers",
                "items",
                "contractID",
            ])),
            View::Plain | View::View | View::Embedded | View::Status(_) => Some(FieldFilter::All),
            _ => None,
        }
    }

    fn assign_ids(&mut self) {
        if self.id.is_none() {
            self.id = Some(new_id());
        }
        assign_list_ids(&mut self.items);
        assign_list_ids(&mut self.documents);
    }
}
