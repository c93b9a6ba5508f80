use serde::{Deserialize, Serialize};

use super::common::{new_id, Document};
use super::{assign_list_ids, require_str, validate_list, Entity};
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::time::Timestamp;

crate::string_enum! {
    #[derive(Default)]
    pub enum CancellationStatus {
        #[default]
        Pending => "pending",
        Active => "active",
    }
}

crate::string_enum! {
    #[derive(Default)]
    pub enum CancellationOf {
        #[default]
        Tender => "tender",
        Lot => "lot",
    }
}

/// Termination of a tender or a single lot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Cancellation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "reason_en", skip_serializing_if = "Option::is_none")]
    pub reason_en: Option<String>,
    pub status: CancellationStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date: Option<Timestamp>,
    pub cancellation_of: CancellationOf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_lot: Option<String>,
}

impl Entity for Cancellation {
    const NAME: &'static str = "Cancellation";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "reason", &self.reason);
        validate_list(&mut errors, "documents", &self.documents, scope)?;

        match &self.related_lot {
            None if self.cancellation_of == CancellationOf::Lot => {
                errors.add("relatedLot", super::REQUIRED)
            }
            Some(related) => {
                if let Some(tender) = scope.parent_tender() {
                    if tender.lot(related).is_none() {
                        errors.add("relatedLot", "relatedLot should be one of lots");
                    }
                }
            }
            None => {}
        }
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        match view {
            View::Create => Some(FieldFilter::Only(&[
                "reason",
                "reason_en",
                "status",
                "cancellationOf",
                "relatedLot",
            ])),
            View::Edit => Some(FieldFilter::Only(&["status"])),
            View::Plain | View::View | View::Embedded | View::Status(_) => Some(FieldFilter::All),
            _ => None,
        }
    }

    fn assign_ids(&mut self) {
        if self.id.is_none() {
            self.id = Some(new_id());
        }
        assign_list_ids(&mut self.documents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::models::lot::Lot;
    use crate::models::tender::Tender;
    use crate::time::kyiv_midnight;

    #[test]
    fn test_related_lot() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let mut tender = Tender::default();
        let mut model = Cancellation {
            reason: Some("test_reason".to_string()),
            ..Cancellation::default()
        };

        let scope = Scope::attached(&tender, "Cancellation", now, &config);
        assert!(model.validate(&scope).unwrap().is_empty());
        assert_eq!(model.status, CancellationStatus::Pending);
        assert_eq!(model.cancellation_of, CancellationOf::Tender);

        model.cancellation_of = CancellationOf::Lot;
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedLot"), vec!["This field is required."]);

        tender.lots.push(Lot {
            id: Some("1234_test_lot".to_string()),
            ..Lot::default()
        });
        let scope = Scope::attached(&tender, "Cancellation", now, &config);
        model.related_lot = Some("5d1e2a3b".to_string());
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedLot"), vec!["relatedLot should be one of lots"]);
    }
}
