//! Building blocks shared by several entities: organizations,
//! classifications, items, periods and documents.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{require, require_str, validate_list, validate_nested, Entity};
use crate::constants::{
    cant_delete_period_start_date_from, cpv_items_class_from,
    not_required_additional_classification_from, ADDITIONAL_CLASSIFICATIONS_SCHEMES,
    ADDITIONAL_CLASSIFICATIONS_SCHEMES_2017, CPV_NOT_CLASSIFIED,
};
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::time::Timestamp;
use crate::validation::validate_additional_classifications;

/// Fresh identifier for a nested entity.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// =============================================================================
// Organizations
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Entity for Identifier {
    const NAME: &'static str = "Identifier";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "scheme", &self.scheme);
        require_str(&mut errors, "id", &self.id);
        if let Some(uri) = &self.uri {
            check_url(&mut errors, "uri", uri);
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
}

impl Entity for Address {
    const NAME: &'static str = "Address";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "countryName", &self.country_name);
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ContactPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fax_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Entity for ContactPoint {
    const NAME: &'static str = "ContactPoint";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "name", &self.name);
        let has_email = self.email.as_deref().is_some_and(|v| !v.is_empty());
        let has_phone = self.telephone.as_deref().is_some_and(|v| !v.is_empty());
        if !has_email && !has_phone {
            errors.add("email", "telephone or email should be present");
        }
        if let Some(email) = self.email.as_deref().filter(|v| !v.is_empty()) {
            if !looks_like_email(email) {
                errors.add("email", "Not a well formed email address.");
            }
        }
        if let Some(url) = &self.url {
            check_url(&mut errors, "url", url);
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

fn looks_like_email(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// A tenderer, supplier or complaint author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Organization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "name_en", skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_identifiers: Vec<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_point: Option<ContactPoint>,
}

impl Entity for Organization {
    const NAME: &'static str = "Organization";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "name", &self.name);
        require(&mut errors, "identifier", &self.identifier);
        require(&mut errors, "address", &self.address);
        require(&mut errors, "contactPoint", &self.contact_point);
        validate_nested(&mut errors, "identifier", self.identifier.as_ref(), scope)?;
        validate_list(&mut errors, "additionalIdentifiers", &self.additional_identifiers, scope)?;
        validate_nested(&mut errors, "address", self.address.as_ref(), scope)?;
        validate_nested(&mut errors, "contactPoint", self.contact_point.as_ref(), scope)?;
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

crate::string_enum! {
    /// Legal category of a procuring entity.
    pub enum ProcuringEntityKind {
        General => "general",
        Special => "special",
        Defense => "defense",
        Other => "other",
    }
}

/// The organization running the tender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ProcuringEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "name_en", skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_identifiers: Vec<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_point: Option<ContactPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProcuringEntityKind>,
}

impl Entity for ProcuringEntity {
    const NAME: &'static str = "ProcuringEntity";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "name", &self.name);
        require(&mut errors, "identifier", &self.identifier);
        require(&mut errors, "address", &self.address);
        require(&mut errors, "contactPoint", &self.contact_point);
        validate_nested(&mut errors, "identifier", self.identifier.as_ref(), scope)?;
        validate_list(&mut errors, "additionalIdentifiers", &self.additional_identifiers, scope)?;
        validate_nested(&mut errors, "address", self.address.as_ref(), scope)?;
        validate_nested(&mut errors, "contactPoint", self.contact_point.as_ref(), scope)?;
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

// =============================================================================
// Classifications and Items
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Classification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Classification {
    pub fn new(scheme: &str, id: &str, description: &str) -> Self {
        Classification {
            scheme: Some(scheme.to_string()),
            id: Some(id.to_string()),
            description: Some(description.to_string()),
            uri: None,
        }
    }
}

impl Entity for Classification {
    const NAME: &'static str = "Classification";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "scheme", &self.scheme);
        require_str(&mut errors, "id", &self.id);
        require_str(&mut errors, "description", &self.description);
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Unit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Entity for Unit {
    const NAME: &'static str = "Unit";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "code", &self.code);
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

/// A good, service or work being procured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "description_en", skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_classifications: Vec<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_lot: Option<String>,
}

impl Item {
    pub fn classification_id(&self) -> Option<&str> {
        self.classification.as_ref().and_then(|c| c.id.as_deref())
    }

    fn check_additional_classifications(
        &self,
        errors: &mut ValidationErrors,
        first_revision: Timestamp,
    ) {
        let from_2017 = first_revision > cpv_items_class_from();
        let not_cpv = self.classification_id() == Some(CPV_NOT_CLASSIFIED);
        let required = first_revision < not_required_additional_classification_from() && not_cpv;
        let items = &self.additional_classifications;

        if items.is_empty() && (!from_2017 || (not_cpv && required)) {
            errors.add("additionalClassifications", super::REQUIRED);
        } else if from_2017 && not_cpv && !items.is_empty() {
            if let Err(message) =
                validate_additional_classifications(items, ADDITIONAL_CLASSIFICATIONS_SCHEMES_2017)
            {
                errors.add("additionalClassifications", message);
            }
        } else if !from_2017 && !items.is_empty() {
            if let Err(message) =
                validate_additional_classifications(items, ADDITIONAL_CLASSIFICATIONS_SCHEMES)
            {
                errors.add("additionalClassifications", message);
            }
        }
    }
}

impl Entity for Item {
    const NAME: &'static str = "Item";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "description", &self.description);
        require(&mut errors, "classification", &self.classification);
        validate_nested(&mut errors, "classification", self.classification.as_ref(), scope)?;
        validate_list(&mut errors, "additionalClassifications", &self.additional_classifications, scope)?;
        validate_nested(&mut errors, "unit", self.unit.as_ref(), scope)?;
        validate_nested(&mut errors, "deliveryDate", self.delivery_date.as_ref(), scope)?;
        validate_nested(&mut errors, "deliveryAddress", self.delivery_address.as_ref(), scope)?;
        if self.quantity.is_some_and(|q| q < 0.0) {
            errors.add("quantity", "Float value should be greater than 0.");
        }

        if self.classification.is_some() {
            let first_revision = scope.first_revision_date()?;
            self.check_additional_classifications(&mut errors, first_revision);
        }

        if let Some(related_lot) = &self.related_lot {
            if scope.has_parent() {
                let tender = scope.enclosing_tender()?;
                if tender.lot(related_lot).is_none() {
                    errors.add("relatedLot", "relatedLot should be one of lots");
                }
            }
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }

    fn assign_ids(&mut self) {
        if self.id.is_none() {
            self.id = Some(new_id());
        }
    }
}

// =============================================================================
// Periods
// =============================================================================

const PERIOD_ORDER: &str = "period should begin before its end";

/// A time window with optional bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub start_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub end_date: Option<Timestamp>,
}

impl Period {
    pub fn new(start_date: Option<Timestamp>, end_date: Option<Timestamp>) -> Self {
        Period {
            start_date,
            end_date,
        }
    }

    /// True when `at` falls inside the window; open bounds are unbounded.
    pub fn contains(&self, at: Timestamp) -> bool {
        self.start_date.map_or(true, |start| start <= at) && self.end_date.map_or(true, |end| at <= end)
    }
}

impl Entity for Period {
    const NAME: &'static str = "Period";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                errors.add("startDate", PERIOD_ORDER);
            }
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

/// A period whose end is mandatory and whose start cannot be removed
/// from tenders published after the cutover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PeriodEndRequired {
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub start_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub end_date: Option<Timestamp>,
}

impl PeriodEndRequired {
    pub fn new(start_date: Option<Timestamp>, end_date: Option<Timestamp>) -> Self {
        PeriodEndRequired {
            start_date,
            end_date,
        }
    }

    pub fn contains(&self, at: Timestamp) -> bool {
        self.start_date.map_or(true, |start| start <= at) && self.end_date.map_or(true, |end| at <= end)
    }
}

impl Entity for PeriodEndRequired {
    const NAME: &'static str = "PeriodEndRequired";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "endDate", &self.end_date);
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => errors.add("startDate", PERIOD_ORDER),
            (Some(_), _) => {}
            (None, _) => {
                let tender = scope.enclosing_tender()?;
                let published_after_cutover = tender
                    .first_revision_date()
                    .is_some_and(|date| date > cant_delete_period_start_date_from());
                if published_after_cutover {
                    errors.add("startDate", "This field cannot be deleted");
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
// Documents
// =============================================================================

crate::string_enum! {
    #[derive(Default)]
    pub enum DocumentOf {
        #[default]
        Tender => "tender",
        Item => "item",
        Lot => "lot",
    }
}

/// An uploaded file reference. Every upload is a new version sharing the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "title_en", skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_published: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::time::iso_opt")]
    pub date_modified: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub document_of: DocumentOf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// A bare `type/subtype` media type. Parameters are not accepted.
fn is_mime_type(raw: &str) -> bool {
    raw.parse::<mime::Mime>()
        .is_ok_and(|parsed| parsed.params().next().is_none())
}

pub(crate) fn check_url(errors: &mut ValidationErrors, field: &str, raw: &str) {
    if Url::parse(raw).is_err() {
        errors.add(field, "Not a well formed URL.");
    }
}

impl Entity for Document {
    const NAME: &'static str = "Document";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "title", &self.title);
        require_str(&mut errors, "url", &self.url);
        require_str(&mut errors, "format", &self.format);
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            check_url(&mut errors, "url", url);
        }
        if let Some(format) = self.format.as_deref().filter(|f| !f.is_empty()) {
            if !is_mime_type(format) {
                errors.add("format", "String value did not match validation regex.");
            }
        }

        let needs_item = matches!(self.document_of, DocumentOf::Lot | DocumentOf::Item);
        match &self.related_item {
            None if needs_item => errors.add("relatedItem", super::REQUIRED),
            Some(related) if scope.has_parent() => {
                let tender = scope.enclosing_tender()?;
                match self.document_of {
                    DocumentOf::Lot if tender.lot(related).is_none() => {
                        errors.add("relatedItem", "relatedItem should be one of lots")
                    }
                    DocumentOf::Item if tender.item(related).is_none() => {
                        errors.add("relatedItem", "relatedItem should be one of items")
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(errors)
    }

    fn filter(view: View) -> Option<FieldFilter> {
        match view {
            View::Create | View::Edit => Some(FieldFilter::Except(&["id", "datePublished", "dateModified", "author"])),
            _ => Some(FieldFilter::All),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::models::lot::Lot;
    use crate::models::tender::Tender;
    use crate::revision::Revision;
    use crate::time::{kyiv_midnight, parse_iso};
    use serde_json::json;

    fn tender_with_revision(date: Timestamp) -> Tender {
        Tender {
            revisions: vec![Revision::new("broker", date, Vec::new())],
            ..Tender::default()
        }
    }

    fn sample_item() -> Item {
        serde_json::from_value(json!({
            "description": "футляри до державних нагород",
            "classification": {"scheme": "CPV", "id": "44617100-9", "description": "Cartons"},
            "additionalClassifications": [
                {"scheme": "ДКПП", "id": "17.21.1", "description": "папір і картон гофровані"}
            ],
            "unit": {"name": "item", "code": "44617100-9"},
            "quantity": 5
        }))
        .unwrap()
    }

    #[test]
    fn test_period_end_required() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let period = PeriodEndRequired::new(Some(now + chrono::TimeDelta::minutes(3)), Some(now));
        let scope = Scope::detached("PeriodEndRequired", now, &config);
        let errors = period.validate(&scope).unwrap();
        assert_eq!(errors.messages("startDate"), vec!["period should begin before its end"]);

        let tender = tender_with_revision(now);
        let scope = Scope::attached(&tender, "PeriodEndRequired", now, &config);
        let errors = PeriodEndRequired::new(None, Some(now)).validate(&scope).unwrap();
        assert_eq!(errors.messages("startDate"), vec!["This field cannot be deleted"]);

        let errors = PeriodEndRequired::new(Some(now), Some(now)).validate(&scope).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_period_without_start_needs_tender() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let root = Scope::detached("Tender", now, &config);
        let scope = root.child("PeriodEndRequired");
        let result = PeriodEndRequired::new(None, Some(now)).validate(&scope);
        assert!(result.is_err());
    }

    #[test]
    fn test_item_additional_classifications() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let tender = tender_with_revision(now);
        let scope = Scope::attached(&tender, "Item", now, &config);

        assert!(sample_item().validate(&scope).unwrap().is_empty());

        let mut item = sample_item();
        item.classification = Some(Classification::new("CPV", "99999999-9", "Other"));
        item.related_lot = Some("missing".to_string());
        let errors = item.validate(&scope).unwrap();
        assert_eq!(
            errors.messages("additionalClassifications"),
            vec!["One of additional classifications should be one of [ДК003, ДК015, ДК018, specialNorms]."]
        );
        assert_eq!(errors.messages("relatedLot"), vec!["relatedLot should be one of lots"]);

        item.additional_classifications.clear();
        let errors = item.validate(&scope).unwrap();
        assert_eq!(errors.messages("additionalClassifications"), vec!["This field is required."]);

        let old = tender_with_revision(kyiv_midnight(2016, 1, 1));
        let scope = Scope::attached(&old, "Item", now, &config);
        let mut item = sample_item();
        item.additional_classifications[0].scheme = Some("test".to_string());
        let errors = item.validate(&scope).unwrap();
        assert_eq!(
            errors.messages("additionalClassifications"),
            vec!["One of additional classifications should be one of [ДКПП, NONE, ДК003, ДК015, ДК018]."]
        );
    }

    #[test]
    fn test_document_related_item() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let mut document: Document = serde_json::from_value(json!({
            "title": "test.pdf",
            "format": "application/pdf",
            "url": "https://somewhere",
            "documentOf": "lot"
        }))
        .unwrap();

        let mut tender = Tender::default();
        tender.lots.push(Lot {
            id: Some("lot".to_string()),
            ..Lot::default()
        });
        let scope = Scope::attached(&tender, "Document", now, &config);
        let errors = document.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedItem"), vec!["This field is required."]);

        document.related_item = Some("other".to_string());
        let errors = document.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedItem"), vec!["relatedItem should be one of lots"]);

        document.document_of = DocumentOf::Item;
        let errors = document.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedItem"), vec!["relatedItem should be one of items"]);

        document.document_of = DocumentOf::Tender;
        assert!(document.validate(&scope).unwrap().is_empty());
    }

    #[test]
    fn test_document_format_and_url() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let scope = Scope::detached("Document", now, &config);
        let document = Document {
            title: Some("x".to_string()),
            url: Some("not a url".to_string()),
            format: Some("pdf".to_string()),
            ..Document::default()
        };
        let errors = document.validate(&scope).unwrap();
        assert_eq!(errors.messages("url"), vec!["Not a well formed URL."]);
        assert_eq!(errors.messages("format"), vec!["String value did not match validation regex."]);
    }

    #[test]
    fn test_document_format_media_types() {
        assert!(is_mime_type("application/pdf"));
        assert!(is_mime_type("application/vnd.ms-excel"));
        assert!(is_mime_type("application/vnd.openxmlformats-officedocument.wordprocessingml.document"));
        assert!(!is_mime_type("text/plain; charset=utf-8"));
        assert!(!is_mime_type("foo"));

        let config = CoreConfig::default();
        let scope = Scope::detached("Document", kyiv_midnight(2017, 10, 7), &config);
        let document = Document {
            title: Some("x".to_string()),
            url: Some("http://localhost/get".to_string()),
            format: Some("application/vnd.ms-excel".to_string()),
            ..Document::default()
        };
        let errors = document.validate(&scope).unwrap();
        assert!(errors.messages("format").is_empty());
    }

    #[test]
    fn test_contact_point_needs_phone_or_email() {
        let config = CoreConfig::default();
        let now = parse_iso("2017-10-07T00:00:00").unwrap();
        let scope = Scope::detached("ContactPoint", now, &config);
        let contact = ContactPoint {
            name: Some("office".to_string()),
            ..ContactPoint::default()
        };
        let errors = contact.validate(&scope).unwrap();
        assert_eq!(errors.messages("email"), vec!["telephone or email should be present"]);
    }
}
