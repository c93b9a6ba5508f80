//! Non-price criteria and their weighted values.

use serde::{Deserialize, Serialize};

use super::common::new_id;
use super::{require, require_list, require_str, validate_list, Entity};
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::validation::validate_uniqueness;

/// Largest weight a single value or a sum of maxima may carry.
pub const MAX_FEATURE_WEIGHT: f64 = 0.3;

crate::string_enum! {
    #[derive(Default)]
    pub enum FeatureOf {
        #[default]
        Tenderer => "tenderer",
        Lot => "lot",
        Item => "item",
    }
}

/// One selectable option of a feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct FeatureValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "title_en", skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for FeatureValue {
    const NAME: &'static str = "FeatureValue";

    fn validate(&self, _scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "value", &self.value);
        require_str(&mut errors, "title", &self.title);
        if let Some(value) = self.value {
            if value < 0.0 {
                errors.add("value", "Float value should be greater than 0.");
            } else if value > MAX_FEATURE_WEIGHT {
                errors.add("value", "Float value should be less than 0.3.");
            }
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }
}

/// A criterion that adjusts bid comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Feature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub feature_of: FeatureOf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "title_en", skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "description_en", skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<FeatureValue>,
}

impl Feature {
    pub fn new(code: &str, feature_of: FeatureOf, related_item: Option<&str>, values: &[f64]) -> Self {
        Feature {
            code: Some(code.to_string()),
            feature_of,
            related_item: related_item.map(str::to_string),
            title: Some(code.to_string()),
            values: values
                .iter()
                .map(|value| FeatureValue {
                    value: Some(*value),
                    title: Some(value.to_string()),
                    ..FeatureValue::default()
                })
                .collect(),
            ..Feature::default()
        }
    }

    /// Highest weight among the values, zero when there are none.
    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .filter_map(|v| v.value)
            .fold(0.0, f64::max)
    }

    /// True when `value` is one of the selectable weights.
    pub fn has_value(&self, value: f64) -> bool {
        self.values
            .iter()
            .filter_map(|v| v.value)
            .any(|candidate| (candidate - value).abs() < f64::EPSILON)
    }
}

impl Entity for Feature {
    const NAME: &'static str = "Feature";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_str(&mut errors, "code", &self.code);
        require_str(&mut errors, "title", &self.title);
        require_list(&mut errors, "enum", &self.values);
        validate_list(&mut errors, "enum", &self.values, scope)?;
        if let Err(message) = validate_uniqueness(
            &self.values,
            // -0.0 and 0.0 are the same weight.
            |v| v.value.map(|value| (value + 0.0).to_bits()),
            "Feature value should be uniq for feature",
        ) {
            errors.add("enum", message);
        }

        let needs_item = matches!(self.feature_of, FeatureOf::Lot | FeatureOf::Item);
        match &self.related_item {
            None if needs_item => errors.add("relatedItem", super::REQUIRED),
            Some(related) => {
                if let Some(tender) = scope.parent_tender() {
                    match self.feature_of {
                        FeatureOf::Item if tender.item(related).is_none() => {
                            errors.add("relatedItem", "relatedItem should be one of items")
                        }
                        FeatureOf::Lot if tender.lot(related).is_none() => {
                            errors.add("relatedItem", "relatedItem should be one of lots")
                        }
                        _ => {}
                    }
                }
            }
            None => {}
        }
        Ok(errors)
    }

    fn filter(_view: View) -> Option<FieldFilter> {
        Some(FieldFilter::All)
    }

    fn assign_ids(&mut self) {
        if self.code.is_none() {
            self.code = Some(new_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::models::common::Item;
    use crate::models::lot::Lot;
    use crate::models::tender::Tender;
    use crate::time::kyiv_midnight;
    use serde_json::json;

    fn feature() -> Feature {
        serde_json::from_value(json!({
            "code": "OCDS-123454-AIR-INTAKE",
            "title": "test_title",
            "enum": [
                {"value": 0.1, "title": "До 1000 Вт"},
                {"value": 0.15, "title": "Більше 1000 Вт"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_related_item() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let mut tender = Tender::default();
        let scope = Scope::attached(&tender, "Feature", now, &config);

        let mut model = feature();
        assert!(model.validate(&scope).unwrap().is_empty());
        assert_eq!(model.feature_of, FeatureOf::Tenderer);

        model.feature_of = FeatureOf::Lot;
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedItem"), vec!["This field is required."]);

        tender.items.push(Item {
            id: Some("test".to_string()),
            ..Item::default()
        });
        tender.lots.push(Lot {
            id: Some("test".to_string()),
            ..Lot::default()
        });
        let scope = Scope::attached(&tender, "Feature", now, &config);
        model.related_item = Some("f3a8b1c2".to_string());
        model.feature_of = FeatureOf::Item;
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedItem"), vec!["relatedItem should be one of items"]);

        model.feature_of = FeatureOf::Lot;
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("relatedItem"), vec!["relatedItem should be one of lots"]);
    }

    #[test]
    fn test_values_uniq_and_range() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let scope = Scope::detached("Feature", now, &config);

        let model = Feature::new("code", FeatureOf::Tenderer, None, &[0.1, 0.1]);
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("enum"), vec!["Feature value should be uniq for feature"]);

        let model = Feature::new("code", FeatureOf::Tenderer, None, &[0.0, -0.0]);
        let errors = model.validate(&scope).unwrap();
        assert_eq!(errors.messages("enum"), vec!["Feature value should be uniq for feature"]);

        let model = Feature::new("code", FeatureOf::Tenderer, None, &[0.5]);
        let errors = model.validate(&scope).unwrap();
        let nested = serde_json::to_value(&errors).unwrap();
        assert_eq!(nested, json!({"enum": [{"value": ["Float value should be less than 0.3."]}]}));
    }

    #[test]
    fn test_missing_code_is_generated() {
        let mut model = feature();
        model.code = None;
        model.assign_ids();
        assert_eq!(model.code.as_deref().map(str::len), Some(32));
        assert!((model.max_value() - 0.15).abs() < f64::EPSILON);
        assert!(model.has_value(0.1));
    }
}
