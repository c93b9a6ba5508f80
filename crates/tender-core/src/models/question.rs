//! Questions asked during the enquiry period.

use serde::{Deserialize, Serialize};

use super::common::{new_id, Organization};
use super::{require, require_str, validate_nested, Entity};
use crate::error::{CoreResult, ValidationErrors};
use crate::node::Scope;
use crate::roles::{FieldFilter, View};
use crate::time::Timestamp;

crate::string_enum! {
    #[derive(Default)]
    pub enum QuestionOf {
        #[default]
        Tender => "tender",
        Item => "item",
        Lot => "lot",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Question {
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
    pub date_answered: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub question_of: QuestionOf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_item: Option<String>,
}

impl Question {
    pub fn is_answered(&self) -> bool {
        self.answer.as_deref().is_some_and(|answer| !answer.is_empty())
    }
}

impl Entity for Question {
    const NAME: &'static str = "Question";

    fn validate(&self, scope: &Scope) -> CoreResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "author", &self.author);
        require_str(&mut errors, "title", &self.title);
        validate_nested(&mut errors, "author", self.author.as_ref(), scope)?;

        let needs_item = matches!(self.question_of, QuestionOf::Lot | QuestionOf::Item);
        match &self.related_item {
            None if needs_item => errors.add("relatedItem", super::REQUIRED),
            Some(related) if scope.has_parent() => {
                let tender = scope.enclosing_tender()?;
                match self.question_of {
                    QuestionOf::Lot if tender.lot(related).is_none() => {
                        errors.add("relatedItem", "relatedItem should be one of lots")
                    }
                    QuestionOf::Item if tender.item(related).is_none() => {
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
            View::Plain => Some(FieldFilter::All),
            View::Create => Some(FieldFilter::Only(&[
                "author",
                "title",
                "description",
                "questionOf",
                "relatedItem",
            ])),
            View::Edit => Some(FieldFilter::Only(&["answer"])),
            View::View | View::Embedded | View::Status(_) => Some(FieldFilter::Only(&[
                "id",
                "title",
                "description",
                "date",
                "dateAnswered",
                "answer",
                "questionOf",
                "relatedItem",
            ])),
            _ => None,
        }
    }

    fn assign_ids(&mut self) {
        if self.id.is_none() {
            self.id = Some(new_id());
        }
    }
}
