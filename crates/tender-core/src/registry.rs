//! # Procedure Registry
//!
//! Every `procurementMethodType` the deployment accepts is described once,
//! at startup, by a [`ProcedureDescriptor`]. The registry is immutable after
//! it is built and is handed to the request layer explicitly.
//!
//! ## Standard Procedures
//! ```text
//! ┌───────────────────┬────────┬──────┬──────────────────┬──────────────┐
//! │ Type              │ Create │ Edit │ Initial status   │ Extension    │
//! ├───────────────────┼────────┼──────┼──────────────────┼──────────────┤
//! │ belowThreshold    │ 1      │ 2    │ active.enquiries │ -            │
//! │ aboveThresholdUA  │ 3      │ 4    │ active.tendering │ 7 days       │
//! │ aboveThresholdEU  │ 3      │ 4    │ active.tendering │ 7 days       │
//! └───────────────────┴────────┴──────┴──────────────────┴──────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::TimeDelta;

use crate::error::{CoreError, CoreResult};
use crate::models::common::ProcuringEntityKind;
use crate::models::complaint::ComplaintStatus;
use crate::models::tender::{Tender, TenderStatus, BLOCK_COMPLAINT_STATUSES, DEFAULT_PROCUREMENT_METHOD_TYPE};

/// The procedures this build knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenderKind {
    BelowThreshold,
    AboveThresholdUa,
    AboveThresholdEu,
}

impl TenderKind {
    pub fn procurement_method_type(&self) -> &'static str {
        match self {
            TenderKind::BelowThreshold => "belowThreshold",
            TenderKind::AboveThresholdUa => "aboveThresholdUA",
            TenderKind::AboveThresholdEu => "aboveThresholdEU",
        }
    }

    /// The built-in descriptor for this kind.
    pub fn descriptor(&self) -> ProcedureDescriptor {
        const ALL_KINDS: &[ProcuringEntityKind] = &[
            ProcuringEntityKind::General,
            ProcuringEntityKind::Special,
            ProcuringEntityKind::Defense,
            ProcuringEntityKind::Other,
        ];
        const ABOVE_KINDS: &[ProcuringEntityKind] = &[
            ProcuringEntityKind::General,
            ProcuringEntityKind::Special,
            ProcuringEntityKind::Defense,
        ];

        match self {
            TenderKind::BelowThreshold => ProcedureDescriptor {
                kind: *self,
                create_accreditations: "1",
                edit_accreditation: '2',
                procuring_entity_kinds: ALL_KINDS,
                initial_status: TenderStatus::ActiveEnquiries,
                block_complaint_statuses: BLOCK_COMPLAINT_STATUSES,
                tendering_extension: None,
            },
            TenderKind::AboveThresholdUa | TenderKind::AboveThresholdEu => ProcedureDescriptor {
                kind: *self,
                create_accreditations: "3",
                edit_accreditation: '4',
                procuring_entity_kinds: ABOVE_KINDS,
                initial_status: TenderStatus::ActiveTendering,
                block_complaint_statuses: &[ComplaintStatus::Pending],
                tendering_extension: Some(TimeDelta::days(7)),
            },
        }
    }
}

/// What the request layer needs to know about one procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDescriptor {
    pub kind: TenderKind,
    /// Any one of these accreditation levels may create the tender.
    pub create_accreditations: &'static str,
    /// Level required to add bids, questions and complaints.
    pub edit_accreditation: char,
    pub procuring_entity_kinds: &'static [ProcuringEntityKind],
    /// Status a draft tender is published into.
    pub initial_status: TenderStatus,
    /// Complaint statuses that block contract signing.
    pub block_complaint_statuses: &'static [ComplaintStatus],
    /// Time that must remain in the tendering period after an owner edit.
    pub tendering_extension: Option<TimeDelta>,
}

impl ProcedureDescriptor {
    pub fn procurement_method_type(&self) -> &'static str {
        self.kind.procurement_method_type()
    }

    pub fn allows_kind(&self, kind: Option<ProcuringEntityKind>) -> bool {
        kind.is_some_and(|kind| self.procuring_entity_kinds.contains(&kind))
    }

    /// Kinds as listed in error messages: `general, special, defense`.
    pub fn kinds_list(&self) -> String {
        let kinds: Vec<&str> = self.procuring_entity_kinds.iter().map(|k| k.as_str()).collect();
        kinds.join(", ")
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable lookup from `procurementMethodType` to its descriptor.
#[derive(Debug, Clone, Default)]
pub struct ProcedureRegistry {
    procedures: BTreeMap<&'static str, ProcedureDescriptor>,
}

impl ProcedureRegistry {
    pub fn builder() -> ProcedureRegistryBuilder {
        ProcedureRegistryBuilder::default()
    }

    /// Registry with every built-in procedure.
    pub fn standard() -> Self {
        Self::builder()
            .register(TenderKind::BelowThreshold.descriptor())
            .register(TenderKind::AboveThresholdUa.descriptor())
            .register(TenderKind::AboveThresholdEu.descriptor())
            .build()
    }

    /// Looks up a procedure; `None` means the default procedure.
    ///
    /// ## Errors
    /// `CoreError::UnknownProcedure` for a type nobody registered.
    pub fn get(&self, procurement_method_type: Option<&str>) -> CoreResult<&ProcedureDescriptor> {
        let name = procurement_method_type.unwrap_or(DEFAULT_PROCUREMENT_METHOD_TYPE);
        self.procedures
            .get(name)
            .ok_or_else(|| CoreError::UnknownProcedure(name.to_string()))
    }

    pub fn for_tender(&self, tender: &Tender) -> CoreResult<&ProcedureDescriptor> {
        self.get(tender.procurement_method_type.as_deref())
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ProcedureRegistryBuilder {
    procedures: BTreeMap<&'static str, ProcedureDescriptor>,
}

impl ProcedureRegistryBuilder {
    /// Adds a procedure; a later registration of the same type replaces it.
    pub fn register(mut self, descriptor: ProcedureDescriptor) -> Self {
        tracing::debug!(
            procurement_method_type = descriptor.procurement_method_type(),
            "registering procedure"
        );
        self.procedures
            .insert(descriptor.procurement_method_type(), descriptor);
        self
    }

    pub fn build(self) -> ProcedureRegistry {
        ProcedureRegistry {
            procedures: self.procedures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = ProcedureRegistry::standard();
        assert_eq!(registry.len(), 3);

        let below = registry.get(None).unwrap();
        assert_eq!(below.kind, TenderKind::BelowThreshold);
        assert_eq!(below.initial_status, TenderStatus::ActiveEnquiries);
        assert_eq!(below.kinds_list(), "general, special, defense, other");

        let ua = registry.get(Some("aboveThresholdUA")).unwrap();
        assert_eq!(ua.tendering_extension, Some(TimeDelta::days(7)));
        assert!(!ua.allows_kind(Some(ProcuringEntityKind::Other)));
        assert!(!ua.allows_kind(None));
    }

    #[test]
    fn test_unknown_procedure() {
        let registry = ProcedureRegistry::standard();
        let err = registry.get(Some("reporting")).unwrap_err();
        assert!(matches!(err, CoreError::UnknownProcedure(ref name) if name == "reporting"));
    }

    #[test]
    fn test_custom_registration_replaces() {
        let mut custom = TenderKind::BelowThreshold.descriptor();
        custom.create_accreditations = "12";
        let registry = ProcedureRegistry::builder()
            .register(TenderKind::BelowThreshold.descriptor())
            .register(custom)
            .build();
        assert_eq!(registry.get(None).unwrap().create_accreditations, "12");
    }
}
