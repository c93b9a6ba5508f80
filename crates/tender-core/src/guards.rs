//! # Status and Role Guards
//!
//! Checks run after a request body is validated and before anything is
//! written. Each guard looks at the loaded tender, the authenticated role
//! and the clock, and either passes or rejects with an [`OperationError`]
//! (rendered as 403 `body`/`data`).
//!
//! ## Where Each Guard Applies
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────┐
//! │ Operation                    │ Guards                               │
//! ├──────────────────────────────┼──────────────────────────────────────┤
//! │ bid POST/PATCH/DELETE        │ bid_operation_not_in_tendering       │
//! │                              │ bid_operation_period                 │
//! │ bid PATCH                    │ update_deleted_bid                   │
//! │                              │ bid_status_update_not_to_pending     │
//! │ tender PATCH                 │ tender_status_update_in_terminated   │
//! │                              │ update_tender_status_not_in_prequal  │
//! │                              │ tender_period_extension              │
//! │ tender document POST/PUT     │ document_in_not_allowed_status       │
//! │ contract PATCH               │ update_contract_only_for_active_lots │
//! │                              │ contract_signing                     │
//! │                              │ update_contract_value                │
//! └──────────────────────────────┴──────────────────────────────────────┘
//! ```
//! Guards never retry and never swallow a rejection; the first failing
//! guard ends the request.

use chrono::TimeDelta;

use crate::amount::ContractValue;
use crate::calendar::{calculate_business_date, BusinessContext};
use crate::error::OperationError;
use crate::models::bid::{Bid, BidStatus};
use crate::models::complaint::ComplaintStatus;
use crate::models::contract::{Contract, ContractStatus};
use crate::models::lot::LotStatus;
use crate::models::tender::{Tender, TenderStatus};
use crate::request::Method;
use crate::time::{format_iso, Timestamp};
use crate::validation::validate_contract_value_update;

pub type GuardResult = Result<(), OperationError>;

fn reject(message: String) -> GuardResult {
    tracing::debug!(%message, "guard rejected operation");
    Err(OperationError::new(message))
}

// =============================================================================
// Bids
// =============================================================================

/// Bids change only while `now` is inside the tendering period.
///
/// Applies to every role, Administrator included.
pub fn validate_bid_operation_period(tender: &Tender, method: Method, now: Timestamp) -> GuardResult {
    let start = tender.tender_period.as_ref().and_then(|p| p.start_date);
    let end = tender.tender_period.as_ref().and_then(|p| p.end_date);
    let too_early = start.is_some_and(|start| now < start);
    let too_late = end.is_some_and(|end| now > end);
    if !too_early && !too_late {
        return Ok(());
    }

    let operation = match method {
        Method::Post => "added",
        Method::Delete => "deleted",
        _ => "updated",
    };
    let render = |ts: Option<Timestamp>| ts.map_or_else(|| "None".to_string(), |ts| format_iso(&ts));
    reject(format!(
        "Bid can be {} only during the tendering period: from ({}) to ({}).",
        operation,
        render(start),
        render(end)
    ))
}

/// Bids change only in active.tendering.
pub fn validate_bid_operation_not_in_tendering(tender: &Tender, method: Method, role: &str) -> GuardResult {
    if tender.status == TenderStatus::ActiveTendering {
        return Ok(());
    }
    let operation = match method {
        Method::Post => "add",
        Method::Put | Method::Patch if role != "Administrator" => "update",
        _ => "delete",
    };
    reject(format!(
        "Can't {} bid in current ({}) tender status",
        operation, tender.status
    ))
}

pub fn validate_update_deleted_bid(bid: &Bid) -> GuardResult {
    if bid.status == BidStatus::Deleted {
        return reject(format!("Can't update bid in ({}) status", bid.status));
    }
    Ok(())
}

/// Outside administration a bid can only be moved to `pending`.
///
/// `requested` is the status in the PATCH body; without one the current
/// status is the target.
pub fn validate_bid_status_update_not_to_pending(
    bid: &Bid,
    requested: Option<BidStatus>,
    role: &str,
) -> GuardResult {
    if role == "Administrator" {
        return Ok(());
    }
    let target = requested.unwrap_or(bid.status);
    if target != BidStatus::Pending {
        return reject(format!("Can't update bid to ({}) status", target));
    }
    Ok(())
}

// =============================================================================
// Tender
// =============================================================================

pub fn validate_tender_status_update_in_terminated_status(tender: &Tender, role: &str) -> GuardResult {
    if role != "Administrator" && tender.status.is_terminated() {
        return reject(format!("Can't update tender in current ({}) status", tender.status));
    }
    Ok(())
}

/// A tender owner may only move a pre-qualification to its stand-still.
pub fn validate_update_tender_status_not_in_pre_qualification(
    tender: &Tender,
    requested: Option<TenderStatus>,
    role: &str,
) -> GuardResult {
    let allowed = |status: TenderStatus| {
        status == TenderStatus::ActivePreQualificationStandStill || status == tender.status
    };
    match requested {
        Some(status) if role == "tender_owner" && !allowed(status) => {
            reject("Can't update tender status".to_string())
        }
        _ => Ok(()),
    }
}

/// At least `extension` must remain until the end of the tendering period.
///
/// The extension is measured in calendar days and honours the tender's
/// accelerator.
pub fn validate_tender_period_extension(tender: &Tender, extension: TimeDelta, now: Timestamp) -> GuardResult {
    let Some(end) = tender.tender_period.as_ref().and_then(|p| p.end_date) else {
        return Ok(());
    };
    let context: &dyn BusinessContext = tender;
    if calculate_business_date(now, extension, Some(context), None) > end {
        return reject(format!(
            "tenderPeriod should be extended by {} days",
            extension.num_days()
        ));
    }
    Ok(())
}

/// [`validate_tender_period_extension`] for tenders in active.tendering only.
pub fn validate_tender_period_extension_in_active_tendering(
    tender: &Tender,
    extension: TimeDelta,
    now: Timestamp,
) -> GuardResult {
    if tender.status != TenderStatus::ActiveTendering {
        return Ok(());
    }
    validate_tender_period_extension(tender, extension, now)
}

// =============================================================================
// Documents
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOperation {
    Add,
    Update,
}

impl DocumentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOperation::Add => "add",
            DocumentOperation::Update => "update",
        }
    }
}

/// Tender documents change during tendering, or afterwards only through
/// the auction.
pub fn validate_operation_with_tender_document_in_not_allowed_status(
    status: TenderStatus,
    role: &str,
    operation: DocumentOperation,
) -> GuardResult {
    let allowed = if role == "auction" {
        matches!(
            status,
            TenderStatus::ActiveAuction | TenderStatus::ActiveQualification
        )
    } else {
        status == TenderStatus::ActiveTendering
    };
    if !allowed {
        return reject(format!(
            "Can't {} document in current ({}) tender status",
            operation.as_str(),
            status
        ));
    }
    Ok(())
}

// =============================================================================
// Contracts
// =============================================================================

/// Contracts of a cancelled or unsuccessful lot are frozen.
pub fn validate_update_contract_only_for_active_lots(tender: &Tender, contract: &Contract) -> GuardResult {
    let Some(lot_id) = contract
        .award_id
        .as_deref()
        .and_then(|id| tender.award(id))
        .and_then(|award| award.lot_id.as_deref())
    else {
        return Ok(());
    };
    if tender.lot(lot_id).is_some_and(|lot| lot.status != LotStatus::Active) {
        return reject("Can update contract only in active lot status".to_string());
    }
    Ok(())
}

/// Activating a contract waits for the award stand-still and for every
/// blocking complaint on the same lot (or the whole tender).
pub fn validate_contract_signing(
    tender: &Tender,
    contract: &Contract,
    requested: Option<ContractStatus>,
    blocking: &[ComplaintStatus],
    now: Timestamp,
) -> GuardResult {
    if contract.status == ContractStatus::Active || requested != Some(ContractStatus::Active) {
        return Ok(());
    }
    let Some(award) = contract.award_id.as_deref().and_then(|id| tender.award(id)) else {
        return Ok(());
    };

    if let Some(stand_still_end) = award.complaint_period.as_ref().and_then(|p| p.end_date) {
        if stand_still_end > now {
            return reject(format!(
                "Can't sign contract before stand-still period end ({})",
                format_iso(&stand_still_end)
            ));
        }
    }

    let lot_id = award.lot_id.as_deref();
    let tender_complaints = tender.complaints.iter().any(|complaint| {
        blocking.contains(&complaint.status)
            && (complaint.related_lot.is_none() || complaint.related_lot.as_deref() == lot_id)
    });
    let award_complaints = tender
        .awards
        .iter()
        .filter(|other| other.lot_id.as_deref() == lot_id)
        .flat_map(|other| other.complaints.iter())
        .any(|complaint| blocking.contains(&complaint.status));
    if tender_complaints || award_complaints {
        return reject("Can't sign contract before reviewing all complaints".to_string());
    }
    Ok(())
}

/// Rejects a contract value the award does not allow.
pub fn validate_update_contract_value(
    tender: &Tender,
    contract: &Contract,
    update: &ContractValue,
) -> GuardResult {
    match validate_contract_value_update(tender, contract, update) {
        Some(message) => reject(message),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
