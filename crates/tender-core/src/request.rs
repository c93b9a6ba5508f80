//! # Request Validation
//!
//! Entry points the HTTP layer calls before it touches a tender. Each one
//! takes the raw request body, runs the checks in a fixed order and either
//! returns the normalized data plus the model built from it, or a complete
//! [`ErrorResponse`] wrapped in `CoreError::Request`.
//!
//! ## Phases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Request Validation Phases                          │
//! │                                                                         │
//! │  1. JSON envelope     {"data": {...}}              422 body/data        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  2. Accreditation     broker level vs procedure    403                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  3. Conversion        rogue fields, bad types      422, all fields      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  4. Entity rules      Entity::validate             422, all fields      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  5. Write mask        role view of the entity      403 url/role         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  6. Post checks       test mode, procuringEntity   403                  │
//! │                                                                         │
//! │  Each phase stops the request; phases 3 and 4 report every field.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Patch Merge
//! ```text
//! current (plain)   {"value": {"amount": 500, "currency": "UAH"}, "items": [a, b]}
//! patch             {"value": {"amount": 400}, "items": [a'], "title": null}
//! merged            {"value": {"amount": 400, "currency": "UAH"}, "items": [a+a']}
//! ```
//! Objects merge key by key, arrays element by element (the patch length
//! wins) and `null` removes a key.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value as JsonValue};

use crate::config::CoreConfig;
use crate::error::{
    status, CoreError, CoreResult, ErrorDetail, ErrorResponse, Location, ValidationErrors,
};
use crate::models::{
    Award, Bid, BidStatus, Cancellation, Complaint, ComplaintStatus, Contract, Entity, Lot,
    LotStatus, Question, Tender, TenderStatus,
};
use crate::node::Scope;
use crate::registry::ProcedureRegistry;
use crate::roles::View;
use crate::time::{format_iso, Timestamp};

const ROGUE_FIELD: &str = "Rogue field";
const NO_JSON: &str = "No JSON object could be decoded";
const DATA_NOT_AVAILABLE: &str = "Data not available";

// =============================================================================
// Request Context
// =============================================================================

/// HTTP method of the request being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// What the validators know about the caller.
///
/// ## Fields
/// - `authenticated_role`: role resolved by traversal (`tender_owner`,
///   `bid_owner`, `Administrator`, a group name or `anonym`)
/// - `accreditations`: levels granted to the broker, e.g. `"1234t"`
/// - `now`: the request clock; every time rule reads this value
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub method: Method,
    pub authenticated_role: String,
    accreditations: String,
    pub now: Timestamp,
    pub config: &'a CoreConfig,
    pub registry: &'a ProcedureRegistry,
}

impl<'a> RequestContext<'a> {
    pub fn new(
        method: Method,
        authenticated_role: impl Into<String>,
        now: Timestamp,
        config: &'a CoreConfig,
        registry: &'a ProcedureRegistry,
    ) -> Self {
        RequestContext {
            method,
            authenticated_role: authenticated_role.into(),
            accreditations: String::new(),
            now,
            config,
            registry,
        }
    }

    pub fn with_accreditations(mut self, levels: &str) -> Self {
        self.accreditations = levels.to_string();
        self
    }

    /// True when the broker holds accreditation `level`.
    pub fn check_accreditation(&self, level: char) -> bool {
        self.accreditations.contains(level)
    }

    /// Scope for validating a direct child of `tender`.
    fn child_scope<'t>(&'t self, tender: &'t Tender, entity: &'static str) -> Scope<'t> {
        Scope::attached(tender, entity, self.now, self.config)
    }
}

/// Data that passed validation.
///
/// `data` is the role-masked payload the caller applies; `model` is the
/// entity built from it (for patches: the current entity with the masked
/// fields replaced).
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<E> {
    pub data: JsonValue,
    pub model: E,
}

fn fail<T>(response: ErrorResponse) -> CoreResult<T> {
    tracing::debug!(
        status = response.status_code,
        errors = response.errors.len(),
        "request rejected"
    );
    Err(CoreError::Request(response))
}

// =============================================================================
// Generic Validation
// =============================================================================

/// Extracts the `data` object from a JSON request body.
///
/// ## Errors
/// 422 body/data when the body is not JSON or carries no `data` object.
pub fn validate_json_data(body: &str) -> CoreResult<Map<String, JsonValue>> {
    let parsed: JsonValue = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return fail(ErrorResponse::unprocessable(Location::Body, "data", NO_JSON)),
    };
    match parsed {
        JsonValue::Object(mut envelope) => match envelope.remove("data") {
            Some(JsonValue::Object(data)) => Ok(data),
            _ => fail(ErrorResponse::unprocessable(
                Location::Body,
                "data",
                DATA_NOT_AVAILABLE,
            )),
        },
        _ => fail(ErrorResponse::unprocessable(
            Location::Body,
            "data",
            DATA_NOT_AVAILABLE,
        )),
    }
}

/// Validates `data` as an `E` and masks it through `view`.
///
/// With `current` set the data is a patch: it is merged into the current
/// plain serialization first, and fields outside the mask keep their
/// current values.
///
/// ## Errors
/// - 422 with one entry per field that fails conversion or `validate`
/// - 403 url/role "Forbidden" when `E` has no `view`
pub fn validate_data<E, F>(
    data: Map<String, JsonValue>,
    view: View,
    current: Option<&E>,
    validate: F,
) -> CoreResult<Validated<E>>
where
    E: Entity,
    F: FnOnce(&E) -> CoreResult<ValidationErrors>,
{
    let errors = conversion_errors::<E>(&data);
    if !errors.is_empty() {
        return fail(ErrorResponse::from_validation(errors));
    }

    let base = current.map(serde_json::to_value).transpose()?;
    let merged = match &base {
        Some(base) => {
            let mut merged = base.clone();
            merge_patch(&mut merged, &JsonValue::Object(data));
            merged
        }
        None => JsonValue::Object(data.into_iter().filter(|(_, v)| !v.is_null()).collect()),
    };
    let model: E = match serde_json::from_value(merged) {
        Ok(model) => model,
        Err(err) => {
            return fail(ErrorResponse::unprocessable(
                Location::Body,
                "data",
                clean_message(&err.to_string()),
            ))
        }
    };

    let errors = validate(&model)?;
    if !errors.is_empty() {
        return fail(ErrorResponse::from_validation(errors));
    }

    let Some(filter) = E::filter(view) else {
        return fail(ErrorResponse::forbidden(Location::Url, "role", "Forbidden"));
    };
    let masked = match serde_json::to_value(&model)? {
        JsonValue::Object(object) => filter.apply(object),
        _ => Map::new(),
    };

    let model = match base {
        Some(JsonValue::Object(mut base)) => {
            base.retain(|key, _| !filter.allows(key) || masked.contains_key(key));
            base.extend(masked.clone());
            serde_json::from_value(JsonValue::Object(base))?
        }
        _ => serde_json::from_value(JsonValue::Object(masked.clone()))?,
    };
    tracing::trace!(entity = E::NAME, view = %view, "data validated");
    Ok(Validated {
        data: JsonValue::Object(masked),
        model,
    })
}

/// Tries every top-level field on its own so one bad field never hides
/// another.
fn conversion_errors<E: Entity>(data: &Map<String, JsonValue>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (key, value) in data {
        if value.is_null() {
            continue;
        }
        let probe = JsonValue::Object(Map::from_iter([(key.clone(), value.clone())]));
        if let Err(err) = serde_json::from_value::<E>(probe) {
            record_conversion_error(&mut errors, key, &err.to_string());
        }
    }
    errors
}

fn record_conversion_error(errors: &mut ValidationErrors, key: &str, message: &str) {
    match unknown_field(message) {
        Some(field) if field == key => errors.add(key, ROGUE_FIELD),
        Some(field) => {
            let mut nested = ValidationErrors::new();
            nested.add(field, ROGUE_FIELD);
            errors.nest(key, nested);
        }
        None => errors.add(key, clean_message(message)),
    }
}

fn unknown_field(message: &str) -> Option<&str> {
    message.strip_prefix("unknown field `")?.split('`').next()
}

/// Drops the position suffix serde_json appends to parse errors.
fn clean_message(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(index) => message[..index].to_string(),
        None => message.to_string(),
    }
}

/// Applies `patch` on top of `target` in place.
pub fn merge_patch(target: &mut JsonValue, patch: &JsonValue) {
    match (target, patch) {
        (JsonValue::Object(target), JsonValue::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                    continue;
                }
                match target.get_mut(key) {
                    Some(existing) => merge_patch(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (JsonValue::Array(target), JsonValue::Array(patch)) => {
            target.truncate(patch.len());
            for (index, value) in patch.iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => merge_patch(existing, value),
                    None => target.push(value.clone()),
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

// =============================================================================
// Tender
// =============================================================================

/// Validates a tender creation request.
///
/// ## Checks
/// 1. `procurementMethodType` is registered (415 otherwise)
/// 2. the broker holds one of the procedure's create accreditations
/// 3. the tender itself
/// 4. test-only brokers create test tenders
/// 5. `procuringEntity.kind` is allowed for the procedure
pub fn validate_tender_data(ctx: &RequestContext, body: &str) -> CoreResult<Validated<Tender>> {
    let data = validate_json_data(body)?;
    let procurement_method_type = data.get("procurementMethodType").and_then(JsonValue::as_str);
    let Ok(procedure) = ctx.registry.get(procurement_method_type) else {
        return fail(ErrorResponse::new(
            status::UNSUPPORTED_MEDIA_TYPE,
            Location::Data,
            "procurementMethodType",
            ErrorDetail::Message("Not implemented".to_string()),
        ));
    };
    tracing::debug!(
        tender_id = "__new__",
        procurement_method_type = procedure.procurement_method_type(),
        "validating tender"
    );

    if !procedure
        .create_accreditations
        .chars()
        .any(|level| ctx.check_accreditation(level))
    {
        return fail(accreditation_error("accreditation", "tender"));
    }

    let validated = validate_data(data, View::Create, None, |tender: &Tender| {
        tender.validate_at(ctx.now, ctx.config)
    })?;

    if validated.model.mode.is_none() && ctx.check_accreditation('t') {
        return fail(accreditation_error("mode", "tender"));
    }

    let kind = validated
        .data
        .get("procuringEntity")
        .and_then(|entity| entity.get("kind"))
        .and_then(JsonValue::as_str)
        .unwrap_or("");
    if !procedure
        .procuring_entity_kinds
        .iter()
        .any(|allowed| allowed.as_str() == kind)
    {
        return fail(ErrorResponse::forbidden(
            Location::ProcuringEntity,
            "kind",
            format!(
                "'{}' procuringEntity cannot publish this type of procedure. Only {} are allowed.",
                kind,
                procedure.kinds_list()
            ),
        ));
    }
    Ok(validated)
}

fn accreditation_error(name: &str, entity: &str) -> ErrorResponse {
    ErrorResponse::forbidden(
        Location::ProcurementMethodType,
        name,
        format!("Broker Accreditation level does not permit {} creation", entity),
    )
}

/// Validates a tender PATCH.
///
/// A draft tender accepts exactly one change: publishing it into the
/// procedure's initial status.
pub fn validate_patch_tender_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
) -> CoreResult<Validated<Tender>> {
    let data = validate_json_data(body)?;
    if tender.status != TenderStatus::Draft {
        let view = tender.get_role(&ctx.authenticated_role);
        return validate_data(data, view, Some(tender), |model: &Tender| {
            model.validate_at(ctx.now, ctx.config)
        });
    }

    let initial = ctx.registry.for_tender(tender)?.initial_status;
    if data.get("status").and_then(JsonValue::as_str) != Some(initial.as_str()) {
        return fail(ErrorResponse::forbidden(
            Location::Body,
            "data",
            "Can't update tender in current (draft) status",
        ));
    }
    let mut model = tender.clone();
    model.status = initial;
    Ok(Validated {
        data: json!({ "status": initial.as_str() }),
        model,
    })
}

/// Validates auction results (POST) or auction urls (PATCH) posted by the
/// auction module.
///
/// Returns the normalized payload: bids and lots reordered to match the
/// tender, entries for other lots replaced by `{}`, and on POST the
/// auction end date stamped for `auction_lot_id` (or the whole tender).
pub fn validate_tender_auction_data(
    ctx: &RequestContext,
    body: Option<&str>,
    tender: &Tender,
    auction_lot_id: Option<&str>,
) -> CoreResult<JsonValue> {
    let action = match ctx.method {
        Method::Post => "report auction results",
        _ => "update auction urls",
    };
    if tender.status != TenderStatus::ActiveAuction {
        return fail(ErrorResponse::forbidden(
            Location::Body,
            "data",
            format!("Can't {} in current ({}) tender status", action, tender.status),
        ));
    }
    if tender
        .lots
        .iter()
        .any(|lot| lot.id.as_deref() == auction_lot_id && lot.status != LotStatus::Active)
    {
        return fail(ErrorResponse::forbidden(
            Location::Body,
            "data",
            format!("Can {} only in active lot status", action),
        ));
    }

    let mut data = match body {
        Some(body) => {
            let data = validate_json_data(body)?;
            normalize_auction_data(data, tender, auction_lot_id)?
        }
        None => Map::new(),
    };

    if ctx.method == Method::Post {
        let now = format_iso(&ctx.now);
        if tender.is_lotted() {
            let lots: Vec<JsonValue> = tender
                .lots
                .iter()
                .map(|lot| {
                    if lot.id.as_deref() == auction_lot_id {
                        json!({ "auctionPeriod": { "endDate": now } })
                    } else {
                        json!({})
                    }
                })
                .collect();
            data.insert("lots".to_string(), JsonValue::Array(lots));
        } else {
            data.insert("auctionPeriod".to_string(), json!({ "endDate": now }));
        }
    }
    Ok(JsonValue::Object(data))
}

fn normalize_auction_data(
    mut data: Map<String, JsonValue>,
    tender: &Tender,
    lot_id: Option<&str>,
) -> CoreResult<Map<String, JsonValue>> {
    let bid_ids: Vec<Option<&str>> = tender.bids.iter().map(|bid| bid.id.as_deref()).collect();
    let bids = take_array(&mut data, "bids");
    if bids.len() != tender.bids.len() {
        return fail(ErrorResponse::unprocessable(
            Location::Body,
            "bids",
            "Number of auction results did not match the number of tender bids",
        ));
    }
    let bids = match reorder(bids, &bid_ids) {
        Some(bids) => bids,
        None => {
            return fail(ErrorResponse::unprocessable(
                Location::Body,
                "bids",
                "Auction bids should be identical to the tender bids",
            ))
        }
    };

    let lots = take_array(&mut data, "lots");
    if !lots.is_empty() {
        let lot_ids: Vec<Option<&str>> = tender.lots.iter().map(|lot| lot.id.as_deref()).collect();
        if lots.len() != tender.lots.len() {
            return fail(ErrorResponse::unprocessable(
                Location::Body,
                "lots",
                "Number of lots did not match the number of tender lots",
            ));
        }
        let Some(lots) = reorder(lots, &lot_ids) else {
            return fail(ErrorResponse::unprocessable(
                Location::Body,
                "lots",
                "Auction lots should be identical to the tender lots",
            ));
        };
        let lots = lots
            .into_iter()
            .map(|lot| {
                if lot.get("id").and_then(JsonValue::as_str) == lot_id {
                    lot
                } else {
                    json!({})
                }
            })
            .collect();
        data.insert("lots".to_string(), JsonValue::Array(lots));
    }

    if tender.is_lotted() {
        for (bid, tender_bid) in bids.iter().zip(&tender.bids) {
            check_auction_lot_values(bid, tender_bid)?;
        }
    }

    let bids = bids
        .into_iter()
        .map(|mut bid| {
            if let Some(JsonValue::Array(lot_values)) = bid.get_mut("lotValues") {
                for lot_value in lot_values.iter_mut() {
                    if lot_value.get("relatedLot").and_then(JsonValue::as_str) != lot_id {
                        *lot_value = json!({});
                    }
                }
            }
            bid
        })
        .collect();
    data.insert("bids".to_string(), JsonValue::Array(bids));
    Ok(data)
}

fn check_auction_lot_values(bid: &JsonValue, tender_bid: &Bid) -> CoreResult<()> {
    if tender_bid.status != BidStatus::Active {
        return Ok(());
    }
    let empty = Vec::new();
    let lot_values = bid
        .get("lotValues")
        .and_then(JsonValue::as_array)
        .unwrap_or(&empty);
    if lot_values.len() != tender_bid.lot_values.len() {
        return fail(lot_values_error(ErrorDetail::Messages(vec![
            "Number of lots of auction results did not match the number of tender lots".to_string(),
        ])));
    }
    for (posted, stored) in lot_values.iter().zip(&tender_bid.lot_values) {
        if posted.get("relatedLot").and_then(JsonValue::as_str) != stored.related_lot.as_deref() {
            let related = ErrorDetail::Fields(BTreeMap::from([(
                "relatedLot".to_string(),
                ErrorDetail::Messages(vec!["relatedLot should be one of lots of bid".to_string()]),
            )]));
            return fail(lot_values_error(ErrorDetail::Items(vec![related])));
        }
    }
    Ok(())
}

fn lot_values_error(detail: ErrorDetail) -> ErrorResponse {
    let item = ErrorDetail::Fields(BTreeMap::from([("lotValues".to_string(), detail)]));
    ErrorResponse::new(
        status::UNPROCESSABLE_ENTITY,
        Location::Body,
        "bids",
        ErrorDetail::Items(vec![item]),
    )
}

fn take_array(data: &mut Map<String, JsonValue>, key: &str) -> Vec<JsonValue> {
    match data.remove(key) {
        Some(JsonValue::Array(values)) => values,
        _ => Vec::new(),
    }
}

/// Sorts posted entries into the order of `ids`; `None` when the posted id
/// set differs from the stored one.
fn reorder(values: Vec<JsonValue>, ids: &[Option<&str>]) -> Option<Vec<JsonValue>> {
    let posted: BTreeSet<Option<&str>> = values
        .iter()
        .map(|value| value.get("id").and_then(JsonValue::as_str))
        .collect();
    let stored: BTreeSet<Option<&str>> = ids.iter().copied().collect();
    if posted != stored {
        return None;
    }
    let mut keyed: Vec<(usize, JsonValue)> = values
        .into_iter()
        .map(|value| {
            let id = value.get("id").and_then(JsonValue::as_str);
            let position = ids.iter().position(|stored| *stored == id).unwrap_or(usize::MAX);
            (position, value)
        })
        .collect();
    keyed.sort_by_key(|(position, _)| *position);
    Some(keyed.into_iter().map(|(_, value)| value).collect())
}

// =============================================================================
// Nested Entities
// =============================================================================

/// Edit accreditation and test-mode checks shared by bids, questions and
/// complaints.
fn check_edit_accreditation(ctx: &RequestContext, tender: &Tender, entity: &str) -> CoreResult<()> {
    let procedure = ctx.registry.for_tender(tender)?;
    if !ctx.check_accreditation(procedure.edit_accreditation) {
        return fail(accreditation_error("accreditation", entity));
    }
    if tender.mode.is_none() && ctx.check_accreditation('t') {
        return fail(accreditation_error("mode", entity));
    }
    Ok(())
}

fn validate_child<E: Entity>(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    view: View,
    current: Option<&E>,
) -> CoreResult<Validated<E>> {
    let data = validate_json_data(body)?;
    validate_data(data, view, current, |model: &E| {
        model.validate(&ctx.child_scope(tender, E::NAME))
    })
}

pub fn validate_bid_data(ctx: &RequestContext, body: &str, tender: &Tender) -> CoreResult<Validated<Bid>> {
    check_edit_accreditation(ctx, tender, "bid")?;
    tracing::debug!(bid_id = "__new__", "validating bid");
    validate_child(ctx, body, tender, View::Create, None)
}

pub fn validate_patch_bid_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    bid: &Bid,
) -> CoreResult<Validated<Bid>> {
    validate_child(ctx, body, tender, View::Edit, Some(bid))
}

pub fn validate_award_data(ctx: &RequestContext, body: &str, tender: &Tender) -> CoreResult<Validated<Award>> {
    tracing::debug!(award_id = "__new__", "validating award");
    validate_child(ctx, body, tender, View::Create, None)
}

pub fn validate_patch_award_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    award: &Award,
) -> CoreResult<Validated<Award>> {
    validate_child(ctx, body, tender, View::Edit, Some(award))
}

pub fn validate_question_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
) -> CoreResult<Validated<Question>> {
    check_edit_accreditation(ctx, tender, "question")?;
    tracing::debug!(question_id = "__new__", "validating question");
    validate_child(ctx, body, tender, View::Create, None)
}

pub fn validate_patch_question_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    question: &Question,
) -> CoreResult<Validated<Question>> {
    validate_child(ctx, body, tender, View::Edit, Some(question))
}

pub fn validate_complaint_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
) -> CoreResult<Validated<Complaint>> {
    check_edit_accreditation(ctx, tender, "complaint")?;
    tracing::debug!(complaint_id = "__new__", "validating complaint");
    validate_child(ctx, body, tender, View::Create, None)
}

/// Validates a complaint PATCH through the (role, status) transition table.
pub fn validate_patch_complaint_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    complaint: &Complaint,
) -> CoreResult<Validated<Complaint>> {
    let data = validate_json_data(body)?;
    let requested: Option<ComplaintStatus> = data
        .get("status")
        .and_then(JsonValue::as_str)
        .and_then(|raw| raw.parse().ok());
    let Some(view) = complaint.get_role(&ctx.authenticated_role, requested).view() else {
        return fail(ErrorResponse::forbidden(Location::Url, "role", "Forbidden"));
    };
    validate_data(data, view, Some(complaint), |model: &Complaint| {
        model.validate(&ctx.child_scope(tender, Complaint::NAME))
    })
}

pub fn validate_cancellation_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
) -> CoreResult<Validated<Cancellation>> {
    tracing::debug!(cancellation_id = "__new__", "validating cancellation");
    validate_child(ctx, body, tender, View::Create, None)
}

pub fn validate_patch_cancellation_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    cancellation: &Cancellation,
) -> CoreResult<Validated<Cancellation>> {
    validate_child(ctx, body, tender, View::Edit, Some(cancellation))
}

pub fn validate_contract_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
) -> CoreResult<Validated<Contract>> {
    tracing::debug!(contract_id = "__new__", "validating contract");
    validate_child(ctx, body, tender, View::Create, None)
}

pub fn validate_patch_contract_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    contract: &Contract,
) -> CoreResult<Validated<Contract>> {
    validate_child(ctx, body, tender, View::Edit, Some(contract))
}

pub fn validate_lot_data(ctx: &RequestContext, body: &str, tender: &Tender) -> CoreResult<Validated<Lot>> {
    tracing::debug!(lot_id = "__new__", "validating lot");
    validate_child(ctx, body, tender, View::Create, None)
}

pub fn validate_patch_lot_data(
    ctx: &RequestContext,
    body: &str,
    tender: &Tender,
    lot: &Lot,
) -> CoreResult<Validated<Lot>> {
    validate_child(ctx, body, tender, View::Edit, Some(lot))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureOf, LotValue};
    use crate::time::kyiv_midnight;

    const ORGANIZATION: &str = r#"{
        "name": "Державне управління справами",
        "identifier": {"scheme": "UA-EDR", "id": "00037256"},
        "address": {"countryName": "Україна"},
        "contactPoint": {"name": "Державне управління справами", "telephone": "0440000000"}
    }"#;

    fn organization() -> JsonValue {
        serde_json::from_str(ORGANIZATION).unwrap()
    }

    fn tender_body(extra: JsonValue) -> String {
        let mut procuring_entity = organization();
        procuring_entity["kind"] = json!("general");
        let mut data = json!({
            "title": "футляри до державних нагород",
            "procuringEntity": procuring_entity,
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
        });
        merge_patch(&mut data, &extra);
        json!({ "data": data }).to_string()
    }

    fn now() -> Timestamp {
        kyiv_midnight(2017, 10, 7)
    }

    struct Env {
        config: CoreConfig,
        registry: ProcedureRegistry,
    }

    impl Env {
        fn new() -> Self {
            Env {
                config: CoreConfig::default(),
                registry: ProcedureRegistry::standard(),
            }
        }

        fn ctx(&self, method: Method, role: &str, levels: &str) -> RequestContext<'_> {
            RequestContext::new(method, role, now(), &self.config, &self.registry)
                .with_accreditations(levels)
        }
    }

    fn rejection<T: std::fmt::Debug>(result: CoreResult<T>) -> ErrorResponse {
        match result {
            Err(CoreError::Request(response)) => response,
            other => panic!("expected a rejected request, got {:?}", other),
        }
    }

    fn description(response: &ErrorResponse, name: &str) -> JsonValue {
        serde_json::to_value(&response.entry(name).unwrap().description).unwrap()
    }

    #[test]
    fn test_json_envelope() {
        let response = rejection(validate_json_data("not json"));
        assert_eq!(response.status_code, 422);
        assert_eq!(description(&response, "data"), json!(NO_JSON));

        for body in [r#"{"data": []}"#, r#"{"other": {}}"#, "[1]"] {
            let response = rejection(validate_json_data(body));
            assert_eq!(description(&response, "data"), json!("Data not available"), "{}", body);
        }
        assert!(validate_json_data(r#"{"data": {"a": 1}}"#).unwrap().contains_key("a"));
    }

    #[test]
    fn test_merge_patch() {
        let mut current = json!({
            "title": "old",
            "value": {"amount": 500, "currency": "UAH"},
            "items": [{"id": "a", "quantity": 1}, {"id": "b"}]
        });
        merge_patch(
            &mut current,
            &json!({"title": null, "value": {"amount": 400}, "items": [{"quantity": 2}]}),
        );
        assert_eq!(
            current,
            json!({"value": {"amount": 400, "currency": "UAH"}, "items": [{"id": "a", "quantity": 2}]})
        );
    }

    #[test]
    fn test_create_tender() {
        let env = Env::new();
        let ctx = env.ctx(Method::Post, "brokers", "1");
        let validated = validate_tender_data(&ctx, &tender_body(json!({}))).unwrap();
        assert_eq!(validated.model.title.as_deref(), Some("футляри до державних нагород"));
        assert_eq!(validated.data["procuringEntity"]["kind"], json!("general"));
        assert!(validated.data.get("owner").is_none());
    }

    #[test]
    fn test_create_tender_unknown_procedure() {
        let env = Env::new();
        let ctx = env.ctx(Method::Post, "brokers", "1234");
        let body = tender_body(json!({"procurementMethodType": "reporting"}));
        let response = rejection(validate_tender_data(&ctx, &body));
        assert_eq!(response.status_code, 415);
        let entry = response.entry("procurementMethodType").unwrap();
        assert_eq!(entry.location, Location::Data);
        assert_eq!(serde_json::to_value(&entry.description).unwrap(), json!("Not implemented"));
    }

    #[test]
    fn test_create_tender_accreditation() {
        let env = Env::new();
        let body = tender_body(json!({}));

        let response = rejection(validate_tender_data(&env.ctx(Method::Post, "brokers", "3"), &body));
        assert_eq!(response.status_code, 403);
        assert_eq!(response.errors[0].location, Location::ProcurementMethodType);
        assert_eq!(
            description(&response, "accreditation"),
            json!("Broker Accreditation level does not permit tender creation")
        );

        let response = rejection(validate_tender_data(&env.ctx(Method::Post, "brokers", "1t"), &body));
        assert_eq!(
            description(&response, "mode"),
            json!("Broker Accreditation level does not permit tender creation")
        );

        let body = tender_body(json!({"mode": "test"}));
        assert!(validate_tender_data(&env.ctx(Method::Post, "brokers", "1t"), &body).is_ok());
    }

    #[test]
    fn test_create_tender_procuring_entity_kind() {
        let env = Env::new();
        let ctx = env.ctx(Method::Post, "brokers", "3");
        let body = tender_body(json!({
            "procurementMethodType": "aboveThresholdUA",
            "procuringEntity": {"kind": "other"}
        }));
        let response = rejection(validate_tender_data(&ctx, &body));
        assert_eq!(response.status_code, 403);
        assert_eq!(response.errors[0].location, Location::ProcuringEntity);
        assert_eq!(
            description(&response, "kind"),
            json!("'other' procuringEntity cannot publish this type of procedure. Only general, special, defense are allowed.")
        );
    }

    #[test]
    fn test_rogue_and_conversion_errors_accumulate() {
        let env = Env::new();
        let ctx = env.ctx(Method::Post, "brokers", "1");
        let body = tender_body(json!({
            "foo": "bar",
            "status": "unknown",
            "procuringEntity": {"extra": 1}
        }));
        let response = rejection(validate_tender_data(&ctx, &body));
        assert_eq!(response.status_code, 422);
        assert_eq!(description(&response, "foo"), json!(["Rogue field"]));
        assert_eq!(
            description(&response, "procuringEntity"),
            json!({"extra": ["Rogue field"]})
        );
        let status = description(&response, "status");
        assert!(status[0].as_str().unwrap().starts_with("Value must be one of ['draft'"));
    }

    #[test]
    fn test_schema_errors_are_all_reported() {
        let env = Env::new();
        let ctx = env.ctx(Method::Post, "brokers", "1");
        let body = json!({"data": {"title": "x"}}).to_string();
        let response = rejection(validate_tender_data(&ctx, &body));
        assert_eq!(response.status_code, 422);
        for field in ["procuringEntity", "value", "minimalStep", "items", "tenderPeriod"] {
            assert_eq!(description(&response, field), json!(["This field is required."]), "{}", field);
        }
    }

    fn stored_tender(env: &Env) -> Tender {
        let ctx = env.ctx(Method::Post, "brokers", "1");
        let mut tender = validate_tender_data(&ctx, &tender_body(json!({}))).unwrap().model;
        tender.owner = Some("broker".to_string());
        tender
    }

    #[test]
    fn test_patch_draft_tender() {
        let env = Env::new();
        let mut tender = stored_tender(&env);
        tender.status = TenderStatus::Draft;
        let ctx = env.ctx(Method::Patch, "tender_owner", "1");

        let response = rejection(validate_patch_tender_data(
            &ctx,
            r#"{"data": {"title": "new"}}"#,
            &tender,
        ));
        assert_eq!(response.status_code, 403);
        assert_eq!(
            description(&response, "data"),
            json!("Can't update tender in current (draft) status")
        );

        let validated = validate_patch_tender_data(
            &ctx,
            r#"{"data": {"status": "active.enquiries"}}"#,
            &tender,
        )
        .unwrap();
        assert_eq!(validated.data, json!({"status": "active.enquiries"}));
        assert_eq!(validated.model.status, TenderStatus::ActiveEnquiries);
    }

    #[test]
    fn test_patch_tender_keeps_masked_fields() {
        let env = Env::new();
        let tender = stored_tender(&env);
        let ctx = env.ctx(Method::Patch, "tender_owner", "1");
        let validated = validate_patch_tender_data(
            &ctx,
            r#"{"data": {"title": "new title", "owner": "someone else"}}"#,
            &tender,
        )
        .unwrap();
        assert_eq!(validated.model.title.as_deref(), Some("new title"));
        assert_eq!(validated.model.owner.as_deref(), Some("broker"));
        assert!(validated.data.get("owner").is_none());
    }

    #[test]
    fn test_patch_tender_in_terminal_status_has_empty_mask() {
        let env = Env::new();
        let mut tender = stored_tender(&env);
        tender.status = TenderStatus::Complete;
        let ctx = env.ctx(Method::Patch, "tender_owner", "1");
        let validated =
            validate_patch_tender_data(&ctx, r#"{"data": {"title": "new"}}"#, &tender).unwrap();
        assert_eq!(validated.data, json!({}));
        assert_eq!(validated.model.title, tender.title);
    }

    fn lotted_tender() -> Tender {
        serde_json::from_value(json!({
            "status": "active.auction",
            "lots": [
                {"id": "lot1", "title": "first", "value": {"amount": 500}, "minimalStep": {"amount": 15}},
                {"id": "lot2", "title": "second", "value": {"amount": 500}, "minimalStep": {"amount": 15}}
            ],
            "bids": [
                {"id": "bid1", "lotValues": [{"relatedLot": "lot1", "value": {"amount": 400}},
                                             {"relatedLot": "lot2", "value": {"amount": 450}}]},
                {"id": "bid2", "lotValues": [{"relatedLot": "lot1", "value": {"amount": 420}},
                                             {"relatedLot": "lot2", "value": {"amount": 470}}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_auction_status_checks() {
        let env = Env::new();
        let mut tender = lotted_tender();
        tender.status = TenderStatus::ActiveTendering;
        let ctx = env.ctx(Method::Post, "auction", "");
        let response = rejection(validate_tender_auction_data(&ctx, None, &tender, Some("lot1")));
        assert_eq!(
            description(&response, "data"),
            json!("Can't report auction results in current (active.tendering) tender status")
        );

        tender.status = TenderStatus::ActiveAuction;
        tender.lots[0].status = LotStatus::Cancelled;
        let ctx = env.ctx(Method::Patch, "auction", "");
        let response = rejection(validate_tender_auction_data(&ctx, None, &tender, Some("lot1")));
        assert_eq!(
            description(&response, "data"),
            json!("Can update auction urls only in active lot status")
        );
    }

    #[test]
    fn test_auction_bid_matching() {
        let env = Env::new();
        let tender = lotted_tender();
        let ctx = env.ctx(Method::Patch, "auction", "");

        let body = json!({"data": {"bids": [{"id": "bid1"}]}}).to_string();
        let response = rejection(validate_tender_auction_data(&ctx, Some(&body), &tender, Some("lot1")));
        assert_eq!(
            description(&response, "bids"),
            json!("Number of auction results did not match the number of tender bids")
        );

        let body = json!({"data": {"bids": [{"id": "bid1"}, {"id": "bid3"}]}}).to_string();
        let response = rejection(validate_tender_auction_data(&ctx, Some(&body), &tender, Some("lot1")));
        assert_eq!(
            description(&response, "bids"),
            json!("Auction bids should be identical to the tender bids")
        );

        let body = json!({"data": {"bids": [
            {"id": "bid1", "lotValues": [{"relatedLot": "lot1"}]},
            {"id": "bid2", "lotValues": [{"relatedLot": "lot1"}, {"relatedLot": "lot2"}]}
        ]}})
        .to_string();
        let response = rejection(validate_tender_auction_data(&ctx, Some(&body), &tender, Some("lot1")));
        assert_eq!(
            description(&response, "bids"),
            json!([{"lotValues": ["Number of lots of auction results did not match the number of tender lots"]}])
        );

        let body = json!({"data": {"bids": [
            {"id": "bid1", "lotValues": [{"relatedLot": "lot2"}, {"relatedLot": "lot1"}]},
            {"id": "bid2", "lotValues": [{"relatedLot": "lot1"}, {"relatedLot": "lot2"}]}
        ]}})
        .to_string();
        let response = rejection(validate_tender_auction_data(&ctx, Some(&body), &tender, Some("lot1")));
        assert_eq!(
            description(&response, "bids"),
            json!([{"lotValues": [{"relatedLot": ["relatedLot should be one of lots of bid"]}]}])
        );
    }

    #[test]
    fn test_auction_results_normalized() {
        let env = Env::new();
        let tender = lotted_tender();
        let ctx = env.ctx(Method::Post, "auction", "");
        let body = json!({"data": {
            "bids": [
                {"id": "bid2", "lotValues": [{"relatedLot": "lot1", "value": {"amount": 410}},
                                             {"relatedLot": "lot2", "value": {"amount": 460}}]},
                {"id": "bid1", "lotValues": [{"relatedLot": "lot1", "value": {"amount": 390}},
                                             {"relatedLot": "lot2", "value": {"amount": 440}}]}
            ]
        }})
        .to_string();
        let data = validate_tender_auction_data(&ctx, Some(&body), &tender, Some("lot1")).unwrap();
        assert_eq!(
            data["bids"],
            json!([
                {"id": "bid1", "lotValues": [{"relatedLot": "lot1", "value": {"amount": 390}}, {}]},
                {"id": "bid2", "lotValues": [{"relatedLot": "lot1", "value": {"amount": 410}}, {}]}
            ])
        );
        assert_eq!(
            data["lots"],
            json!([{"auctionPeriod": {"endDate": "2017-10-07T00:00:00+03:00"}}, {}])
        );
    }

    #[test]
    fn test_auction_lots_reordered() {
        let env = Env::new();
        let tender = lotted_tender();
        let ctx = env.ctx(Method::Patch, "auction", "");
        let body = json!({"data": {
            "bids": [{"id": "bid1", "lotValues": [{"relatedLot": "lot1"}, {"relatedLot": "lot2"}]},
                     {"id": "bid2", "lotValues": [{"relatedLot": "lot1"}, {"relatedLot": "lot2"}]}],
            "lots": [{"id": "lot2", "auctionUrl": "http://auction/2"},
                     {"id": "lot1", "auctionUrl": "http://auction/1"}]
        }})
        .to_string();
        let data = validate_tender_auction_data(&ctx, Some(&body), &tender, Some("lot1")).unwrap();
        assert_eq!(data["lots"], json!([{"id": "lot1", "auctionUrl": "http://auction/1"}, {}]));
        assert!(data.get("auctionPeriod").is_none());
    }

    fn bid_tender() -> Tender {
        let mut tender = lotted_tender();
        tender.status = TenderStatus::ActiveTendering;
        tender.bids.clear();
        tender.items = vec![serde_json::from_value(json!({"id": "item1", "relatedLot": "lot1"})).unwrap()];
        tender.features = vec![crate::models::Feature::new("OCDS-123", FeatureOf::Tenderer, None, &[0.1])];
        tender
    }

    #[test]
    fn test_bid_accreditation() {
        let env = Env::new();
        let tender = bid_tender();
        let body = json!({"data": {}}).to_string();

        let response = rejection(validate_bid_data(&env.ctx(Method::Post, "brokers", "1"), &body, &tender));
        assert_eq!(
            description(&response, "accreditation"),
            json!("Broker Accreditation level does not permit bid creation")
        );
        let response = rejection(validate_question_data(&env.ctx(Method::Post, "brokers", "2t"), &body, &tender));
        assert_eq!(
            description(&response, "mode"),
            json!("Broker Accreditation level does not permit question creation")
        );
    }

    #[test]
    fn test_lotted_bid_errors_accumulate() {
        let env = Env::new();
        let tender = bid_tender();
        let ctx = env.ctx(Method::Post, "brokers", "2");
        let body = json!({"data": {
            "tenderers": [organization()],
            "participationUrl": "https://somewhere.ua",
            "value": {"amount": 400}
        }})
        .to_string();
        let response = rejection(validate_bid_data(&ctx, &body, &tender));
        assert_eq!(response.status_code, 422);
        assert_eq!(
            description(&response, "participationUrl"),
            json!(["url should be posted for each lot of bid"])
        );
        assert_eq!(
            description(&response, "value"),
            json!(["value should be posted for each lot of bid"])
        );
        assert_eq!(description(&response, "lotValues"), json!(["This field is required."]));
        assert_eq!(
            description(&response, "parameters"),
            json!(["All features parameters is required."])
        );
    }

    #[test]
    fn test_create_and_patch_bid() {
        let env = Env::new();
        let tender = bid_tender();
        let ctx = env.ctx(Method::Post, "brokers", "2");
        let body = json!({"data": {
            "tenderers": [organization()],
            "parameters": [{"code": "OCDS-123", "value": 0.1}],
            "lotValues": [{"relatedLot": "lot1", "value": {"amount": 400}}],
            "owner": "ignored"
        }})
        .to_string();
        let validated = validate_bid_data(&ctx, &body, &tender).unwrap();
        assert!(validated.model.owner.is_none());
        assert_eq!(validated.model.lot_values.len(), 1);

        let mut bid = validated.model;
        bid.id = Some("bid1".to_string());
        let ctx = env.ctx(Method::Patch, "bid_owner", "2");
        let validated = validate_patch_bid_data(
            &ctx,
            r#"{"data": {"lotValues": [{"value": {"amount": 350}}], "id": "other"}}"#,
            &tender,
            &bid,
        )
        .unwrap();
        assert_eq!(validated.model.id.as_deref(), Some("bid1"));
        let lot_value: &LotValue = &validated.model.lot_values[0];
        assert_eq!(lot_value.related_lot.as_deref(), Some("lot1"));
        assert_eq!(lot_value.value.as_ref().unwrap().amount, crate::amount::Amount::from_units(350));
    }

    #[test]
    fn test_patch_complaint_roles() {
        let env = Env::new();
        let tender = bid_tender();
        let complaint: Complaint = serde_json::from_value(json!({
            "id": "c1",
            "title": "complaint",
            "status": "claim",
            "author": organization()
        }))
        .unwrap();

        let ctx = env.ctx(Method::Patch, "complaint_owner", "2");
        let response = rejection(validate_patch_complaint_data(
            &ctx,
            r#"{"data": {"status": "resolved"}}"#,
            &tender,
            &complaint,
        ));
        assert_eq!(response.status_code, 403);
        assert_eq!(response.errors[0].location, Location::Url);
        assert_eq!(description(&response, "role"), json!("Forbidden"));

        let validated = validate_patch_complaint_data(
            &ctx,
            r#"{"data": {"status": "cancelled", "cancellationReason": "reason"}}"#,
            &tender,
            &complaint,
        )
        .unwrap();
        assert_eq!(validated.model.status, ComplaintStatus::Cancelled);
        assert_eq!(validated.data["cancellationReason"], json!("reason"));
    }

    #[test]
    fn test_undefined_view_is_forbidden() {
        let errors = rejection(validate_data::<Tender, _>(
            Map::new(),
            View::Answer,
            None,
            |_| Ok(ValidationErrors::new()),
        ));
        assert_eq!(errors.status_code, 403);
        assert_eq!(errors.errors[0].name, "role");
    }
}
