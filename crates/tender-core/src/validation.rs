//! # Cross-Entity Rules
//!
//! Pure rule functions shared by the entity validators and the guards.
//! Each returns the exact message clients see; none of them mutates state.
//!
//! ## Contract Value Updates
//! ```text
//! ┌─────────────┬──────────────┬────────────────────────────────────────────┐
//! │ Award on    │ VAT included │ Allowed change                             │
//! ├─────────────┼──────────────┼────────────────────────────────────────────┤
//! │ a lot       │ lot: yes     │ amount fixed, amountNet in [80%, 100%]     │
//! │ a lot       │ lot: no      │ amountNet fixed, amountNet ≤ amount ≤ award│
//! │ the tender  │ tender: no   │ amountNet fixed, amount ≤ 120% amountNet   │
//! │ the tender  │ tender: yes  │ amount fixed, amountNet in [80%, 100%]     │
//! └─────────────┴──────────────┴────────────────────────────────────────────┘
//! ```
//! An award without VAT on a lot whose VAT flag matches the tender's
//! belongs to a participant that does not pay VAT; such contracts cannot
//! take a net amount at all.

use std::collections::BTreeSet;

use crate::amount::{Amount, ContractValue, Value};
use crate::constants::{cpv_items_class_from, group_336_from, scheme_list, CPV_GROUP_336};
use crate::models::common::{Classification, Item};
use crate::models::contract::Contract;
use crate::models::feature::{Feature, FeatureOf, MAX_FEATURE_WEIGHT};
use crate::models::tender::Tender;
use crate::time::Timestamp;

// =============================================================================
// Classification
// =============================================================================

/// At least one additional classification must use one of `schemes`.
pub fn validate_additional_classifications(
    classifications: &[Classification],
    schemes: &[&str],
) -> Result<(), String> {
    let accepted = classifications
        .iter()
        .filter_map(|c| c.scheme.as_deref())
        .any(|scheme| schemes.contains(&scheme));
    if accepted {
        Ok(())
    } else {
        Err(format!(
            "One of additional classifications should be one of [{}].",
            scheme_list(schemes)
        ))
    }
}

fn cpv_prefixes(items: &[Item], length: usize) -> BTreeSet<String> {
    items
        .iter()
        .filter_map(Item::classification_id)
        .map(|id| id.chars().take(length).collect())
        .collect()
}

/// All items share the 3-character CPV group.
pub fn validate_cpv_group(items: &[Item]) -> Result<(), String> {
    if !items.is_empty() && cpv_prefixes(items, 3).len() != 1 {
        return Err("CPV group of items be identical".to_string());
    }
    Ok(())
}

/// Items of a tender first published at `first_revision` share a CPV
/// class, or a CPV group where classes are not compared.
pub fn validate_items_classification(items: &[Item], first_revision: Timestamp) -> Result<(), String> {
    let in_group_336 = first_revision > group_336_from()
        && items
            .first()
            .and_then(Item::classification_id)
            .is_some_and(|id| id.starts_with(CPV_GROUP_336));
    if !in_group_336 && first_revision > cpv_items_class_from() && cpv_prefixes(items, 4).len() != 1 {
        return Err("CPV class of items should be identical".to_string());
    }
    validate_cpv_group(items)
}

// =============================================================================
// Uniqueness
// =============================================================================

/// Rejects collections where two elements share a key.
///
/// Elements without a key are ignored.
pub fn validate_uniqueness<T, K: Ord>(
    values: &[T],
    key: impl Fn(&T) -> Option<K>,
    message: &str,
) -> Result<(), String> {
    let keys: Vec<K> = values.iter().filter_map(key).collect();
    let distinct: BTreeSet<&K> = keys.iter().collect();
    if distinct.len() != keys.len() {
        return Err(message.to_string());
    }
    Ok(())
}

// =============================================================================
// Features
// =============================================================================

fn sum_of_max(features: &[&Feature]) -> f64 {
    let sum: f64 = features.iter().map(|feature| feature.max_value()).sum();
    (sum * 1e15).round() / 1e15
}

/// The best score a bid can earn through features stays within 30%.
///
/// For a lotted tender the limit applies to each lot separately: tenderer
/// features plus the features of that lot and of its items.
pub fn validate_features_max_sum(tender: &Tender) -> Result<(), String> {
    if tender.features.is_empty() {
        return Ok(());
    }
    if !tender.is_lotted() {
        let all: Vec<&Feature> = tender.features.iter().collect();
        if sum_of_max(&all) > MAX_FEATURE_WEIGHT {
            return Err("Sum of max value of all features should be less then or equal to 30%".to_string());
        }
        return Ok(());
    }

    for lot_id in tender.lots.iter().filter_map(|lot| lot.id.as_deref()) {
        let items: BTreeSet<&str> = tender
            .items
            .iter()
            .filter(|item| item.related_lot.as_deref() == Some(lot_id))
            .filter_map(|item| item.id.as_deref())
            .collect();
        let applicable: Vec<&Feature> = tender
            .features
            .iter()
            .filter(|feature| {
                let related = feature.related_item.as_deref();
                match feature.feature_of {
                    FeatureOf::Tenderer => true,
                    FeatureOf::Lot => related == Some(lot_id),
                    FeatureOf::Item => related.is_some_and(|id| items.contains(id)),
                }
            })
            .collect();
        if sum_of_max(&applicable) > MAX_FEATURE_WEIGHT {
            return Err(
                "Sum of max value of all features for lot should be less then or equal to 30%".to_string(),
            );
        }
    }
    Ok(())
}

// =============================================================================
// Values
// =============================================================================

/// A lot value of a bid fits the lot it points at.
///
/// Only the first mismatch is reported, in the order amount, currency,
/// VAT flag. An unknown lot is left to the reference check.
pub fn validate_lot_value(tender: &Tender, related_lot: &str, value: &Value) -> Result<(), String> {
    let Some(lot_value) = tender.lot(related_lot).and_then(|lot| lot.value.as_ref()) else {
        return Ok(());
    };
    if lot_value.amount < value.amount {
        Err("value of bid should be less than value of lot".to_string())
    } else if lot_value.currency != value.currency {
        Err("currency of bid should be identical to currency of value of lot".to_string())
    } else if lot_value.value_added_tax_included != value.value_added_tax_included {
        Err("valueAddedTaxIncluded of bid should be identical to valueAddedTaxIncluded of value of lot"
            .to_string())
    } else {
        Ok(())
    }
}

fn net_within_vat_range(amount: Amount, net: Amount) -> Option<String> {
    let lower = amount.percent(80);
    if net < lower || net > amount {
        return Some(format!(
            "Value amountNet should be less or equal to amount ({}) but not more than 20 percent ({})",
            amount.compact(),
            lower.compact()
        ));
    }
    None
}

/// Checks a new contract value against the award it implements.
///
/// `update` is the contract value after applying the request. Returns the
/// message to reject the update with, `None` when it is acceptable or when
/// the award chain cannot be resolved.
pub fn validate_contract_value_update(
    tender: &Tender,
    contract: &Contract,
    update: &ContractValue,
) -> Option<String> {
    let current = contract.value.as_ref()?;
    let award = contract.award_id.as_deref().and_then(|id| tender.award(id))?;
    let awarded = award.value.as_ref()?;
    let tender_vat = tender.value.as_ref()?.value_added_tax_included;

    let amount = update.amount;
    let net = update.amount_net.unwrap_or(amount);
    let amount_changed = amount != current.amount;
    let net_changed = net != current.amount_net.unwrap_or(current.amount);

    let Some(lot_id) = award.lot_id.as_deref() else {
        return if tender_vat {
            if amount_changed {
                return Some(
                    "Can't update amount for contract value if tender with valueAddedTaxIncluded".to_string(),
                );
            }
            net_within_vat_range(amount, net)
        } else if net_changed {
            Some("Can't update amountNet for contract value if tender without valueAddedTaxIncluded".to_string())
        } else if amount < net {
            Some(format!("Value amount can not be less than amountNet ({})", net.compact()))
        } else if amount > net.percent(120) {
            Some(format!(
                "Value amount should be more or equal to amountNet ({}) but not more then 20 percent ({})",
                net.decimal(),
                net.percent(120).decimal()
            ))
        } else {
            None
        };
    };

    let lot_vat = tender.lot(lot_id)?.value.as_ref()?.value_added_tax_included;
    let not_payer = !awarded.value_added_tax_included && tender_vat == lot_vat;

    if lot_vat {
        if amount_changed {
            Some("Can't update amount for contract value if lot with valueAddedTaxIncluded".to_string())
        } else if awarded.value_added_tax_included {
            net_within_vat_range(amount, net)
        } else if not_payer {
            Some("Participant is not payer of VAT".to_string())
        } else if net < amount.percent(80) {
            Some(format!(
                "Value amountNet can not be less then 20 percent of amount ({})",
                amount.percent(80).compact()
            ))
        } else if net > awarded.amount {
            Some(format!(
                "Value amountNet should be less or equal to awarded amount ({})",
                awarded.amount.compact()
            ))
        } else {
            None
        }
    } else if not_payer {
        Some("Participant is not payer of VAT".to_string())
    } else if net_changed {
        Some("Can't update amountNet for contract value if lot without valueAddedTaxIncluded".to_string())
    } else if amount < net {
        Some(format!("Value amount can not be less than amountNet ({})", net.compact()))
    } else if amount > awarded.amount {
        Some(format!(
            "Value amount should be less or equal to awarded amount ({})",
            awarded.amount.decimal()
        ))
    } else {
        None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
