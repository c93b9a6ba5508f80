//! # Constants
//!
//! Auction timings, rule cutover dates and classification scheme lists.
//!
//! ## Cutover Timeline (Kyiv midnight)
//! ```text
//! 2016-07-16  shouldStartAfter rounding to midnight
//! 2016-08-30  period startDate can no longer be deleted
//! 2016-10-24  duplicated bid lotValues rejected
//! 2017-01-01  CPV items compared by class (4 chars) instead of group (3 chars)
//! 2017-12-19  group 336 items compared by group
//! 2018-03-20  99999999-9 items may omit additionalClassifications
//! ```
//!
//! A rule applies to a tender when its first revision date is past the
//! cutover. Tenders without revisions are dated by the current time.

use chrono::TimeDelta;

use crate::time::{kyiv_midnight, Timestamp};

// =============================================================================
// Auction Timings
// =============================================================================

/// Auction time budgeted per bidder.
pub fn bidder_time() -> TimeDelta {
    TimeDelta::minutes(6)
}

/// Fixed auction overhead.
pub fn service_time() -> TimeDelta {
    TimeDelta::minutes(9)
}

/// Pause after an auction before the next one may start.
pub fn auction_stand_still_time() -> TimeDelta {
    TimeDelta::minutes(15)
}

/// Award complaint period length.
pub fn complaint_stand_still_time() -> TimeDelta {
    TimeDelta::days(3)
}

// =============================================================================
// Rule Cutovers
// =============================================================================

pub fn rounding_should_start_after_from() -> Timestamp {
    kyiv_midnight(2016, 7, 16)
}

pub fn cant_delete_period_start_date_from() -> Timestamp {
    kyiv_midnight(2016, 8, 30)
}

pub fn bid_lot_values_validation_from() -> Timestamp {
    kyiv_midnight(2016, 10, 24)
}

pub fn cpv_items_class_from() -> Timestamp {
    kyiv_midnight(2017, 1, 1)
}

pub fn group_336_from() -> Timestamp {
    kyiv_midnight(2017, 12, 19)
}

pub fn not_required_additional_classification_from() -> Timestamp {
    kyiv_midnight(2018, 3, 20)
}

// =============================================================================
// Classification Schemes
// =============================================================================

/// Additional classification schemes accepted before 2017.
pub const ADDITIONAL_CLASSIFICATIONS_SCHEMES: &[&str] = &["ДКПП", "NONE", "ДК003", "ДК015", "ДК018"];

/// Additional classification schemes accepted for `99999999-9` items from 2017.
pub const ADDITIONAL_CLASSIFICATIONS_SCHEMES_2017: &[&str] =
    &["ДК003", "ДК015", "ДК018", "specialNorms"];

/// CPV code meaning "not classified"; items using it need an additional scheme.
pub const CPV_NOT_CLASSIFIED: &str = "99999999-9";

/// CPV group whose items are compared by group even after the class cutover.
pub const CPV_GROUP_336: &str = "336";

/// Renders a scheme list the way messages show it: `ДКПП, NONE, ДК003`.
pub fn scheme_list(schemes: &[&str]) -> String {
    schemes.join(", ")
}

// =============================================================================
// Sandbox Markers
// =============================================================================

/// `procurementMethodDetails` marker enabling duration compression.
pub const ACCELERATOR_MARKER: &str = "accelerator=";

/// `submissionMethodDetails` marker disabling shouldStartAfter rounding.
pub const QUICK_MARKER: &str = "quick";
