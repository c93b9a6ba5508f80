//! # Business Calendar
//!
//! Business-date arithmetic for tender periods and auction estimates.
//!
//! ## calculate_business_date
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start + delta                                                          │
//! │     │                                                                   │
//! │     ├── context has ",accelerator=N" ──► start + delta / N   (done)     │
//! │     │                                                                   │
//! │     ├── calendar days ───────────────► start + delta         (done)     │
//! │     │                                                                   │
//! │     └── working days                                                    │
//! │           1. start on a day off: snap to midnight, move to the          │
//! │              nearest working day in the direction of delta              │
//! │           2. step |delta.days| working days                             │
//! │           3. add the sub-day remainder, then skip days off              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A day is off when it falls on a weekend and the calendar does not mark
//! it as a working day, or when the calendar marks it as a holiday.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::constants::{
    auction_stand_still_time, bidder_time, complaint_stand_still_time,
    rounding_should_start_after_from, service_time, ACCELERATOR_MARKER, QUICK_MARKER,
};
use crate::time::{at_midnight, Timestamp};

// =============================================================================
// Working Days Table
// =============================================================================

/// Date overrides for the weekly calendar.
///
/// `true` marks a holiday, `false` marks a weekend day that is worked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkingDays(BTreeMap<NaiveDate, bool>);

const BUNDLED_WORKING_DAYS: &str = include_str!("../data/working_days.json");

impl WorkingDays {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Ukrainian calendar shipped with the crate.
    pub fn bundled() -> Self {
        serde_json::from_str(BUNDLED_WORKING_DAYS).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "bundled working days table is unreadable");
            WorkingDays::default()
        })
    }

    pub fn insert(&mut self, date: NaiveDate, holiday: bool) {
        self.0.insert(date, holiday);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.0.get(&date) == Some(&true)
    }

    /// True when the local date of `date` is not a working day.
    pub fn is_day_off(&self, date: NaiveDate) -> bool {
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        match self.0.get(&date) {
            Some(true) => true,
            Some(false) => false,
            None => weekend,
        }
    }

    fn is_off(&self, ts: &Timestamp) -> bool {
        self.is_day_off(ts.date_naive())
    }
}

// =============================================================================
// Context
// =============================================================================

/// Tender fields that influence date arithmetic.
pub trait BusinessContext {
    fn procurement_method_details(&self) -> Option<&str>;

    fn submission_method_details(&self) -> Option<&str> {
        None
    }

    fn enquiry_period_start(&self) -> Option<Timestamp> {
        None
    }
}

/// Extracts `N` from a `<sep>accelerator=N` marker.
///
/// A missing, malformed or zero accelerator means no acceleration.
pub fn accelerator(context: Option<&dyn BusinessContext>) -> Option<i32> {
    let details = context?.procurement_method_details()?;
    let position = details.find(ACCELERATOR_MARKER)?;
    if position == 0 {
        return None;
    }
    let digits: String = details[position + ACCELERATOR_MARKER.len()..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<i32>().ok().filter(|n| *n > 0)
}

// =============================================================================
// Calculations
// =============================================================================

/// Adds `delta` to `start`.
///
/// With `working_days` set, only working days of that calendar are counted.
/// An accelerator in `context` divides `delta` and skips the calendar.
pub fn calculate_business_date(
    start: Timestamp,
    delta: TimeDelta,
    context: Option<&dyn BusinessContext>,
    working_days: Option<&WorkingDays>,
) -> Timestamp {
    if let Some(n) = accelerator(context) {
        return start + delta / n;
    }
    let Some(calendar) = working_days else {
        return start + delta;
    };

    let forward = delta > TimeDelta::zero();
    let step = if forward { TimeDelta::days(1) } else { TimeDelta::days(-1) };
    let mut date = start;

    if calendar.is_off(&date) {
        date = at_midnight(date);
        if forward {
            date += step;
            while calendar.is_off(&date) {
                date += step;
            }
        } else {
            while calendar.is_off(&date) {
                date += step;
            }
            date += TimeDelta::days(1);
        }
    }

    let whole_days = delta.num_days();
    for _ in 0..whole_days.abs() {
        date += step;
        while calendar.is_off(&date) {
            date += step;
        }
    }

    let remainder = delta - TimeDelta::days(whole_days);
    if remainder != TimeDelta::zero() {
        date += remainder;
        while calendar.is_off(&date) {
            date += step;
        }
    }
    date
}

/// Estimated end of an auction with `number_of_bids` participants.
pub fn calc_auction_end_time(number_of_bids: i64, start: Timestamp) -> Timestamp {
    let bidders = i32::try_from(number_of_bids).unwrap_or(0);
    start + bidder_time() * bidders + service_time() + auction_stand_still_time()
}

/// Rounds an auction start estimate up to the next midnight.
///
/// Rounding is skipped for tenders dated before the rounding cutover and
/// for sandbox "quick" tenders.
pub fn rounding_should_start_after(
    candidate: Timestamp,
    context: &dyn BusinessContext,
    now: Timestamp,
    config: &CoreConfig,
) -> Timestamp {
    let reference = context.enquiry_period_start().unwrap_or(now);
    let quick = config.sandbox_mode
        && context
            .submission_method_details()
            .is_some_and(|details| details.contains(QUICK_MARKER));
    if reference > rounding_should_start_after_from() && !quick && candidate.time() > NaiveTime::MIN {
        return at_midnight(candidate) + TimeDelta::days(1);
    }
    candidate
}

/// End of an award complaint period opened at `start`.
pub fn award_complaint_period_end(start: Timestamp, context: &dyn BusinessContext) -> Timestamp {
    calculate_business_date(start, complaint_stand_still_time(), Some(context), None)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{format_iso, kyiv_midnight, parse_iso};

    struct Details {
        procurement: Option<&'static str>,
        submission: Option<&'static str>,
        enquiry_start: Option<Timestamp>,
    }

    impl BusinessContext for Details {
        fn procurement_method_details(&self) -> Option<&str> {
            self.procurement
        }

        fn submission_method_details(&self) -> Option<&str> {
            self.submission
        }

        fn enquiry_period_start(&self) -> Option<Timestamp> {
            self.enquiry_start
        }
    }

    fn plain() -> Details {
        Details {
            procurement: None,
            submission: None,
            enquiry_start: None,
        }
    }

    fn october_holiday() -> WorkingDays {
        let mut days = WorkingDays::new();
        days.insert(NaiveDate::from_ymd_opt(2017, 10, 16).unwrap(), true);
        days
    }

    #[test]
    fn test_calendar_days_ignore_weekends() {
        let start = parse_iso("2017-10-07T10:00:00+03:00").unwrap();
        assert_eq!(
            calculate_business_date(start, TimeDelta::days(3), None, None),
            start + TimeDelta::days(3)
        );
        assert_eq!(
            calculate_business_date(start, TimeDelta::days(-1), None, None),
            start - TimeDelta::days(1)
        );
        assert_eq!(calculate_business_date(start, TimeDelta::zero(), None, None), start);
    }

    #[test]
    fn test_working_days_skip_weekend_and_holiday() {
        let start = kyiv_midnight(2017, 10, 7);
        let result = calculate_business_date(start, TimeDelta::days(7), None, Some(&october_holiday()));
        assert_eq!(format_iso(&result), "2017-10-19T00:00:00+03:00");
    }

    #[test]
    fn test_working_days_backward_from_weekend() {
        let start = kyiv_midnight(2017, 10, 8);
        let result = calculate_business_date(start, TimeDelta::days(-1), None, Some(&october_holiday()));
        // Sunday snaps to Saturday midnight, one working day back is Friday.
        assert_eq!(format_iso(&result), "2017-10-06T00:00:00+03:00");
    }

    #[test]
    fn test_sub_day_remainder_lands_on_working_day() {
        let start = parse_iso("2017-10-13T23:50:00+03:00").unwrap();
        let result =
            calculate_business_date(start, TimeDelta::minutes(30), None, Some(&october_holiday()));
        assert_eq!(format_iso(&result), "2017-10-17T00:20:00+03:00");
    }

    #[test]
    fn test_worked_saturday_counts() {
        let mut days = WorkingDays::new();
        days.insert(NaiveDate::from_ymd_opt(2017, 10, 14).unwrap(), false);
        let start = kyiv_midnight(2017, 10, 13);
        let result = calculate_business_date(start, TimeDelta::days(1), None, Some(&days));
        assert_eq!(format_iso(&result), "2017-10-14T00:00:00+03:00");
    }

    #[test]
    fn test_accelerator_divides_delta() {
        let start = kyiv_midnight(2017, 10, 7);
        let context = Details {
            procurement: Some("quick,accelerator=1440"),
            ..plain()
        };
        assert_eq!(
            calculate_business_date(start, TimeDelta::days(3), Some(&context), Some(&october_holiday())),
            start + TimeDelta::minutes(3)
        );
        assert_eq!(
            calculate_business_date(start, TimeDelta::days(-3), Some(&context), None),
            start - TimeDelta::minutes(3)
        );
    }

    #[test]
    fn test_invalid_accelerator_is_ignored() {
        for details in ["accelerator=1440", "quick,accelerator=0", "quick,accelerator=x"] {
            let context = Details {
                procurement: Some(details),
                ..plain()
            };
            assert_eq!(accelerator(Some(&context)), None, "{}", details);
        }
    }

    #[test]
    fn test_auction_end_time() {
        let start = kyiv_midnight(2017, 10, 7);
        let end = calc_auction_end_time(2, start);
        assert_eq!(end - start, TimeDelta::minutes(36));
    }

    #[test]
    fn test_award_complaint_period_end() {
        let start = kyiv_midnight(2017, 10, 7);
        assert_eq!(award_complaint_period_end(start, &plain()), start + TimeDelta::days(3));

        let quick = Details {
            procurement: Some("quick,accelerator=1440"),
            ..plain()
        };
        assert_eq!(award_complaint_period_end(start, &quick), start + TimeDelta::minutes(3));
    }

    #[test]
    fn test_rounding_moves_to_next_midnight() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let candidate = parse_iso("2017-10-09T10:15:00+03:00").unwrap();
        let context = Details {
            enquiry_start: Some(now),
            ..plain()
        };
        let rounded = rounding_should_start_after(candidate, &context, now, &config);
        assert_eq!(format_iso(&rounded), "2017-10-10T00:00:00+03:00");

        let midnight = kyiv_midnight(2017, 10, 9);
        assert_eq!(rounding_should_start_after(midnight, &context, now, &config), midnight);
    }

    #[test]
    fn test_rounding_skipped_for_old_and_quick_tenders() {
        let candidate = parse_iso("2017-10-09T10:15:00+03:00").unwrap();
        let now = kyiv_midnight(2017, 10, 7);

        let old = Details {
            enquiry_start: Some(kyiv_midnight(2016, 1, 1)),
            ..plain()
        };
        assert_eq!(
            rounding_should_start_after(candidate, &old, now, &CoreConfig::default()),
            candidate
        );

        let sandbox = CoreConfig {
            sandbox_mode: true,
            ..CoreConfig::default()
        };
        let quick = Details {
            submission: Some("quick"),
            ..plain()
        };
        assert_eq!(rounding_should_start_after(candidate, &quick, now, &sandbox), candidate);
    }

    #[test]
    fn test_bundled_table_loads() {
        let days = WorkingDays::bundled();
        assert!(!days.is_empty());
        assert!(days.is_holiday(NaiveDate::from_ymd_opt(2017, 10, 16).unwrap()));
    }
}
