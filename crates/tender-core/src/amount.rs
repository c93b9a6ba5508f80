//! # Amount Module
//!
//! Provides the `Amount` type and the value records built on it.
//!
//! ## Why Integer Kopecks?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Clients send amounts as JSON floats:  {"amount": 479.99}               │
//! │                                                                         │
//! │  Comparing floats directly:                                             │
//! │    0.8 * 500.1 = 400.08000000000004   → bound checks drift              │
//! │                                                                         │
//! │  OUR SOLUTION: parse once into integer kopecks                          │
//! │    479.99  ──► Amount(47999)                                            │
//! │    80% of Amount(50010) = Amount(40008)   exact, no drift               │
//! │                                                                         │
//! │  Floats only reappear when the value is written back to JSON.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Value Records
//! ```text
//! Value         {amount, currency = "UAH", valueAddedTaxIncluded = true}
//! ContractValue {amount, amountNet, currency, valueAddedTaxIncluded}
//! Guarantee     {amount, currency = "UAH"}
//! ```

use std::fmt;
use std::ops::{Add, Sub};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationErrors;

// =============================================================================
// Amount Type
// =============================================================================

/// A monetary amount in kopecks (1/100 of the currency unit).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    /// Creates an amount from kopecks.
    #[inline]
    pub const fn from_kopecks(kopecks: i64) -> Self {
        Amount(kopecks)
    }

    /// Creates an amount from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Amount(units * 100)
    }

    /// Rounds a float to the nearest kopeck.
    pub fn from_f64(value: f64) -> Self {
        Amount((value * 100.0).round() as i64)
    }

    #[inline]
    pub const fn kopecks(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Amount(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `pct` percent of this amount, rounded to the nearest kopeck.
    ///
    /// ## Example
    /// ```rust
    /// use tender_core::amount::Amount;
    ///
    /// let amount = Amount::from_units(500);
    /// assert_eq!(amount.percent(80), Amount::from_units(400));
    /// assert_eq!(amount.percent(120), Amount::from_units(600));
    /// ```
    pub fn percent(&self, pct: i64) -> Amount {
        // i128 keeps large procurement budgets from overflowing.
        let scaled = (self.0 as i128 * pct as i128 + 50) / 100;
        Amount(scaled as i64)
    }

    /// Short rendering used in messages: `500`, `450.5`.
    pub fn compact(&self) -> String {
        match self.fraction() {
            Some(fraction) => format!("{}.{}", self.units_str(), fraction),
            None => self.units_str(),
        }
    }

    /// Float-style rendering used in messages: `500.0`, `450.5`.
    pub fn decimal(&self) -> String {
        match self.fraction() {
            Some(fraction) => format!("{}.{}", self.units_str(), fraction),
            None => format!("{}.0", self.units_str()),
        }
    }

    fn units_str(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}", sign, (self.0 / 100).abs())
    }

    fn fraction(&self) -> Option<String> {
        let kopecks = (self.0 % 100).abs();
        if kopecks == 0 {
            return None;
        }
        let padded = format!("{:02}", kopecks);
        Some(padded.trim_end_matches('0').to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decimal())
    }
}

impl Add for Amount {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Amount(self.0 + other.0)
    }
}

impl Sub for Amount {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Amount(self.0 - other.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

const NEGATIVE_AMOUNT: &str = "Float value should be greater than 0.";

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative number")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        i64::try_from(v)
            .ok()
            .and_then(|units| units.checked_mul(100))
            .map(Amount)
            .ok_or_else(|| E::custom(format!("Value '{}' is not float.", v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        if v < 0 {
            return Err(E::custom(NEGATIVE_AMOUNT));
        }
        v.checked_mul(100)
            .map(Amount)
            .ok_or_else(|| E::custom(format!("Value '{}' is not float.", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        if !v.is_finite() {
            return Err(E::custom(format!("Value '{}' is not float.", v)));
        }
        if v < 0.0 {
            return Err(E::custom(NEGATIVE_AMOUNT));
        }
        Ok(Amount::from_f64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        match v.trim().parse::<f64>() {
            Ok(parsed) => self.visit_f64(parsed),
            Err(_) => Err(E::custom(format!("Value '{}' is not float.", v))),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

// =============================================================================
// Value Records
// =============================================================================

pub const DEFAULT_CURRENCY: &str = "UAH";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_true() -> bool {
    true
}

fn check_currency(errors: &mut ValidationErrors, currency: &str) {
    let len = currency.chars().count();
    if len < 3 {
        errors.add("currency", "String value is too short.");
    } else if len > 3 {
        errors.add("currency", "String value is too long.");
    }
}

/// Budget, bid price, award price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Value {
    pub amount: Amount,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_true")]
    pub value_added_tax_included: bool,
}

impl Value {
    pub fn new(amount: Amount, currency: &str, value_added_tax_included: bool) -> Self {
        Value {
            amount,
            currency: currency.to_string(),
            value_added_tax_included,
        }
    }

    /// UAH with VAT included.
    pub fn uah(amount: Amount) -> Self {
        Self::new(amount, DEFAULT_CURRENCY, true)
    }

    /// Keeps the amount but takes currency and VAT flag from `parent`.
    ///
    /// Lot values and minimal steps are always presented in the tender's
    /// currency and tax mode.
    pub fn inherit(&self, parent: &Value) -> Value {
        Value {
            amount: self.amount,
            currency: parent.currency.clone(),
            value_added_tax_included: parent.value_added_tax_included,
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_currency(&mut errors, &self.currency);
        errors
    }
}

/// Contract price with the net (tax-excluded) amount alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContractValue {
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_net: Option<Amount>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_true")]
    pub value_added_tax_included: bool,
}

impl ContractValue {
    pub fn from_value(value: &Value) -> Self {
        ContractValue {
            amount: value.amount,
            amount_net: Some(value.amount),
            currency: value.currency.clone(),
            value_added_tax_included: value.value_added_tax_included,
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_currency(&mut errors, &self.currency);
        errors
    }
}

/// Bid security required from participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Guarantee {
    pub amount: Amount,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Guarantee {
    /// Keeps the amount but takes the currency from the tender guarantee.
    pub fn inherit(&self, parent: &Guarantee) -> Guarantee {
        Guarantee {
            amount: self.amount,
            currency: parent.currency.clone(),
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_currency(&mut errors, &self.currency);
        errors
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
