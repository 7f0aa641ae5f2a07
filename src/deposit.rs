// 🪙 Deposit / Reconciliation Engine
//
// Merges a batch of (type, value, amount) requests into a box's holdings.
//
// Two phases:
//   1. resolve  - every request is checked against the catalog, nothing is touched
//   2. merge    - resolved denominations are added to a copy of the holdings,
//                 which replaces the original only if every addition succeeded
//
// A batch is all-or-nothing: one unknown denomination rejects the whole thing.

use crate::denomination::{CashType, Denomination, DenominationCatalog};
use crate::error::{MoneyBoxError, Result};
use crate::money_box::MoneyBox;
use crate::wealth::format_money;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Digits allowed in a denomination value, and how many may follow the point
const MAX_VALUE_DIGITS: u32 = 5;
const VALUE_DECIMAL_PLACES: u32 = 2;

// ============================================================================
// REQUESTS
// ============================================================================

/// A validated request to add `amount` pieces of (cash_type, value)
#[derive(Debug, Clone, PartialEq)]
pub struct DepositRequest {
    pub cash_type: CashType,
    pub value: Decimal,
    pub amount: u32,
}

impl DepositRequest {
    pub fn new(cash_type: CashType, value: Decimal, amount: u32) -> Self {
        DepositRequest {
            cash_type,
            value,
            amount,
        }
    }
}

/// Request as it arrives from the outside world, before field validation.
/// Fields are kept as raw JSON so a wrongly typed field is reported on that field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CashRequest {
    pub cash_type: Option<Value>,
    pub value: Option<Value>,
    pub amount: Option<Value>,
}

impl CashRequest {
    /// Field-level validation into a typed request
    pub fn parse(&self) -> Result<DepositRequest> {
        let cash_type = match required(&self.cash_type, "cash_type")? {
            Value::String(raw) => CashType::from_str(raw),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
        .map_err(|msg| MoneyBoxError::invalid_input("cash_type", msg))?;

        let value = match required(&self.value, "value")? {
            Value::String(raw) => parse_value(raw)?,
            Value::Number(number) => parse_value(&number.to_string())?,
            _ => {
                return Err(MoneyBoxError::invalid_input(
                    "value",
                    "A valid number is required.",
                ))
            }
        };

        let amount = parse_amount(integer_field(required(&self.amount, "amount")?)?)?;

        Ok(DepositRequest::new(cash_type, value, amount))
    }
}

fn required<'v>(field: &'v Option<Value>, name: &str) -> Result<&'v Value> {
    field.as_ref().ok_or_else(|| MoneyBoxError::required(name))
}

/// Integers, integral floats ("1.0") and numeric strings ("5") are accepted
fn integer_field(raw: &Value) -> Result<i64> {
    let invalid = || MoneyBoxError::invalid_input("amount", "A valid integer is required.");

    match raw {
        Value::Number(number) => number
            .as_i64()
            // above i64::MAX: let the range check report it
            .or_else(|| number.as_u64().map(|_| i64::MAX))
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                    .map(|f| f as i64)
            })
            .ok_or_else(invalid),
        Value::String(text) => text.trim().parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Parse a denomination value: a decimal with at most 5 digits, 2 after the point
pub fn parse_value(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    // Decimal::from_str also takes digit separators such as "1_00"
    let plain = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
    let value = plain
        .then(|| Decimal::from_str(raw).ok())
        .flatten()
        .ok_or_else(|| MoneyBoxError::invalid_input("value", "A valid number is required."))?;

    let normalized = value.normalize();
    if normalized.scale() > VALUE_DECIMAL_PLACES {
        return Err(MoneyBoxError::invalid_input(
            "value",
            format!(
                "Ensure that there are no more than {} decimal places.",
                VALUE_DECIMAL_PLACES
            ),
        ));
    }

    let integer_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len() as u32;
    if integer_digits > MAX_VALUE_DIGITS - VALUE_DECIMAL_PLACES {
        return Err(MoneyBoxError::invalid_input(
            "value",
            format!(
                "Ensure that there are no more than {} digits in total.",
                MAX_VALUE_DIGITS
            ),
        ));
    }

    Ok(value)
}

/// Amounts are strictly positive piece counts
pub fn parse_amount(raw: i64) -> Result<u32> {
    if raw < 1 {
        return Err(MoneyBoxError::invalid_input(
            "amount",
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    u32::try_from(raw).map_err(|_| {
        MoneyBoxError::invalid_input(
            "amount",
            format!("Ensure this value is less than or equal to {}.", u32::MAX),
        )
    })
}

/// Parse a whole wire batch, failing on the first invalid field
pub fn parse_batch(raw: &[CashRequest]) -> Result<Vec<DepositRequest>> {
    raw.iter().map(CashRequest::parse).collect()
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct DepositEngine<'a> {
    catalog: &'a DenominationCatalog,
}

impl<'a> DepositEngine<'a> {
    pub fn new(catalog: &'a DenominationCatalog) -> Self {
        DepositEngine { catalog }
    }

    /// Resolve every request against the catalog; fails on the first unknown one
    pub fn resolve(&self, requests: &[DepositRequest]) -> Result<Vec<(Denomination, u32)>> {
        requests
            .iter()
            .map(|request| {
                if request.amount == 0 {
                    return Err(MoneyBoxError::invalid_input(
                        "amount",
                        "Ensure this value is greater than or equal to 1.",
                    ));
                }

                self.catalog
                    .find(request.cash_type, request.value)
                    .map(|denomination| (*denomination, request.amount))
                    .ok_or_else(|| MoneyBoxError::InvalidDenomination {
                        cash_type: request.cash_type.to_string(),
                        value: format_money(request.value),
                    })
            })
            .collect()
    }

    /// Apply a batch to an active box. On error the box is left untouched.
    pub fn deposit(&self, money_box: &mut MoneyBox, requests: &[DepositRequest]) -> Result<()> {
        if money_box.is_broken() {
            return Err(MoneyBoxError::BoxBroken(money_box.id));
        }

        let resolved = self.resolve(requests)?;

        let holdings = money_box.holdings_mut()?;
        let mut merged = holdings.clone();
        for (denomination, amount) in resolved {
            merged.add(denomination, amount)?;
        }
        *holdings = merged;

        money_box.touch();
        Ok(())
    }
}
