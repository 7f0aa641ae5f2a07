// 💰 Wealth / Content View - what is inside a box and what it is worth
//
// Pure read model: built from a box's holdings, never mutates anything.
// Money leaves the crate as a decimal string with exactly 2 fractional digits.

use crate::denomination::{CashType, Currency};
use crate::money_box::LineItem;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

/// Format a decimal amount with exactly two fractional digits ("0.20", "203.00")
pub fn format_money(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

fn serialize_money<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_money(*value))
}

/// One (denomination, amount) row of a box's contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentLine {
    pub cash_type: CashType,
    pub currency: Currency,
    #[serde(serialize_with = "serialize_money")]
    pub value: Decimal,
    pub amount: u32,
}

impl ContentLine {
    pub fn subtotal(&self) -> Decimal {
        self.value * Decimal::from(self.amount)
    }
}

/// Contents ordered ascending by value, plus their total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WealthView {
    #[serde(serialize_with = "serialize_money")]
    pub wealth: Decimal,
    pub cashes: Vec<ContentLine>,
}

impl WealthView {
    pub fn empty() -> Self {
        WealthView {
            wealth: Decimal::ZERO,
            cashes: Vec::new(),
        }
    }

    /// Build the view from line items in storage order.
    /// The sort is stable, so equal values keep their storage order.
    pub fn from_line_items(items: &[LineItem]) -> Self {
        let mut cashes: Vec<ContentLine> = items
            .iter()
            .map(|item| ContentLine {
                cash_type: item.denomination.cash_type,
                currency: item.denomination.currency,
                value: item.denomination.value,
                amount: item.amount,
            })
            .collect();

        cashes.sort_by(|a, b| a.value.cmp(&b.value));

        let wealth = cashes.iter().map(ContentLine::subtotal).sum();

        WealthView { wealth, cashes }
    }

    pub fn formatted_wealth(&self) -> String {
        format_money(self.wealth)
    }

    pub fn is_empty(&self) -> bool {
        self.cashes.is_empty()
    }

    /// Total number of bills and coins
    pub fn piece_count(&self) -> u64 {
        self.cashes.iter().map(|line| u64::from(line.amount)).sum()
    }
}
