// 💶 Denomination Catalog - the fixed set of accepted bills and coins
//
// The catalog is static configuration: built once at startup from the store
// (or a CSV file) and shared read-only for the lifetime of the process.
// Lookups key on the NORMALIZED decimal so "0.2" and "0.20" are the same value.

use crate::deposit::parse_value;
use anyhow::{bail, Context as AnyhowContext, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// CASH TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CashType {
    Bill,
    Coin,
}

impl CashType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashType::Bill => "bill",
            CashType::Coin => "coin",
        }
    }
}

impl fmt::Display for CashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CashType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "bill" => Ok(CashType::Bill),
            "coin" => Ok(CashType::Coin),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

// ============================================================================
// CURRENCY
// ============================================================================

/// Only the Euro is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Currency {
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Eur => "€",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "EUR" => Ok(Currency::Eur),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

// ============================================================================
// DENOMINATION
// ============================================================================

/// A single accepted unit of money. Identity is (cash_type, value).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Denomination {
    pub cash_type: CashType,
    pub currency: Currency,
    pub value: Decimal,
}

impl Denomination {
    pub fn new(cash_type: CashType, value: Decimal) -> Self {
        Denomination {
            cash_type,
            currency: Currency::Eur,
            value,
        }
    }

    /// Lookup key: exact type + normalized decimal value
    pub fn key(&self) -> (CashType, Decimal) {
        (self.cash_type, self.value.normalize())
    }

    /// Same identity (type and value), regardless of decimal scale
    pub fn same_as(&self, other: &Denomination) -> bool {
        self.key() == other.key()
    }
}

impl PartialEq for Denomination {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Denomination {}

// ============================================================================
// CATALOG
// ============================================================================

/// Euro coins and bills, as (type, cents)
const EURO_DENOMINATIONS: &[(CashType, i64)] = &[
    (CashType::Coin, 1),
    (CashType::Coin, 2),
    (CashType::Coin, 5),
    (CashType::Coin, 10),
    (CashType::Coin, 20),
    (CashType::Coin, 50),
    (CashType::Coin, 100),
    (CashType::Coin, 200),
    (CashType::Bill, 500),
    (CashType::Bill, 1_000),
    (CashType::Bill, 2_000),
    (CashType::Bill, 5_000),
    (CashType::Bill, 10_000),
    (CashType::Bill, 20_000),
    (CashType::Bill, 50_000),
];

/// Immutable (type, value) → Denomination map
#[derive(Debug, Clone)]
pub struct DenominationCatalog {
    by_key: HashMap<(CashType, Decimal), Denomination>,
    ordered: Vec<Denomination>,
}

impl DenominationCatalog {
    /// Build a catalog, rejecting duplicate (type, value) entries
    pub fn from_denominations(denominations: Vec<Denomination>) -> Result<Self> {
        let mut by_key = HashMap::with_capacity(denominations.len());

        for denomination in &denominations {
            if by_key.insert(denomination.key(), *denomination).is_some() {
                bail!(
                    "Duplicate denomination in catalog: {} {}",
                    denomination.cash_type,
                    denomination.value
                );
            }
        }

        let mut ordered = denominations;
        ordered.sort_by(|a, b| a.value.cmp(&b.value));

        Ok(DenominationCatalog { by_key, ordered })
    }

    /// The reference Euro catalog
    pub fn euro() -> Self {
        let ordered: Vec<Denomination> = EURO_DENOMINATIONS
            .iter()
            .map(|(cash_type, cents)| Denomination::new(*cash_type, Decimal::new(*cents, 2)))
            .collect();

        let by_key = ordered.iter().map(|d| (d.key(), *d)).collect();

        DenominationCatalog { by_key, ordered }
    }

    /// Load a catalog from a CSV file with `cash_type,currency,value` columns
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open catalog CSV {:?}", path))?;

        let mut denominations = Vec::new();

        for (line, result) in rdr.deserialize().enumerate() {
            let row: CatalogRow = result.context("Failed to deserialize catalog row")?;
            denominations.push(row.into_denomination().with_context(|| {
                // +2: header line and 1-based numbering
                format!("Invalid catalog row at line {}", line + 2)
            })?);
        }

        if denominations.is_empty() {
            bail!("Catalog CSV {:?} contains no denominations", path);
        }

        Self::from_denominations(denominations)
    }

    pub fn find(&self, cash_type: CashType, value: Decimal) -> Option<&Denomination> {
        self.by_key.get(&(cash_type, value.normalize()))
    }

    /// All denominations, ascending by value
    pub fn all(&self) -> &[Denomination] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl Default for DenominationCatalog {
    fn default() -> Self {
        Self::euro()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    cash_type: String,
    currency: String,
    value: String,
}

impl CatalogRow {
    fn into_denomination(self) -> Result<Denomination> {
        let cash_type = CashType::from_str(self.cash_type.trim()).map_err(anyhow::Error::msg)?;
        let currency = Currency::from_str(self.currency.trim()).map_err(anyhow::Error::msg)?;
        let value = parse_value(&self.value)
            .with_context(|| format!("Invalid value {:?}", self.value))?;

        if value <= Decimal::ZERO {
            bail!("Denomination value must be positive, got {}", value);
        }

        Ok(Denomination {
            cash_type,
            currency,
            value,
        })
    }
}
