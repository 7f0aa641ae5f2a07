// 🐷 Money Box Entity - Active with holdings, or Broken
//
// Lifecycle:
//   Active(holdings) --break_open--> Broken
//
// The only way out of Active is `break_open`, which takes the holdings with it.
// A Broken box has nothing left to mutate, so deposits cannot slip through.

use crate::denomination::Denomination;
use crate::error::{MoneyBoxError, Result};
use crate::wealth::WealthView;
use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Maximum length of a box name
pub const MAX_NAME_LEN: usize = 200;

// ============================================================================
// LINE ITEMS
// ============================================================================

/// Count of one denomination inside a box
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub denomination: Denomination,
    pub amount: u32,
}

/// Line items of an active box, in storage order, at most one per denomination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holdings {
    items: Vec<LineItem>,
}

impl Holdings {
    pub fn new() -> Self {
        Holdings { items: Vec::new() }
    }

    /// Rebuild holdings from stored rows, merging any repeated denomination
    pub fn from_items(items: Vec<LineItem>) -> Result<Self> {
        let mut holdings = Holdings::new();
        for item in items {
            holdings.add(item.denomination, item.amount)?;
        }
        Ok(holdings)
    }

    /// Increment the existing line item or append a new one
    pub fn add(&mut self, denomination: Denomination, amount: u32) -> Result<()> {
        match self
            .items
            .iter_mut()
            .find(|item| item.denomination.same_as(&denomination))
        {
            Some(existing) => {
                existing.amount = existing.amount.checked_add(amount).ok_or_else(|| {
                    MoneyBoxError::invalid_input(
                        "amount",
                        format!("Ensure this value is less than or equal to {}.", u32::MAX),
                    )
                })?;
            }
            None => self.items.push(LineItem {
                denomination,
                amount,
            }),
        }
        Ok(())
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BoxState {
    Active(Holdings),
    Broken,
}

impl BoxState {
    pub fn is_broken(&self) -> bool {
        matches!(self, BoxState::Broken)
    }
}

// ============================================================================
// MONEY BOX
// ============================================================================

#[derive(Debug, Clone)]
pub struct MoneyBox {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    state: BoxState,
}

impl MoneyBox {
    /// Rehydrate a box from storage
    pub fn from_parts(
        id: i64,
        name: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        state: BoxState,
    ) -> Self {
        MoneyBox {
            id,
            name,
            created_at,
            updated_at,
            state,
        }
    }

    /// Validate a name for a new box
    pub fn validate_name(name: &str) -> Result<String> {
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(MoneyBoxError::required("name"));
        }
        if trimmed.chars().count() > MAX_NAME_LEN {
            return Err(MoneyBoxError::invalid_input(
                "name",
                format!(
                    "Ensure this field has no more than {} characters.",
                    MAX_NAME_LEN
                ),
            ));
        }

        Ok(trimmed.to_string())
    }

    pub fn state(&self) -> &BoxState {
        &self.state
    }

    pub fn is_broken(&self) -> bool {
        self.state.is_broken()
    }

    /// Current line items; always empty once broken
    pub fn line_items(&self) -> &[LineItem] {
        match &self.state {
            BoxState::Active(holdings) => holdings.items(),
            BoxState::Broken => &[],
        }
    }

    /// Mutable access to the holdings, refused once broken
    pub fn holdings_mut(&mut self) -> Result<&mut Holdings> {
        match &mut self.state {
            BoxState::Active(holdings) => Ok(holdings),
            BoxState::Broken => Err(MoneyBoxError::BoxBroken(self.id)),
        }
    }

    /// Ordered contents and total (empty once broken)
    pub fn contents(&self) -> WealthView {
        WealthView::from_line_items(self.line_items())
    }

    pub fn wealth(&self) -> Decimal {
        self.contents().wealth
    }

    /// Refresh updated_at (microsecond precision, never moves backwards)
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().trunc_subsecs(6).max(self.updated_at);
    }

    /// Active → Broken. Returns the contents as they were before clearing.
    pub fn break_open(&mut self) -> Result<WealthView> {
        if self.is_broken() {
            return Err(MoneyBoxError::AlreadyBroken(self.id));
        }

        let snapshot = self.contents();
        self.state = BoxState::Broken;
        self.touch();

        Ok(snapshot)
    }

    pub fn summary(&self) -> BoxSummary {
        BoxSummary {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            name: self.name.clone(),
            broken: self.is_broken(),
        }
    }
}

/// Basic box data, as returned by create/get/list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub broken: bool,
}
