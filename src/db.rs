// 🗄️ Persistence - SQLite store for boxes, their contents and the catalog
//
// Tables:
//   cashes              - denomination catalog, keyed by (cash_type, value)
//   money_boxes         - one row per box
//   money_box_contents  - one row per (box, denomination), amount >= 0
//
// Decimal values are stored as 2-digit text ("0.20") so they compare exactly.
// Timestamps are fixed-width RFC 3339 (microseconds, Z) so text order = time order.

use crate::denomination::{CashType, Currency, Denomination, DenominationCatalog};
use crate::error::{MoneyBoxError, Result};
use crate::money_box::{BoxState, Holdings, LineItem, MoneyBox};
use crate::wealth::format_money;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

// ============================================================================
// STORE CONTRACT
// ============================================================================

/// What the service needs from a persistence backend.
///
/// `save_box` and `delete_line_items` must be atomic: a failure leaves the
/// previously committed state in place.
pub trait BoxStore {
    fn load_catalog(&self) -> Result<Vec<Denomination>>;

    fn create_box(&mut self, name: &str, created_at: DateTime<Utc>) -> Result<MoneyBox>;

    fn load_box(&self, id: i64) -> Result<Option<MoneyBox>>;

    /// Newest first
    fn list_boxes(&self) -> Result<Vec<MoneyBox>>;

    /// Upsert box fields and its full line-item set
    fn save_box(&mut self, money_box: &MoneyBox) -> Result<()>;

    /// Remove every line item of a box, returning how many rows went.
    /// Breaking a box does not call this: `save_box` on a broken box clears
    /// the rows in the same transaction as the flag update.
    fn delete_line_items(&mut self, box_id: i64) -> Result<usize>;
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL only applies to file databases; in-memory connections keep "memory"
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cashes (
            cash_type TEXT NOT NULL CHECK (cash_type IN ('bill', 'coin')),
            currency TEXT NOT NULL DEFAULT 'EUR',
            value TEXT NOT NULL,
            PRIMARY KEY (cash_type, value)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS money_boxes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            broken INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS money_box_contents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            money_box_id INTEGER NOT NULL REFERENCES money_boxes(id) ON DELETE CASCADE,
            cash_type TEXT NOT NULL,
            value TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount >= 0),
            UNIQUE (money_box_id, cash_type, value),
            FOREIGN KEY (cash_type, value) REFERENCES cashes(cash_type, value)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_money_boxes_created_at ON money_boxes(created_at)",
        [],
    )?;

    Ok(())
}

/// Insert catalog rows that are not there yet; returns how many were added
pub fn seed_catalog(conn: &Connection, catalog: &DenominationCatalog) -> Result<usize> {
    let mut inserted = 0;

    for denomination in catalog.all() {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO cashes (cash_type, currency, value) VALUES (?1, ?2, ?3)",
            params![
                denomination.cash_type.as_str(),
                denomination.currency.code(),
                format_money(denomination.value),
            ],
        )?;
    }

    if inserted > 0 {
        info!(inserted, "Seeded denomination catalog");
    }

    Ok(inserted)
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MoneyBoxError::Corrupt(format!("timestamp {:?}: {}", raw, e)))
}

fn parse_denomination(cash_type: &str, currency: &str, value: &str) -> Result<Denomination> {
    Ok(Denomination {
        cash_type: CashType::from_str(cash_type).map_err(MoneyBoxError::Corrupt)?,
        currency: Currency::from_str(currency).map_err(MoneyBoxError::Corrupt)?,
        value: Decimal::from_str(value)
            .map_err(|e| MoneyBoxError::Corrupt(format!("value {:?}: {}", value, e)))?,
    })
}

/// Raw money_boxes row before line items are attached
struct BoxRow {
    id: i64,
    name: String,
    created_at: String,
    updated_at: String,
    broken: bool,
}

impl BoxRow {
    const COLUMNS: &'static str = "id, name, created_at, updated_at, broken";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BoxRow {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            broken: row.get(4)?,
        })
    }
}

fn clear_contents(conn: &Connection, box_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM money_box_contents WHERE money_box_id = ?1",
        [box_id],
    )?)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wrap an open connection, creating tables and seeding the catalog
    pub fn new(conn: Connection, catalog: &DenominationCatalog) -> Result<Self> {
        setup_database(&conn)?;
        seed_catalog(&conn, catalog)?;
        Ok(SqliteStore { conn })
    }

    pub fn open(path: &Path, catalog: &DenominationCatalog) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened database");
        Self::new(conn, catalog)
    }

    pub fn open_in_memory(catalog: &DenominationCatalog) -> Result<Self> {
        Self::new(Connection::open_in_memory()?, catalog)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn load_line_items(&self, box_id: i64) -> Result<Vec<LineItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.cash_type, k.currency, c.value, c.amount
             FROM money_box_contents c
             JOIN cashes k ON k.cash_type = c.cash_type AND k.value = c.value
             WHERE c.money_box_id = ?1
             ORDER BY c.id",
        )?;

        let rows = stmt
            .query_map([box_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(cash_type, currency, value, amount)| {
                Ok(LineItem {
                    denomination: parse_denomination(&cash_type, &currency, &value)?,
                    amount,
                })
            })
            .collect()
    }

    fn hydrate(&self, row: BoxRow) -> Result<MoneyBox> {
        let state = if row.broken {
            BoxState::Broken
        } else {
            BoxState::Active(Holdings::from_items(self.load_line_items(row.id)?)?)
        };

        Ok(MoneyBox::from_parts(
            row.id,
            row.name,
            parse_timestamp(&row.created_at)?,
            parse_timestamp(&row.updated_at)?,
            state,
        ))
    }
}

impl BoxStore for SqliteStore {
    fn load_catalog(&self) -> Result<Vec<Denomination>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cash_type, currency, value FROM cashes")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let denominations = rows
            .iter()
            .map(|(cash_type, currency, value)| parse_denomination(cash_type, currency, value))
            .collect::<Result<Vec<_>>>()?;

        debug!(count = denominations.len(), "Loaded catalog from database");
        Ok(denominations)
    }

    fn create_box(&mut self, name: &str, created_at: DateTime<Utc>) -> Result<MoneyBox> {
        // stored with microsecond precision; keep the returned value identical
        let created_at = created_at.trunc_subsecs(6);
        let ts = format_timestamp(&created_at);

        self.conn.execute(
            "INSERT INTO money_boxes (name, created_at, updated_at, broken) VALUES (?1, ?2, ?2, 0)",
            params![name, ts],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(id, name, "Inserted money box");

        Ok(MoneyBox::from_parts(
            id,
            name.to_string(),
            created_at,
            created_at,
            BoxState::Active(Holdings::new()),
        ))
    }

    fn load_box(&self, id: i64) -> Result<Option<MoneyBox>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM money_boxes WHERE id = ?1", BoxRow::COLUMNS),
                [id],
                BoxRow::from_row,
            )
            .optional()?;

        row.map(|row| self.hydrate(row)).transpose()
    }

    fn list_boxes(&self) -> Result<Vec<MoneyBox>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM money_boxes ORDER BY created_at DESC, id DESC",
            BoxRow::COLUMNS
        ))?;

        let rows = stmt
            .query_map([], BoxRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn save_box(&mut self, money_box: &MoneyBox) -> Result<()> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE money_boxes SET name = ?1, updated_at = ?2, broken = ?3 WHERE id = ?4",
            params![
                money_box.name,
                format_timestamp(&money_box.updated_at),
                money_box.is_broken(),
                money_box.id,
            ],
        )?;
        if updated == 0 {
            return Err(MoneyBoxError::NotFound(money_box.id));
        }

        match money_box.state() {
            BoxState::Broken => {
                clear_contents(&tx, money_box.id)?;
            }
            BoxState::Active(holdings) => {
                let mut upsert = tx.prepare(
                    "INSERT INTO money_box_contents (money_box_id, cash_type, value, amount)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (money_box_id, cash_type, value)
                     DO UPDATE SET amount = excluded.amount",
                )?;

                for item in holdings.items() {
                    upsert.execute(params![
                        money_box.id,
                        item.denomination.cash_type.as_str(),
                        format_money(item.denomination.value),
                        item.amount,
                    ])?;
                }
            }
        }

        tx.commit()?;
        debug!(id = money_box.id, broken = money_box.is_broken(), "Saved money box");
        Ok(())
    }

    fn delete_line_items(&mut self, box_id: i64) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let deleted = clear_contents(&tx, box_id)?;
        tx.commit()?;

        debug!(box_id, deleted, "Deleted line items");
        Ok(deleted)
    }
}
