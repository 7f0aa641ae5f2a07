// 🧰 Money Box Service - the operations offered to the outside world
//
// Each operation is one unit of work: load the box, run the domain logic,
// save through the store (one transaction), return a typed result.
//
//   create(name)           -> BoxSummary
//   get(id)                -> BoxSummary
//   list()                 -> Vec<BoxSummary>   (newest first)
//   deposit(id, requests)  -> WealthView        (after the deposit)
//   shake(id)              -> WealthView        (read-only)
//   break_box(id)          -> WealthView        (contents before clearing)

use crate::db::BoxStore;
use crate::denomination::DenominationCatalog;
use crate::deposit::{DepositEngine, DepositRequest};
use crate::error::{MoneyBoxError, Result};
use crate::money_box::{BoxSummary, MoneyBox};
use crate::wealth::WealthView;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MoneyBoxService<S: BoxStore> {
    store: S,
    catalog: Arc<DenominationCatalog>,
}

impl<S: BoxStore> MoneyBoxService<S> {
    /// Build the service, loading the catalog from the store once
    pub fn new(store: S) -> Result<Self> {
        let denominations = store.load_catalog()?;
        let catalog = DenominationCatalog::from_denominations(denominations)
            .map_err(|e| MoneyBoxError::Corrupt(format!("{:#}", e)))?;

        info!(denominations = catalog.len(), "Catalog loaded");

        Ok(MoneyBoxService {
            store,
            catalog: Arc::new(catalog),
        })
    }

    pub fn catalog(&self) -> &Arc<DenominationCatalog> {
        &self.catalog
    }

    fn load(&self, id: i64) -> Result<MoneyBox> {
        self.store
            .load_box(id)?
            .ok_or(MoneyBoxError::NotFound(id))
    }

    /// Load a box that must still be usable
    fn load_active(&self, id: i64) -> Result<MoneyBox> {
        let money_box = self.load(id)?;
        if money_box.is_broken() {
            warn!(id, "Rejected operation on broken money box");
            return Err(MoneyBoxError::BoxBroken(id));
        }
        Ok(money_box)
    }

    pub fn create(&mut self, name: &str) -> Result<BoxSummary> {
        let name = MoneyBox::validate_name(name)?;
        let money_box = self.store.create_box(&name, Utc::now())?;

        info!(id = money_box.id, name = %money_box.name, "Money box created");
        Ok(money_box.summary())
    }

    pub fn get(&self, id: i64) -> Result<BoxSummary> {
        Ok(self.load(id)?.summary())
    }

    pub fn list(&self) -> Result<Vec<BoxSummary>> {
        Ok(self
            .store
            .list_boxes()?
            .iter()
            .map(MoneyBox::summary)
            .collect())
    }

    pub fn deposit(&mut self, id: i64, requests: &[DepositRequest]) -> Result<WealthView> {
        let mut money_box = self.load_active(id)?;

        DepositEngine::new(&self.catalog).deposit(&mut money_box, requests)?;
        self.store.save_box(&money_box)?;

        let view = money_box.contents();
        info!(
            id,
            requests = requests.len(),
            wealth = %view.formatted_wealth(),
            "Deposit saved"
        );
        Ok(view)
    }

    pub fn shake(&self, id: i64) -> Result<WealthView> {
        let view = self.load_active(id)?.contents();
        debug!(id, wealth = %view.formatted_wealth(), "Money box shaken");
        Ok(view)
    }

    pub fn break_box(&mut self, id: i64) -> Result<WealthView> {
        let mut money_box = self.load(id)?;

        let snapshot = money_box.break_open()?;
        self.store.save_box(&money_box)?;

        info!(id, wealth = %snapshot.formatted_wealth(), "Money box broken");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::denomination::{CashType, Denomination};
    use crate::wealth::format_money;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn service() -> MoneyBoxService<SqliteStore> {
        let store = SqliteStore::open_in_memory(&DenominationCatalog::euro()).unwrap();
        MoneyBoxService::new(store).unwrap()
    }

    fn request(cash_type: CashType, value: &str, amount: u32) -> DepositRequest {
        DepositRequest::new(cash_type, Decimal::from_str(value).unwrap(), amount)
    }

    fn standard_batch() -> Vec<DepositRequest> {
        vec![
            request(CashType::Bill, "100", 2),
            request(CashType::Coin, "2", 1),
            request(CashType::Coin, "0.2", 5),
        ]
    }

    fn rows(view: &WealthView) -> Vec<(CashType, String, u32)> {
        view.cashes
            .iter()
            .map(|line| (line.cash_type, format_money(line.value), line.amount))
            .collect()
    }

    fn expected_rows(two_euro_coins: u32) -> Vec<(CashType, String, u32)> {
        vec![
            (CashType::Coin, "0.20".to_string(), 5),
            (CashType::Coin, "2.00".to_string(), two_euro_coins),
            (CashType::Bill, "100.00".to_string(), 2),
        ]
    }

    #[test]
    fn test_create_and_get() {
        let mut service = service();
        let created = service.create("Moneybox test").unwrap();

        let fetched = service.get(created.id).unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.name, "Moneybox test");
        assert!(!fetched.broken);
    }

    #[test]
    fn test_create_requires_name() {
        let mut service = service();
        let err = service.create("").unwrap_err();

        match err {
            MoneyBoxError::InvalidInput { field, message } => {
                assert_eq!(field, "name");
                assert_eq!(message, "This field is required.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_get_not_found() {
        let service = service();
        assert!(matches!(service.get(111_111), Err(MoneyBoxError::NotFound(111_111))));
    }

    #[test]
    fn test_list_newest_first() {
        let mut service = service();
        let ids: Vec<i64> = (1..=5)
            .map(|n| service.create(&format!("Moneybox test {}", n)).unwrap().id)
            .collect();

        let listed: Vec<i64> = service.list().unwrap().iter().map(|b| b.id).collect();

        let mut expected = ids;
        expected.reverse();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_deposit_into_new_box() {
        let mut service = service();
        let id = service.create("Moneybox test").unwrap().id;

        let view = service.deposit(id, &standard_batch()).unwrap();

        assert_eq!(view.formatted_wealth(), "203.00");
        assert_eq!(rows(&view), expected_rows(1));
        assert_eq!(service.shake(id).unwrap(), view);
    }

    #[test]
    fn test_deposit_with_existing_content() {
        let mut service = service();
        let id = service.create("Moneybox test").unwrap().id;
        service
            .deposit(id, &[request(CashType::Coin, "2", 2)])
            .unwrap();

        let view = service.deposit(id, &standard_batch()).unwrap();

        assert_eq!(view.formatted_wealth(), "207.00");
        assert_eq!(rows(&view), expected_rows(3));
    }

    #[test]
    fn test_deposit_duplicate_requests_in_one_batch() {
        let mut service = service();
        let id = service.create("Moneybox test").unwrap().id;

        let view = service
            .deposit(
                id,
                &[request(CashType::Coin, "2.00", 1), request(CashType::Coin, "2.00", 1)],
            )
            .unwrap();

        assert_eq!(view.cashes.len(), 1);
        assert_eq!(view.cashes[0].amount, 2);
        assert_eq!(view.formatted_wealth(), "4.00");
    }

    #[test]
    fn test_deposit_unknown_denomination_changes_nothing() {
        let mut service = service();
        let id = service.create("Moneybox test").unwrap().id;
        service
            .deposit(id, &[request(CashType::Coin, "2", 2)])
            .unwrap();
        let before = service.get(id).unwrap();

        let mut batch = standard_batch();
        batch.push(request(CashType::Coin, "30", 1));
        let err = service.deposit(id, &batch).unwrap_err();

        assert_eq!(err.to_string(), "The coin with the value 30.00 does not exist.");
        let after = service.shake(id).unwrap();
        assert_eq!(after.formatted_wealth(), "4.00");
        assert_eq!(after.cashes.len(), 1);
        assert_eq!(service.get(id).unwrap().updated_at, before.updated_at);
    }

    #[test]
    fn test_deposit_not_found() {
        let mut service = service();
        assert!(matches!(
            service.deposit(111, &standard_batch()),
            Err(MoneyBoxError::NotFound(111))
        ));
    }

    #[test]
    fn test_deposit_and_shake_on_broken_box() {
        let mut service = service();
        let id = service.create("Moneybox test").unwrap().id;
        service.break_box(id).unwrap();

        assert!(matches!(
            service.deposit(id, &standard_batch()),
            Err(MoneyBoxError::BoxBroken(_))
        ));
        assert!(matches!(service.shake(id), Err(MoneyBoxError::BoxBroken(_))));
    }

    #[test]
    fn test_break_returns_snapshot_and_empties_box() {
        let mut service = service();
        let id = service.create("Moneybox test").unwrap().id;
        service.deposit(id, &standard_batch()).unwrap();

        let snapshot = service.break_box(id).unwrap();

        assert_eq!(snapshot.formatted_wealth(), "203.00");
        assert_eq!(rows(&snapshot), expected_rows(1));

        let summary = service.get(id).unwrap();
        assert!(summary.broken);

        let reloaded = service.store.load_box(id).unwrap().unwrap();
        assert!(reloaded.line_items().is_empty());
        assert_eq!(reloaded.contents().formatted_wealth(), "0.00");
    }

    #[test]
    fn test_break_twice() {
        let mut service = service();
        let id = service.create("Moneybox test").unwrap().id;
        service.break_box(id).unwrap();

        assert!(matches!(service.break_box(id), Err(MoneyBoxError::AlreadyBroken(_))));
        assert!(matches!(service.break_box(404), Err(MoneyBoxError::NotFound(404))));
    }

    #[test]
    fn test_boxes_are_independent() {
        let mut service = service();
        let first = service.create("First").unwrap().id;
        let second = service.create("Second").unwrap().id;

        service.deposit(first, &standard_batch()).unwrap();
        service.break_box(second).unwrap();

        assert_eq!(service.shake(first).unwrap().formatted_wealth(), "203.00");
        assert!(!service.get(first).unwrap().broken);
    }

    #[test]
    fn test_catalog_is_loaded_from_store() {
        let service = service();
        let two_euro = Denomination::new(CashType::Coin, Decimal::from_str("2").unwrap());

        assert_eq!(service.catalog().len(), 15);
        assert_eq!(service.catalog().find(CashType::Coin, two_euro.value), Some(&two_euro));
    }
}
