use super::in_memory::today;
use crate::domain::balance;
use crate::domain::debt::{Debt, DebtChanges, DebtId, NewDebt};
use crate::domain::income::{Income, NewIncome};
use crate::domain::payment::{
    DebtPayments, NewPayment, Payment, PaymentChanges, PaymentFilter, PaymentId, PaymentReceipt,
};
use crate::domain::ports::{DebtStore, IncomeStore, PaymentStore, Repository};
use crate::domain::user::UserId;
use crate::error::{Result, ZenithError};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Column Family for storing debts.
pub const CF_DEBTS: &str = "debts";
/// Column Family for storing payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing incomes.
pub const CF_INCOMES: &str = "incomes";

/// A persistent repository backed by RocksDB.
///
/// Debts, payments and incomes live in separate Column Families, keyed by
/// their id in big-endian so iteration follows id order. Values are JSON.
///
/// Mutations are serialized through a lock so that a payment is validated and
/// written against the same balance; multi-record writes go through a
/// `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

fn key(id: u32) -> [u8; 4] {
    id.to_be_bytes()
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_DEBTS, CF_PAYMENTS, CF_INCOMES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            ZenithError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn get<T: DeserializeOwned>(&self, family: &str, id: u32) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match self.db.get_pinned_cf(cf, key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn all<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.cf(family)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn put<T: Serialize>(&self, batch: &mut WriteBatch, family: &str, id: u32, value: &T) -> Result<()> {
        let cf = self.cf(family)?;
        batch.put_cf(cf, key(id), serde_json::to_vec(value)?);
        Ok(())
    }

    fn next_id(&self, family: &str) -> Result<u32> {
        let cf = self.cf(family)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (last, _value) = item?;
                let bytes: [u8; 4] = last.as_ref().try_into().map_err(|_| {
                    ZenithError::InternalError(Box::new(std::io::Error::other(format!(
                        "malformed key in {}",
                        family
                    ))))
                })?;
                Ok(u32::from_be_bytes(bytes) + 1)
            }
            None => Ok(1),
        }
    }

    fn require_debt(&self, id: DebtId) -> Result<Debt> {
        self.get(CF_DEBTS, id)?
            .ok_or(ZenithError::NotFound { entity: "debt", id })
    }

    fn payments_of(&self, debt_id: DebtId) -> Result<Vec<Payment>> {
        Ok(self
            .all::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.debt_id == debt_id)
            .collect())
    }
}

#[async_trait]
impl DebtStore for RocksDbStore {
    async fn list_debts(&self, user_id: UserId) -> Result<Vec<Debt>> {
        Ok(self
            .all::<Debt>(CF_DEBTS)?
            .into_iter()
            .filter(|d| d.user_id == user_id)
            .collect())
    }

    async fn get_debt(&self, id: DebtId) -> Result<Option<Debt>> {
        self.get(CF_DEBTS, id)
    }

    async fn create_debt(&self, debt: NewDebt) -> Result<Debt> {
        debt.validate()?;
        let _guard = self.writer.lock().await;
        let debt = debt.into_debt(self.next_id(CF_DEBTS)?, today());
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_DEBTS, debt.id, &debt)?;
        self.db.write(batch)?;
        debug!(debt = debt.id, "stored debt");
        Ok(debt)
    }

    async fn update_debt(&self, id: DebtId, changes: DebtChanges) -> Result<Debt> {
        let _guard = self.writer.lock().await;
        let mut debt = self.require_debt(id)?;
        let payments = self.payments_of(id)?;
        changes.validate_for(&debt, !payments.is_empty())?;
        changes.apply_to(&mut debt);
        debt.state = balance::state_for(&debt, &payments);
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_DEBTS, id, &debt)?;
        self.db.write(batch)?;
        Ok(debt)
    }

    async fn delete_debt(&self, id: DebtId) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.require_debt(id)?;
        let payments = self.payments_of(id)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_DEBTS)?, key(id));
        let payments_cf = self.cf(CF_PAYMENTS)?;
        for payment in &payments {
            batch.delete_cf(payments_cf, key(payment.id));
        }
        self.db.write(batch)?;
        debug!(debt = id, payments = payments.len(), "deleted debt");
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>> {
        let owned: Option<Vec<DebtId>> = match filter.user_id {
            Some(user) => Some(self.list_debts(user).await?.iter().map(|d| d.id).collect()),
            None => None,
        };
        let mut payments: Vec<Payment> = self
            .all::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| filter.debt_id.is_none_or(|id| p.debt_id == id))
            .filter(|p| owned.as_ref().is_none_or(|ids| ids.contains(&p.debt_id)))
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    async fn payments_for_debt(&self, debt_id: DebtId) -> Result<DebtPayments> {
        let debt = self.require_debt(debt_id)?;
        let mut payments = self.payments_of(debt_id)?;
        let total_paid = balance::total_paid(&debt, &payments);
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at).then(b.id.cmp(&a.id)));
        Ok(DebtPayments {
            payments,
            total_paid,
        })
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentReceipt> {
        let _guard = self.writer.lock().await;
        let mut debt = self.require_debt(payment.debt_id)?;
        payment.validate_for(&debt.currency)?;
        let prior = self.payments_of(debt.id)?;
        let settlement = balance::settle(&debt, &prior, payment.settled_amount(&debt.currency))?;

        let payment = payment.into_payment(
            self.next_id(CF_PAYMENTS)?,
            settlement.remaining_after,
            Utc::now(),
        );
        debt.state = settlement.state;

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_PAYMENTS, payment.id, &payment)?;
        self.put(&mut batch, CF_DEBTS, debt.id, &debt)?;
        self.db.write(batch)?;

        Ok(PaymentReceipt {
            payment,
            new_balance: settlement.remaining_after,
            debt_state: settlement.state,
        })
    }

    async fn update_payment(&self, id: PaymentId, changes: PaymentChanges) -> Result<PaymentReceipt> {
        let _guard = self.writer.lock().await;
        let current: Payment = self
            .get(CF_PAYMENTS, id)?
            .ok_or(ZenithError::NotFound { entity: "payment", id })?;
        let mut debt = self.require_debt(current.debt_id)?;
        let mut updated = changes.applied_to(&current);
        let outcome = balance::resettle(&debt, &self.payments_of(debt.id)?, &updated)?;
        updated.remaining_after = outcome.snapshot;
        debt.state = outcome.state;

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_PAYMENTS, id, &updated)?;
        self.put(&mut batch, CF_DEBTS, debt.id, &debt)?;
        self.db.write(batch)?;

        Ok(PaymentReceipt {
            payment: updated,
            new_balance: outcome.remaining,
            debt_state: outcome.state,
        })
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<()> {
        let _guard = self.writer.lock().await;
        let payment: Payment = self
            .get(CF_PAYMENTS, id)?
            .ok_or(ZenithError::NotFound { entity: "payment", id })?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_PAYMENTS)?, key(id));
        if let Some(mut debt) = self.get::<Debt>(CF_DEBTS, payment.debt_id)? {
            let left: Vec<Payment> = self
                .payments_of(debt.id)?
                .into_iter()
                .filter(|p| p.id != id)
                .collect();
            debt.state = balance::state_for(&debt, &left);
            self.put(&mut batch, CF_DEBTS, debt.id, &debt)?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl IncomeStore for RocksDbStore {
    async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>> {
        let mut incomes: Vec<Income> = self
            .all::<Income>(CF_INCOMES)?
            .into_iter()
            .filter(|i| i.user_id == user_id)
            .collect();
        incomes.sort_by(|a, b| b.received_on.cmp(&a.received_on).then(b.id.cmp(&a.id)));
        Ok(incomes)
    }

    async fn create_income(&self, income: NewIncome) -> Result<Income> {
        income.validate()?;
        let _guard = self.writer.lock().await;
        let income = income.into_income(self.next_id(CF_INCOMES)?, today());
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_INCOMES, income.id, &income)?;
        self.db.write(batch)?;
        Ok(income)
    }
}

#[async_trait]
impl Repository for RocksDbStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::debt::DebtState;
    use crate::domain::money::{Amount, Currency};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn new_debt(principal: rust_decimal::Decimal) -> NewDebt {
        NewDebt {
            user_id: 1,
            description: "Loan".to_string(),
            creditor: "Bank".to_string(),
            principal,
            currency: Currency::new("USD").unwrap(),
            due_on: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            reminder: false,
            interest_rate: None,
        }
    }

    fn pay(debt_id: DebtId, amount: rust_decimal::Decimal) -> NewPayment {
        NewPayment::new(debt_id, Amount::new(amount).unwrap(), Currency::new("USD").unwrap())
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_DEBTS).is_some());
        assert!(store.db.cf_handle(CF_PAYMENTS).is_some());
        assert!(store.db.cf_handle(CF_INCOMES).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_payment_flow() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let debt = store.create_debt(new_debt(dec!(500))).await.unwrap();
        let receipt = store.create_payment(pay(debt.id, dec!(200))).await.unwrap();
        assert_eq!(receipt.new_balance, dec!(300));
        assert_eq!(receipt.debt_state, DebtState::InProgress);

        assert!(store.create_payment(pay(debt.id, dec!(301))).await.is_err());

        let receipt = store.create_payment(pay(debt.id, dec!(300))).await.unwrap();
        assert_eq!(receipt.payment.id, 2);
        assert_eq!(receipt.debt_state, DebtState::Paid);

        let listing = store.payments_for_debt(debt.id).await.unwrap();
        assert_eq!(listing.total_paid, dec!(500));
    }

    #[tokio::test]
    async fn test_rocksdb_edits_respect_balance_and_currency() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let debt = store.create_debt(new_debt(dec!(100))).await.unwrap();
        let first = store.create_payment(pay(debt.id, dec!(60))).await.unwrap();
        store.create_payment(pay(debt.id, dec!(20))).await.unwrap();

        let too_much = PaymentChanges {
            amount: Some(Amount::new(dec!(81)).unwrap()),
            ..Default::default()
        };
        assert!(store.update_payment(first.payment.id, too_much).await.is_err());

        let changes = PaymentChanges {
            amount: Some(Amount::new(dec!(50)).unwrap()),
            ..Default::default()
        };
        let receipt = store.update_payment(first.payment.id, changes).await.unwrap();
        assert_eq!(receipt.payment.remaining_after, dec!(50));
        assert_eq!(receipt.new_balance, dec!(30));

        let to_mxn = DebtChanges {
            currency: Some(Currency::new("MXN").unwrap()),
            ..Default::default()
        };
        assert!(store.update_debt(debt.id, to_mxn).await.is_err());
        let stored = store.get_debt(debt.id).await.unwrap().unwrap();
        assert_eq!(stored.currency, Currency::new("USD").unwrap());
    }

    #[tokio::test]
    async fn test_rocksdb_cascade_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            let first = store.create_debt(new_debt(dec!(100))).await.unwrap();
            let second = store.create_debt(new_debt(dec!(100))).await.unwrap();
            store.create_payment(pay(first.id, dec!(10))).await.unwrap();
            store.create_payment(pay(second.id, dec!(10))).await.unwrap();
            store.delete_debt(first.id).await.unwrap();
        }

        let store = RocksDbStore::open(dir.path()).unwrap();
        let debts = store.list_debts(1).await.unwrap();
        assert_eq!(debts.len(), 1);
        let payments = store.list_payments(PaymentFilter::for_user(1)).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].debt_id, debts[0].id);

        // Ids keep growing after a reopen.
        let third = store.create_debt(new_debt(dec!(5))).await.unwrap();
        assert_eq!(third.id, 3);
    }
}
