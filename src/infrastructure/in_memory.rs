use crate::domain::balance;
use crate::domain::debt::{Debt, DebtChanges, DebtId, NewDebt};
use crate::domain::income::{Income, IncomeId, NewIncome};
use crate::domain::payment::{
    DebtPayments, NewPayment, Payment, PaymentChanges, PaymentFilter, PaymentId, PaymentReceipt,
};
use crate::domain::ports::{DebtStore, IncomeStore, PaymentStore, Repository};
use crate::domain::user::UserId;
use crate::error::{Result, ZenithError};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// The three collections a local store keeps, keyed by id.
///
/// All local backends share these operations so that id assignment, cascade
/// deletes and balance bookkeeping behave the same everywhere.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    pub debts: BTreeMap<DebtId, Debt>,
    pub payments: BTreeMap<PaymentId, Payment>,
    pub incomes: BTreeMap<IncomeId, Income>,
}

fn next_id<V>(map: &BTreeMap<u32, V>) -> u32 {
    map.keys().next_back().map_or(1, |id| id + 1)
}

fn newest_first(payments: &mut [Payment]) {
    payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at).then(b.id.cmp(&a.id)));
}

impl Tables {
    pub fn debts_of(&self, user_id: UserId) -> Vec<Debt> {
        self.debts
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn payments_of_debt(&self, debt_id: DebtId) -> Vec<Payment> {
        self.payments
            .values()
            .filter(|p| p.debt_id == debt_id)
            .cloned()
            .collect()
    }

    pub fn list_payments(&self, filter: PaymentFilter) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| filter.debt_id.is_none_or(|id| p.debt_id == id))
            .filter(|p| {
                filter.user_id.is_none_or(|user| {
                    self.debts
                        .get(&p.debt_id)
                        .is_some_and(|d| d.user_id == user)
                })
            })
            .cloned()
            .collect();
        newest_first(&mut payments);
        payments
    }

    pub fn debt_payments(&self, debt_id: DebtId) -> Result<DebtPayments> {
        let debt = self.debt(debt_id)?;
        let mut payments = self.payments_of_debt(debt_id);
        let total_paid = balance::total_paid(debt, &payments);
        newest_first(&mut payments);
        Ok(DebtPayments {
            payments,
            total_paid,
        })
    }

    fn debt(&self, id: DebtId) -> Result<&Debt> {
        self.debts.get(&id).ok_or(ZenithError::NotFound { entity: "debt", id })
    }

    fn debt_mut(&mut self, id: DebtId) -> Result<&mut Debt> {
        self.debts
            .get_mut(&id)
            .ok_or(ZenithError::NotFound { entity: "debt", id })
    }

    pub fn insert_debt(&mut self, new: NewDebt, today: NaiveDate) -> Result<Debt> {
        new.validate()?;
        let id = next_id(&self.debts);
        let debt = new.into_debt(id, today);
        self.debts.insert(id, debt.clone());
        Ok(debt)
    }

    pub fn update_debt(&mut self, id: DebtId, changes: DebtChanges) -> Result<Debt> {
        let payments = self.payments_of_debt(id);
        let debt = self.debt_mut(id)?;
        changes.validate_for(debt, !payments.is_empty())?;
        changes.apply_to(debt);
        debt.state = balance::state_for(debt, &payments);
        Ok(debt.clone())
    }

    pub fn remove_debt(&mut self, id: DebtId) -> Result<usize> {
        self.debts
            .remove(&id)
            .ok_or(ZenithError::NotFound { entity: "debt", id })?;
        let before = self.payments.len();
        self.payments.retain(|_, p| p.debt_id != id);
        Ok(before - self.payments.len())
    }

    pub fn insert_payment(&mut self, new: NewPayment, now: DateTime<Utc>) -> Result<PaymentReceipt> {
        let debt = self.debt(new.debt_id)?;
        new.validate_for(&debt.currency)?;
        let prior = self.payments_of_debt(debt.id);
        let settlement = balance::settle(debt, &prior, new.settled_amount(&debt.currency))?;

        let id = next_id(&self.payments);
        let payment = new.into_payment(id, settlement.remaining_after, now);
        self.payments.insert(id, payment.clone());
        self.debt_mut(payment.debt_id)?.state = settlement.state;

        Ok(PaymentReceipt {
            payment,
            new_balance: settlement.remaining_after,
            debt_state: settlement.state,
        })
    }

    pub fn update_payment(&mut self, id: PaymentId, changes: PaymentChanges) -> Result<PaymentReceipt> {
        let current = self
            .payments
            .get(&id)
            .ok_or(ZenithError::NotFound { entity: "payment", id })?;
        let debt = self.debt(current.debt_id)?;
        let mut updated = changes.applied_to(current);
        let outcome = balance::resettle(debt, &self.payments_of_debt(debt.id), &updated)?;
        updated.remaining_after = outcome.snapshot;

        self.payments.insert(id, updated.clone());
        self.debt_mut(updated.debt_id)?.state = outcome.state;

        Ok(PaymentReceipt {
            payment: updated,
            new_balance: outcome.remaining,
            debt_state: outcome.state,
        })
    }

    pub fn remove_payment(&mut self, id: PaymentId) -> Result<()> {
        let removed = self
            .payments
            .remove(&id)
            .ok_or(ZenithError::NotFound { entity: "payment", id })?;
        let remaining = self.payments_of_debt(removed.debt_id);
        if let Ok(debt) = self.debt_mut(removed.debt_id) {
            debt.state = balance::state_for(debt, &remaining);
        }
        Ok(())
    }

    pub fn incomes_of(&self, user_id: UserId) -> Vec<Income> {
        let mut incomes: Vec<Income> = self
            .incomes
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        incomes.sort_by(|a, b| b.received_on.cmp(&a.received_on).then(b.id.cmp(&a.id)));
        incomes
    }

    pub fn insert_income(&mut self, new: NewIncome, today: NaiveDate) -> Result<Income> {
        new.validate()?;
        let id = next_id(&self.incomes);
        let income = new.into_income(id, today);
        self.incomes.insert(id, income.clone());
        Ok(income)
    }
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// A thread-safe in-memory repository.
///
/// Uses `Arc<RwLock<Tables>>` so clones share the same data. Nothing survives
/// the process; useful for tests and one-off CSV imports.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }
}

#[async_trait]
impl DebtStore for InMemoryStore {
    async fn list_debts(&self, user_id: UserId) -> Result<Vec<Debt>> {
        Ok(self.tables.read().await.debts_of(user_id))
    }

    async fn get_debt(&self, id: DebtId) -> Result<Option<Debt>> {
        Ok(self.tables.read().await.debts.get(&id).cloned())
    }

    async fn create_debt(&self, debt: NewDebt) -> Result<Debt> {
        let debt = self.tables.write().await.insert_debt(debt, today())?;
        debug!(debt = debt.id, "stored debt");
        Ok(debt)
    }

    async fn update_debt(&self, id: DebtId, changes: DebtChanges) -> Result<Debt> {
        self.tables.write().await.update_debt(id, changes)
    }

    async fn delete_debt(&self, id: DebtId) -> Result<()> {
        let removed = self.tables.write().await.remove_debt(id)?;
        debug!(debt = id, payments = removed, "deleted debt");
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>> {
        Ok(self.tables.read().await.list_payments(filter))
    }

    async fn payments_for_debt(&self, debt_id: DebtId) -> Result<DebtPayments> {
        self.tables.read().await.debt_payments(debt_id)
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentReceipt> {
        self.tables.write().await.insert_payment(payment, Utc::now())
    }

    async fn update_payment(&self, id: PaymentId, changes: PaymentChanges) -> Result<PaymentReceipt> {
        self.tables.write().await.update_payment(id, changes)
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<()> {
        self.tables.write().await.remove_payment(id)
    }
}

#[async_trait]
impl IncomeStore for InMemoryStore {
    async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>> {
        Ok(self.tables.read().await.incomes_of(user_id))
    }

    async fn create_income(&self, income: NewIncome) -> Result<Income> {
        self.tables.write().await.insert_income(income, today())
    }
}

#[async_trait]
impl Repository for InMemoryStore {}
