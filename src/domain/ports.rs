use super::debt::{Debt, DebtChanges, DebtId, NewDebt};
use super::income::{Income, NewIncome};
use super::payment::{
    DebtPayments, NewPayment, Payment, PaymentChanges, PaymentFilter, PaymentId, PaymentReceipt,
};
use super::summary::DashboardSummary;
use super::user::UserId;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DebtStore: Send + Sync {
    async fn list_debts(&self, user_id: UserId) -> Result<Vec<Debt>>;
    async fn get_debt(&self, id: DebtId) -> Result<Option<Debt>>;
    async fn create_debt(&self, debt: NewDebt) -> Result<Debt>;
    async fn update_debt(&self, id: DebtId, changes: DebtChanges) -> Result<Debt>;
    /// Deletes the debt together with every payment recorded against it.
    async fn delete_debt(&self, id: DebtId) -> Result<()>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>>;
    async fn payments_for_debt(&self, debt_id: DebtId) -> Result<DebtPayments>;
    /// Records the payment and moves the debt to its new state.
    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentReceipt>;
    async fn update_payment(&self, id: PaymentId, changes: PaymentChanges)
    -> Result<PaymentReceipt>;
    async fn delete_payment(&self, id: PaymentId) -> Result<()>;
}

#[async_trait]
pub trait IncomeStore: Send + Sync {
    async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>>;
    async fn create_income(&self, income: NewIncome) -> Result<Income>;
}

/// Everything the application needs from a backend, local or remote.
#[async_trait]
pub trait Repository: DebtStore + PaymentStore + IncomeStore {
    async fn dashboard(&self, user_id: UserId) -> Result<DashboardSummary> {
        let debts = self.list_debts(user_id).await?;
        let payments = self.list_payments(PaymentFilter::for_user(user_id)).await?;
        Ok(DashboardSummary::compute(&debts, &payments))
    }
}

pub type RepositoryBox = Box<dyn Repository>;
pub type RepositoryFactory = Box<dyn Fn() -> RepositoryBox + Send + Sync>;
