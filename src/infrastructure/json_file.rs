use super::in_memory::{Tables, today};
use crate::domain::debt::{Debt, DebtChanges, DebtId, NewDebt};
use crate::domain::income::{Income, NewIncome};
use crate::domain::payment::{
    DebtPayments, NewPayment, Payment, PaymentChanges, PaymentFilter, PaymentId, PaymentReceipt,
};
use crate::domain::ports::{DebtStore, IncomeStore, PaymentStore, Repository};
use crate::domain::user::UserId;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A repository persisted as a single JSON document.
///
/// The whole data set is held in memory and rewritten after every mutation,
/// through a temporary file and a rename so a crash never leaves a truncated
/// document behind. Suited to the data volume of one person's finances.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    tables: Arc<RwLock<Tables>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "starting a new data file");
                Tables::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            tables: Arc::new(RwLock::new(tables)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(tables)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "data file written");
        Ok(())
    }

    /// Runs `op` under the write lock and persists only if it succeeded.
    async fn mutate<T>(&self, op: impl FnOnce(&mut Tables) -> Result<T> + Send) -> Result<T> {
        let mut tables = self.tables.write().await;
        let mut draft = tables.clone();
        let value = op(&mut draft)?;
        self.persist(&draft).await?;
        *tables = draft;
        Ok(value)
    }
}

#[async_trait]
impl DebtStore for JsonFileStore {
    async fn list_debts(&self, user_id: UserId) -> Result<Vec<Debt>> {
        Ok(self.tables.read().await.debts_of(user_id))
    }

    async fn get_debt(&self, id: DebtId) -> Result<Option<Debt>> {
        Ok(self.tables.read().await.debts.get(&id).cloned())
    }

    async fn create_debt(&self, debt: NewDebt) -> Result<Debt> {
        let today = today();
        self.mutate(|t| t.insert_debt(debt, today)).await
    }

    async fn update_debt(&self, id: DebtId, changes: DebtChanges) -> Result<Debt> {
        self.mutate(|t| t.update_debt(id, changes)).await
    }

    async fn delete_debt(&self, id: DebtId) -> Result<()> {
        self.mutate(|t| t.remove_debt(id)).await.map(|_| ())
    }
}

#[async_trait]
impl PaymentStore for JsonFileStore {
    async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>> {
        Ok(self.tables.read().await.list_payments(filter))
    }

    async fn payments_for_debt(&self, debt_id: DebtId) -> Result<DebtPayments> {
        self.tables.read().await.debt_payments(debt_id)
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentReceipt> {
        let now = Utc::now();
        self.mutate(|t| t.insert_payment(payment, now)).await
    }

    async fn update_payment(&self, id: PaymentId, changes: PaymentChanges) -> Result<PaymentReceipt> {
        self.mutate(|t| t.update_payment(id, changes)).await
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<()> {
        self.mutate(|t| t.remove_payment(id)).await
    }
}

#[async_trait]
impl IncomeStore for JsonFileStore {
    async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>> {
        Ok(self.tables.read().await.incomes_of(user_id))
    }

    async fn create_income(&self, income: NewIncome) -> Result<Income> {
        let today = today();
        self.mutate(|t| t.insert_income(income, today)).await
    }
}

#[async_trait]
impl Repository for JsonFileStore {}
