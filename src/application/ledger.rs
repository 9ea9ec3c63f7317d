use crate::domain::balance::{self, Statement};
use crate::domain::debt::{Debt, DebtChanges, DebtId, DebtState, NewDebt};
use crate::domain::income::{Income, NewIncome};
use crate::domain::money::Currency;
use crate::domain::payment::{
    NewPayment, Payment, PaymentChanges, PaymentFilter, PaymentId, PaymentReceipt,
};
use crate::domain::ports::RepositoryBox;
use crate::domain::summary::{self, CurrencyStats, DashboardSummary, IncomeSummary};
use crate::domain::user::UserId;
use crate::error::{Result, ZenithError};
use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// A debt together with its computed figures.
#[derive(Debug, Clone, PartialEq)]
pub struct DebtView {
    pub debt: Debt,
    pub statement: Statement,
}

/// The application entry point for managing debts, payments and income.
///
/// `Ledger` owns the repository and runs every check that must hold before a
/// request reaches it, so local and remote backends reject the same input.
pub struct Ledger {
    repository: RepositoryBox,
}

impl Ledger {
    pub fn new(repository: RepositoryBox) -> Self {
        Self { repository }
    }

    /// All of the user's debts with their statements, most recent first.
    pub async fn debts(&self, user_id: UserId, today: NaiveDate) -> Result<Vec<DebtView>> {
        let debts = self.repository.list_debts(user_id).await?;
        let payments = self
            .repository
            .list_payments(PaymentFilter::for_user(user_id))
            .await?;

        let mut by_debt: HashMap<DebtId, Vec<Payment>> = HashMap::new();
        for payment in payments {
            by_debt.entry(payment.debt_id).or_default().push(payment);
        }

        let mut views: Vec<DebtView> = debts
            .into_iter()
            .map(|debt| {
                let payments = by_debt.remove(&debt.id).unwrap_or_default();
                let statement = balance::statement(&debt, &payments, today);
                DebtView { debt, statement }
            })
            .collect();
        views.sort_by(|a, b| {
            b.debt
                .registered_on
                .cmp(&a.debt.registered_on)
                .then(b.debt.id.cmp(&a.debt.id))
        });
        Ok(views)
    }

    pub async fn debt(&self, id: DebtId, today: NaiveDate) -> Result<DebtView> {
        let debt = self.require_debt(id).await?;
        let listing = self.repository.payments_for_debt(id).await?;
        let statement = balance::statement(&debt, &listing.payments, today);
        Ok(DebtView { debt, statement })
    }

    pub async fn add_debt(&self, debt: NewDebt) -> Result<Debt> {
        debt.validate()?;
        let debt = self.repository.create_debt(debt).await?;
        info!(debt = debt.id, user = debt.user_id, "debt added");
        Ok(debt)
    }

    pub async fn edit_debt(&self, id: DebtId, changes: DebtChanges) -> Result<Debt> {
        if changes.is_empty() {
            return Err(ZenithError::validation("Nothing to change"));
        }
        let current = self.require_debt(id).await?;
        let listing = self.repository.payments_for_debt(id).await?;
        changes.validate_for(&current, !listing.payments.is_empty())?;
        let debt = self.repository.update_debt(id, changes).await?;
        info!(debt = id, state = %debt.state, "debt updated");
        Ok(debt)
    }

    /// Removes the debt and every payment recorded against it.
    pub async fn remove_debt(&self, id: DebtId) -> Result<()> {
        self.repository.delete_debt(id).await?;
        info!(debt = id, "debt removed");
        Ok(())
    }

    pub async fn record_payment(&self, payment: NewPayment) -> Result<PaymentReceipt> {
        let debt = self.require_debt(payment.debt_id).await?;
        payment.validate_for(&debt.currency)?;
        let prior = self.repository.payments_for_debt(debt.id).await?;
        balance::settle(&debt, &prior.payments, payment.settled_amount(&debt.currency))?;

        let receipt = self.repository.create_payment(payment).await?;
        info!(
            debt = debt.id,
            payment = receipt.payment.id,
            remaining = %receipt.new_balance,
            state = %receipt.debt_state,
            "payment recorded"
        );
        Ok(receipt)
    }

    /// Applies `changes` to one of the user's payments after checking the
    /// edited payment against the rest of the debt's payments.
    pub async fn edit_payment(
        &self,
        user_id: UserId,
        id: PaymentId,
        changes: PaymentChanges,
    ) -> Result<PaymentReceipt> {
        if changes.is_empty() {
            return Err(ZenithError::validation("Nothing to change"));
        }
        let current = self
            .repository
            .list_payments(PaymentFilter::for_user(user_id))
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(ZenithError::NotFound { entity: "payment", id })?;
        let debt = self.require_debt(current.debt_id).await?;
        let listing = self.repository.payments_for_debt(debt.id).await?;
        balance::resettle(&debt, &listing.payments, &changes.applied_to(&current))?;

        let receipt = self.repository.update_payment(id, changes).await?;
        info!(payment = id, state = %receipt.debt_state, "payment updated");
        Ok(receipt)
    }

    pub async fn remove_payment(&self, id: PaymentId) -> Result<()> {
        self.repository.delete_payment(id).await?;
        info!(payment = id, "payment removed");
        Ok(())
    }

    pub async fn payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>> {
        self.repository.list_payments(filter).await
    }

    /// Debts whose description or creditor contains `text`, optionally
    /// restricted to a displayed state.
    pub async fn search_debts(
        &self,
        user_id: UserId,
        text: Option<&str>,
        state: Option<DebtState>,
        today: NaiveDate,
    ) -> Result<Vec<DebtView>> {
        let views = self.debts(user_id, today).await?;
        Ok(views
            .into_iter()
            .filter(|v| text.is_none_or(|t| v.debt.matches(t)))
            .filter(|v| state.is_none_or(|s| v.statement.state == s))
            .collect())
    }

    pub async fn search_payments(
        &self,
        user_id: UserId,
        text: Option<&str>,
        debt_id: Option<DebtId>,
    ) -> Result<Vec<Payment>> {
        let filter = PaymentFilter {
            user_id: Some(user_id),
            debt_id,
        };
        let payments = self.repository.list_payments(filter).await?;
        Ok(payments
            .into_iter()
            .filter(|p| text.is_none_or(|t| p.matches(t)))
            .collect())
    }

    pub async fn payment_stats(&self, user_id: UserId) -> Result<BTreeMap<Currency, CurrencyStats>> {
        let payments = self
            .repository
            .list_payments(PaymentFilter::for_user(user_id))
            .await?;
        Ok(summary::payment_stats(&payments))
    }

    pub async fn dashboard(&self, user_id: UserId) -> Result<DashboardSummary> {
        self.repository.dashboard(user_id).await
    }

    /// Unpaid debts falling due after `today` and within `window_days`,
    /// soonest first.
    pub async fn upcoming_due(
        &self,
        user_id: UserId,
        today: NaiveDate,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<DebtView>> {
        let horizon = today
            .checked_add_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MAX);
        let mut views: Vec<DebtView> = self
            .debts(user_id, today)
            .await?
            .into_iter()
            .filter(|v| v.statement.remaining > rust_decimal::Decimal::ZERO)
            .filter(|v| v.debt.due_on > today && v.debt.due_on < horizon)
            .collect();
        views.sort_by_key(|v| (v.debt.due_on, v.debt.id));
        views.truncate(limit);
        Ok(views)
    }

    pub async fn add_income(&self, income: NewIncome) -> Result<Income> {
        income.validate()?;
        let income = self.repository.create_income(income).await?;
        info!(income = income.id, category = %income.category, "income added");
        Ok(income)
    }

    pub async fn incomes(&self, user_id: UserId) -> Result<Vec<Income>> {
        self.repository.list_incomes(user_id).await
    }

    pub async fn income_summary(&self, user_id: UserId) -> Result<IncomeSummary> {
        let incomes = self.repository.list_incomes(user_id).await?;
        Ok(IncomeSummary::compute(&incomes))
    }

    async fn require_debt(&self, id: DebtId) -> Result<Debt> {
        self.repository
            .get_debt(id)
            .await?
            .ok_or(ZenithError::NotFound { entity: "debt", id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::income::IncomeCategory;
    use crate::domain::money::Amount;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn ledger() -> Ledger {
        Ledger::new(Box::new(InMemoryStore::new()))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn currency(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn new_debt(description: &str, principal: rust_decimal::Decimal, due_on: NaiveDate) -> NewDebt {
        NewDebt {
            user_id: 1,
            description: description.to_string(),
            creditor: "Bank".to_string(),
            principal,
            currency: currency("USD"),
            due_on,
            reminder: false,
            interest_rate: None,
        }
    }

    fn payment(debt_id: DebtId, amount: rust_decimal::Decimal) -> NewPayment {
        NewPayment::new(debt_id, Amount::new(amount).unwrap(), currency("USD"))
    }

    #[tokio::test]
    async fn test_full_payment_with_interest() {
        let ledger = ledger();
        let mut debt = new_debt("Loan", dec!(1000), date(2099, 1, 1));
        debt.interest_rate = Some(dec!(10));
        let debt = ledger.add_debt(debt).await.unwrap();

        let view = ledger.debt(debt.id, date(2025, 1, 1)).await.unwrap();
        assert_eq!(view.statement.total, dec!(1100));

        let receipt = ledger.record_payment(payment(debt.id, dec!(1100))).await.unwrap();
        assert_eq!(receipt.new_balance, dec!(0));
        assert_eq!(receipt.debt_state, DebtState::Paid);

        let err = ledger
            .record_payment(payment(debt.id, dec!(1)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already paid"));
    }

    #[tokio::test]
    async fn test_partial_payment_and_overpayment() {
        let ledger = ledger();
        let debt = ledger
            .add_debt(new_debt("Phone", dec!(500), date(2099, 1, 1)))
            .await
            .unwrap();

        let receipt = ledger.record_payment(payment(debt.id, dec!(200))).await.unwrap();
        assert_eq!(receipt.new_balance, dec!(300));
        assert_eq!(receipt.debt_state, DebtState::InProgress);

        let err = ledger
            .record_payment(payment(debt.id, dec!(300.01)))
            .await
            .unwrap_err();
        assert!(matches!(err, ZenithError::ValidationError(_)));
        assert_eq!(ledger.payments(PaymentFilter::for_debt(debt.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_for_missing_debt() {
        let err = ledger()
            .record_payment(payment(42, dec!(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, ZenithError::NotFound { entity: "debt", id: 42 }));
    }

    #[tokio::test]
    async fn test_foreign_payment_requires_rate() {
        let ledger = ledger();
        let debt = ledger
            .add_debt(new_debt("Trip", dec!(100), date(2099, 1, 1)))
            .await
            .unwrap();

        let mut foreign = NewPayment::new(debt.id, Amount::new(dec!(170)).unwrap(), currency("MXN"));
        assert!(ledger.record_payment(foreign.clone()).await.is_err());

        foreign.exchange_rate = Some(dec!(0.05));
        let receipt = ledger.record_payment(foreign).await.unwrap();
        assert_eq!(receipt.new_balance, dec!(91.5));
    }

    #[tokio::test]
    async fn test_remove_debt_cascades() {
        let ledger = ledger();
        let debt = ledger
            .add_debt(new_debt("Car", dec!(900), date(2099, 1, 1)))
            .await
            .unwrap();
        ledger.record_payment(payment(debt.id, dec!(100))).await.unwrap();

        ledger.remove_debt(debt.id).await.unwrap();
        assert!(ledger.payments(PaymentFilter::for_user(1)).await.unwrap().is_empty());
        assert!(matches!(
            ledger.debt(debt.id, date(2025, 1, 1)).await,
            Err(ZenithError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_and_overdue_state() {
        let ledger = ledger();
        ledger
            .add_debt(new_debt("Credit card", dec!(300), date(2025, 1, 10)))
            .await
            .unwrap();
        ledger
            .add_debt(new_debt("Rent", dec!(800), date(2025, 3, 1)))
            .await
            .unwrap();

        let today = date(2025, 2, 1);
        let overdue = ledger
            .search_debts(1, None, Some(DebtState::Overdue), today)
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].debt.description, "Credit card");

        let by_text = ledger.search_debts(1, Some("RENT"), None, today).await.unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].statement.state, DebtState::Pending);
    }

    #[tokio::test]
    async fn test_upcoming_due_window() {
        let ledger = ledger();
        let today = date(2025, 5, 1);
        for (name, due) in [
            ("today", date(2025, 5, 1)),
            ("soon", date(2025, 5, 3)),
            ("sooner", date(2025, 5, 2)),
            ("edge", date(2025, 5, 8)),
            ("later", date(2025, 6, 1)),
        ] {
            ledger.add_debt(new_debt(name, dec!(50), due)).await.unwrap();
        }
        let paid = ledger
            .add_debt(new_debt("settled", dec!(50), date(2025, 5, 4)))
            .await
            .unwrap();
        ledger.record_payment(payment(paid.id, dec!(50))).await.unwrap();

        let upcoming = ledger.upcoming_due(1, today, 7, 5).await.unwrap();
        let names: Vec<&str> = upcoming.iter().map(|v| v.debt.description.as_str()).collect();
        assert_eq!(names, vec!["sooner", "soon"]);
    }

    #[tokio::test]
    async fn test_payment_stats_and_search() {
        let ledger = ledger();
        let debt = ledger
            .add_debt(new_debt("Laptop", dec!(1000), date(2099, 1, 1)))
            .await
            .unwrap();
        let mut first = payment(debt.id, dec!(100));
        first.note = Some("January instalment".to_string());
        ledger.record_payment(first).await.unwrap();
        ledger.record_payment(payment(debt.id, dec!(300))).await.unwrap();

        let stats = ledger.payment_stats(1).await.unwrap();
        let usd = &stats[&currency("USD")];
        assert_eq!(usd.total, dec!(400));
        assert_eq!(usd.count, 2);
        assert_eq!(usd.average(), dec!(200));

        let found = ledger.search_payments(1, Some("january"), None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount.value(), dec!(100));
    }

    #[tokio::test]
    async fn test_edit_requires_changes() {
        let ledger = ledger();
        let debt = ledger
            .add_debt(new_debt("Sofa", dec!(200), date(2099, 1, 1)))
            .await
            .unwrap();
        assert!(ledger.edit_debt(debt.id, DebtChanges::default()).await.is_err());
        assert!(ledger.edit_payment(1, 1, PaymentChanges::default()).await.is_err());

        let edited = ledger
            .edit_debt(
                debt.id,
                DebtChanges {
                    description: Some("Couch".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.description, "Couch");
    }

    #[tokio::test]
    async fn test_income_summary() {
        let ledger = ledger();
        for (amount, code, category) in [
            (dec!(1000), "USD", IncomeCategory::Salario),
            (dec!(250), "USD", IncomeCategory::Freelance),
            (dec!(5000), "MXN", IncomeCategory::Salario),
        ] {
            ledger
                .add_income(NewIncome {
                    user_id: 1,
                    description: "income".to_string(),
                    amount: Amount::new(amount).unwrap(),
                    currency: currency(code),
                    category,
                    received_on: None,
                })
                .await
                .unwrap();
        }

        let blank = NewIncome {
            user_id: 1,
            description: "  ".to_string(),
            amount: Amount::new(dec!(1)).unwrap(),
            currency: currency("USD"),
            category: IncomeCategory::Otro,
            received_on: None,
        };
        assert!(ledger.add_income(blank).await.is_err());

        let summary = ledger.income_summary(1).await.unwrap();
        assert_eq!(summary.by_currency[&currency("USD")], dec!(1250));
        assert_eq!(summary.by_currency[&currency("MXN")], dec!(5000));
        assert_eq!(
            summary.by_category[&IncomeCategory::Salario][&currency("USD")],
            dec!(1000)
        );
        assert_eq!(ledger.incomes(1).await.unwrap().len(), 3);
    }
}
