use super::balance::{remaining_balance, total_due, total_paid};
use super::debt::{Debt, DebtState};
use super::income::{Income, IncomeCategory};
use super::money::Currency;
use super::payment::Payment;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate figures for a user's debts, as served by `GET /dashboard/:id`.
///
/// Sums add raw amounts across currencies, the same way the backend does.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct DashboardSummary {
    #[serde(rename = "total_deudas")]
    pub total_debt: Decimal,
    #[serde(rename = "total_abonado")]
    pub total_paid: Decimal,
    #[serde(rename = "saldo_pendiente")]
    pub outstanding: Decimal,
    #[serde(rename = "cantidad_deudas")]
    pub debt_count: usize,
    #[serde(rename = "deudas_pendientes")]
    pub unpaid_count: usize,
    #[serde(rename = "deudas_pagadas")]
    pub paid_count: usize,
}

impl DashboardSummary {
    pub fn compute(debts: &[Debt], payments: &[Payment]) -> Self {
        let mut summary = Self {
            debt_count: debts.len(),
            ..Self::default()
        };
        for debt in debts {
            summary.total_debt += total_due(debt);
            summary.total_paid += total_paid(debt, payments);
            summary.outstanding += remaining_balance(debt, payments);
            if debt.state == DebtState::Paid {
                summary.paid_count += 1;
            } else {
                summary.unpaid_count += 1;
            }
        }
        summary
    }
}

/// Payment totals for one currency.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurrencyStats {
    pub total: Decimal,
    pub count: usize,
}

impl CurrencyStats {
    pub fn average(&self) -> Decimal {
        if self.count == 0 {
            Decimal::ZERO
        } else {
            self.total / Decimal::from(self.count)
        }
    }
}

/// Totals and averages of payments, grouped by the currency they were made in.
pub fn payment_stats(payments: &[Payment]) -> BTreeMap<Currency, CurrencyStats> {
    let mut stats: BTreeMap<Currency, CurrencyStats> = BTreeMap::new();
    for payment in payments {
        let entry = stats.entry(payment.currency.clone()).or_default();
        entry.total += payment.amount.value();
        entry.count += 1;
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncomeSummary {
    pub by_currency: BTreeMap<Currency, Decimal>,
    pub by_category: BTreeMap<IncomeCategory, BTreeMap<Currency, Decimal>>,
}

impl IncomeSummary {
    pub fn compute(incomes: &[Income]) -> Self {
        let mut summary = Self::default();
        for income in incomes {
            *summary
                .by_currency
                .entry(income.currency.clone())
                .or_default() += income.amount.value();
            *summary
                .by_category
                .entry(income.category)
                .or_default()
                .entry(income.currency.clone())
                .or_default() += income.amount.value();
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::payment::NewPayment;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn currency(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn debt(id: u32, principal: Decimal, state: DebtState) -> Debt {
        Debt {
            id,
            user_id: 1,
            description: format!("Debt {}", id),
            creditor: String::new(),
            principal,
            currency: currency("USD"),
            registered_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            due_on: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            state,
            reminder: false,
            interest_applied: false,
            interest_rate: Decimal::ZERO,
        }
    }

    fn payment(debt_id: u32, amount: Decimal, code: &str) -> Payment {
        let mut new = NewPayment::new(debt_id, Amount::new(amount).unwrap(), currency(code));
        new.exchange_rate = Some(Decimal::ONE);
        new.into_payment(0, Decimal::ZERO, Utc::now())
    }

    #[test]
    fn test_dashboard_compute() {
        let debts = vec![
            debt(1, dec!(100), DebtState::Paid),
            debt(2, dec!(300), DebtState::InProgress),
            debt(3, dec!(50), DebtState::Pending),
        ];
        let payments = vec![payment(1, dec!(100), "USD"), payment(2, dec!(120), "USD")];
        let summary = DashboardSummary::compute(&debts, &payments);
        assert_eq!(summary.total_debt, dec!(450));
        assert_eq!(summary.total_paid, dec!(220));
        assert_eq!(summary.outstanding, dec!(230));
        assert_eq!(summary.debt_count, 3);
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.unpaid_count, 2);
    }

    #[test]
    fn test_payment_stats_by_currency() {
        let payments = vec![
            payment(1, dec!(100), "USD"),
            payment(1, dec!(50), "USD"),
            payment(2, dec!(900), "MXN"),
        ];
        let stats = payment_stats(&payments);
        let usd = &stats[&currency("USD")];
        assert_eq!(usd.total, dec!(150));
        assert_eq!(usd.count, 2);
        assert_eq!(usd.average(), dec!(75));
        assert_eq!(stats[&currency("MXN")].count, 1);
    }

    #[test]
    fn test_dashboard_wire_format() {
        let json = r#"{"total_deudas": 1500, "total_abonado": "200.5", "saldo_pendiente": 1299.5,
            "cantidad_deudas": 2, "deudas_pendientes": 1, "deudas_pagadas": 1}"#;
        let summary: DashboardSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.outstanding, dec!(1299.5));
        assert_eq!(summary.paid_count, 1);
    }
}
