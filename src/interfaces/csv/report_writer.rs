use crate::application::ledger::DebtView;
use crate::domain::exchange::Quote;
use crate::domain::income::Income;
use crate::domain::money::Currency;
use crate::domain::payment::Payment;
use crate::domain::summary::{CurrencyStats, DashboardSummary, IncomeSummary};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Amounts are written rounded to cents without trailing zeros.
fn money(value: Decimal) -> String {
    value.round_dp(2).normalize().to_string()
}

#[derive(Serialize)]
struct DebtRow<'a> {
    id: u32,
    description: &'a str,
    creditor: &'a str,
    currency: &'a str,
    principal: String,
    interest: String,
    total: String,
    paid: String,
    remaining: String,
    progress: String,
    state: &'static str,
    registered_on: String,
    due_on: String,
}

#[derive(Serialize)]
struct PaymentRow<'a> {
    id: u32,
    debt: u32,
    paid_at: String,
    amount: String,
    currency: &'a str,
    rate: Option<String>,
    remaining_after: String,
    note: Option<&'a str>,
}

#[derive(Serialize)]
struct IncomeRow<'a> {
    id: u32,
    date: String,
    description: &'a str,
    category: &'static str,
    amount: String,
    currency: &'a str,
}

#[derive(Serialize)]
struct StatsRow<'a> {
    currency: &'a str,
    total: String,
    count: usize,
    average: String,
}

#[derive(Serialize)]
struct DashboardRow {
    total_debt: String,
    total_paid: String,
    outstanding: String,
    debt_count: usize,
    unpaid_count: usize,
    paid_count: usize,
}

#[derive(Serialize)]
struct QuoteRow<'a> {
    code: &'a str,
    name: &'a str,
    symbol: &'a str,
    value: String,
    change: String,
}

/// Writes listings and reports as CSV, one header row per report.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_debts(&mut self, views: &[DebtView]) -> Result<()> {
        if views.is_empty() {
            self.header(&[
                "id", "description", "creditor", "currency", "principal", "interest", "total",
                "paid", "remaining", "progress", "state", "registered_on", "due_on",
            ])?;
        }
        for view in views {
            let (debt, statement) = (&view.debt, &view.statement);
            self.writer.serialize(DebtRow {
                id: debt.id,
                description: &debt.description,
                creditor: &debt.creditor,
                currency: debt.currency.code(),
                principal: money(debt.principal),
                interest: money(statement.interest),
                total: money(statement.total),
                paid: money(statement.paid),
                remaining: money(statement.remaining),
                progress: money(statement.progress),
                state: statement.state.as_str(),
                registered_on: debt.registered_on.to_string(),
                due_on: debt.due_on.to_string(),
            })?;
        }
        self.flush()
    }

    pub fn write_payments(&mut self, payments: &[Payment]) -> Result<()> {
        if payments.is_empty() {
            self.header(&[
                "id", "debt", "paid_at", "amount", "currency", "rate", "remaining_after", "note",
            ])?;
        }
        for payment in payments {
            self.writer.serialize(PaymentRow {
                id: payment.id,
                debt: payment.debt_id,
                paid_at: payment.paid_at.format("%Y-%m-%d %H:%M").to_string(),
                amount: money(payment.amount.value()),
                currency: payment.currency.code(),
                rate: payment.exchange_rate.map(|r| r.normalize().to_string()),
                remaining_after: money(payment.remaining_after),
                note: payment.note.as_deref(),
            })?;
        }
        self.flush()
    }

    pub fn write_incomes(&mut self, incomes: &[Income]) -> Result<()> {
        if incomes.is_empty() {
            self.header(&["id", "date", "description", "category", "amount", "currency"])?;
        }
        for income in incomes {
            self.writer.serialize(IncomeRow {
                id: income.id,
                date: income.received_on.to_string(),
                description: &income.description,
                category: income.category.as_str(),
                amount: money(income.amount.value()),
                currency: income.currency.code(),
            })?;
        }
        self.flush()
    }

    pub fn write_payment_stats(&mut self, stats: &BTreeMap<Currency, CurrencyStats>) -> Result<()> {
        if stats.is_empty() {
            self.header(&["currency", "total", "count", "average"])?;
        }
        for (currency, stats) in stats {
            self.writer.serialize(StatsRow {
                currency: currency.code(),
                total: money(stats.total),
                count: stats.count,
                average: money(stats.average()),
            })?;
        }
        self.flush()
    }

    /// Per-currency totals first, then each category's totals.
    pub fn write_income_summary(&mut self, summary: &IncomeSummary) -> Result<()> {
        self.header(&["scope", "currency", "total"])?;
        for (currency, total) in &summary.by_currency {
            self.total_row("all", currency, *total)?;
        }
        for (category, totals) in &summary.by_category {
            for (currency, total) in totals {
                self.total_row(category.as_str(), currency, *total)?;
            }
        }
        self.flush()
    }

    pub fn write_dashboard(&mut self, summary: &DashboardSummary) -> Result<()> {
        self.writer.serialize(DashboardRow {
            total_debt: money(summary.total_debt),
            total_paid: money(summary.total_paid),
            outstanding: money(summary.outstanding),
            debt_count: summary.debt_count,
            unpaid_count: summary.unpaid_count,
            paid_count: summary.paid_count,
        })?;
        self.flush()
    }

    pub fn write_quotes(&mut self, quotes: &[Quote]) -> Result<()> {
        for quote in quotes {
            self.writer.serialize(QuoteRow {
                code: quote.code,
                name: quote.name,
                symbol: quote.symbol,
                value: quote.value.normalize().to_string(),
                change: quote.change.normalize().to_string(),
            })?;
        }
        self.flush()
    }

    fn total_row(&mut self, scope: &str, currency: &Currency, total: Decimal) -> Result<()> {
        self.writer
            .write_record([scope, currency.code(), money(total).as_str()])?;
        Ok(())
    }

    fn header(&mut self, columns: &[&str]) -> Result<()> {
        self.writer.write_record(columns)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance;
    use crate::domain::debt::{Debt, DebtState};
    use crate::domain::money::Amount;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn written(write: impl FnOnce(&mut ReportWriter<&mut Vec<u8>>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        {
            let mut writer = ReportWriter::new(&mut buffer);
            write(&mut writer).unwrap();
        }
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_debts_report() {
        let debt = Debt {
            id: 1,
            user_id: 1,
            description: "Loan".to_string(),
            creditor: "Bank".to_string(),
            principal: dec!(1000),
            currency: usd(),
            registered_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            due_on: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            state: DebtState::Pending,
            reminder: false,
            interest_applied: true,
            interest_rate: dec!(10),
        };
        let statement = balance::statement(&debt, &[], NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let out = written(|w| w.write_debts(&[DebtView { debt, statement }]));

        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("id,description,creditor,currency,principal,interest,total,paid,remaining,progress,state,registered_on,due_on")
        );
        assert_eq!(
            lines.next(),
            Some("1,Loan,Bank,USD,1000,100,1100,0,1100,0,pending,2025-01-01,2025-12-31")
        );
    }

    #[test]
    fn test_empty_listing_still_has_header() {
        let out = written(|w| w.write_payments(&[]));
        assert_eq!(out, "id,debt,paid_at,amount,currency,rate,remaining_after,note\n");
    }

    #[test]
    fn test_payments_report() {
        let payment = Payment {
            id: 3,
            debt_id: 1,
            paid_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            amount: Amount::new(dec!(200.00)).unwrap(),
            currency: usd(),
            exchange_rate: None,
            remaining_after: dec!(900.00),
            note: Some("march".to_string()),
        };
        let out = written(|w| w.write_payments(&[payment]));
        assert!(out.contains("3,1,2025-03-01 09:30,200,USD,,900,march"));
    }

    #[test]
    fn test_payment_stats_report() {
        let mut stats = BTreeMap::new();
        stats.insert(
            usd(),
            CurrencyStats {
                total: dec!(100),
                count: 3,
            },
        );
        let out = written(|w| w.write_payment_stats(&stats));
        assert_eq!(out, "currency,total,count,average\nUSD,100,3,33.33\n");
    }
}
