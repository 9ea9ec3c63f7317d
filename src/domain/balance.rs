//! Balance computation for debts.
//!
//! Every function here is pure: callers hand in a debt and the payments
//! recorded against it, and get back amounts or the state the debt should be
//! in. Payments belonging to other debts are ignored, so a caller may pass an
//! unfiltered list.

use super::debt::{Debt, DebtState};
use super::payment::{Payment, validate_exchange_rate};
use crate::error::ZenithError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const HUNDRED: Decimal = dec!(100);

pub fn interest_amount(debt: &Debt) -> Decimal {
    match debt.interest() {
        Some(rate) => debt.principal * rate / HUNDRED,
        None => Decimal::ZERO,
    }
}

/// Principal plus interest, if any.
pub fn total_due(debt: &Debt) -> Decimal {
    debt.principal + interest_amount(debt)
}

/// Sum of the debt's payments, converted to the debt's currency.
pub fn total_paid(debt: &Debt, payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.debt_id == debt.id)
        .map(|p| p.settled_amount(&debt.currency))
        .sum()
}

/// Outstanding balance, clamped at zero.
pub fn remaining_balance(debt: &Debt, payments: &[Payment]) -> Decimal {
    (total_due(debt) - total_paid(debt, payments)).max(Decimal::ZERO)
}

/// Percentage of the total already paid, between 0 and 100.
pub fn progress(debt: &Debt, payments: &[Payment]) -> Decimal {
    let total = total_due(debt);
    if total <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (total_paid(debt, payments) / total * HUNDRED).min(HUNDRED)
}

/// State a debt moves to once a payment has left `remaining` outstanding.
pub fn state_after_payment(remaining: Decimal) -> DebtState {
    if remaining <= Decimal::ZERO {
        DebtState::Paid
    } else {
        DebtState::InProgress
    }
}

/// Persisted state implied by the payments currently on record.
pub fn state_for(debt: &Debt, payments: &[Payment]) -> DebtState {
    if !payments.iter().any(|p| p.debt_id == debt.id) {
        return DebtState::Pending;
    }
    state_after_payment(remaining_balance(debt, payments))
}

/// Outcome of accepting a payment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub remaining_after: Decimal,
    pub state: DebtState,
}

/// Validates a payment worth `amount` (in the debt's currency) against the
/// balance left by `prior` payments.
pub fn settle(debt: &Debt, prior: &[Payment], amount: Decimal) -> Result<Settlement, ZenithError> {
    if amount <= Decimal::ZERO {
        return Err(ZenithError::validation(
            "Payment amount must be greater than zero",
        ));
    }

    let remaining = remaining_balance(debt, prior);
    if remaining.is_zero() {
        return Err(ZenithError::validation(format!(
            "Debt {} is already paid off",
            debt.id
        )));
    }
    if amount > remaining {
        return Err(ZenithError::validation(format!(
            "Payment of {} {} exceeds the remaining balance of {} {}",
            amount.normalize(),
            debt.currency,
            remaining.normalize(),
            debt.currency
        )));
    }

    let remaining_after = remaining - amount;
    Ok(Settlement {
        remaining_after,
        state: state_after_payment(remaining_after),
    })
}

/// Outcome of accepting an edited payment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resettlement {
    /// Balance right after the edited payment, counting only the payments
    /// recorded before it.
    pub snapshot: Decimal,
    /// Balance of the debt with every payment counted.
    pub remaining: Decimal,
    pub state: DebtState,
}

/// Validates `edited` as the new version of the payment with the same id.
///
/// The balance check runs against all the other payments of the debt, so an
/// edit can never push the total paid past what is due.
pub fn resettle(debt: &Debt, payments: &[Payment], edited: &Payment) -> Result<Resettlement, ZenithError> {
    validate_exchange_rate(&edited.currency, edited.exchange_rate, &debt.currency)?;
    let others: Vec<Payment> = payments
        .iter()
        .filter(|p| p.id != edited.id)
        .cloned()
        .collect();
    let amount = edited.settled_amount(&debt.currency);
    let settlement = settle(debt, &others, amount)?;

    let earlier: Vec<Payment> = others
        .into_iter()
        .filter(|p| (p.paid_at, p.id) < (edited.paid_at, edited.id))
        .collect();
    let snapshot = (remaining_balance(debt, &earlier) - amount).max(Decimal::ZERO);

    Ok(Resettlement {
        snapshot,
        remaining: settlement.remaining_after,
        state: settlement.state,
    })
}

/// State to show for a debt on `today`.
///
/// Overdue is never stored: it is derived here from the due date whenever a
/// balance remains.
pub fn display_state(debt: &Debt, remaining: Decimal, today: NaiveDate) -> DebtState {
    if remaining > Decimal::ZERO && debt.due_on < today {
        return DebtState::Overdue;
    }
    match debt.state {
        DebtState::Overdue if remaining.is_zero() => DebtState::Paid,
        DebtState::Overdue => DebtState::Pending,
        state => state,
    }
}

/// Read model combining every figure shown for a debt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statement {
    pub interest: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub remaining: Decimal,
    pub progress: Decimal,
    pub state: DebtState,
}

pub fn statement(debt: &Debt, payments: &[Payment], today: NaiveDate) -> Statement {
    let remaining = remaining_balance(debt, payments);
    Statement {
        interest: interest_amount(debt),
        total: total_due(debt),
        paid: total_paid(debt, payments),
        remaining,
        progress: progress(debt, payments),
        state: display_state(debt, remaining, today),
    }
}
