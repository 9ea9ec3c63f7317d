use super::dates::deserialize_timestamp;
use super::debt::{DebtId, DebtState};
use super::money::{Amount, Currency};
use super::user::UserId;
use crate::error::ZenithError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type PaymentId = u32;

/// A payment recorded against a debt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    #[serde(rename = "id_abono")]
    pub id: PaymentId,
    #[serde(rename = "id_deuda")]
    pub debt_id: DebtId,
    #[serde(rename = "fecha_abono", deserialize_with = "deserialize_timestamp")]
    pub paid_at: DateTime<Utc>,
    #[serde(rename = "monto_abonado")]
    pub amount: Amount,
    #[serde(rename = "moneda")]
    pub currency: Currency,
    /// Units of the debt's currency per unit of `currency`.
    #[serde(rename = "tipo_cambio", default)]
    pub exchange_rate: Option<Decimal>,
    /// Remaining balance of the debt right after this payment, counting the
    /// payments made before it. Only recomputed when this payment is edited.
    #[serde(rename = "restante_actual")]
    pub remaining_after: Decimal,
    #[serde(rename = "nota", default)]
    pub note: Option<String>,
}

impl Payment {
    /// The amount this payment settles, expressed in `debt_currency`.
    pub fn settled_amount(&self, debt_currency: &Currency) -> Decimal {
        settled_amount(self.amount, &self.currency, self.exchange_rate, debt_currency)
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.note
            .as_deref()
            .is_some_and(|note| note.to_lowercase().contains(&needle))
    }
}

/// Converts a payment amount into the debt's currency.
///
/// A payment in the debt's own currency counts at face value whatever rate it
/// carries; any other currency is multiplied by its exchange rate.
pub fn settled_amount(
    amount: Amount,
    currency: &Currency,
    exchange_rate: Option<Decimal>,
    debt_currency: &Currency,
) -> Decimal {
    if currency == debt_currency {
        amount.value()
    } else {
        amount.value() * exchange_rate.unwrap_or(Decimal::ONE)
    }
}

/// Input for recording a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub debt_id: DebtId,
    pub amount: Amount,
    pub currency: Currency,
    pub exchange_rate: Option<Decimal>,
    pub note: Option<String>,
    /// Defaults to the time the store records the payment.
    pub paid_at: Option<DateTime<Utc>>,
}

impl NewPayment {
    pub fn new(debt_id: DebtId, amount: Amount, currency: Currency) -> Self {
        Self {
            debt_id,
            amount,
            currency,
            exchange_rate: None,
            note: None,
            paid_at: None,
        }
    }

    /// Checks the exchange rate against the currency of the debt being paid.
    pub fn validate_for(&self, debt_currency: &Currency) -> Result<(), ZenithError> {
        validate_exchange_rate(&self.currency, self.exchange_rate, debt_currency)
    }

    pub fn settled_amount(&self, debt_currency: &Currency) -> Decimal {
        settled_amount(self.amount, &self.currency, self.exchange_rate, debt_currency)
    }

    pub fn into_payment(
        self,
        id: PaymentId,
        remaining_after: Decimal,
        now: DateTime<Utc>,
    ) -> Payment {
        Payment {
            id,
            debt_id: self.debt_id,
            paid_at: self.paid_at.unwrap_or(now),
            amount: self.amount,
            currency: self.currency,
            exchange_rate: self.exchange_rate,
            remaining_after,
            note: self.note.filter(|note| !note.trim().is_empty()),
        }
    }
}

/// Partial update of a payment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentChanges {
    pub amount: Option<Amount>,
    pub currency: Option<Currency>,
    pub exchange_rate: Option<Decimal>,
    pub note: Option<String>,
}

impl PaymentChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `payment` with the changes applied, leaving the original intact.
    pub fn applied_to(&self, payment: &Payment) -> Payment {
        let mut updated = payment.clone();
        if let Some(amount) = self.amount {
            updated.amount = amount;
        }
        if let Some(currency) = &self.currency {
            updated.currency = currency.clone();
        }
        if let Some(rate) = self.exchange_rate {
            updated.exchange_rate = Some(rate);
        }
        if let Some(note) = &self.note {
            updated.note = Some(note.clone()).filter(|note| !note.trim().is_empty());
        }
        updated
    }
}

pub fn validate_exchange_rate(
    currency: &Currency,
    exchange_rate: Option<Decimal>,
    debt_currency: &Currency,
) -> Result<(), ZenithError> {
    match exchange_rate {
        Some(rate) if rate <= Decimal::ZERO => Err(ZenithError::validation(
            "Exchange rate must be greater than zero",
        )),
        None if currency != debt_currency => Err(ZenithError::validation(format!(
            "An exchange rate from {} to {} is required",
            currency, debt_currency
        ))),
        _ => Ok(()),
    }
}

/// Which payments to list. Both filters are optional and combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PaymentFilter {
    pub user_id: Option<UserId>,
    pub debt_id: Option<DebtId>,
}

impl PaymentFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            debt_id: None,
        }
    }

    pub fn for_debt(debt_id: DebtId) -> Self {
        Self {
            user_id: None,
            debt_id: Some(debt_id),
        }
    }
}

/// Payments of one debt with their running total.
#[derive(Debug, Clone, PartialEq)]
pub struct DebtPayments {
    pub payments: Vec<Payment>,
    pub total_paid: Decimal,
}

/// What a store reports back after recording or editing a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub new_balance: Decimal,
    pub debt_state: DebtState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn mxn() -> Currency {
        Currency::new("MXN").unwrap()
    }

    #[test]
    fn test_same_currency_ignores_rate() {
        let amount = Amount::new(dec!(100)).unwrap();
        assert_eq!(settled_amount(amount, &usd(), Some(dec!(17)), &usd()), dec!(100));
    }

    #[test]
    fn test_foreign_currency_uses_rate() {
        let amount = Amount::new(dec!(10)).unwrap();
        assert_eq!(
            settled_amount(amount, &usd(), Some(dec!(17.25)), &mxn()),
            dec!(172.50)
        );
    }

    #[test]
    fn test_exchange_rate_validation() {
        assert!(validate_exchange_rate(&usd(), None, &usd()).is_ok());
        assert!(validate_exchange_rate(&usd(), None, &mxn()).is_err());
        assert!(validate_exchange_rate(&usd(), Some(dec!(0)), &mxn()).is_err());
        assert!(validate_exchange_rate(&usd(), Some(dec!(17.25)), &mxn()).is_ok());
    }

    #[test]
    fn test_payment_wire_format() {
        let json = r#"{
            "id_abono": 4,
            "id_deuda": 2,
            "fecha_abono": "2025-02-01",
            "monto_abonado": 250.5,
            "moneda": "USD",
            "tipo_cambio": 1,
            "restante_actual": "749.50",
            "nota": "February"
        }"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.amount.value(), dec!(250.5));
        assert_eq!(payment.remaining_after, dec!(749.50));
        assert!(payment.matches("feb"));
        assert!(!payment.matches("march"));
    }

    #[test]
    fn test_blank_note_is_dropped() {
        let mut new = NewPayment::new(1, Amount::new(dec!(5)).unwrap(), usd());
        new.note = Some("  ".to_string());
        let payment = new.into_payment(1, dec!(0), Utc::now());
        assert_eq!(payment.note, None);
    }
}
