use super::dates::deserialize_date;
use super::money::Currency;
use super::user::UserId;
use crate::error::ZenithError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type DebtId = u32;

/// Lifecycle of a debt.
///
/// `Overdue` is only ever produced by [`crate::domain::balance::display_state`];
/// stores persist the other three. A backend that does send `vencida` is
/// still accepted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub enum DebtState {
    #[default]
    #[serde(rename = "pendiente", alias = "pending")]
    Pending,
    #[serde(rename = "en_progreso", alias = "in_progress")]
    InProgress,
    #[serde(rename = "pagada", alias = "paid")]
    Paid,
    #[serde(rename = "vencida", alias = "overdue")]
    Overdue,
}

impl DebtState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtState::Pending => "pending",
            DebtState::InProgress => "in_progress",
            DebtState::Paid => "paid",
            DebtState::Overdue => "overdue",
        }
    }
}

impl fmt::Display for DebtState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebtState {
    type Err = ZenithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Ok(DebtState::Pending),
            "in_progress" | "en_progreso" => Ok(DebtState::InProgress),
            "paid" | "pagada" => Ok(DebtState::Paid),
            "overdue" | "vencida" => Ok(DebtState::Overdue),
            other => Err(ZenithError::validation(format!(
                "Unknown debt state '{}'",
                other
            ))),
        }
    }
}

/// A debt owed by a user to a creditor.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Debt {
    #[serde(rename = "id_deuda")]
    pub id: DebtId,
    #[serde(rename = "id_usuario")]
    pub user_id: UserId,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "acreedor", default)]
    pub creditor: String,
    /// Amount originally borrowed, before interest.
    #[serde(rename = "monto_total")]
    pub principal: Decimal,
    #[serde(rename = "moneda")]
    pub currency: Currency,
    #[serde(rename = "fecha_registro", deserialize_with = "deserialize_date")]
    pub registered_on: NaiveDate,
    #[serde(rename = "fecha_pago_objetivo", deserialize_with = "deserialize_date")]
    pub due_on: NaiveDate,
    #[serde(rename = "estado_pago", default)]
    pub state: DebtState,
    #[serde(rename = "recordatorio", default)]
    pub reminder: bool,
    #[serde(rename = "interes_aplicado", default)]
    pub interest_applied: bool,
    /// Percentage; only meaningful when `interest_applied` is set.
    #[serde(rename = "tasa_interes", default)]
    pub interest_rate: Decimal,
}

impl Debt {
    /// The interest rate in percent, if interest applies to this debt.
    pub fn interest(&self) -> Option<Decimal> {
        self.interest_applied.then_some(self.interest_rate)
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.description.to_lowercase().contains(&needle)
            || self.creditor.to_lowercase().contains(&needle)
    }
}

/// Input for registering a debt.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDebt {
    pub user_id: UserId,
    pub description: String,
    pub creditor: String,
    pub principal: Decimal,
    pub currency: Currency,
    pub due_on: NaiveDate,
    pub reminder: bool,
    pub interest_rate: Option<Decimal>,
}

impl NewDebt {
    pub fn validate(&self) -> Result<(), ZenithError> {
        if self.description.trim().is_empty() {
            return Err(ZenithError::validation("Description is required"));
        }
        if self.principal <= Decimal::ZERO {
            return Err(ZenithError::validation(
                "Principal must be greater than zero",
            ));
        }
        validate_rate(self.interest_rate)
    }

    /// Materializes the debt once a store has assigned its id.
    pub fn into_debt(self, id: DebtId, registered_on: NaiveDate) -> Debt {
        Debt {
            id,
            user_id: self.user_id,
            description: self.description.trim().to_string(),
            creditor: self.creditor.trim().to_string(),
            principal: self.principal,
            currency: self.currency,
            registered_on,
            due_on: self.due_on,
            state: DebtState::Pending,
            reminder: self.reminder,
            interest_applied: self.interest_rate.is_some(),
            interest_rate: self.interest_rate.unwrap_or_default(),
        }
    }
}

/// Partial update of a debt. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebtChanges {
    pub description: Option<String>,
    pub creditor: Option<String>,
    pub principal: Option<Decimal>,
    pub currency: Option<Currency>,
    pub due_on: Option<NaiveDate>,
    pub reminder: Option<bool>,
    /// `Some(None)` removes interest, `Some(Some(rate))` sets it.
    pub interest_rate: Option<Option<Decimal>>,
}

impl DebtChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ZenithError> {
        if let Some(description) = &self.description
            && description.trim().is_empty()
        {
            return Err(ZenithError::validation("Description is required"));
        }
        if let Some(principal) = self.principal
            && principal <= Decimal::ZERO
        {
            return Err(ZenithError::validation(
                "Principal must be greater than zero",
            ));
        }
        match self.interest_rate {
            Some(rate) => validate_rate(rate),
            None => Ok(()),
        }
    }

    /// Checks the changes against the debt they will be applied to.
    ///
    /// Payments are settled in the debt's currency, so the currency is fixed
    /// once any payment has been recorded.
    pub fn validate_for(&self, debt: &Debt, has_payments: bool) -> Result<(), ZenithError> {
        self.validate()?;
        match &self.currency {
            Some(currency) if has_payments && *currency != debt.currency => {
                Err(ZenithError::validation(format!(
                    "Cannot change the currency of debt {} from {} to {} once payments are recorded",
                    debt.id, debt.currency, currency
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn apply_to(self, debt: &mut Debt) {
        if let Some(description) = self.description {
            debt.description = description.trim().to_string();
        }
        if let Some(creditor) = self.creditor {
            debt.creditor = creditor.trim().to_string();
        }
        if let Some(principal) = self.principal {
            debt.principal = principal;
        }
        if let Some(currency) = self.currency {
            debt.currency = currency;
        }
        if let Some(due_on) = self.due_on {
            debt.due_on = due_on;
        }
        if let Some(reminder) = self.reminder {
            debt.reminder = reminder;
        }
        if let Some(rate) = self.interest_rate {
            debt.interest_applied = rate.is_some();
            debt.interest_rate = rate.unwrap_or_default();
        }
    }
}

fn validate_rate(rate: Option<Decimal>) -> Result<(), ZenithError> {
    match rate {
        Some(rate) if rate < Decimal::ZERO => Err(ZenithError::validation(
            "Interest rate cannot be negative",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_debt() -> NewDebt {
        NewDebt {
            user_id: 1,
            description: " Car loan ".to_string(),
            creditor: "Bank".to_string(),
            principal: dec!(1000),
            currency: Currency::new("USD").unwrap(),
            due_on: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            reminder: true,
            interest_rate: Some(dec!(10)),
        }
    }

    #[test]
    fn test_new_debt_starts_pending() {
        let debt = new_debt().into_debt(7, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(debt.id, 7);
        assert_eq!(debt.description, "Car loan");
        assert_eq!(debt.state, DebtState::Pending);
        assert_eq!(debt.interest(), Some(dec!(10)));
    }

    #[test]
    fn test_new_debt_validation() {
        assert!(new_debt().validate().is_ok());

        let mut blank = new_debt();
        blank.description = "   ".to_string();
        assert!(matches!(blank.validate(), Err(ZenithError::ValidationError(_))));

        let mut zero = new_debt();
        zero.principal = Decimal::ZERO;
        assert!(zero.validate().is_err());

        let mut negative_rate = new_debt();
        negative_rate.interest_rate = Some(dec!(-1));
        assert!(negative_rate.validate().is_err());
    }

    #[test]
    fn test_changes_remove_interest() {
        let mut debt = new_debt().into_debt(1, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let changes = DebtChanges {
            interest_rate: Some(None),
            principal: Some(dec!(800)),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        changes.apply_to(&mut debt);
        assert_eq!(debt.interest(), None);
        assert_eq!(debt.principal, dec!(800));
        assert!(DebtChanges::default().is_empty());
    }

    #[test]
    fn test_currency_is_fixed_once_paid() {
        let debt = new_debt().into_debt(1, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let to_mxn = DebtChanges {
            currency: Some(Currency::new("MXN").unwrap()),
            ..Default::default()
        };
        assert!(to_mxn.validate_for(&debt, false).is_ok());
        assert!(matches!(
            to_mxn.validate_for(&debt, true),
            Err(ZenithError::ValidationError(_))
        ));

        let same = DebtChanges {
            currency: Some(Currency::new("USD").unwrap()),
            ..Default::default()
        };
        assert!(same.validate_for(&debt, true).is_ok());
    }

    #[test]
    fn test_debt_wire_format() {
        let json = r#"{
            "id_deuda": 3,
            "id_usuario": 9,
            "descripcion": "Laptop",
            "acreedor": "Store",
            "monto_total": "1500.00",
            "moneda": "MXN",
            "fecha_registro": "2025-01-10T08:00:00.000Z",
            "fecha_pago_objetivo": "2025-06-30",
            "estado_pago": "en_progreso",
            "recordatorio": true,
            "interes_aplicado": false,
            "tasa_interes": 0,
            "monto_interes": 0
        }"#;
        let debt: Debt = serde_json::from_str(json).unwrap();
        assert_eq!(debt.id, 3);
        assert_eq!(debt.principal, dec!(1500));
        assert_eq!(debt.state, DebtState::InProgress);
        assert_eq!(debt.registered_on, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert_eq!(debt.interest(), None);
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!("pagada".parse::<DebtState>().unwrap(), DebtState::Paid);
        assert_eq!("IN_PROGRESS".parse::<DebtState>().unwrap(), DebtState::InProgress);
        assert!("settled".parse::<DebtState>().is_err());
    }
}
