use super::dates::deserialize_date;
use super::money::{Amount, Currency};
use super::user::UserId;
use crate::error::ZenithError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type IncomeId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Default)]
pub enum IncomeCategory {
    #[default]
    Salario,
    Freelance,
    Inversiones,
    Venta,
    Regalo,
    Reembolso,
    Otro,
}

impl IncomeCategory {
    pub const ALL: [IncomeCategory; 7] = [
        IncomeCategory::Salario,
        IncomeCategory::Freelance,
        IncomeCategory::Inversiones,
        IncomeCategory::Venta,
        IncomeCategory::Regalo,
        IncomeCategory::Reembolso,
        IncomeCategory::Otro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeCategory::Salario => "Salario",
            IncomeCategory::Freelance => "Freelance",
            IncomeCategory::Inversiones => "Inversiones",
            IncomeCategory::Venta => "Venta",
            IncomeCategory::Regalo => "Regalo",
            IncomeCategory::Reembolso => "Reembolso",
            IncomeCategory::Otro => "Otro",
        }
    }
}

impl fmt::Display for IncomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncomeCategory {
    type Err = ZenithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ZenithError::validation(format!("Unknown income category '{}'", wanted)))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Income {
    #[serde(rename = "id_ingreso")]
    pub id: IncomeId,
    #[serde(rename = "id_usuario")]
    pub user_id: UserId,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "monto")]
    pub amount: Amount,
    #[serde(rename = "moneda")]
    pub currency: Currency,
    #[serde(rename = "fecha", deserialize_with = "deserialize_date")]
    pub received_on: NaiveDate,
    #[serde(rename = "categoria")]
    pub category: IncomeCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIncome {
    pub user_id: UserId,
    pub description: String,
    pub amount: Amount,
    pub currency: Currency,
    pub category: IncomeCategory,
    pub received_on: Option<NaiveDate>,
}

impl NewIncome {
    pub fn validate(&self) -> Result<(), ZenithError> {
        if self.description.trim().is_empty() {
            return Err(ZenithError::validation("Description is required"));
        }
        Ok(())
    }

    pub fn into_income(self, id: IncomeId, today: NaiveDate) -> Income {
        Income {
            id,
            user_id: self.user_id,
            description: self.description.trim().to_string(),
            amount: self.amount,
            currency: self.currency,
            received_on: self.received_on.unwrap_or(today),
            category: self.category,
        }
    }
}
