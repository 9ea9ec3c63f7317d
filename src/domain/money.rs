use crate::error::ZenithError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A strictly positive monetary amount.
///
/// Payments and incomes are always expressed as an `Amount`, so a zero or
/// negative value can never reach a store.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, ZenithError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ZenithError::validation("Amount must be greater than zero"))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ZenithError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An upper-case currency code such as `USD` or `MXN`.
///
/// Codes are kept as the backend sends them; `BS` (bolívar) is the only one
/// that differs from its ISO 4217 code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, ZenithError> {
        let code = code.trim().to_ascii_uppercase();
        if (2..=4).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code))
        } else {
            Err(ZenithError::validation(format!(
                "Invalid currency code '{}'",
                code
            )))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn iso_code(&self) -> &str {
        match self.0.as_str() {
            "BS" => "VES",
            other => other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self.0.as_str() {
            "EUR" => "€",
            "GBP" => "£",
            "JPY" => "¥",
            "BRL" => "R$",
            "BS" | "VES" => "Bs.",
            "PEN" => "S/",
            _ => "$",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl TryFrom<String> for Currency {
    type Error = ZenithError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl FromStr for Currency {
    type Err = ZenithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Formats `amount` as `$1,234.50 USD`, rounded half-away-from-zero to cents.
pub fn format_money(amount: Decimal, currency: &Currency) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!(
        "{}{}{}.{} {}",
        sign,
        currency.symbol(),
        grouped,
        frac_part,
        currency.iso_code()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(ZenithError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(ZenithError::ValidationError(_))
        ));
    }

    #[test]
    fn test_amount_rejects_zero_on_deserialize() {
        let parsed: Result<Amount, _> = serde_json::from_str("\"0\"");
        assert!(parsed.is_err());
        let parsed: Amount = serde_json::from_str("12.5").unwrap();
        assert_eq!(parsed.value(), dec!(12.5));
    }

    #[test]
    fn test_currency_normalizes_code() {
        let currency = Currency::new(" usd ").unwrap();
        assert_eq!(currency.code(), "USD");
        assert!(Currency::new("U5D").is_err());
        assert!(Currency::new("").is_err());
    }

    #[test]
    fn test_bolivar_maps_to_iso_code() {
        let bs = Currency::new("BS").unwrap();
        assert_eq!(bs.iso_code(), "VES");
        assert_eq!(bs.symbol(), "Bs.");
    }

    #[test]
    fn test_format_money() {
        let usd = Currency::new("USD").unwrap();
        assert_eq!(format_money(dec!(1234567.5), &usd), "$1,234,567.50 USD");
        assert_eq!(format_money(dec!(0), &usd), "$0.00 USD");
        assert_eq!(format_money(dec!(999.999), &usd), "$1,000.00 USD");
        assert_eq!(format_money(dec!(-20), &usd), "-$20.00 USD");

        let eur = Currency::new("EUR").unwrap();
        assert_eq!(format_money(dec!(100), &eur), "€100.00 EUR");
    }
}
