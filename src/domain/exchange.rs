use super::money::Currency;
use crate::error::ZenithError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Value of one unit of a currency expressed in the table's base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub code: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    pub value: Decimal,
    /// Change since the previous day, in base currency units.
    pub change: Decimal,
}

/// A table of quotes against a single base currency.
#[derive(Debug, Clone)]
pub struct RateTable {
    base: &'static str,
    quotes: Vec<Quote>,
}

impl RateTable {
    /// Fixed quotes against the Mexican peso. Not live market data.
    pub fn simulated() -> Self {
        let quote = |code, name, symbol, value, change| Quote {
            code,
            name,
            symbol,
            value,
            change,
        };
        Self {
            base: "MXN",
            quotes: vec![
                quote("USD", "Dólar Estadounidense", "$", dec!(17.25), dec!(0.15)),
                quote("EUR", "Euro", "€", dec!(18.80), dec!(-0.08)),
                quote("GBP", "Libra Esterlina", "£", dec!(21.85), dec!(0.22)),
                quote("CAD", "Dólar Canadiense", "$", dec!(12.65), dec!(0.05)),
                quote("JPY", "Yen Japonés", "¥", dec!(0.115), dec!(-0.002)),
                quote("BRL", "Real Brasileño", "R$", dec!(3.45), dec!(0.03)),
                quote("ARS", "Peso Argentino", "$", dec!(0.019), dec!(-0.001)),
                quote("COP", "Peso Colombiano", "$", dec!(0.0042), dec!(0.0001)),
            ],
        }
    }

    pub fn base(&self) -> &'static str {
        self.base
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn quote(&self, currency: &Currency) -> Option<&Quote> {
        self.quotes.iter().find(|q| q.code == currency.code())
    }

    fn value_of(&self, currency: &Currency) -> Result<Decimal, ZenithError> {
        if currency.code() == self.base {
            return Ok(Decimal::ONE);
        }
        self.quote(currency)
            .map(|q| q.value)
            .ok_or_else(|| ZenithError::validation(format!("No exchange rate for {}", currency)))
    }

    /// Converts `amount` of `currency` into the base currency.
    pub fn to_base(&self, amount: Decimal, currency: &Currency) -> Result<Decimal, ZenithError> {
        Ok(amount * self.value_of(currency)?)
    }

    /// Cross rate: units of `to` per unit of `from`.
    pub fn rate(&self, from: &Currency, to: &Currency) -> Result<Decimal, ZenithError> {
        Ok(self.value_of(from)? / self.value_of(to)?)
    }

    pub fn convert(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
    ) -> Result<Decimal, ZenithError> {
        Ok(amount * self.value_of(from)? / self.value_of(to)?)
    }
}
