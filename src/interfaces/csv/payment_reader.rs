use crate::domain::debt::DebtId;
use crate::domain::money::{Amount, Currency};
use crate::domain::payment::NewPayment;
use crate::error::{Result, ZenithError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a payment import file: `debt,amount,currency,rate,note`.
#[derive(Debug, Deserialize)]
struct PaymentRow {
    debt: DebtId,
    amount: Amount,
    currency: Currency,
    #[serde(default)]
    rate: Option<Decimal>,
    #[serde(default)]
    note: Option<String>,
}

impl From<PaymentRow> for NewPayment {
    fn from(row: PaymentRow) -> Self {
        let mut payment = NewPayment::new(row.debt, row.amount, row.currency);
        payment.exchange_rate = row.rate;
        payment.note = row.note;
        payment
    }
}

/// Reads payments to import from a CSV source.
///
/// Fields are trimmed and short rows are accepted, so trailing optional
/// columns may be left out.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one result per data row; a bad row does not stop the rest.
    pub fn payments(self) -> impl Iterator<Item = Result<NewPayment>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map(|row: PaymentRow| row.into())
                .map_err(ZenithError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_rows() {
        let data = "debt, amount, currency, rate, note\n1, 150.50, usd, , first\n2, 3000, MXN, 0.058\n";
        let results: Vec<Result<NewPayment>> = PaymentReader::new(data.as_bytes()).payments().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.debt_id, 1);
        assert_eq!(first.amount.value(), dec!(150.50));
        assert_eq!(first.currency.code(), "USD");
        assert_eq!(first.exchange_rate, None);
        assert_eq!(first.note.as_deref(), Some("first"));

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.exchange_rate, Some(dec!(0.058)));
        assert_eq!(second.note, None);
    }

    #[test]
    fn test_reader_rejects_bad_rows() {
        let data = "debt,amount,currency,rate,note\nabc,10,USD,,\n1,-5,USD,,\n1,10,US1,,\n1,10,USD,,ok\n";
        let results: Vec<Result<NewPayment>> = PaymentReader::new(data.as_bytes()).payments().collect();

        assert_eq!(results.len(), 4);
        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert!(results[2].is_err());
        assert!(results[3].is_ok());
    }
}
