use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency an RFQ is priced in. Amounts are always stored in minor units (cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Inr,
    Cny,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Inr => "INR",
            Currency::Cny => "CNY",
        }
    }
}

/// Format an amount held in minor units, e.g. `320000` USD -> `3200.00 USD`.
pub fn format_amount(amount_cents: u64, currency: &Currency) -> String {
    format!(
        "{}.{:02} {}",
        amount_cents / 100,
        amount_cents % 100,
        currency.code()
    )
}

/// `quantity × unit price`, refusing to wrap.
pub fn line_total(quantity: u64, unit_price_cents: u64) -> Option<u64> {
    quantity.checked_mul(unit_price_cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(320_000, &Currency::Usd), "3200.00 USD");
        assert_eq!(format_amount(350, &Currency::Eur), "3.50 EUR");
        assert_eq!(format_amount(7, &Currency::Inr), "0.07 INR");
    }

    #[test]
    fn test_line_total_overflow() {
        assert_eq!(line_total(1000, 320), Some(320_000));
        assert_eq!(line_total(u64::MAX, 2), None);
    }

    #[test]
    fn test_currency_wire_format() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
        let c: Currency = serde_json::from_str("\"INR\"").unwrap();
        assert_eq!(c, Currency::Inr);
    }
}
