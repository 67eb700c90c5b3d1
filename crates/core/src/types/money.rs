//! Money amounts and their display formatting.
//!
//! The backend computes every total; the storefront only formats what it is
//! given. Amounts use decimal arithmetic so nothing is lost to floating point
//! on the way from the JSON body to the page.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Display currency for the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Vietnamese dong: no minor unit, `.` as thousands separator, trailing `₫`.
    #[default]
    Vnd,
    /// US dollar: two decimals, `,` as thousands separator, leading `$`.
    Usd,
}

impl Currency {
    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Vnd => "VND",
            Self::Usd => "USD",
        }
    }

    const fn minor_digits(self) -> u32 {
        match self {
            Self::Vnd => 0,
            Self::Usd => 2,
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VND" => Ok(Self::Vnd),
            "USD" => Ok(Self::Usd),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// An amount in a given currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// Currency used for display.
    pub currency: Currency,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Format for display, e.g. `1.250.000 ₫` or `$1,250.00`.
    #[must_use]
    pub fn display(&self) -> String {
        let digits = self.currency.minor_digits();
        let rounded = self
            .amount
            .round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let text = format!("{:.*}", digits as usize, rounded.abs());
        let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

        let separator = match self.currency {
            Currency::Vnd => '.',
            Currency::Usd => ',',
        };
        let grouped = group_thousands(whole, separator);
        let sign = if negative { "-" } else { "" };

        match self.currency {
            Currency::Vnd => format!("{sign}{grouped} ₫"),
            Currency::Usd => format!("{sign}${grouped}.{fraction}"),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_dong_without_minor_units() {
        let m = Money::new(Decimal::new(1_250_000, 0), Currency::Vnd);
        assert_eq!(m.display(), "1.250.000 ₫");
        let m = Money::new(Decimal::new(9_995, 1), Currency::Vnd);
        assert_eq!(m.display(), "1.000 ₫");
    }

    #[test]
    fn formats_dollars_with_cents() {
        let m = Money::new(Decimal::new(123_456_7, 2), Currency::Usd);
        assert_eq!(m.display(), "$12,345.67");
        assert_eq!(Money::zero(Currency::Usd).display(), "$0.00");
    }

    #[test]
    fn formats_negative_discounts() {
        let m = Money::new(Decimal::new(-50_000, 0), Currency::Vnd);
        assert_eq!(m.display(), "-50.000 ₫");
    }

    #[test]
    fn parses_currency_codes() {
        assert_eq!("vnd".parse::<Currency>(), Ok(Currency::Vnd));
        assert_eq!("USD".parse::<Currency>(), Ok(Currency::Usd));
        assert!("EUR".parse::<Currency>().is_err());
    }
}
