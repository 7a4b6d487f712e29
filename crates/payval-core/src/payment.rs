//! The cross-currency payment instruction validated by the payment rules.
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which leg of the trade the customer fixed up front.
///
/// With [`Leg::Buy`] the customer asked for an exact buy amount and the sell
/// amount was derived from it through the rate; [`Leg::Sell`] is the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Leg {
    Sell,
    Buy,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sell => f.write_str("SELL"),
            Self::Buy => f.write_str("BUY"),
        }
    }
}

/// An FX payment: sell one currency, buy another, pay out to an account.
///
/// Every field is optional on the wire; absent fields are simply not checked
/// by the rules that concern them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_leg: Option<Leg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
}

impl Payment {
    pub fn new(sell_currency: impl Into<String>, buy_currency: impl Into<String>) -> Self {
        Self {
            sell_currency: Some(sell_currency.into()),
            buy_currency: Some(buy_currency.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_amounts(mut self, sell_amount: Decimal, buy_amount: Decimal, fixed_leg: Leg) -> Self {
        self.sell_amount = Some(sell_amount);
        self.buy_amount = Some(buy_amount);
        self.fixed_leg = Some(fixed_leg);
        self
    }

    #[must_use]
    pub fn with_rate(mut self, rate: Decimal) -> Self {
        self.rate = Some(rate);
        self
    }

    #[must_use]
    pub fn with_iban(mut self, iban: impl Into<String>) -> Self {
        self.iban = Some(iban.into());
        self
    }

    #[must_use]
    pub fn with_bic(mut self, bic: impl Into<String>) -> Self {
        self.bic = Some(bic.into());
        self
    }

    /// The amount on `leg`, if set.
    pub fn amount(&self, leg: Leg) -> Option<Decimal> {
        match leg {
            Leg::Sell => self.sell_amount,
            Leg::Buy => self.buy_amount,
        }
    }

    /// The currency on `leg`, if set.
    pub fn currency(&self, leg: Leg) -> Option<&str> {
        match leg {
            Leg::Sell => self.sell_currency.as_deref(),
            Leg::Buy => self.buy_currency.as_deref(),
        }
    }

    /// Absolute difference between the buy amount and `sell_amount * rate`.
    ///
    /// `None` unless both amounts and a positive rate are present, or if the
    /// product overflows.
    pub fn rate_discrepancy(&self) -> Option<Decimal> {
        let sell = self.sell_amount?;
        let buy = self.buy_amount?;
        let rate = self.rate.filter(|r| r.is_sign_positive() && !r.is_zero())?;
        let implied = sell.checked_mul(rate)?;
        Some(buy.checked_sub(implied)?.abs())
    }
}

impl fmt::Display for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(f: &mut fmt::Formatter<'_>, amount: Option<Decimal>, ccy: Option<&str>) -> fmt::Result {
            match (amount, ccy) {
                (Some(a), Some(c)) => write!(f, "{a} {c}"),
                (Some(a), None) => write!(f, "{a}"),
                (None, Some(c)) => f.write_str(c),
                (None, None) => f.write_str("?"),
            }
        }
        f.write_str("payment ")?;
        side(f, self.sell_amount, self.sell_currency.as_deref())?;
        f.write_str(" -> ")?;
        side(f, self.buy_amount, self.buy_currency.as_deref())?;
        if let Some(leg) = self.fixed_leg {
            write!(f, " fixed {leg}")?;
        }
        if let Some(rate) = self.rate {
            write!(f, " @ {rate}")?;
        }
        if let Some(iban) = &self.iban {
            write!(f, " iban {iban}")?;
        }
        if let Some(bic) = &self.bic {
            write!(f, " bic {bic}")?;
        }
        Ok(())
    }
}
