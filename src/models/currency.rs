//! Currencies and the static FX table
//!
//! Rates are expressed as units of the home currency (GBP) per one unit of
//! the foreign currency. The table is a static input to the cost model; the
//! engine never fetches live rates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::money::Money;
use crate::error::{VaultError, VaultResult};

/// ISO 4217 currencies the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Gbp,
    Usd,
    Eur,
    Inr,
    Aud,
}

impl Currency {
    /// ISO code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Gbp => "GBP",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Inr => "INR",
            Self::Aud => "AUD",
        }
    }

    /// Display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gbp => "£",
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Inr => "₹",
            Self::Aud => "A$",
        }
    }

    /// Parse currency from an ISO code (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GBP" => Some(Self::Gbp),
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            "INR" => Some(Self::Inr),
            "AUD" => Some(Self::Aud),
            _ => None,
        }
    }

    /// Format an amount in this currency, e.g. "£112.40"
    pub fn format(&self, amount: Money) -> String {
        amount.format_with_symbol(self.symbol())
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::Gbp
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Static FX table: home-currency units per one unit of each currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FxTable(BTreeMap<Currency, f64>);

impl Default for FxTable {
    fn default() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(Currency::Gbp, 1.0);
        rates.insert(Currency::Usd, 0.7912);
        rates.insert(Currency::Eur, 0.8521);
        rates.insert(Currency::Inr, 0.00951);
        rates.insert(Currency::Aud, 0.5080);
        Self(rates)
    }
}

impl FxTable {
    /// Build a table from explicit rates
    pub fn from_rates(rates: impl IntoIterator<Item = (Currency, f64)>) -> Self {
        Self(rates.into_iter().collect())
    }

    /// Home-currency units per one unit of `currency`
    pub fn rate(&self, currency: Currency) -> VaultResult<f64> {
        match self.0.get(&currency) {
            Some(rate) if *rate > 0.0 => Ok(*rate),
            _ => Err(VaultError::Config(format!("No FX rate configured for {}", currency))),
        }
    }

    /// Cross rate multiplier converting `from` amounts into `to` amounts
    pub fn cross_rate(&self, from: Currency, to: Currency) -> VaultResult<f64> {
        if from == to {
            return Ok(1.0);
        }
        Ok(self.rate(from)? / self.rate(to)?)
    }

    /// Convert an amount, rounding to the nearest minor unit
    pub fn convert(&self, amount: Money, from: Currency, to: Currency) -> VaultResult<Money> {
        if from == to {
            return Ok(amount);
        }
        Ok(amount.scale(self.cross_rate(from, to)?))
    }

    /// Largest amount in `to` whose conversion back into `from` does not
    /// exceed `limit`
    ///
    /// Used to express a source-currency capacity in transaction currency so
    /// that the source-currency draw of a plan entry never exceeds capacity
    /// after rounding.
    pub fn max_covered(&self, limit: Money, from: Currency, to: Currency) -> VaultResult<Money> {
        if from == to {
            return Ok(limit);
        }
        let mut covered = limit.scale_floor(self.cross_rate(from, to)?).non_negative();
        while covered.is_positive() && self.convert(covered, to, from)? > limit {
            covered -= Money::from_minor(1);
        }
        Ok(covered)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (currency, rate) in &self.0 {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(format!("FX rate for {} must be positive", currency));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Currency::parse("usd"), Some(Currency::Usd));
        assert_eq!(Currency::parse("XYZ"), None);
        assert_eq!(Currency::Gbp.format(Money::from_minor(382015)), "£3820.15");
        assert_eq!(Currency::Eur.to_string(), "EUR");
    }

    #[test]
    fn test_convert_same_currency_is_identity() {
        let fx = FxTable::default();
        let amount = Money::from_minor(8999);
        assert_eq!(fx.convert(amount, Currency::Usd, Currency::Usd).unwrap(), amount);
    }

    #[test]
    fn test_convert_usd_to_gbp() {
        let fx = FxTable::default();
        // 89.99 USD * 0.7912 = 71.199...
        let gbp = fx.convert(Money::from_minor(8999), Currency::Usd, Currency::Gbp).unwrap();
        assert_eq!(gbp.minor(), 7120);
    }

    #[test]
    fn test_max_covered_never_overdraws_source() {
        let fx = FxTable::default();
        let limit = Money::from_minor(5000); // 50.00 GBP
        let covered = fx.max_covered(limit, Currency::Gbp, Currency::Usd).unwrap();
        assert_eq!(covered.minor(), 6319);
        let back = fx.convert(covered, Currency::Usd, Currency::Gbp).unwrap();
        assert!(back <= limit);
    }

    #[test]
    fn test_missing_rate_is_config_error() {
        let fx = FxTable::from_rates([(Currency::Gbp, 1.0)]);
        let err = fx.convert(Money::from_minor(100), Currency::Usd, Currency::Gbp);
        assert!(matches!(err, Err(VaultError::Config(_))));
    }

    #[test]
    fn test_serialization_uses_codes() {
        let fx = FxTable::from_rates([(Currency::Gbp, 1.0), (Currency::Usd, 0.7912)]);
        let json = serde_json::to_string(&fx).unwrap();
        assert_eq!(json, r#"{"GBP":1.0,"USD":0.7912}"#);
    }
}
