use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currencies accepted by the test gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Turkish Lira
    #[default]
    TRY,
    /// US Dollar
    USD,
    /// Euro
    EUR,
}

impl Currency {
    /// Decimal places the gateway accepts for this currency
    pub fn scale(&self) -> u32 {
        2
    }

    /// Validates that an amount is positive and fits the currency scale
    pub fn validate_amount(&self, amount: Decimal) -> Result<(), String> {
        if amount <= Decimal::ZERO {
            return Err("must be greater than zero".to_string());
        }

        if amount.scale() > self.scale() {
            return Err(format!(
                "{} amounts must have at most {} decimal places",
                self,
                self.scale()
            ));
        }

        Ok(())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::TRY => write!(f, "TRY"),
            Currency::USD => write!(f, "USD"),
            Currency::EUR => write!(f, "EUR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRY" => Ok(Currency::TRY),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            _ => Err(format!("Unsupported currency: {}", s)),
        }
    }
}
