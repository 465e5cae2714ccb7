//! Fixed-point USDC amounts.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Number of fractional digits carried by the USDC token contract.
pub const USDC_DECIMALS: u32 = 6;
const SCALE: u64 = 10u64.pow(USDC_DECIMALS);

/// Amount of USDC stored as integer base units (1 USDC = 1,000,000 units).
///
/// Serialized as a decimal string; deserializes from either a string or a JSON
/// number so LLM function-call arguments can be fed in directly.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UsdcAmount(u64);

impl UsdcAmount {
    /// Zero USDC.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from raw token base units.
    #[must_use]
    pub const fn from_base_units(units: u64) -> Self {
        Self(units)
    }

    /// Creates an amount from whole USDC.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub const fn from_whole(whole: u64) -> Option<Self> {
        match whole.checked_mul(SCALE) {
            Some(units) => Some(Self(units)),
            None => None,
        }
    }

    /// Returns the amount in token base units.
    #[must_use]
    pub const fn base_units(self) -> u64 {
        self.0
    }

    /// Returns `true` for a zero amount.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parses a decimal string such as `"25"` or `"12.50"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAmount`] for negative values, non-digit input,
    /// more than six fractional digits, or values that overflow `u64` units.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "amount must not be empty"));
        }
        if trimmed.starts_with('-') {
            return Err(invalid(input, "amount must not be negative"));
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid(input, "amount must contain digits"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid(input, "amount must be a plain decimal number"));
        }
        if fraction.len() > USDC_DECIMALS as usize {
            return Err(invalid(input, "USDC supports at most 6 fractional digits"));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .ok()
                .and_then(|w| w.checked_mul(SCALE))
                .ok_or_else(|| invalid(input, "amount is too large"))?
        };

        let mut fraction_units = 0u64;
        if !fraction.is_empty() {
            let padded = format!("{fraction:0<6}");
            fraction_units = padded
                .parse::<u64>()
                .map_err(|_| invalid(input, "amount must be a plain decimal number"))?;
        }

        whole_units
            .checked_add(fraction_units)
            .map(Self)
            .ok_or_else(|| invalid(input, "amount is too large"))
    }
}

fn invalid(input: &str, reason: &'static str) -> Error {
    Error::InvalidAmount {
        input: input.to_owned(),
        reason,
    }
}

impl Display for UsdcAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let fraction = self.0 % SCALE;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:06}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for UsdcAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for UsdcAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UsdcAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = UsdcAmount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative USDC amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        UsdcAmount::parse(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        UsdcAmount::from_whole(v).ok_or_else(|| E::custom("amount is too large"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        let whole = u64::try_from(v).map_err(|_| E::custom("amount must not be negative"))?;
        self.visit_u64(whole)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        // Shortest round-trip representation keeps `12.5` as `12.5`.
        UsdcAmount::parse(&v.to_string()).map_err(E::custom)
    }
}
