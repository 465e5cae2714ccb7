//! Recipient address validation for Base network transfers.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

const HEX_DIGITS: usize = 40;

/// EVM-style account address (`0x` followed by 40 hex digits) on Base.
///
/// Mixed-case input is accepted as-is; EIP-55 checksums are not verified.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecipientAddress(String);

impl RecipientAddress {
    /// Parses and validates an address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddressFormat`] when the input is not a `0x`
    /// prefixed 20-byte hex string, or when it is the zero address.
    pub fn parse(input: impl Into<String>) -> crate::Result<Self> {
        let input = input.into();
        let trimmed = input.trim();

        let Some(digits) = trimmed.strip_prefix("0x") else {
            return Err(invalid(&input, "address must start with 0x"));
        };
        if digits.len() != HEX_DIGITS {
            return Err(invalid(&input, "address must contain exactly 40 hex digits"));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid(&input, "address contains non-hex characters"));
        }
        if digits.bytes().all(|b| b == b'0') {
            return Err(invalid(&input, "the zero address cannot receive transfers"));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the address as provided by the requester.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lower-cased form used for comparisons.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

fn invalid(input: &str, reason: &'static str) -> Error {
    Error::InvalidAddressFormat {
        address: input.to_owned(),
        reason,
    }
}

impl Display for RecipientAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecipientAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RecipientAddress> for String {
    fn from(value: RecipientAddress) -> Self {
        value.0
    }
}

impl FromStr for RecipientAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
