//! Monetary amount type.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// A positive decimal amount with at most two fractional digits.
///
/// Amounts travel to the API as strings so no precision is lost to
/// floating point.
///
/// # Example
///
/// ```
/// use kasa::Amount;
///
/// let amount = Amount::new("12.5").unwrap();
/// assert_eq!(amount.as_str(), "12.5");
/// assert!(Amount::new("0").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Amount(String);

impl Amount {
    /// Parse and validate an amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a plain decimal, has more than
    /// two fractional digits, or is not greater than zero.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref().trim();
        let invalid = |reason: &str| InvalidInputError::Amount {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("must not be empty").into());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid("must be a positive decimal number").into());
        }
        if fraction.len() > 2 {
            return Err(invalid("at most two decimal places").into());
        }
        if whole.chars().chain(fraction.chars()).all(|c| c == '0') {
            return Err(invalid("must be greater than 0").into());
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
