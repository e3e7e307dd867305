//! Arbitrary-precision decimal numbers.
//!
//! Numeric scalars that do not fit losslessly in an `i64` or `f64` are kept
//! as a `BigInt` coefficient scaled by a power of ten.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when text is not a decimal number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid decimal number \"{0}\"")]
pub struct DecimalError(pub String);

/// A decimal number `coefficient * 10^exponent`.
#[derive(Clone)]
pub struct Decimal {
    coefficient: BigInt,
    exponent: i64,
}

impl Decimal {
    /// Build a decimal from its parts.
    pub fn new(coefficient: BigInt, exponent: i64) -> Self {
        Self {
            coefficient,
            exponent,
        }
    }

    pub fn coefficient(&self) -> &BigInt {
        &self.coefficient
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    pub fn is_negative(&self) -> bool {
        self.coefficient.sign() == Sign::Minus
    }

    /// Returns `true` if the number has no fractional part.
    pub fn is_integer(&self) -> bool {
        let (coefficient, exponent) = self.normalized();
        coefficient.is_zero() || exponent >= 0
    }

    /// Lossy conversion to a native float.
    pub fn to_f64(&self) -> Option<f64> {
        self.to_string().parse().ok()
    }

    /// Strip trailing zeros from the coefficient so equal values compare equal.
    ///
    /// The exponent widens to `i128` since stripping can push it past
    /// `i64::MAX`.
    fn normalized(&self) -> (BigInt, i128) {
        if self.coefficient.is_zero() {
            return (BigInt::zero(), 0);
        }
        let ten = BigInt::from(10u8);
        let mut coefficient = self.coefficient.clone();
        let mut exponent = i128::from(self.exponent);
        while (&coefficient % &ten).is_zero() {
            coefficient = coefficient / &ten;
            exponent += 1;
        }
        (coefficient, exponent)
    }

    /// Exponent of the leading digit, as in `d.ddd * 10^adjusted`.
    fn adjusted_exponent(&self) -> i128 {
        let digits = self.coefficient.abs().to_string().len() as i128;
        i128::from(self.exponent) + digits - 1
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || DecimalError(text.to_string());
        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
            Some(at) => {
                let exponent: i64 = unsigned[at + 1..].parse().map_err(|_| invalid())?;
                (&unsigned[..at], exponent)
            }
            None => (unsigned, 0),
        };
        let (whole, fraction) = match mantissa.find('.') {
            Some(at) => (&mantissa[..at], &mantissa[at + 1..]),
            None => (mantissa, ""),
        };
        let digits = format!("{}{}", whole, fraction);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        let fraction_len = i64::try_from(fraction.len()).map_err(|_| invalid())?;
        let exponent = exponent.checked_sub(fraction_len).ok_or_else(invalid)?;
        Ok(Self {
            coefficient: if negative { -magnitude } else { magnitude },
            exponent,
        })
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let sign = self.coefficient.sign().cmp(&other.coefficient.sign());
        if sign != Ordering::Equal || self.coefficient.is_zero() {
            return Some(sign);
        }
        // Same sign: magnitudes with different leading-digit exponents are
        // ordered by that exponent alone.
        let magnitude = match self.adjusted_exponent().cmp(&other.adjusted_exponent()) {
            Ordering::Equal => {
                // Leading digits line up, so the shift is bounded by the
                // coefficient lengths.
                let common = self.exponent.min(other.exponent);
                let scale = |d: &Decimal| -> Option<BigInt> {
                    let shift = usize::try_from(d.exponent.checked_sub(common)?).ok()?;
                    Some(d.coefficient.abs() * num_traits::pow(BigInt::from(10u8), shift))
                };
                scale(self)?.cmp(&scale(other)?)
            }
            ordering => ordering,
        };
        Some(if self.is_negative() { magnitude.reverse() } else { magnitude })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-")?;
        }
        let digits = self.coefficient.abs().to_string();
        let len = digits.len() as i128;
        let exponent = i128::from(self.exponent);
        let adjusted = exponent + (len - 1);

        if exponent <= 0 && adjusted >= -6 {
            if exponent == 0 {
                return write!(f, "{}", digits);
            }
            let point = len + exponent;
            if point > 0 {
                let (whole, fraction) = digits.split_at(point as usize);
                write!(f, "{}.{}", whole, fraction)
            } else {
                write!(f, "0.{}{}", "0".repeat((-point) as usize), digits)
            }
        } else {
            let (lead, rest) = digits.split_at(1);
            write!(f, "{}", lead)?;
            if !rest.is_empty() {
                write!(f, ".{}", rest)?;
            }
            if adjusted >= 0 {
                write!(f, "e+{}", adjusted)
            } else {
                write!(f, "e{}", adjusted)
            }
        }
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self)
    }
}

impl From<i64> for Decimal {
    fn from(n: i64) -> Self {
        Self::new(BigInt::from(n), 0)
    }
}

/// `10^19` already exceeds `i64::MAX`.
const MAX_I64_SHIFT: i128 = 18;

impl ToPrimitive for Decimal {
    fn to_i64(&self) -> Option<i64> {
        let (coefficient, exponent) = self.normalized();
        if !(0..=MAX_I64_SHIFT).contains(&exponent) {
            return None;
        }
        (coefficient * num_traits::pow(BigInt::from(10u8), exponent as usize)).to_i64()
    }

    fn to_u64(&self) -> Option<u64> {
        self.to_i64().and_then(|n| u64::try_from(n).ok())
    }

    fn to_f64(&self) -> Option<f64> {
        self.to_string().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_plain_integers_round_trip_text() {
        assert_eq!(
            dec("123456789012345678901234567890").to_string(),
            "123456789012345678901234567890"
        );
        assert_eq!(dec("-42").to_string(), "-42");
    }

    #[test]
    fn test_fractions_keep_precision() {
        assert_eq!(
            dec("3.141592653589793238462643383279").to_string(),
            "3.141592653589793238462643383279"
        );
        assert_eq!(dec("0.0001").to_string(), "0.0001");
    }

    #[test]
    fn test_scientific_rendering() {
        assert_eq!(dec("1e10").to_string(), "1e+10");
        assert_eq!(dec("1.5E-9").to_string(), "1.5e-9");
        assert_eq!(dec("+2.5e3").to_string(), "2.5e+3");
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(dec("3.10"), dec("3.1"));
        assert_eq!(dec("1e2"), dec("100"));
        assert_ne!(dec("1e2"), dec("101"));
        assert!(dec("2.5") < dec("3"));
    }

    #[test]
    fn test_rejects_malformed_text() {
        assert!("1e".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!(".".parse::<Decimal>().is_err());
        assert!("1e+".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(dec("1e3").to_i64(), Some(1000));
        assert_eq!(dec("1.5").to_i64(), None);
        assert_eq!(dec("2.5").to_f64(), Some(2.5));
        assert!(dec("1e3").is_integer());
        assert!(!dec("1.25").is_integer());
    }

    #[test]
    fn test_extreme_exponents() {
        let huge = dec("12e9223372036854775807");
        assert_eq!(huge.to_string(), "1.2e+9223372036854775808");
        assert_eq!(dec("1e-9223372036854775808").to_string(), "1e-9223372036854775808");
        assert_eq!(huge.to_i64(), None);
        assert_eq!(dec("10e9223372036854775807").to_i64(), None);
        assert!(huge.is_integer());
        assert_eq!(huge.to_f64(), Some(f64::INFINITY));
    }

    #[test]
    fn test_ordering_across_distant_exponents() {
        let huge = dec("1e9223372036854775807");
        let tiny = dec("1e-9223372036854775808");
        assert!(tiny < huge);
        assert!(dec("-1e9223372036854775807") < tiny);
        assert!(dec("-1e9223372036854775807") < dec("-1e-9223372036854775808"));
        assert!(dec("0") < tiny);
        assert!(dec("99") < dec("1e2"));
        assert!(dec("-2") < dec("-1.5"));
        assert_eq!(dec("10e9223372036854775806"), dec("1e9223372036854775807"));
    }
}
