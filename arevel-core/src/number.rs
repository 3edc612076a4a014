//! Arbitrary precision numbers using dashu
//!
//! Uses dashu-float (DBig) for decimal arithmetic, so literals such as `0.1`
//! are represented exactly and `0.1 + 0.2 == 0.3` holds.

use dashu_float::DBig;
use dashu_int::IBig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error type for number operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("Invalid number format: {0}")]
    ParseError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Overflow: result too large")]
    Overflow,
}

/// Default precision for calculations (decimal digits)
pub const DEFAULT_PRECISION: usize = 50;

/// Largest integer exponent accepted by [`Number::pow`]
const MAX_EXPONENT: i64 = 1_000_000;

/// Padding zeros [`Display`](std::fmt::Display) writes before switching to
/// exponent notation
const MAX_PADDING: usize = 64;

/// Arbitrary precision decimal number
///
/// Built on dashu-float's DBig. All operations return Results or new
/// Numbers - never panic.
#[derive(Debug, Clone)]
pub struct Number {
    inner: DBig,
}

impl Number {
    // ========== Construction ==========

    /// Ensure a DBig has adequate precision for calculations
    fn with_work_precision(val: DBig) -> DBig {
        Self::with_at_least(val, DEFAULT_PRECISION)
    }

    fn with_at_least(val: DBig, digits: usize) -> DBig {
        val.with_precision(digits.max(DEFAULT_PRECISION)).value()
    }

    /// Create from the textual form produced by the lexer.
    /// Supports: "123", "3.14", ".5", "-42", "1e-10", "1.5E+3"
    ///
    /// Every written digit is kept, even beyond [`DEFAULT_PRECISION`].
    pub fn from_str(s: &str) -> Result<Self, NumberError> {
        let s = s.trim();
        let parse_error = || NumberError::ParseError(s.to_string());

        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => {
                let exp: isize = unsigned[pos + 1..].parse().map_err(|_| parse_error())?;
                (&unsigned[..pos], exp)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(parse_error());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(parse_error());
        }

        // significand * 10^exponent, exact
        let digits = format!("{}{}", int_part, frac_part);
        let mut significand: IBig = digits.parse().map_err(|_| parse_error())?;
        if negative {
            significand = -significand;
        }
        let scale = exponent
            .checked_sub(frac_part.len() as isize)
            .ok_or(NumberError::Overflow)?;

        let written = digits.trim_start_matches('0').len();
        Ok(Self { inner: Self::with_at_least(DBig::from_parts(significand, scale), written) })
    }

    /// Create from i64 with working precision
    pub fn from_i64(n: i64) -> Self {
        Self { inner: Self::with_work_precision(DBig::from(n)) }
    }

    // ========== Predicates ==========

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.inner == DBig::ZERO
    }

    /// Check if negative
    pub fn is_negative(&self) -> bool {
        self.inner < DBig::ZERO
    }

    /// Check if value is an integer
    pub fn is_integer(&self) -> bool {
        let floor_val = self.inner.clone().floor();
        self.inner == floor_val
    }

    // ========== Basic Arithmetic ==========

    /// Addition
    pub fn add(&self, other: &Self) -> Self {
        Self { inner: &self.inner + &other.inner }
    }

    /// Subtraction
    pub fn sub(&self, other: &Self) -> Self {
        Self { inner: &self.inner - &other.inner }
    }

    /// Multiplication
    pub fn mul(&self, other: &Self) -> Self {
        Self { inner: &self.inner * &other.inner }
    }

    /// Negation
    pub fn neg(&self) -> Self {
        Self { inner: -&self.inner }
    }

    /// Safe division (returns Result, never panics)
    pub fn checked_div(&self, other: &Self) -> Result<Self, NumberError> {
        if other.is_zero() {
            Err(NumberError::DivisionByZero)
        } else {
            Ok(Self { inner: &self.inner / &other.inner })
        }
    }

    /// Remainder with the sign of the dividend: `a - trunc(a / b) * b`
    pub fn checked_rem(&self, other: &Self) -> Result<Self, NumberError> {
        let quotient = self.checked_div(other)?.trunc();
        Ok(self.sub(&quotient.mul(other)))
    }

    /// Integer power by repeated squaring
    pub fn pow(&self, exp: i64) -> Result<Self, NumberError> {
        if exp.abs() > MAX_EXPONENT {
            return Err(NumberError::Overflow);
        }
        if exp == 0 {
            return Ok(Self::from_i64(1));
        }

        let mut remaining = exp.unsigned_abs();
        let mut base = self.clone();
        let mut result = Self::from_i64(1);
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = result.mul(&base);
            }
            remaining >>= 1;
            if remaining > 0 {
                base = base.mul(&base);
            }
        }

        if exp < 0 {
            Self::from_i64(1).checked_div(&result)
        } else {
            Ok(result)
        }
    }

    /// Real-valued power: x^y = exp(y * ln(x)), `precision` significant
    /// digits for the fractional case
    pub fn pow_real(&self, exp: &Self, precision: u32) -> Result<Self, NumberError> {
        if exp.is_integer() {
            return match exp.to_i64() {
                Some(e) => self.pow(e),
                None => Err(NumberError::Overflow),
            };
        }
        if self.is_zero() {
            return if exp.is_negative() {
                Err(NumberError::DivisionByZero)
            } else {
                Ok(Self::from_i64(0))
            };
        }
        if self.is_negative() {
            return Err(NumberError::DomainError(
                "fractional power of negative number".to_string(),
            ));
        }
        if precision == 0 {
            return Err(NumberError::DomainError(
                "fractional power needs a precision of at least one digit".to_string(),
            ));
        }

        let ln_x = self.inner.clone().with_precision(precision as usize).value().ln();
        let product = &ln_x * &exp.inner;
        Ok(Self { inner: product.exp() })
    }

    // ========== Other Operations ==========

    /// Floor - largest integer <= x
    pub fn floor(&self) -> Self {
        Self { inner: self.inner.clone().floor() }
    }

    /// Ceiling - smallest integer >= x
    pub fn ceil(&self) -> Self {
        Self { inner: self.inner.clone().ceil() }
    }

    /// Round toward zero
    pub fn trunc(&self) -> Self {
        if self.is_negative() {
            self.ceil()
        } else {
            self.floor()
        }
    }

    /// Try to convert to i64
    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }

        // DBig stores as significand * 10^exponent
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        if exponent > 18 {
            return None;
        }
        let ten = IBig::from(10u8);
        let value = if exponent >= 0 {
            significand * ten.pow(exponent as usize)
        } else {
            let divisor = ten.pow(exponent.unsigned_abs());
            if &significand % &divisor != IBig::ZERO {
                return None;
            }
            significand / divisor
        };
        value.try_into().ok()
    }

    /// Render the exact decimal expansion with trailing fractional zeros
    /// removed. Values that would need more than [`MAX_PADDING`] padding
    /// zeros are written as `<digits>e<exponent>` instead.
    fn render(&self) -> String {
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        if significand == IBig::ZERO {
            return "0".to_string();
        }

        let negative = significand < IBig::ZERO;
        let digits = if negative { (-significand).to_string() } else { significand.to_string() };

        let mut out = String::with_capacity(digits.len() + 2);
        if negative {
            out.push('-');
        }

        let padding = if exponent >= 0 {
            exponent.unsigned_abs()
        } else {
            exponent.unsigned_abs().saturating_sub(digits.len())
        };
        if padding > MAX_PADDING {
            let kept = digits.trim_end_matches('0');
            let exponent = exponent + (digits.len() - kept.len()) as isize;
            out.push_str(kept);
            out.push('e');
            out.push_str(&exponent.to_string());
            return out;
        }

        if exponent >= 0 {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take(exponent as usize));
            return out;
        }

        let scale = exponent.unsigned_abs();
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            out.push_str(int_part);
            out.push('.');
            out.push_str(frac_part);
        } else {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take(scale - digits.len()));
            out.push_str(&digits);
        }

        let trimmed = out.trim_end_matches('0').trim_end_matches('.').len();
        out.truncate(trimmed);
        out
    }
}

// ========== Trait Implementations ==========

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // DBig implements PartialOrd, use it and treat None as Equal
        self.inner.partial_cmp(&other.inner).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Self::from_i64(n)
    }
}
