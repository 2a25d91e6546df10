// src/ledger/quantity.rs

//! Exact decimal quantities
//!
//! A [`Quantity`] stores `mantissa × 10^-scale`, the same shape the ledger
//! server uses on the wire (`decimalMantissa` / `decimalPlaces`). Money math
//! stays exact; [`Quantity::to_approx`] exists for display and ordering only
//! and must never be used for persistence equality.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Largest scale we accept; 10^18 still fits in an i64
pub const MAX_SCALE: u32 = 18;

/// Exact decimal number: `mantissa × 10^-scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Quantity {
    pub mantissa: i64,
    pub scale: u32,
}

impl Quantity {
    pub const ZERO: Quantity = Quantity { mantissa: 0, scale: 0 };

    pub const fn new(mantissa: i64, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    /// Parse a plain decimal string such as `-123.45`, `1000` or `+0.5`
    ///
    /// The digit count after the decimal point becomes the scale; no point
    /// means scale 0. Grouping characters are not accepted here; callers
    /// normalise locale-specific input first.
    pub fn from_decimal_str(text: &str) -> Result<Self> {
        let text = text.trim();
        let (negative, body) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (int_part, frac_part) = match body.find('.') {
            Some(pos) => (&body[..pos], &body[pos + 1..]),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::parse(format!("empty decimal: {text:?}")));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::parse(format!("invalid decimal: {text:?}")));
        }

        let scale = frac_part.len() as u32;
        if scale > MAX_SCALE {
            return Err(Error::parse(format!("too many decimal places: {text:?}")));
        }

        let digits = format!("{int_part}{frac_part}");
        let magnitude: i64 = if digits.is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|_| Error::parse(format!("decimal out of range: {text:?}")))?
        };

        Ok(Self {
            mantissa: if negative { -magnitude } else { magnitude },
            scale,
        })
    }

    /// Approximate floating point value, for display and ordering only
    pub fn to_approx(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// Express the same value with a larger scale
    ///
    /// Returns `None` when shrinking would lose digits or the mantissa overflows.
    pub fn rescale(&self, scale: u32) -> Option<Self> {
        match scale.cmp(&self.scale) {
            Ordering::Equal => Some(*self),
            Ordering::Greater => {
                let factor = 10i64.checked_pow(scale - self.scale)?;
                Some(Self {
                    mantissa: self.mantissa.checked_mul(factor)?,
                    scale,
                })
            }
            Ordering::Less => {
                let factor = 10i64.checked_pow(self.scale - scale)?;
                if self.mantissa % factor != 0 {
                    return None;
                }
                Some(Self {
                    mantissa: self.mantissa / factor,
                    scale,
                })
            }
        }
    }

    /// Exact addition at the larger of both scales
    pub fn checked_add(self, other: Self) -> Option<Self> {
        let scale = self.scale.max(other.scale);
        let a = self.rescale(scale)?;
        let b = other.rescale(scale)?;
        Some(Self {
            mantissa: a.mantissa.checked_add(b.mantissa)?,
            scale,
        })
    }

    /// Addition that reports overflow as a parse error
    pub fn try_add(self, other: Self) -> Result<Self> {
        self.checked_add(other)
            .ok_or_else(|| Error::parse(format!("quantity overflow adding {self} and {other}")))
    }

    pub fn negate(self) -> Self {
        Self {
            mantissa: -self.mantissa,
            scale: self.scale,
        }
    }

    /// Compare by value regardless of scale
    pub fn value_cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        match (self.rescale(scale), other.rescale(scale)) {
            (Some(a), Some(b)) => a.mantissa.cmp(&b.mantissa),
            _ => self
                .to_approx()
                .partial_cmp(&other.to_approx())
                .unwrap_or(Ordering::Equal),
        }
    }

    pub fn value_eq(&self, other: &Self) -> bool {
        self.value_cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        if self.scale == 0 {
            return write!(f, "{sign}{digits}");
        }

        let scale = self.scale as usize;
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_decimal_str(s)
    }
}
