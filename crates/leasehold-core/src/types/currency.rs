//! Currency amounts
//!
//! Amounts are counted in the smallest currency unit and stored as `u128`.
//! Arithmetic saturates at `u128::MAX`; no real balance gets anywhere near
//! that bound.
//!
//! Amounts that fit in a `u64` serialize as plain numbers, larger ones as
//! decimal strings, since not every format carries 128-bit integers.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// An amount of money in the smallest currency unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency(pub u128);

impl Currency {
    /// Zero amount
    pub const ZERO: Currency = Currency(0);

    /// Create from a raw amount
    pub const fn new(amount: u128) -> Self {
        Self(amount)
    }

    /// Raw amount
    pub const fn amount(self) -> u128 {
        self.0
    }

    /// True when the amount is zero
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction
    pub const fn saturating_sub(self, other: Currency) -> Currency {
        Currency(self.0.saturating_sub(other.0))
    }

    /// Multiply by a unit count, saturating
    pub const fn saturating_mul(self, units: u64) -> Currency {
        Currency(self.0.saturating_mul(units as u128))
    }
}

impl Add for Currency {
    type Output = Currency;

    fn add(self, rhs: Currency) -> Currency {
        Currency(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Currency {
    fn add_assign(&mut self, rhs: Currency) {
        *self = *self + rhs;
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Currency {
        iter.fold(Currency::ZERO, Add::add)
    }
}

impl From<u64> for Currency {
    fn from(amount: u64) -> Self {
        Self(u128::from(amount))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} H", self.0)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(self.0) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.collect_str(&self.0),
        }
    }
}

struct CurrencyVisitor;

impl<'de> Visitor<'de> for CurrencyVisitor {
    type Value = Currency;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Currency, E> {
        Ok(Currency::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Currency, E> {
        Ok(Currency(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Currency, E> {
        u64::try_from(v)
            .map(Currency::from)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Currency, E> {
        v.trim()
            .parse::<u128>()
            .map(Currency)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Currency, D::Error> {
        deserializer.deserialize_any(CurrencyVisitor)
    }
}
