use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of fractional digits carried by [`Money`].
pub const MONEY_SCALE: u32 = 6;
/// Micro-units per whole currency unit.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// Exact fixed-point monetary amount stored as signed micro-units.
///
/// Rates carry six decimals (`0.002500`), file earnings four and user
/// balances two; keeping everything in micro-units lets file-level and
/// user-level aggregates reconcile without rounding drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Builds an amount from hundredths, e.g. `1000` for `10.00`.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents * (MICROS_PER_UNIT / 100))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn max(self, other: Money) -> Money {
        Money(self.0.max(other.0))
    }

    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Multiplies by `numerator / denominator`, rounding half to even.
    pub fn mul_ratio(self, numerator: i64, denominator: i64) -> Money {
        let product = i128::from(self.0) * i128::from(numerator);
        Money(div_round_half_even(product, i128::from(denominator)) as i64)
    }

    /// Multiplies by `numerator / denominator` and rounds once to `places`
    /// fractional digits, half to even.
    pub fn mul_ratio_dp(self, numerator: i64, denominator: i64, places: u32) -> Money {
        let step = 10_i128.pow(MONEY_SCALE - places.min(MONEY_SCALE));
        let product = i128::from(self.0) * i128::from(numerator);
        Money((div_round_half_even(product, i128::from(denominator) * step) * step) as i64)
    }

    /// Rounds to `places` fractional digits (0..=6), half to even.
    pub fn round_dp(self, places: u32) -> Money {
        let places = places.min(MONEY_SCALE);
        let step = 10_i128.pow(MONEY_SCALE - places);
        let rounded = div_round_half_even(i128::from(self.0), step) * step;
        Money(rounded as i64)
    }

    /// Number of fractional digits actually used (trailing zeros ignored).
    pub fn fractional_digits(self) -> u32 {
        let mut frac = (self.0 % MICROS_PER_UNIT).abs();
        if frac == 0 {
            return 0;
        }
        let mut digits = MONEY_SCALE;
        while frac % 10 == 0 {
            frac /= 10;
            digits -= 1;
        }
        digits
    }

    /// Renders with exactly `places` fractional digits (after rounding).
    pub fn format_dp(self, places: u32) -> String {
        let places = places.min(MONEY_SCALE);
        let rounded = self.round_dp(places).0;
        let sign = if rounded < 0 { "-" } else { "" };
        let abs = rounded.unsigned_abs();
        let units = abs / MICROS_PER_UNIT as u64;
        if places == 0 {
            return format!("{sign}{units}");
        }
        let frac = (abs % MICROS_PER_UNIT as u64) / 10_u64.pow(MONEY_SCALE - places);
        format!("{sign}{units}.{frac:0width$}", width = places as usize)
    }

    /// Lossy conversion used for JSON numbers on input.
    pub fn from_f64(value: f64) -> Result<Money, MoneyParseError> {
        if !value.is_finite() {
            return Err(MoneyParseError::Invalid(value.to_string()));
        }
        let scaled = (value * MICROS_PER_UNIT as f64).round();
        if scaled.abs() > i64::MAX as f64 {
            return Err(MoneyParseError::Overflow);
        }
        Ok(Money(scaled as i64))
    }
}

fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);
    let twice = remainder * 2;
    if twice > denominator || (twice == denominator && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    #[error("`{0}` is not a valid amount")]
    Invalid(String),
    #[error("amounts carry at most {MONEY_SCALE} decimal places")]
    TooPrecise,
    #[error("amount is out of range")]
    Overflow,
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let invalid = || MoneyParseError::Invalid(raw.to_string());
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > MONEY_SCALE as usize {
            return Err(MoneyParseError::TooPrecise);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| MoneyParseError::Overflow)?
        };
        let frac_micros: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = MONEY_SCALE as usize);
            padded.parse().map_err(|_| invalid())?
        };
        let micros = whole
            .checked_mul(MICROS_PER_UNIT)
            .and_then(|value| value.checked_add(frac_micros))
            .ok_or(MoneyParseError::Overflow)?;
        Ok(Money(if negative { -micros } else { micros }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_dp(MONEY_SCALE))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawAmount::deserialize(deserializer)? {
            RawAmount::Text(text) => text.parse(),
            RawAmount::Integer(units) => units
                .checked_mul(MICROS_PER_UNIT)
                .map(Money)
                .ok_or(MoneyParseError::Overflow),
            RawAmount::Float(value) => Money::from_f64(value),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("10.00".parse::<Money>().unwrap(), Money::from_cents(1000));
        assert_eq!("0.0025".parse::<Money>().unwrap(), Money::from_micros(2_500));
        assert_eq!(".5".parse::<Money>().unwrap(), Money::from_micros(500_000));
        assert_eq!("-1.5".parse::<Money>().unwrap(), Money::from_micros(-1_500_000));
        assert_eq!(
            "0.0000001".parse::<Money>(),
            Err(MoneyParseError::TooPrecise)
        );
        assert!("1,50".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!(".".parse::<Money>().is_err());
    }

    #[test]
    fn formats_with_fixed_places() {
        let amount = Money::from_micros(3_750);
        assert_eq!(amount.to_string(), "0.003750");
        assert_eq!(amount.format_dp(4), "0.0038");
        assert_eq!(Money::from_cents(-1050).format_dp(2), "-10.50");
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(Money::from_micros(250).round_dp(3), Money::from_micros(0));
        assert_eq!(Money::from_micros(1_500).round_dp(3), Money::from_micros(2_000));
        assert_eq!(Money::from_micros(2_500).round_dp(3), Money::from_micros(2_000));
        assert_eq!(Money::from_micros(2_501).round_dp(3), Money::from_micros(3_000));
    }

    #[test]
    fn mul_ratio_applies_download_multiplier() {
        assert_eq!(
            Money::from_micros(2_500).mul_ratio(3, 2),
            Money::from_micros(3_750)
        );
    }

    #[test]
    fn fractional_digits_ignores_trailing_zeros() {
        assert_eq!(Money::from_cents(1000).fractional_digits(), 0);
        assert_eq!(Money::from_cents(999).fractional_digits(), 2);
        assert_eq!(Money::from_micros(3_750).fractional_digits(), 5);
    }

    #[test]
    fn deserializes_strings_and_numbers() {
        let from_text: Money = serde_json::from_str("\"12.5\"").unwrap();
        let from_int: Money = serde_json::from_str("12").unwrap();
        let from_float: Money = serde_json::from_str("12.5").unwrap();
        assert_eq!(from_text, Money::from_cents(1250));
        assert_eq!(from_int, Money::from_cents(1200));
        assert_eq!(from_float, Money::from_cents(1250));
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "\"12.500000\"");
    }
}
