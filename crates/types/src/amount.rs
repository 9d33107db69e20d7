//! Signed fixed-point coin amount.
//!
//! One coin is `10^8` grains. Arithmetic on amounts saturates at the `i64`
//! bounds; intermediate sums over valid UTXOs never reach them, so
//! saturation only shows up on adversarial inputs where the containing check
//! fails anyway.

use crate::wire::{ReadExt, Serializable, WriteExt};
use parity_scale_codec::{Decode, Encode};
use std::fmt;
use std::io::{Read, Write};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of grains per whole coin.
pub const GRAINS_PER_COIN: i64 = 100_000_000;

/// A signed 64-bit fixed-point amount with 8 decimal places.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub i64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Constructs an amount from raw grains units.
    pub const fn from_grains(grains: i64) -> Amount {
        Amount(grains)
    }

    /// Constructs an amount from whole coins.
    pub const fn from_coins(coins: i64) -> Amount {
        Amount(coins * GRAINS_PER_COIN)
    }

    /// Raw grains value.
    pub const fn grains(self) -> i64 {
        self.0
    }

    /// Checked addition, `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction, `None` on overflow.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// True when the amount is strictly positive.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// True when the amount is negative.
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Ceiling of `self * num / den` in exact integer arithmetic.
    ///
    /// Reward splits are specified as ceilings of fractional products; doing
    /// the computation over 128-bit integers reproduces them bit-exactly on
    /// every platform.
    pub fn ceil_mul(self, num: i64, den: i64) -> Amount {
        debug_assert!(den > 0);
        let wide = self.0 as i128 * num as i128;
        let den = den as i128;
        let ceil = (wide + den - 1).div_euclid(den);
        Amount(ceil as i64)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = *self - rhs;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:08}",
            sign,
            abs / GRAINS_PER_COIN as u64,
            abs % GRAINS_PER_COIN as u64
        )
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self)
    }
}

impl Serializable for Amount {
    fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u64(self.0 as u64)
    }

    fn deserialize<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok(Amount(r.read_u64()? as i64))
    }
}
