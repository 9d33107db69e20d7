//! Compact-target encoding and big-integer target math.
//!
//! A 32-bit "bits" field packs a 256-bit proof-of-work target: the high byte
//! is a base-256 exponent, the low 23 bits a mantissa, bit 23 the sign. A
//! header is valid when the big-endian integer value of its parent PoW hash
//! is at most the unpacked target.

use crate::hash::Hash256;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;

/// Unpacks a compact `bits` value into the full target integer.
pub fn compact_to_big(compact: u32) -> BigInt {
    let mantissa = compact & 0x007f_ffff;
    let negative = compact & 0x0080_0000 != 0;
    let exponent = (compact >> 24) as u32;

    // Exponents up to 3 keep the whole value inside the mantissa.
    let mut value = if exponent <= 3 {
        BigInt::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigInt::from(mantissa) << (8 * (exponent - 3))
    };

    if negative {
        value = -value;
    }
    value
}

/// Packs a target integer back into compact form.
pub fn big_to_compact(value: &BigInt) -> u32 {
    if value.is_zero() {
        return 0;
    }

    let (sign, bytes) = value.to_bytes_be();
    let mut exponent = bytes.len() as u32;
    let mut mantissa: u32 = 0;
    for (i, b) in bytes.iter().take(3).enumerate() {
        mantissa |= (*b as u32) << (8 * (2 - i));
    }

    // When the mantissa's top bit is set it would read as the sign bit, so
    // shift one byte into the exponent.
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        exponent += 1;
    }

    let mut compact = (exponent << 24) | mantissa;
    if sign == Sign::Minus {
        compact |= 0x0080_0000;
    }
    compact
}

/// Interprets a hash as a big-endian integer for target comparison.
///
/// Hashes are stored little-endian on the wire, so the byte order flips
/// here.
pub fn hash_to_big(hash: &Hash256) -> BigInt {
    let mut bytes = *hash.as_bytes();
    bytes.reverse();
    BigInt::from_bytes_be(Sign::Plus, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_roundtrip() {
        // Canonical encodings only; a mantissa with a leading zero byte
        // re-packs with a smaller exponent.
        for bits in [0x1d00_ffffu32, 0x1b04_864c, 0x1709_7e2d, 0x0312_3400] {
            let big = compact_to_big(bits);
            assert_eq!(big_to_compact(&big), bits, "bits {:#x}", bits);
        }
    }

    #[test]
    fn zero_target_is_not_positive() {
        assert!(compact_to_big(0).is_zero());
    }

    #[test]
    fn negative_bit_produces_negative_target() {
        let big = compact_to_big(0x0180_1234 | 0x0080_0000);
        assert!(big < BigInt::zero());
    }

    #[test]
    fn hash_ordering_matches_target() {
        let mut low = [0u8; 32];
        low[0] = 1; // little-endian: tiny value
        let mut high = [0u8; 32];
        high[31] = 1; // little-endian: huge value
        assert!(hash_to_big(&Hash256(low)) < hash_to_big(&Hash256(high)));
    }
}
