//! Fixed-width hash identifiers.
//!
//! [`Hash256`] identifies transactions, blocks and proposals; [`Hash168`] is
//! the program hash form of an address. Both are stored as raw little-endian
//! bytes, the exact bytes that go on the wire.

use crate::wire::{ReadExt, Serializable, WriteExt};
use parity_scale_codec::{Decode, Encode};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};

/// A 256-bit identifier: transaction hash, block hash, proposal hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct Hash256(pub [u8; 32]);

/// A 168-bit program hash identifying a payment destination.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct Hash168(pub [u8; 21]);

impl Hash256 {
    /// The all-zero hash.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Double SHA-256 of `data`, the digest used for all chain identities.
    pub fn double_sha256(data: &[u8]) -> Hash256 {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        Hash256(out)
    }

    /// Builds a hash from a byte slice, failing on length mismatch.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash256> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Hash256(arr))
    }

    /// Raw little-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Hash168 {
    /// The all-zero program hash.
    pub const ZERO: Hash168 = Hash168([0u8; 21]);

    /// Derives the deposit/reward program hash owned by a key or code.
    ///
    /// The derivation only needs to be deterministic and collision-resistant
    /// inside the registry; it truncates the double SHA-256 of the key.
    pub fn from_key(key: &[u8]) -> Hash168 {
        let digest = Hash256::double_sha256(key);
        let mut out = [0u8; 21];
        out.copy_from_slice(&digest.as_bytes()[..21]);
        Hash168(out)
    }

    /// Builds a program hash from a byte slice, failing on length mismatch.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash168> {
        let arr: [u8; 21] = bytes.try_into().ok()?;
        Some(Hash168(arr))
    }

    /// Raw little-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 21] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rendered big-endian, the conventional direction for chain ids.
        let mut rev = self.0;
        rev.reverse();
        write!(f, "{}", hex::encode(rev))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

impl fmt::Display for Hash168 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash168 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash168({})", self)
    }
}

impl Serializable for Hash256 {
    fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.0)
    }

    fn deserialize<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let mut buf = [0u8; 32];
        r.read_exact(&mut buf)?;
        Ok(Hash256(buf))
    }
}

impl Serializable for Hash168 {
    fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.0)
    }

    fn deserialize<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let mut buf = [0u8; 21];
        r.read_exact(&mut buf)?;
        Ok(Hash168(buf))
    }
}

impl serde::Serialize for Hash256 {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for Hash256 {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        use serde::Deserialize;
        let text = String::deserialize(d)?;
        let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
        Hash256::from_slice(&bytes)
            .ok_or_else(|| serde::de::Error::custom("expected 32 hex-encoded bytes"))
    }
}

impl serde::Serialize for Hash168 {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for Hash168 {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        use serde::Deserialize;
        let text = String::deserialize(d)?;
        let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
        Hash168::from_slice(&bytes)
            .ok_or_else(|| serde::de::Error::custom("expected 21 hex-encoded bytes"))
    }
}

// Keep the blanket var-list helpers usable for hash lists.
impl Hash256 {
    /// Reads a length-prefixed list of hashes.
    pub fn read_var_list<R: Read>(r: &mut R) -> std::io::Result<Vec<Hash256>> {
        let count = r.read_var_uint()?;
        let mut out = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            out.push(Hash256::deserialize(r)?);
        }
        Ok(out)
    }

    /// Writes a length-prefixed list of hashes.
    pub fn write_var_list<W: Write>(w: &mut W, hashes: &[Hash256]) -> std::io::Result<()> {
        w.write_var_uint(hashes.len() as u64)?;
        for h in hashes {
            h.serialize(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_sha256_known_vector() {
        // sha256d of the empty string.
        let h = Hash256::double_sha256(b"");
        assert_eq!(
            hex::encode(h.0),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn display_reverses_bytes() {
        let mut raw = [0u8; 32];
        raw[0] = 0xab;
        let h = Hash256(raw);
        assert!(h.to_string().ends_with("ab"));
    }

    #[test]
    fn wire_roundtrip() {
        let h = Hash256::double_sha256(b"kestrel");
        let bytes = crate::wire::to_bytes(&h).unwrap();
        assert_eq!(bytes.len(), 32);
        let back: Hash256 = crate::wire::from_bytes(&bytes).unwrap();
        assert_eq!(h, back);
    }
}
