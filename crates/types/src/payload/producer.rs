//! Producer registration and lifecycle payloads.

use super::{
    MAX_OWNER_KEY_LEN, MAX_SIGNATURE_LEN, MAX_STRING_LEN, PROCESS_PRODUCER_SCHNORR_VERSION,
};
use crate::wire::{ReadExt, VersionedSerializable, WriteExt};
use parity_scale_codec::{Decode, Encode};
use std::io::{self, Read, Write};

/// Payload version that adds the `stake_until` field, marking a producer as
/// DPoS v2.
pub const PRODUCER_INFO_DPOS_V2_VERSION: u8 = 0x01;

/// Registration or update data for a DPoS producer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct ProducerInfo {
    /// The producer's owner key: a public key or a multi-sign code.
    pub owner_key: Vec<u8>,
    /// The node public key used in the producing rotation.
    pub node_key: Vec<u8>,
    /// Display name, unique across the registry.
    pub nickname: String,
    /// Producer web presence.
    pub url: String,
    /// Numeric location code.
    pub location: u64,
    /// Network address for arbiter p2p.
    pub net_address: String,
    /// Height until which the stake is locked; non-zero marks DPoS v2.
    pub stake_until: u32,
    /// Owner signature over the unsigned serialization.
    pub signature: Vec<u8>,
}

impl ProducerInfo {
    /// Serializes the signed-over fields only.
    pub fn serialize_unsigned<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        w.write_var_bytes(&self.owner_key)?;
        w.write_var_bytes(&self.node_key)?;
        w.write_var_string(&self.nickname)?;
        w.write_var_string(&self.url)?;
        w.write_u64(self.location)?;
        w.write_var_string(&self.net_address)?;
        if version >= PRODUCER_INFO_DPOS_V2_VERSION {
            w.write_u32(self.stake_until)?;
        }
        Ok(())
    }

    /// The byte string the owner key signs.
    pub fn data_for_signing(&self, version: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.serialize_unsigned(&mut buf, version);
        buf
    }

    /// True when the producer registered with DPoS v2 staking semantics.
    pub fn is_dpos_v2(&self) -> bool {
        self.stake_until > 0
    }
}

impl VersionedSerializable for ProducerInfo {
    fn serialize<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        self.serialize_unsigned(w, version)?;
        w.write_var_bytes(&self.signature)
    }

    fn deserialize<R: Read>(r: &mut R, version: u8) -> io::Result<Self> {
        let owner_key = r.read_var_bytes(MAX_OWNER_KEY_LEN, "owner key")?;
        let node_key = r.read_var_bytes(MAX_OWNER_KEY_LEN, "node key")?;
        let nickname = r.read_var_string(MAX_STRING_LEN, "nickname")?;
        let url = r.read_var_string(MAX_STRING_LEN, "url")?;
        let location = r.read_u64()?;
        let net_address = r.read_var_string(MAX_STRING_LEN, "net address")?;
        let stake_until = if version >= PRODUCER_INFO_DPOS_V2_VERSION {
            r.read_u32()?
        } else {
            0
        };
        let signature = r.read_var_bytes(MAX_SIGNATURE_LEN, "signature")?;
        Ok(ProducerInfo {
            owner_key,
            node_key,
            nickname,
            url,
            location,
            net_address,
            stake_until,
            signature,
        })
    }
}

/// Payload of a producer lifecycle operation signed by the owner key,
/// currently only cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessProducer {
    /// The owner key of the affected producer.
    pub owner_key: Vec<u8>,
    /// Inline owner signature; absent from the wire at Schnorr and
    /// multi-code versions, which sign through the outer witness.
    pub signature: Vec<u8>,
}

impl ProcessProducer {
    /// Serializes the signed-over fields only.
    pub fn serialize_unsigned<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_var_bytes(&self.owner_key)
    }

    /// The byte string the owner key signs.
    pub fn data_for_signing(&self, version: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = self.serialize_unsigned(&mut buf, version);
        buf
    }
}

impl VersionedSerializable for ProcessProducer {
    fn serialize<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        self.serialize_unsigned(w, version)?;
        if version < PROCESS_PRODUCER_SCHNORR_VERSION {
            w.write_var_bytes(&self.signature)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, version: u8) -> io::Result<Self> {
        let owner_key = r.read_var_bytes(MAX_OWNER_KEY_LEN, "owner key")?;
        let signature = if version < PROCESS_PRODUCER_SCHNORR_VERSION {
            r.read_var_bytes(MAX_SIGNATURE_LEN, "signature")?
        } else {
            Vec::new()
        };
        Ok(ProcessProducer {
            owner_key,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stake_until_gated_by_version() {
        let info = ProducerInfo {
            owner_key: vec![2; 33],
            node_key: vec![3; 33],
            nickname: "node-1".into(),
            stake_until: 1000,
            ..Default::default()
        };

        let mut v0 = Vec::new();
        info.serialize(&mut v0, 0).unwrap();
        let decoded0 = ProducerInfo::deserialize(&mut v0.as_slice(), 0).unwrap();
        assert_eq!(decoded0.stake_until, 0);

        let mut v1 = Vec::new();
        info.serialize(&mut v1, PRODUCER_INFO_DPOS_V2_VERSION).unwrap();
        let decoded1 =
            ProducerInfo::deserialize(&mut v1.as_slice(), PRODUCER_INFO_DPOS_V2_VERSION).unwrap();
        assert_eq!(decoded1.stake_until, 1000);
        assert!(decoded1.is_dpos_v2());
    }

    #[test]
    fn schnorr_version_omits_inline_signature() {
        let p = ProcessProducer {
            owner_key: vec![2; 33],
            signature: vec![9; 64],
        };

        let mut legacy = Vec::new();
        p.serialize(&mut legacy, 0).unwrap();
        let mut schnorr = Vec::new();
        p.serialize(&mut schnorr, PROCESS_PRODUCER_SCHNORR_VERSION).unwrap();
        assert!(schnorr.len() < legacy.len());

        let decoded =
            ProcessProducer::deserialize(&mut schnorr.as_slice(), PROCESS_PRODUCER_SCHNORR_VERSION)
                .unwrap();
        assert!(decoded.signature.is_empty());
    }

    #[test]
    fn data_for_signing_excludes_signature() {
        let mut p = ProcessProducer {
            owner_key: vec![2; 33],
            signature: Vec::new(),
        };
        let unsigned = p.data_for_signing(0);
        p.signature = vec![1; 64];
        assert_eq!(p.data_for_signing(0), unsigned);
    }
}
