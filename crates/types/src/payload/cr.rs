//! Council candidate registration payloads.

use super::{MAX_OWNER_KEY_LEN, MAX_SIGNATURE_LEN, MAX_STRING_LEN};
use crate::hash::Hash168;
use crate::wire::{ReadExt, Serializable, VersionedSerializable, WriteExt};
use parity_scale_codec::{Decode, Encode};
use std::io::{self, Read, Write};

/// Payload version that adds the candidate's DID.
pub const CR_INFO_DID_VERSION: u8 = 0x01;

/// Registration or update data for a council candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct CrInfo {
    /// The candidate's redeem script code.
    pub code: Vec<u8>,
    /// The candidate id derived from `code`, unique across the registry.
    pub cid: Hash168,
    /// The candidate's DID program hash.
    pub did: Hash168,
    /// Display name.
    pub nickname: String,
    /// Candidate web presence.
    pub url: String,
    /// Numeric location code.
    pub location: u64,
    /// Candidate signature over the unsigned serialization.
    pub signature: Vec<u8>,
}

impl CrInfo {
    /// Serializes the signed-over fields only.
    pub fn serialize_unsigned<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        w.write_var_bytes(&self.code)?;
        self.cid.serialize(w)?;
        if version >= CR_INFO_DID_VERSION {
            self.did.serialize(w)?;
        }
        w.write_var_string(&self.nickname)?;
        w.write_var_string(&self.url)?;
        w.write_u64(self.location)?;
        Ok(())
    }

    /// The byte string the candidate signs.
    pub fn data_for_signing(&self, version: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = self.serialize_unsigned(&mut buf, version);
        buf
    }
}

impl VersionedSerializable for CrInfo {
    fn serialize<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        self.serialize_unsigned(w, version)?;
        w.write_var_bytes(&self.signature)
    }

    fn deserialize<R: Read>(r: &mut R, version: u8) -> io::Result<Self> {
        let code = r.read_var_bytes(MAX_OWNER_KEY_LEN, "code")?;
        let cid = Hash168::deserialize(r)?;
        let did = if version >= CR_INFO_DID_VERSION {
            Hash168::deserialize(r)?
        } else {
            Hash168::ZERO
        };
        let nickname = r.read_var_string(MAX_STRING_LEN, "nickname")?;
        let url = r.read_var_string(MAX_STRING_LEN, "url")?;
        let location = r.read_u64()?;
        let signature = r.read_var_bytes(MAX_SIGNATURE_LEN, "signature")?;
        Ok(CrInfo {
            code,
            cid,
            did,
            nickname,
            url,
            location,
            signature,
        })
    }
}

/// Deregistration of a council candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnregisterCr {
    /// The candidate id to retire.
    pub cid: Hash168,
    /// Candidate signature over the unsigned serialization.
    pub signature: Vec<u8>,
}

impl UnregisterCr {
    /// Serializes the signed-over fields only.
    pub fn serialize_unsigned<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        self.cid.serialize(w)
    }

    /// The byte string the candidate signs.
    pub fn data_for_signing(&self, version: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = self.serialize_unsigned(&mut buf, version);
        buf
    }
}

impl VersionedSerializable for UnregisterCr {
    fn serialize<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        self.serialize_unsigned(w, version)?;
        w.write_var_bytes(&self.signature)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        let cid = Hash168::deserialize(r)?;
        let signature = r.read_var_bytes(MAX_SIGNATURE_LEN, "signature")?;
        Ok(UnregisterCr { cid, signature })
    }
}
