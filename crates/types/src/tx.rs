//! Transaction, input, output and witness program structures.

use crate::amount::Amount;
use crate::hash::{Hash168, Hash256};
use crate::payload::{read_tx_type, Payload, TxType, MAX_STRING_LEN};
pub use crate::payload::{OutputPayload, OutputType};
use crate::wire::{invalid_data, ReadExt, Serializable, WriteExt};
use std::io::{self, Read, Write};

/// Transaction version that adds typed outputs with payloads.
pub const TX_VERSION_09: u8 = 0x09;

/// Sequence value that finalizes an input regardless of lock time.
pub const MAX_SEQUENCE: u32 = u16::MAX as u32;

/// Most attributes, inputs, outputs or programs in one transaction.
pub const MAX_TX_LIST_LEN: usize = 1 << 16;

/// A reference to a previous transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OutPoint {
    /// Hash of the transaction being spent.
    pub tx_hash: Hash256,
    /// Index of the output within that transaction.
    pub index: u16,
}

impl OutPoint {
    /// The canonical byte key identifying this output reference:
    /// `tx hash bytes ∥ big-endian index`.
    ///
    /// This key is stored in snapshots, so its layout must never change.
    pub fn refer_key(&self) -> ReferKey {
        let mut bytes = [0u8; 34];
        bytes[..32].copy_from_slice(self.tx_hash.as_bytes());
        bytes[32..].copy_from_slice(&self.index.to_be_bytes());
        ReferKey(bytes)
    }
}

impl Serializable for OutPoint {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.tx_hash.serialize(w)?;
        w.write_u16(self.index)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(OutPoint {
            tx_hash: Hash256::deserialize(r)?,
            index: r.read_u16()?,
        })
    }
}

/// The canonical map key for a previous-output reference.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    parity_scale_codec::Encode,
    parity_scale_codec::Decode,
)]
pub struct ReferKey(pub [u8; 34]);

/// A transaction input spending a previous output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Input {
    /// The spent output.
    pub previous: OutPoint,
    /// Relative finality counter; [`MAX_SEQUENCE`] disables lock time.
    pub sequence: u32,
}

impl Input {
    /// The canonical byte key of the spent output.
    pub fn refer_key(&self) -> ReferKey {
        self.previous.refer_key()
    }
}

impl Serializable for Input {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.previous.serialize(w)?;
        w.write_u32(self.sequence)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Input {
            previous: OutPoint::deserialize(r)?,
            sequence: r.read_u32()?,
        })
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Output {
    /// Asset being transferred; the chain's native asset everywhere today.
    pub asset_id: Hash256,
    /// Amount of the output, never negative in a valid transaction.
    pub value: Amount,
    /// Lock height; 0 for immediately spendable.
    pub output_lock: u32,
    /// Destination program hash.
    pub program_hash: Hash168,
    /// Output kind, meaningful for tx version ≥ 0x09.
    pub output_type: OutputType,
    /// Kind-specific payload.
    pub payload: OutputPayload,
}

impl Output {
    /// Writes the output at the transaction's version.
    pub fn serialize<W: Write>(&self, w: &mut W, tx_version: u8) -> io::Result<()> {
        self.asset_id.serialize(w)?;
        self.value.serialize(w)?;
        w.write_u32(self.output_lock)?;
        self.program_hash.serialize(w)?;
        if tx_version >= TX_VERSION_09 {
            w.write_u8(self.output_type as u8)?;
            self.payload.serialize(w)?;
        }
        Ok(())
    }

    /// Reads an output at the transaction's version.
    pub fn deserialize<R: Read>(r: &mut R, tx_version: u8) -> io::Result<Self> {
        let asset_id = Hash256::deserialize(r)?;
        let value = Amount::deserialize(r)?;
        let output_lock = r.read_u32()?;
        let program_hash = Hash168::deserialize(r)?;
        let (output_type, payload) = if tx_version >= TX_VERSION_09 {
            let tag = r.read_u8()?;
            let output_type = OutputType::from_u8(tag)
                .ok_or_else(|| invalid_data(format!("unknown output type {:#04x}", tag)))?;
            let payload = OutputPayload::deserialize(output_type, r)?;
            (output_type, payload)
        } else {
            (OutputType::None, OutputPayload::None)
        };
        Ok(Output {
            asset_id,
            value,
            output_lock,
            program_hash,
            output_type,
            payload,
        })
    }

    /// The vote payload, when this is a vote output.
    pub fn vote_payload(&self) -> Option<&crate::payload::VoteOutput> {
        match &self.payload {
            OutputPayload::Vote(v) => Some(v),
            _ => None,
        }
    }
}

/// An auxiliary key/value attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attribute {
    /// Attribute usage tag.
    pub usage: u8,
    /// Attribute data.
    pub data: Vec<u8>,
}

/// Attribute usages the chain accepts.
pub fn is_valid_attribute_usage(usage: u8) -> bool {
    // Nonce, script, description, description-url, memo, confirmation.
    matches!(usage, 0x00 | 0x20 | 0x81 | 0x90 | 0x91 | 0x92)
}

impl Serializable for Attribute {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.usage)?;
        w.write_var_bytes(&self.data)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Attribute {
            usage: r.read_u8()?,
            data: r.read_var_bytes(MAX_STRING_LEN, "attribute data")?,
        })
    }
}

/// A witness program: script code plus its signature parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// Redeem script code.
    pub code: Vec<u8>,
    /// Signature parameter satisfying the code.
    pub parameter: Vec<u8>,
}

/// Smallest meaningful redeem script.
pub const MIN_PROGRAM_CODE_SIZE: usize = 2;

impl Serializable for Program {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_var_bytes(&self.parameter)?;
        w.write_var_bytes(&self.code)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        let parameter = r.read_var_bytes(MAX_STRING_LEN, "program parameter")?;
        let code = r.read_var_bytes(MAX_STRING_LEN, "program code")?;
        Ok(Program { parameter, code })
    }
}

/// A kestrel transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction format version.
    pub version: u8,
    /// Type tag selecting the payload variant.
    pub tx_type: TxType,
    /// Payload encoding version.
    pub payload_version: u8,
    /// The typed payload.
    pub payload: Payload,
    /// Auxiliary attributes.
    pub attributes: Vec<Attribute>,
    /// Spent previous outputs.
    pub inputs: Vec<Input>,
    /// Created outputs.
    pub outputs: Vec<Output>,
    /// Absolute lock height; 0 means finalized.
    pub lock_time: u32,
    /// Witness programs authorizing the spend.
    pub programs: Vec<Program>,
}

impl Transaction {
    /// Builds a transaction with the default payload for `tx_type`.
    pub fn new(tx_type: TxType) -> Transaction {
        Transaction {
            version: 0,
            tx_type,
            payload_version: 0,
            payload: Payload::default_for(tx_type),
            attributes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            programs: Vec::new(),
        }
    }

    /// Serializes everything except the witness programs; this is the form
    /// that is hashed and signed.
    pub fn serialize_unsigned<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.version)?;
        w.write_u8(self.tx_type as u8)?;
        w.write_u8(self.payload_version)?;
        self.payload.serialize(w, self.payload_version)?;
        w.write_var_uint(self.attributes.len() as u64)?;
        for attr in &self.attributes {
            attr.serialize(w)?;
        }
        w.write_var_uint(self.inputs.len() as u64)?;
        for input in &self.inputs {
            input.serialize(w)?;
        }
        w.write_var_uint(self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.serialize(w, self.version)?;
        }
        w.write_u32(self.lock_time)
    }

    /// The transaction identity: double SHA-256 of the unsigned form.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.serialize_unsigned(&mut buf);
        Hash256::double_sha256(&buf)
    }

    /// True for the block's minting transaction.
    pub fn is_coinbase(&self) -> bool {
        self.tx_type == TxType::CoinBase
    }

    /// True for the once-per-block sponsor record.
    pub fn is_record_sponsor(&self) -> bool {
        self.tx_type == TxType::RecordSponsor
    }

    /// True for council funding proposals.
    pub fn is_crc_proposal(&self) -> bool {
        self.tx_type == TxType::CrcProposal
    }

    /// The proposal payload, when this is a proposal transaction.
    pub fn crc_proposal(&self) -> Option<&crate::payload::CrcProposal> {
        match &self.payload {
            Payload::CrcProposal(p) => Some(p),
            _ => None,
        }
    }
}

impl Serializable for Transaction {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.serialize_unsigned(w)?;
        w.write_var_uint(self.programs.len() as u64)?;
        for program in &self.programs {
            program.serialize(w)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        let version = r.read_u8()?;
        let tx_type = read_tx_type(r)?;
        let payload_version = r.read_u8()?;
        let payload = Payload::deserialize(tx_type, r, payload_version)?;

        let read_count = |r: &mut R, label: &str| -> io::Result<usize> {
            let count = r.read_var_uint()? as usize;
            if count > MAX_TX_LIST_LEN {
                return Err(invalid_data(format!("{}: list too long", label)));
            }
            Ok(count)
        };

        let count = read_count(r, "attributes")?;
        let mut attributes = Vec::with_capacity(count);
        for _ in 0..count {
            attributes.push(Attribute::deserialize(r)?);
        }

        let count = read_count(r, "inputs")?;
        let mut inputs = Vec::with_capacity(count);
        for _ in 0..count {
            inputs.push(Input::deserialize(r)?);
        }

        let count = read_count(r, "outputs")?;
        let mut outputs = Vec::with_capacity(count);
        for _ in 0..count {
            outputs.push(Output::deserialize(r, version)?);
        }

        let lock_time = r.read_u32()?;

        let count = read_count(r, "programs")?;
        let mut programs = Vec::with_capacity(count);
        for _ in 0..count {
            programs.push(Program::deserialize(r)?);
        }

        Ok(Transaction {
            version,
            tx_type,
            payload_version,
            payload,
            attributes,
            inputs,
            outputs,
            lock_time,
            programs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ProcessProducer;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new(TxType::CancelProducer);
        tx.payload = Payload::ProcessProducer(ProcessProducer {
            owner_key: vec![2; 33],
            signature: vec![7; 64],
        });
        tx.inputs.push(Input {
            previous: OutPoint {
                tx_hash: Hash256::double_sha256(b"prev"),
                index: 3,
            },
            sequence: 0,
        });
        tx.outputs.push(Output {
            value: Amount::from_coins(1),
            program_hash: Hash168([9; 21]),
            ..Default::default()
        });
        tx.programs.push(Program {
            code: vec![0x21, 0x02],
            parameter: vec![0x40],
        });
        tx
    }

    #[test]
    fn wire_roundtrip() {
        let tx = sample_tx();
        let bytes = crate::wire::to_bytes(&tx).unwrap();
        let back: Transaction = crate::wire::from_bytes(&bytes).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn hash_ignores_witness_programs() {
        let mut tx = sample_tx();
        let h = tx.hash();
        tx.programs[0].parameter = vec![0x41, 0x41];
        assert_eq!(tx.hash(), h);
    }

    #[test]
    fn refer_key_layout_is_stable() {
        let op = OutPoint {
            tx_hash: Hash256([0xaa; 32]),
            index: 0x0102,
        };
        let key = op.refer_key();
        assert_eq!(&key.0[..32], &[0xaa; 32]);
        // Big-endian index tail.
        assert_eq!(&key.0[32..], &[0x01, 0x02]);
    }

    #[test]
    fn typed_outputs_only_at_version_09() {
        let mut tx = sample_tx();
        tx.version = TX_VERSION_09;
        tx.outputs[0].output_type = OutputType::Vote;
        tx.outputs[0].payload = OutputPayload::Vote(crate::payload::VoteOutput {
            version: 1,
            contents: vec![crate::payload::VoteContent {
                vote_type: crate::payload::VoteKind::Crc,
                candidate_votes: vec![crate::payload::CandidateVotes {
                    candidate: vec![5; 21],
                    votes: Amount::from_coins(2),
                }],
            }],
        });
        let bytes = crate::wire::to_bytes(&tx).unwrap();
        let back: Transaction = crate::wire::from_bytes(&bytes).unwrap();
        assert_eq!(back, tx);
    }
}
