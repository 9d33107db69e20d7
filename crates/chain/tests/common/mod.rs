//! Shared fakes and builders for validator tests.

use kestrel_api::views::{CommitteeView, ProducersView};
use kestrel_api::{
    ArbitersView, ConsensusAlgorithm, ProducerDigest, SignatureVerifier, TimeSource, UtxoView,
};
use kestrel_types::amount::Amount;
use kestrel_types::block::{Block, Header};
use kestrel_types::error::RuleError;
use kestrel_types::hash::{Hash168, Hash256};
use kestrel_types::merkle::merkle_root;
use kestrel_types::params::ChainParams;
use kestrel_types::payload::TxType;
use kestrel_types::tx::{Input, Output, ReferKey, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// A compact target loose enough that every parent header hash meets it.
pub const EASY_BITS: u32 = 0x2200_ffff;

/// Chain parameters tuned for tests: an always-satisfiable PoW limit and no
/// reduced-issuance switch in the way.
pub fn test_params() -> ChainParams {
    let mut params = ChainParams::default();
    params.pow_limit_bits = EASY_BITS;
    params.new_issuance_height = u32::MAX;
    params
}

pub struct FakeTime(pub u64);

impl TimeSource for FakeTime {
    fn adjusted_time(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
pub struct FakeArbiters {
    pub rewards: BTreeMap<Hash168, Amount>,
    pub change: Amount,
    pub active_height: Option<u32>,
    pub pow_mode: bool,
}

impl ArbitersView for FakeArbiters {
    fn arbiters_round_reward(&self) -> BTreeMap<Hash168, Amount> {
        self.rewards.clone()
    }
    fn final_round_change(&self) -> Amount {
        self.change
    }
    fn dpos_v2_active_height(&self) -> u32 {
        self.active_height.unwrap_or(u32::MAX)
    }
    fn consensus_algorithm(&self) -> ConsensusAlgorithm {
        if self.pow_mode {
            ConsensusAlgorithm::Pow
        } else {
            ConsensusAlgorithm::Dpos
        }
    }
    fn last_block_timestamp(&self) -> u32 {
        0
    }
    fn check_dpos_illegal_tx(&self, _: &Block) -> Result<(), RuleError> {
        Ok(())
    }
    fn check_crc_appropriation_tx(&self, _: &Block) -> Result<(), RuleError> {
        Ok(())
    }
    fn check_next_turn_dpos_info_tx(&self, _: &Block) -> Result<(), RuleError> {
        Ok(())
    }
    fn check_custom_id_results_tx(&self, _: &Block) -> Result<(), RuleError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProducers {
    pub by_owner: HashMap<Vec<u8>, ProducerDigest>,
    pub nft_votes: HashSet<Hash256>,
}

impl ProducersView for FakeProducers {
    fn producer_by_owner(&self, owner_key: &[u8]) -> Option<ProducerDigest> {
        self.by_owner.get(owner_key).cloned()
    }
    fn node_key_exists(&self, node_key: &[u8]) -> bool {
        self.by_owner.values().any(|p| p.node_key == node_key)
    }
    fn nickname_exists(&self, _nickname: &str) -> bool {
        false
    }
    fn dpos_v2_vote_exists(&self, id: &Hash256) -> bool {
        self.nft_votes.contains(id)
    }
}

#[derive(Default)]
pub struct FakeCommittee {
    pub candidates: HashSet<Hash168>,
    pub members: HashSet<Hash168>,
    pub proposals: HashSet<Hash256>,
    pub available: Amount,
}

impl CommitteeView for FakeCommittee {
    fn candidate_exists(&self, cid: &Hash168) -> bool {
        self.candidates.contains(cid)
    }
    fn is_elected_member(&self, did: &Hash168) -> bool {
        self.members.contains(did)
    }
    fn proposal_exists(&self, hash: &Hash256) -> bool {
        self.proposals.contains(hash)
    }
    fn available_committee_amount(&self) -> Amount {
        self.available
    }
}

/// A UTXO view backed by a mutable refer-key map.
#[derive(Default)]
pub struct FakeUtxo {
    pub outputs: Mutex<HashMap<ReferKey, Output>>,
}

impl FakeUtxo {
    pub fn insert(&self, input: &Input, output: Output) {
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.insert(input.refer_key(), output);
        }
    }
}

impl UtxoView for FakeUtxo {
    fn tx_reference(&self, tx: &Transaction) -> Result<HashMap<Input, Output>, RuleError> {
        let outputs = self
            .outputs
            .lock()
            .map_err(|_| RuleError::TxDoubleSpend("utxo lock poisoned".into()))?;
        let mut references = HashMap::new();
        for input in &tx.inputs {
            let output = outputs.get(&input.refer_key()).ok_or_else(|| {
                RuleError::TxDoubleSpend("input refers to unknown output".into())
            })?;
            references.insert(input.clone(), output.clone());
        }
        Ok(references)
    }
}

/// Accepts any non-empty signature; rejects empty ones.
pub struct FakeSig;

impl SignatureVerifier for FakeSig {
    fn verify(&self, _key: &[u8], _data: &[u8], signature: &[u8]) -> bool {
        !signature.is_empty()
    }
    fn is_schnorr(&self, code: &[u8]) -> bool {
        code.first() == Some(&0xfe)
    }
}

/// A coinbase minting `value` to one output.
pub fn coinbase_tx(value: Amount) -> Transaction {
    let mut tx = Transaction::new(TxType::CoinBase);
    tx.outputs.push(Output {
        value,
        program_hash: Hash168([1; 21]),
        ..Default::default()
    });
    tx
}

/// Builds a block over `txs` with a correct merkle root and an aux-pow
/// commitment the sanity phase accepts.
pub fn build_block(height: u32, timestamp: u32, txs: Vec<Transaction>, params: &ChainParams) -> Block {
    let mut block = Block {
        header: Header {
            version: 0,
            timestamp,
            bits: params.pow_limit_bits,
            height,
            ..Default::default()
        },
        transactions: txs,
    };
    let hashes: Vec<Hash256> = block.transactions.iter().map(Transaction::hash).collect();
    if let Ok(root) = merkle_root(&hashes) {
        block.header.merkle_root = root;
    }
    block.header.aux_pow.chain_id = params.aux_pow_chain_id;
    block.header.aux_pow.aux_block_hash = block.header.hash();
    block
}
