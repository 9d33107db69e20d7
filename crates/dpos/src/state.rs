//! The producer registry and its block-driven transitions.

use kestrel_api::views::ProducersView;
use kestrel_api::{ArbitersView, ConsensusAlgorithm, History, ProducerDigest, ProducerStatus};
use kestrel_types::amount::Amount;
use kestrel_types::block::{Block, DposBlock};
use kestrel_types::error::RuleError;
use kestrel_types::hash::{Hash168, Hash256};
use kestrel_types::params::ChainParams;
use kestrel_types::payload::{Payload, ProducerInfo, TxType};
use kestrel_types::tx::{OutPoint, OutputType, Transaction};
use parity_scale_codec::{Decode, Encode};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Blocks per arbiter round; the reward table resets on this boundary.
pub const ROUND_LENGTH: u32 = 36;

/// A registered producer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct Producer {
    /// Registration data as last updated.
    pub info: ProducerInfo,
    /// Lifecycle state.
    pub status: ProducerStatus,
    /// Height the registration settled at.
    pub registered_height: u32,
    /// Height a cancellation settled at, 0 if none.
    pub cancel_height: u32,
    /// Height an illegal conviction settled at, 0 if none.
    pub illegal_height: u32,
    /// Accumulated v1 votes.
    pub votes: Amount,
    /// Accumulated v2 stake votes.
    pub dpos_v2_votes: Amount,
    /// Locked registration deposit.
    pub deposit_amount: Amount,
}

impl Producer {
    /// The program hash this producer's rewards accrue to.
    pub fn reward_hash(&self) -> Hash168 {
        Hash168::from_key(&self.info.owner_key)
    }
}

/// The snapshot-serializable body of the arbiter state.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct StateData {
    /// All known producers keyed by owner key.
    pub producers: BTreeMap<Vec<u8>, Producer>,
    /// Node key to owner key index.
    pub node_owner_keys: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Taken nicknames.
    pub nicknames: BTreeSet<String>,
    /// Per-address rewards of the running round.
    pub round_rewards: BTreeMap<Hash168, Amount>,
    /// Rounding dust of the last distributed round.
    pub final_round_change: Amount,
    /// Timestamp of the last settled block.
    pub last_block_timestamp: u32,
    /// True while consensus is PoW-reverted.
    pub in_pow_mode: bool,
    /// Height DPoS v2 became fully active; `u32::MAX` before then.
    pub dpos_v2_active_height: u32,
    /// The announced next-turn arbiter node keys, council first.
    pub next_arbiters: Vec<Vec<u8>>,
    /// Settled custom-id auction results.
    pub custom_id_results: Vec<Hash256>,
    /// Refer-key hashes of live v2 stake votes, the NFT mint precondition.
    pub stake_vote_ids: BTreeSet<Hash256>,
}

impl StateData {
    fn new(params: &ChainParams) -> StateData {
        StateData {
            producers: BTreeMap::new(),
            node_owner_keys: BTreeMap::new(),
            nicknames: BTreeSet::new(),
            round_rewards: BTreeMap::new(),
            final_round_change: Amount::ZERO,
            last_block_timestamp: 0,
            in_pow_mode: false,
            dpos_v2_active_height: params.dpos_v2_active_height,
            next_arbiters: Vec::new(),
            custom_id_results: Vec::new(),
            stake_vote_ids: BTreeSet::new(),
        }
    }

    fn owner_for(&self, key: &[u8]) -> Option<Vec<u8>> {
        if self.producers.contains_key(key) {
            return Some(key.to_vec());
        }
        self.node_owner_keys.get(key).cloned()
    }
}

/// The arbiter layer's replicated state.
///
/// Mutations go through the history journal exclusively; rolling back to a
/// height replays the journal backwards and lands on the exact prior state.
pub struct ArbiterState {
    params: ChainParams,
    data: StateData,
    history: History<StateData>,
}

impl ArbiterState {
    /// Fresh state at genesis for `params`.
    pub fn new(params: ChainParams) -> ArbiterState {
        let data = StateData::new(&params);
        ArbiterState {
            params,
            data,
            history: History::new(),
        }
    }

    /// Read access to the raw state body, used by the checkpoint adapter.
    pub fn data(&self) -> &StateData {
        &self.data
    }

    /// The chain parameters this state runs under.
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Replaces the state body wholesale from a restored snapshot.
    pub fn replace_data(&mut self, data: StateData) {
        self.data = data;
        self.history = History::new();
    }

    /// Folds a settled block into the state.
    pub fn process_block(&mut self, block: &DposBlock) {
        let height = block.height();
        for tx in &block.block.transactions {
            self.process_transaction(tx, height);
        }

        self.activate_pending(height);
        self.settle_round(block, height);

        let new_timestamp = block.block.header.timestamp;
        let old_timestamp = self.data.last_block_timestamp;
        self.history.append(
            height,
            move |s: &mut StateData| s.last_block_timestamp = new_timestamp,
            move |s: &mut StateData| s.last_block_timestamp = old_timestamp,
        );

        self.history.commit(height, &mut self.data);
    }

    /// Rolls the state back to `height`.
    pub fn rollback_to(&mut self, height: u32) {
        self.history.rollback_to(height, &mut self.data);
    }

    /// Drops journal entries above `height` without executing them.
    pub fn rollback_seek_to(&mut self, height: u32) {
        self.history.seek_to(height);
    }

    fn process_transaction(&mut self, tx: &Transaction, height: u32) {
        match tx.tx_type {
            TxType::RegisterProducer => self.register_producer(tx, height),
            TxType::UpdateProducer => self.update_producer(tx, height),
            TxType::CancelProducer => self.cancel_producer(tx, height),
            TxType::IllegalBlockEvidence => self.process_illegal_evidence(tx, height),
            TxType::SidechainIllegalEvidence => self.process_sidechain_illegal(tx, height),
            TxType::InactiveArbitrators => self.process_inactive_arbitrators(tx, height),
            TxType::NextTurnDposInfo => self.process_next_turn(tx, height),
            TxType::CustomIdResult => self.process_custom_id_results(tx, height),
            TxType::RevertToPow => self.process_revert_to_pow(tx, height),
            TxType::ExchangeVotes => self.record_stake_votes(tx, height),
            _ => {}
        }
    }

    fn register_producer(&mut self, tx: &Transaction, height: u32) {
        let Payload::ProducerInfo(payload_info) = &tx.payload else {
            return;
        };
        let info = payload_info.clone();
        let deposit: Amount = tx.outputs.iter().map(|o| o.value).sum();
        let producer = Producer {
            info: info.clone(),
            status: ProducerStatus::Pending,
            registered_height: height,
            deposit_amount: deposit,
            ..Default::default()
        };
        self.history.append(
            height,
            move |s: &mut StateData| {
                s.node_owner_keys
                    .insert(producer.info.node_key.clone(), producer.info.owner_key.clone());
                s.nicknames.insert(producer.info.nickname.clone());
                s.producers
                    .insert(producer.info.owner_key.clone(), producer.clone());
            },
            move |s: &mut StateData| {
                s.producers.remove(&info.owner_key);
                s.node_owner_keys.remove(&info.node_key);
                s.nicknames.remove(&info.nickname);
            },
        );
    }

    fn update_producer(&mut self, tx: &Transaction, height: u32) {
        let Payload::ProducerInfo(new_info) = &tx.payload else {
            return;
        };
        let Some(existing) = self.data.producers.get(&new_info.owner_key) else {
            warn!(target: "dpos", owner = %hex::encode(&new_info.owner_key), "update for unknown producer");
            return;
        };
        let old_info = existing.info.clone();
        let new_info = new_info.clone();
        let owner = new_info.owner_key.clone();
        let owner_undo = owner.clone();
        let old_undo = old_info.clone();
        self.history.append(
            height,
            move |s: &mut StateData| {
                if let Some(p) = s.producers.get_mut(&owner) {
                    s.node_owner_keys.remove(&p.info.node_key);
                    s.nicknames.remove(&p.info.nickname);
                    p.info = new_info.clone();
                    s.node_owner_keys
                        .insert(new_info.node_key.clone(), owner.clone());
                    s.nicknames.insert(new_info.nickname.clone());
                }
            },
            move |s: &mut StateData| {
                if let Some(p) = s.producers.get_mut(&owner_undo) {
                    s.node_owner_keys.remove(&p.info.node_key);
                    s.nicknames.remove(&p.info.nickname);
                    p.info = old_undo.clone();
                    s.node_owner_keys
                        .insert(old_undo.node_key.clone(), owner_undo.clone());
                    s.nicknames.insert(old_undo.nickname.clone());
                }
            },
        );
    }

    fn cancel_producer(&mut self, tx: &Transaction, height: u32) {
        let Payload::ProcessProducer(payload) = &tx.payload else {
            return;
        };
        let Some(existing) = self.data.producers.get(&payload.owner_key) else {
            warn!(target: "dpos", "cancel for unknown producer");
            return;
        };
        let owner = payload.owner_key.clone();
        let owner_undo = owner.clone();
        let old_status = existing.status;
        let old_cancel_height = existing.cancel_height;
        self.history.append(
            height,
            move |s: &mut StateData| {
                if let Some(p) = s.producers.get_mut(&owner) {
                    p.status = ProducerStatus::Canceled;
                    p.cancel_height = height;
                }
            },
            move |s: &mut StateData| {
                if let Some(p) = s.producers.get_mut(&owner_undo) {
                    p.status = old_status;
                    p.cancel_height = old_cancel_height;
                }
            },
        );
    }

    fn set_status_by_key(&mut self, key: &[u8], status: ProducerStatus, height: u32, illegal: bool) {
        let Some(owner) = self.data.owner_for(key) else {
            warn!(target: "dpos", key = %hex::encode(key), "evidence names unknown producer");
            return;
        };
        let Some(existing) = self.data.producers.get(&owner) else {
            return;
        };
        let owner_undo = owner.clone();
        let old_status = existing.status;
        let old_illegal_height = existing.illegal_height;
        self.history.append(
            height,
            move |s: &mut StateData| {
                if let Some(p) = s.producers.get_mut(&owner) {
                    p.status = status;
                    if illegal {
                        p.illegal_height = height;
                    }
                }
            },
            move |s: &mut StateData| {
                if let Some(p) = s.producers.get_mut(&owner_undo) {
                    p.status = old_status;
                    if illegal {
                        p.illegal_height = old_illegal_height;
                    }
                }
            },
        );
    }

    fn process_illegal_evidence(&mut self, tx: &Transaction, height: u32) {
        let Payload::IllegalBlockEvidence(payload) = &tx.payload else {
            return;
        };
        for key in payload.offending_keys() {
            info!(target: "dpos", key = %hex::encode(&key), "marking producer illegal");
            self.set_status_by_key(&key, ProducerStatus::Illegal, height, true);
        }
    }

    fn process_sidechain_illegal(&mut self, tx: &Transaction, height: u32) {
        let Payload::SidechainIllegalData(payload) = &tx.payload else {
            return;
        };
        info!(target: "dpos", key = %hex::encode(&payload.illegal_signer), "marking sidechain signer illegal");
        self.set_status_by_key(&payload.illegal_signer, ProducerStatus::Illegal, height, true);
    }

    fn process_inactive_arbitrators(&mut self, tx: &Transaction, height: u32) {
        let Payload::InactiveArbitrators(payload) = &tx.payload else {
            return;
        };
        for key in &payload.arbitrators {
            self.set_status_by_key(key, ProducerStatus::Inactive, height, false);
        }
    }

    fn process_next_turn(&mut self, tx: &Transaction, height: u32) {
        let Payload::NextTurnDposInfo(payload) = &tx.payload else {
            return;
        };
        let mut announced = payload.crc_public_keys.clone();
        announced.extend(payload.dpos_public_keys.iter().cloned());
        let old = self.data.next_arbiters.clone();
        self.history.append(
            height,
            move |s: &mut StateData| s.next_arbiters = announced.clone(),
            move |s: &mut StateData| s.next_arbiters = old.clone(),
        );
    }

    fn process_custom_id_results(&mut self, tx: &Transaction, height: u32) {
        let Payload::CustomIdResult(payload) = &tx.payload else {
            return;
        };
        let results = payload.results.clone();
        let old = self.data.custom_id_results.clone();
        self.history.append(
            height,
            move |s: &mut StateData| s.custom_id_results = results.clone(),
            move |s: &mut StateData| s.custom_id_results = old.clone(),
        );
    }

    fn process_revert_to_pow(&mut self, tx: &Transaction, height: u32) {
        let Payload::RevertToPow(payload) = &tx.payload else {
            return;
        };
        info!(target: "dpos", ?payload, "consensus reverting to PoW");
        let was_pow = self.data.in_pow_mode;
        self.history.append(
            height,
            move |s: &mut StateData| s.in_pow_mode = true,
            move |s: &mut StateData| s.in_pow_mode = was_pow,
        );
    }

    fn record_stake_votes(&mut self, tx: &Transaction, height: u32) {
        let tx_hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            if output.output_type != OutputType::Stake {
                continue;
            }
            let refer_key = OutPoint {
                tx_hash,
                index: index as u16,
            }
            .refer_key();
            let id = Hash256::double_sha256(&refer_key.0);
            self.history.append(
                height,
                move |s: &mut StateData| {
                    s.stake_vote_ids.insert(id);
                },
                move |s: &mut StateData| {
                    s.stake_vote_ids.remove(&id);
                },
            );
        }
    }

    fn activate_pending(&mut self, height: u32) {
        let pending_blocks = self.params.producer_pending_blocks;
        let due: Vec<Vec<u8>> = self
            .data
            .producers
            .iter()
            .filter(|(_, p)| {
                p.status == ProducerStatus::Pending
                    && p.registered_height + pending_blocks <= height
            })
            .map(|(owner, _)| owner.clone())
            .collect();
        for owner in due {
            let owner_undo = owner.clone();
            self.history.append(
                height,
                move |s: &mut StateData| {
                    if let Some(p) = s.producers.get_mut(&owner) {
                        p.status = ProducerStatus::Active;
                    }
                },
                move |s: &mut StateData| {
                    if let Some(p) = s.producers.get_mut(&owner_undo) {
                        p.status = ProducerStatus::Pending;
                    }
                },
            );
        }
    }

    /// Credits the confirm sponsor with the block's arbiter cut and resets
    /// the table on round boundaries.
    fn settle_round(&mut self, block: &DposBlock, height: u32) {
        if let Some(confirm) = &block.confirm {
            if let Some(owner) = self.data.owner_for(&confirm.sponsor) {
                let reward_hash = Hash168::from_key(&owner);
                let cut = self.params.block_reward(height).ceil_mul(35, 100);
                self.history.append(
                    height,
                    move |s: &mut StateData| {
                        let entry = s.round_rewards.entry(reward_hash).or_insert(Amount::ZERO);
                        *entry += cut;
                    },
                    move |s: &mut StateData| {
                        let mut drained = false;
                        if let Some(entry) = s.round_rewards.get_mut(&reward_hash) {
                            *entry -= cut;
                            drained = *entry == Amount::ZERO;
                        }
                        if drained {
                            s.round_rewards.remove(&reward_hash);
                        }
                    },
                );
            }
        }

        if height % ROUND_LENGTH == 0 {
            let old = self.data.round_rewards.clone();
            self.history.append(
                height,
                move |s: &mut StateData| s.round_rewards.clear(),
                move |s: &mut StateData| s.round_rewards = old.clone(),
            );
        }
    }

    fn count_in_block(block: &Block, tx_type: TxType) -> usize {
        block
            .transactions
            .iter()
            .filter(|tx| tx.tx_type == tx_type)
            .count()
    }
}

impl ArbitersView for ArbiterState {
    fn arbiters_round_reward(&self) -> BTreeMap<Hash168, Amount> {
        self.data.round_rewards.clone()
    }

    fn final_round_change(&self) -> Amount {
        self.data.final_round_change
    }

    fn dpos_v2_active_height(&self) -> u32 {
        self.data.dpos_v2_active_height
    }

    fn consensus_algorithm(&self) -> ConsensusAlgorithm {
        if self.data.in_pow_mode {
            ConsensusAlgorithm::Pow
        } else {
            ConsensusAlgorithm::Dpos
        }
    }

    fn last_block_timestamp(&self) -> u32 {
        self.data.last_block_timestamp
    }

    fn check_dpos_illegal_tx(&self, block: &Block) -> Result<(), RuleError> {
        if Self::count_in_block(block, TxType::IllegalBlockEvidence) > 1
            || Self::count_in_block(block, TxType::SidechainIllegalEvidence) > 1
        {
            return Err(RuleError::ConsensusRule(
                "block contains more than one illegal evidence tx".into(),
            ));
        }
        for tx in &block.transactions {
            let Payload::IllegalBlockEvidence(payload) = &tx.payload else {
                continue;
            };
            for key in payload.offending_keys() {
                if self.data.owner_for(&key).is_none() {
                    return Err(RuleError::ConsensusRule(
                        "illegal evidence names unknown producer".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_crc_appropriation_tx(&self, block: &Block) -> Result<(), RuleError> {
        if Self::count_in_block(block, TxType::CrcAppropriation) > 1 {
            return Err(RuleError::ConsensusRule(
                "block contains more than one appropriation tx".into(),
            ));
        }
        Ok(())
    }

    fn check_next_turn_dpos_info_tx(&self, block: &Block) -> Result<(), RuleError> {
        if Self::count_in_block(block, TxType::NextTurnDposInfo) > 1 {
            return Err(RuleError::ConsensusRule(
                "block contains more than one next turn tx".into(),
            ));
        }
        for tx in &block.transactions {
            let Payload::NextTurnDposInfo(payload) = &tx.payload else {
                continue;
            };
            if payload.working_height <= block.height() {
                return Err(RuleError::ConsensusRule(
                    "next turn working height must be in the future".into(),
                ));
            }
        }
        Ok(())
    }

    fn check_custom_id_results_tx(&self, block: &Block) -> Result<(), RuleError> {
        if Self::count_in_block(block, TxType::CustomIdResult) > 1 {
            return Err(RuleError::ConsensusRule(
                "block contains more than one custom id results tx".into(),
            ));
        }
        Ok(())
    }
}

impl ProducersView for ArbiterState {
    fn producer_by_owner(&self, owner_key: &[u8]) -> Option<ProducerDigest> {
        self.data.producers.get(owner_key).map(|p| ProducerDigest {
            owner_key: p.info.owner_key.clone(),
            node_key: p.info.node_key.clone(),
            status: p.status,
            stake_until: p.info.stake_until,
        })
    }

    fn node_key_exists(&self, node_key: &[u8]) -> bool {
        self.data
            .node_owner_keys
            .get(node_key)
            .and_then(|owner| self.data.producers.get(owner))
            .is_some_and(|p| p.status != ProducerStatus::Canceled)
    }

    fn nickname_exists(&self, nickname: &str) -> bool {
        self.data.nicknames.contains(nickname)
    }

    fn dpos_v2_vote_exists(&self, id: &Hash256) -> bool {
        self.data.stake_vote_ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::block::{Block, Confirm, Header};
    use kestrel_types::payload::ProcessProducer;

    fn params() -> ChainParams {
        let mut params = ChainParams::default();
        params.producer_pending_blocks = 2;
        params
    }

    fn register_tx(owner: u8, stake_until: u32) -> Transaction {
        let mut tx = Transaction::new(TxType::RegisterProducer);
        tx.payload = Payload::ProducerInfo(ProducerInfo {
            owner_key: vec![owner; 33],
            node_key: vec![owner + 1; 33],
            nickname: format!("producer-{}", owner),
            stake_until,
            ..Default::default()
        });
        tx
    }

    fn block_at(height: u32, txs: Vec<Transaction>) -> DposBlock {
        DposBlock::unconfirmed(Block {
            header: Header {
                height,
                timestamp: 1_000 + height,
                ..Default::default()
            },
            transactions: txs,
        })
    }

    #[test]
    fn register_then_activate() {
        let mut state = ArbiterState::new(params());
        state.process_block(&block_at(10, vec![register_tx(2, 0)]));

        let digest = state.producer_by_owner(&[2; 33]).unwrap();
        assert_eq!(digest.status, ProducerStatus::Pending);
        assert!(state.node_key_exists(&[3; 33]));

        // Two empty blocks later the producer activates.
        state.process_block(&block_at(11, Vec::new()));
        state.process_block(&block_at(12, Vec::new()));
        let digest = state.producer_by_owner(&[2; 33]).unwrap();
        assert_eq!(digest.status, ProducerStatus::Active);
    }

    #[test]
    fn cancel_and_rollback() {
        let mut state = ArbiterState::new(params());
        state.process_block(&block_at(10, vec![register_tx(2, 0)]));
        state.process_block(&block_at(11, Vec::new()));
        state.process_block(&block_at(12, Vec::new()));

        let mut cancel = Transaction::new(TxType::CancelProducer);
        cancel.payload = Payload::ProcessProducer(ProcessProducer {
            owner_key: vec![2; 33],
            signature: vec![1; 64],
        });
        state.process_block(&block_at(13, vec![cancel]));
        assert_eq!(
            state.producer_by_owner(&[2; 33]).unwrap().status,
            ProducerStatus::Canceled
        );

        state.rollback_to(12);
        assert_eq!(
            state.producer_by_owner(&[2; 33]).unwrap().status,
            ProducerStatus::Active
        );
    }

    #[test]
    fn rollback_removes_registration() {
        let mut state = ArbiterState::new(params());
        let before = state.data().clone();
        state.process_block(&block_at(10, vec![register_tx(2, 100)]));
        assert!(state.producer_by_owner(&[2; 33]).is_some());

        state.rollback_to(9);
        assert!(state.producer_by_owner(&[2; 33]).is_none());
        assert_eq!(state.data(), &before);
    }

    #[test]
    fn revert_to_pow_flips_algorithm() {
        let mut state = ArbiterState::new(params());
        let mut revert = Transaction::new(TxType::RevertToPow);
        revert.payload = Payload::RevertToPow(kestrel_types::payload::RevertToPow {
            revert_type: kestrel_types::payload::RevertType::NoBlock,
            working_height: 20,
        });
        state.process_block(&block_at(20, vec![revert]));
        assert_eq!(state.consensus_algorithm(), ConsensusAlgorithm::Pow);

        state.rollback_to(19);
        assert_eq!(state.consensus_algorithm(), ConsensusAlgorithm::Dpos);
    }

    #[test]
    fn confirm_sponsor_accrues_round_reward() {
        let mut state = ArbiterState::new(params());
        state.process_block(&block_at(10, vec![register_tx(2, 0)]));
        state.process_block(&block_at(11, Vec::new()));
        state.process_block(&block_at(12, Vec::new()));

        let block = Block {
            header: Header {
                height: 13,
                timestamp: 1_013,
                ..Default::default()
            },
            transactions: Vec::new(),
        };
        let confirm = Confirm {
            block_hash: block.hash(),
            // The node key routes to the registered owner.
            sponsor: vec![3; 33],
            view_offset: 0,
        };
        state.process_block(&DposBlock::confirmed(block, confirm));

        let rewards = state.arbiters_round_reward();
        let hash = Hash168::from_key(&[2u8; 33]);
        assert!(rewards.get(&hash).is_some_and(|a| a.is_positive()));
    }

    #[test]
    fn next_turn_check_rejects_stale_working_height() {
        let state = ArbiterState::new(params());
        let mut tx = Transaction::new(TxType::NextTurnDposInfo);
        tx.payload = Payload::NextTurnDposInfo(kestrel_types::payload::NextTurnDposInfo {
            working_height: 5,
            crc_public_keys: Vec::new(),
            dpos_public_keys: Vec::new(),
        });
        let block = Block {
            header: Header {
                height: 10,
                ..Default::default()
            },
            transactions: vec![tx],
        };
        assert!(state.check_next_turn_dpos_info_tx(&block).is_err());
    }
}
