//! The committee: block processing, vote bookkeeping and treasury
//! accounting.

use crate::state::{CandidateStatus, CommitteeData, CrCandidate, CrMember, MemberState};
use kestrel_api::views::CommitteeView;
use kestrel_api::{History, UtxoView};
use kestrel_types::amount::Amount;
use kestrel_types::block::DposBlock;
use kestrel_types::hash::{Hash168, Hash256};
use kestrel_types::params::ChainParams;
use kestrel_types::payload::{Payload, TxType, VoteKind, VoteOutput, VOTE_PRODUCER_AND_CR_VERSION};
use kestrel_types::tx::{Output, Transaction, TX_VERSION_09};
use std::sync::Arc;
use tracing::{error, warn};

/// The council committee, sole owner of candidate, member, vote, treasury
/// and proposal state.
pub struct Committee {
    pub(crate) params: ChainParams,
    pub(crate) data: CommitteeData,
    pub(crate) history: History<CommitteeData>,
    utxo: Option<Arc<dyn UtxoView>>,
}

impl Committee {
    /// Fresh committee state at genesis.
    pub fn new(params: ChainParams) -> Committee {
        Committee {
            params,
            data: CommitteeData::default(),
            history: History::new(),
            utxo: None,
        }
    }

    /// Injects the UTXO view used to resolve spent vote outputs.
    pub fn register_utxo_view(&mut self, utxo: Arc<dyn UtxoView>) {
        self.utxo = Some(utxo);
    }

    /// Read access to the raw state body.
    pub fn data(&self) -> &CommitteeData {
        &self.data
    }

    /// The chain parameters this committee runs under.
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Replaces the state body wholesale from a restored snapshot.
    pub fn replace_data(&mut self, data: CommitteeData) {
        self.data = data;
        self.history = History::new();
    }

    /// Folds a settled block into the committee state.
    pub fn process_block(&mut self, block: &DposBlock) {
        let height = block.height();
        for tx in &block.block.transactions {
            self.process_transaction(tx, height);
        }
        self.update_proposals(height);
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
        // Spent vote outputs cancel before new state lands.
        self.process_cancel_votes(tx, height);

        match tx.tx_type {
            TxType::RegisterCr => self.register_candidate(tx, height),
            TxType::UpdateCr => self.update_candidate(tx, height),
            TxType::UnregisterCr => self.unregister_candidate(tx, height),
            TxType::TransferAsset => self.process_votes(tx, height),
            TxType::ReturnCrDepositCoin => self.return_deposit(tx, height),
            TxType::CrcProposal => self.register_proposal(tx, height),
            TxType::CrcProposalReview => self.proposal_review(tx, height),
            TxType::CrcProposalTracking => self.proposal_tracking(tx, height),
            TxType::CrcProposalWithdraw => self.proposal_withdraw(tx, height),
            TxType::CrcAppropriation => self.process_appropriation(height),
            _ => {}
        }

        self.process_crc_address_related_tx(tx, height);
    }

    // --- Candidate lifecycle -----------------------------------------------

    fn register_candidate(&mut self, tx: &Transaction, height: u32) {
        let Payload::CrInfo(info) = &tx.payload else {
            return;
        };
        let deposit: Amount = tx
            .outputs
            .iter()
            .filter(|o| o.program_hash == Hash168::from_key(&info.code))
            .map(|o| o.value)
            .sum();
        let candidate = CrCandidate {
            info: info.clone(),
            status: CandidateStatus::Active,
            registered_height: height,
            deposit_amount: deposit,
            ..Default::default()
        };
        let cid = info.cid;
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                s.candidates.insert(cid, candidate.clone());
            },
            move |s: &mut CommitteeData| {
                s.candidates.remove(&cid);
            },
        );
    }

    fn update_candidate(&mut self, tx: &Transaction, height: u32) {
        let Payload::CrInfo(info) = &tx.payload else {
            return;
        };
        let Some(existing) = self.data.candidates.get(&info.cid) else {
            warn!(target: "cr", cid = %info.cid, "update for unknown candidate");
            return;
        };
        let cid = info.cid;
        let new_info = info.clone();
        let old_info = existing.info.clone();
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(c) = s.candidates.get_mut(&cid) {
                    c.info = new_info.clone();
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(c) = s.candidates.get_mut(&cid) {
                    c.info = old_info.clone();
                }
            },
        );
    }

    fn unregister_candidate(&mut self, tx: &Transaction, height: u32) {
        let Payload::UnregisterCr(payload) = &tx.payload else {
            return;
        };
        let Some(existing) = self.data.candidates.get(&payload.cid) else {
            warn!(target: "cr", cid = %payload.cid, "unregister for unknown candidate");
            return;
        };
        let cid = payload.cid;
        let old_status = existing.status;
        let old_cancel_height = existing.cancel_height;
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(c) = s.candidates.get_mut(&cid) {
                    c.status = CandidateStatus::Canceled;
                    c.cancel_height = height;
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(c) = s.candidates.get_mut(&cid) {
                    c.status = old_status;
                    c.cancel_height = old_cancel_height;
                }
            },
        );
    }

    fn return_deposit(&mut self, tx: &Transaction, height: u32) {
        // The deposit address is derived from the candidate's code; find the
        // candidate whose canceled registration this return settles.
        for program in &tx.programs {
            let cid_candidates: Vec<Hash168> = self
                .data
                .candidates
                .iter()
                .filter(|(_, c)| {
                    c.status == CandidateStatus::Canceled && c.info.code == program.code
                })
                .map(|(cid, _)| *cid)
                .collect();
            for cid in cid_candidates {
                let old_status = CandidateStatus::Canceled;
                self.history.append(
                    height,
                    move |s: &mut CommitteeData| {
                        if let Some(c) = s.candidates.get_mut(&cid) {
                            c.status = CandidateStatus::Returned;
                        }
                    },
                    move |s: &mut CommitteeData| {
                        if let Some(c) = s.candidates.get_mut(&cid) {
                            c.status = old_status;
                        }
                    },
                );
            }
        }
    }

    /// Seats the council from the current candidate standings.
    ///
    /// The appropriation transaction opens a term: the top candidates by
    /// votes become elected members and the candidate roll resets.
    fn process_appropriation(&mut self, height: u32) {
        let mut standings: Vec<(&Hash168, &CrCandidate)> = self
            .data
            .candidates
            .iter()
            .filter(|(_, c)| c.status == CandidateStatus::Active)
            .collect();
        standings.sort_by(|a, b| b.1.votes.cmp(&a.1.votes).then(a.0.cmp(b.0)));

        let seats = self.params.cr_member_count as usize;
        let elected: Vec<CrMember> = standings
            .into_iter()
            .take(seats)
            .map(|(_, c)| CrMember {
                info: c.info.clone(),
                member_state: MemberState::Elected,
                impeachment_votes: Amount::ZERO,
            })
            .collect();
        if elected.is_empty() {
            return;
        }

        let old_members = self.data.members.clone();
        let old_candidates = self.data.candidates.clone();
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                s.members = elected
                    .iter()
                    .map(|m| (m.info.cid, m.clone()))
                    .collect();
                s.candidates.clear();
            },
            move |s: &mut CommitteeData| {
                s.members = old_members.clone();
                s.candidates = old_candidates.clone();
            },
        );
    }

    // --- Vote bookkeeping --------------------------------------------------

    /// Applies the council-related contents of every vote output in `tx`.
    fn process_votes(&mut self, tx: &Transaction, height: u32) {
        if tx.version < TX_VERSION_09 {
            return;
        }
        let tx_hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            let Some(vote) = output.vote_payload() else {
                continue;
            };
            if vote.version < VOTE_PRODUCER_AND_CR_VERSION {
                continue;
            }
            let cr_related = vote
                .contents
                .iter()
                .any(|content| content.vote_type.is_cr_related());
            if !cr_related {
                continue;
            }

            let refer_key = kestrel_types::tx::OutPoint {
                tx_hash,
                index: index as u16,
            }
            .refer_key();
            self.history.append(
                height,
                move |s: &mut CommitteeData| {
                    s.votes.insert(refer_key);
                },
                move |s: &mut CommitteeData| {
                    s.votes.remove(&refer_key);
                },
            );
            self.process_vote_output(vote, height);
        }
    }

    fn process_vote_output(&mut self, vote: &VoteOutput, height: u32) {
        for content in &vote.contents {
            for cv in &content.candidate_votes {
                let votes = cv.votes;
                match content.vote_type {
                    VoteKind::Crc => {
                        let Some(cid) = cv.candidate_as_hash168() else {
                            continue;
                        };
                        if !self.data.candidates.contains_key(&cid) {
                            continue;
                        }
                        self.history.append(
                            height,
                            move |s: &mut CommitteeData| {
                                if let Some(c) = s.candidates.get_mut(&cid) {
                                    c.votes += votes;
                                }
                            },
                            move |s: &mut CommitteeData| {
                                if let Some(c) = s.candidates.get_mut(&cid) {
                                    c.votes -= votes;
                                }
                            },
                        );
                    }
                    VoteKind::CrcProposal => {
                        let Some(hash) = Hash256::from_slice(&cv.candidate) else {
                            continue;
                        };
                        let eligible = self
                            .data
                            .proposals
                            .get(&hash)
                            .is_some_and(|p| p.status == crate::ProposalStatus::CrAgreed);
                        if !eligible {
                            continue;
                        }
                        self.history.append(
                            height,
                            move |s: &mut CommitteeData| {
                                if let Some(p) = s.proposals.get_mut(&hash) {
                                    p.voters_reject_amount += votes;
                                }
                            },
                            move |s: &mut CommitteeData| {
                                if let Some(p) = s.proposals.get_mut(&hash) {
                                    p.voters_reject_amount -= votes;
                                }
                            },
                        );
                    }
                    VoteKind::CrcImpeachment => {
                        self.process_impeachment(&cv.candidate, votes, height, false);
                    }
                    VoteKind::Delegate => {}
                }
            }
        }
    }

    /// Accrues (or, on cancel, releases) impeachment votes against an
    /// elected member.
    fn process_impeachment(&mut self, member: &[u8], votes: Amount, height: u32, cancel: bool) {
        let Some(cid) = Hash168::from_slice(member) else {
            return;
        };
        let eligible = self
            .data
            .members
            .get(&cid)
            .is_some_and(|m| m.member_state == MemberState::Elected);
        if !eligible {
            return;
        }
        let delta = if cancel { -votes } else { votes };
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(m) = s.members.get_mut(&cid) {
                    m.impeachment_votes += delta;
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(m) = s.members.get_mut(&cid) {
                    m.impeachment_votes -= delta;
                }
            },
        );
    }

    /// Undoes vote effects when a transaction spends a live vote output.
    fn process_cancel_votes(&mut self, tx: &Transaction, height: u32) {
        let spends_vote = tx
            .inputs
            .iter()
            .any(|input| self.data.votes.contains(&input.refer_key()));
        if !spends_vote {
            return;
        }

        let Some(utxo) = self.utxo.clone() else {
            error!(target: "cr", tx = %tx.hash(), "no utxo view to resolve canceled votes");
            return;
        };
        let references = match utxo.tx_reference(tx) {
            Ok(references) => references,
            Err(err) => {
                error!(target: "cr", tx = %tx.hash(), %err, "get tx reference failed");
                return;
            }
        };

        for input in &tx.inputs {
            let refer_key = input.refer_key();
            if !self.data.votes.contains(&refer_key) {
                continue;
            }
            self.history.append(
                height,
                move |s: &mut CommitteeData| {
                    s.votes.remove(&refer_key);
                },
                move |s: &mut CommitteeData| {
                    s.votes.insert(refer_key);
                },
            );
            if let Some(output) = references.get(input) {
                self.process_vote_cancel(output, height);
            }
        }
    }

    fn process_vote_cancel(&mut self, output: &Output, height: u32) {
        let Some(vote) = output.vote_payload() else {
            return;
        };
        for content in &vote.contents {
            for cv in &content.candidate_votes {
                let votes = cv.votes;
                match content.vote_type {
                    VoteKind::Crc => {
                        let Some(cid) = cv.candidate_as_hash168() else {
                            continue;
                        };
                        if !self.data.candidates.contains_key(&cid) {
                            continue;
                        }
                        self.history.append(
                            height,
                            move |s: &mut CommitteeData| {
                                if let Some(c) = s.candidates.get_mut(&cid) {
                                    c.votes -= votes;
                                }
                            },
                            move |s: &mut CommitteeData| {
                                if let Some(c) = s.candidates.get_mut(&cid) {
                                    c.votes += votes;
                                }
                            },
                        );
                    }
                    VoteKind::CrcProposal => {
                        let Some(hash) = Hash256::from_slice(&cv.candidate) else {
                            continue;
                        };
                        let eligible = self
                            .data
                            .proposals
                            .get(&hash)
                            .is_some_and(|p| p.status == crate::ProposalStatus::CrAgreed);
                        if !eligible {
                            continue;
                        }
                        self.history.append(
                            height,
                            move |s: &mut CommitteeData| {
                                if let Some(p) = s.proposals.get_mut(&hash) {
                                    p.voters_reject_amount -= votes;
                                }
                            },
                            move |s: &mut CommitteeData| {
                                if let Some(p) = s.proposals.get_mut(&hash) {
                                    p.voters_reject_amount += votes;
                                }
                            },
                        );
                    }
                    VoteKind::CrcImpeachment => {
                        self.process_impeachment(&cv.candidate, votes, height, true);
                    }
                    VoteKind::Delegate => {}
                }
            }
        }
    }

    // --- Treasury accounting ----------------------------------------------

    /// Tracks the three treasury balances and the committed budget total.
    fn process_crc_address_related_tx(&mut self, tx: &Transaction, height: u32) {
        if let Some(proposal) = tx.crc_proposal() {
            let budget = proposal.total_budget();
            self.history.append(
                height,
                move |s: &mut CommitteeData| s.crc_committee_used_amount += budget,
                move |s: &mut CommitteeData| s.crc_committee_used_amount -= budget,
            );
        }

        for input in &tx.inputs {
            let refer_key = input.refer_key();
            if let Some(amount) = self.data.foundation_outputs.get(&refer_key).copied() {
                self.history.append(
                    height,
                    move |s: &mut CommitteeData| s.crc_foundation_balance -= amount,
                    move |s: &mut CommitteeData| s.crc_foundation_balance += amount,
                );
            } else if let Some(amount) = self.data.committee_outputs.get(&refer_key).copied() {
                self.history.append(
                    height,
                    move |s: &mut CommitteeData| s.crc_committee_balance -= amount,
                    move |s: &mut CommitteeData| s.crc_committee_balance += amount,
                );
            }
        }

        let tx_hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            let amount = output.value;
            let refer_key = kestrel_types::tx::OutPoint {
                tx_hash,
                index: index as u16,
            }
            .refer_key();
            if output.program_hash == self.params.crc_foundation {
                self.history.append(
                    height,
                    move |s: &mut CommitteeData| {
                        s.crc_foundation_balance += amount;
                        s.foundation_outputs.insert(refer_key, amount);
                    },
                    move |s: &mut CommitteeData| {
                        s.crc_foundation_balance -= amount;
                        s.foundation_outputs.remove(&refer_key);
                    },
                );
            } else if output.program_hash == self.params.crc_committee_address {
                self.history.append(
                    height,
                    move |s: &mut CommitteeData| {
                        s.crc_committee_balance += amount;
                        s.committee_outputs.insert(refer_key, amount);
                    },
                    move |s: &mut CommitteeData| {
                        s.crc_committee_balance -= amount;
                        s.committee_outputs.remove(&refer_key);
                    },
                );
            } else if output.program_hash == self.params.destroy_program_hash {
                self.history.append(
                    height,
                    move |s: &mut CommitteeData| s.destroyed_amount += amount,
                    move |s: &mut CommitteeData| s.destroyed_amount -= amount,
                );
            }
        }
    }
}

impl CommitteeView for Committee {
    fn candidate_exists(&self, cid: &Hash168) -> bool {
        self.data.candidates.contains_key(cid)
    }

    fn is_elected_member(&self, did: &Hash168) -> bool {
        self.data
            .member_by_did(did)
            .is_some_and(|m| m.member_state == MemberState::Elected)
    }

    fn proposal_exists(&self, hash: &Hash256) -> bool {
        self.data.proposals.contains_key(hash)
    }

    fn available_committee_amount(&self) -> Amount {
        self.data.crc_committee_balance - self.data.crc_committee_used_amount
    }
}
