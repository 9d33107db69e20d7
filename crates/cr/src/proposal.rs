//! The proposal lifecycle state machine.
//!
//! ```text
//! Registered ──(approvals ≥ CRAgreementCount within CRVotingPeriod)──► CRAgreed
//!     │                                                                  │
//!     └── else after CRVotingPeriod ──► CRCanceled                       │
//!                                                                        │
//! CRAgreed ──(reject votes ≥ circulation·rejectPct)──► VoterCanceled     │
//!     │                                                                  ▼
//!     └── else after PublicVotingPeriod ──► VoterAgreed ──► Finished
//! ```
//!
//! Any approved state can be externally transitioned to `Aborted`.

use crate::committee::Committee;
use crate::state::CommitteeData;
use kestrel_types::amount::Amount;
use kestrel_types::hash::{Hash168, Hash256};
use kestrel_types::payload::{CrcProposal, VoteResult};
use kestrel_types::tx::Transaction;
use parity_scale_codec::{Decode, Encode};
use tracing::debug;

/// Total coin circulation used by the voter-reject threshold.
///
/// The running network pins this rather than computing it from the UTXO
/// set; keep the constant in one place.
pub const CIRCULATION: Amount = Amount::from_grains(3_300 * 10_000 * 100_000_000);

/// Where a proposal stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum ProposalStatus {
    /// On chain, collecting council reviews.
    #[default]
    Registered,
    /// Approved by the council, open to public reject votes.
    CrAgreed,
    /// Survived the public voting period.
    VoterAgreed,
    /// Ran out its lifetime.
    Finished,
    /// Canceled by council vote.
    CrCanceled,
    /// Canceled by public reject votes.
    VoterCanceled,
    /// Abandoned after approval.
    Aborted,
}

/// Replicated state of one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct ProposalState {
    /// The proposal payload as registered.
    pub proposal: CrcProposal,
    /// Hash of the registering transaction.
    pub tx_hash: Hash256,
    /// Lifecycle position.
    pub status: ProposalStatus,
    /// Height the registration settled at.
    pub register_height: u32,
    /// Height the public voting window opened at; 0 before CR agreement.
    pub vote_start_height: u32,
    /// Council reviews by member DID.
    pub cr_votes: std::collections::BTreeMap<Hash168, VoteResult>,
    /// Accumulated public reject votes.
    pub voters_reject_amount: Amount,
    /// Stage amounts already withdrawn.
    pub withdrawn_amount: Amount,
}

impl Committee {
    /// Registers a proposal from its settling transaction.
    pub(crate) fn register_proposal(&mut self, tx: &Transaction, height: u32) {
        let Some(proposal) = tx.crc_proposal() else {
            return;
        };
        let hash = proposal.hash(tx.payload_version);
        let state = ProposalState {
            proposal: proposal.clone(),
            tx_hash: tx.hash(),
            status: ProposalStatus::Registered,
            register_height: height,
            ..Default::default()
        };
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                s.proposals.insert(hash, state.clone());
            },
            move |s: &mut CommitteeData| {
                s.proposals.remove(&hash);
            },
        );
    }

    /// Records a council member's review.
    pub(crate) fn proposal_review(&mut self, tx: &Transaction, height: u32) {
        let kestrel_types::payload::Payload::CrcProposalReview(review) = &tx.payload else {
            return;
        };
        if !self.data.proposals.contains_key(&review.proposal_hash) {
            return;
        }
        let hash = review.proposal_hash;
        let did = review.did;
        let result = review.vote_result;
        let previous = self
            .data
            .proposals
            .get(&hash)
            .and_then(|p| p.cr_votes.get(&did).copied());
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.cr_votes.insert(did, result);
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    match previous {
                        Some(prior) => {
                            p.cr_votes.insert(did, prior);
                        }
                        None => {
                            p.cr_votes.remove(&did);
                        }
                    }
                }
            },
        );
    }

    /// Records stage progress; the final stage finishes the proposal.
    pub(crate) fn proposal_tracking(&mut self, tx: &Transaction, height: u32) {
        let kestrel_types::payload::Payload::CrcProposalTracking(tracking) = &tx.payload else {
            return;
        };
        let Some(state) = self.data.proposals.get(&tracking.proposal_hash) else {
            return;
        };
        let last_stage = state.proposal.budgets.len().saturating_sub(1) as u8;
        if state.status != ProposalStatus::VoterAgreed || tracking.stage < last_stage {
            return;
        }
        let hash = tracking.proposal_hash;
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.status = ProposalStatus::Finished;
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.status = ProposalStatus::VoterAgreed;
                }
            },
        );
    }

    /// Records a stage withdrawal.
    pub(crate) fn proposal_withdraw(&mut self, tx: &Transaction, height: u32) {
        let kestrel_types::payload::Payload::CrcProposalWithdraw(withdraw) = &tx.payload else {
            return;
        };
        if !self.data.proposals.contains_key(&withdraw.proposal_hash) {
            return;
        }
        let hash = withdraw.proposal_hash;
        let amount = withdraw.amount;
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.withdrawn_amount += amount;
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.withdrawn_amount -= amount;
                }
            },
        );
    }

    /// Drives time-based proposal transitions at `height`.
    pub(crate) fn update_proposals(&mut self, height: u32) {
        let due: Vec<(Hash256, ProposalStatus)> = self
            .data
            .proposals
            .iter()
            .filter_map(|(hash, p)| match p.status {
                ProposalStatus::Registered if self.should_end_cr_vote(p, height) => {
                    Some((*hash, ProposalStatus::Registered))
                }
                ProposalStatus::CrAgreed if self.should_end_public_vote(p, height) => {
                    Some((*hash, ProposalStatus::CrAgreed))
                }
                _ => None,
            })
            .collect();

        for (hash, status) in due {
            match status {
                ProposalStatus::Registered => self.transfer_registered_state(hash, height),
                ProposalStatus::CrAgreed => self.transfer_cr_agreed_state(hash, height),
                _ => {}
            }
        }
    }

    fn should_end_cr_vote(&self, proposal: &ProposalState, height: u32) -> bool {
        proposal.register_height + self.params.proposal_cr_voting_period <= height
    }

    fn should_end_public_vote(&self, proposal: &ProposalState, height: u32) -> bool {
        proposal.vote_start_height + self.params.proposal_public_voting_period <= height
    }

    /// Resolves a `Registered` proposal by council agreement count.
    fn transfer_registered_state(&mut self, hash: Hash256, height: u32) {
        let Some(proposal) = self.data.proposals.get(&hash) else {
            return;
        };
        let agreed = proposal
            .cr_votes
            .values()
            .filter(|v| **v == VoteResult::Approve)
            .count() as u32;

        if agreed >= self.params.cr_agreement_count {
            debug!(target: "cr", %hash, agreed, "proposal reached council agreement");
            self.history.append(
                height,
                move |s: &mut CommitteeData| {
                    if let Some(p) = s.proposals.get_mut(&hash) {
                        p.status = ProposalStatus::CrAgreed;
                        p.vote_start_height = height;
                    }
                },
                move |s: &mut CommitteeData| {
                    if let Some(p) = s.proposals.get_mut(&hash) {
                        p.status = ProposalStatus::Registered;
                        p.vote_start_height = 0;
                    }
                },
            );
        } else {
            self.history.append(
                height,
                move |s: &mut CommitteeData| {
                    if let Some(p) = s.proposals.get_mut(&hash) {
                        p.status = ProposalStatus::CrCanceled;
                    }
                },
                move |s: &mut CommitteeData| {
                    if let Some(p) = s.proposals.get_mut(&hash) {
                        p.status = ProposalStatus::Registered;
                    }
                },
            );
        }
    }

    /// Resolves a `CrAgreed` proposal by public reject weight.
    fn transfer_cr_agreed_state(&mut self, hash: Hash256, height: u32) {
        let Some(proposal) = self.data.proposals.get(&hash) else {
            return;
        };
        let threshold =
            CIRCULATION.ceil_mul(self.params.voter_reject_percentage as i64, 100);
        let rejected = proposal.voters_reject_amount >= threshold;

        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.status = if rejected {
                        ProposalStatus::VoterCanceled
                    } else {
                        ProposalStatus::VoterAgreed
                    };
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.status = ProposalStatus::CrAgreed;
                }
            },
        );
    }

    /// Externally aborts an approved proposal.
    pub fn abort_proposal(&mut self, hash: Hash256, height: u32) -> bool {
        let Some(proposal) = self.data.proposals.get(&hash) else {
            return false;
        };
        let from = proposal.status;
        if !matches!(from, ProposalStatus::CrAgreed | ProposalStatus::VoterAgreed) {
            return false;
        }
        self.history.append(
            height,
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.status = ProposalStatus::Aborted;
                }
            },
            move |s: &mut CommitteeData| {
                if let Some(p) = s.proposals.get_mut(&hash) {
                    p.status = from;
                }
            },
        );
        self.history.commit(height, &mut self.data);
        true
    }

    /// Whether a proposal with `hash` is known.
    pub fn exist_proposal(&self, hash: &Hash256) -> bool {
        self.data.proposals.contains_key(hash)
    }

    /// Whether any proposal references this draft document.
    pub fn exist_draft(&self, draft_hash: &Hash256) -> bool {
        self.data
            .proposals
            .values()
            .any(|p| p.proposal.draft_hash == *draft_hash)
    }

    /// The proposal state for `hash`, if known.
    pub fn proposal(&self, hash: &Hash256) -> Option<&ProposalState> {
        self.data.proposals.get(hash)
    }
}
