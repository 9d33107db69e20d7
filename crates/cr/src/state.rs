//! Committee state data: candidates, members, votes and treasury balances.

use crate::proposal::ProposalState;
use kestrel_types::amount::Amount;
use kestrel_types::hash::{Hash168, Hash256};
use kestrel_types::payload::CrInfo;
use kestrel_types::tx::ReferKey;
use parity_scale_codec::{Decode, Encode};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle state of a council candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum CandidateStatus {
    /// Registered, gathering votes.
    #[default]
    Pending,
    /// Eligible for election.
    Active,
    /// Deregistered, deposit still locked.
    Canceled,
    /// Deposit returned.
    Returned,
}

/// Lifecycle state of a sitting council member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum MemberState {
    /// Serving on the council.
    #[default]
    Elected,
    /// Removed by impeachment votes.
    Impeached,
    /// Term over, deposit returned.
    Returned,
    /// Removed by governance decision.
    Terminated,
}

/// A registered council candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct CrCandidate {
    /// Registration data as last updated.
    pub info: CrInfo,
    /// Lifecycle state.
    pub status: CandidateStatus,
    /// Accumulated votes.
    pub votes: Amount,
    /// Height the registration settled at.
    pub registered_height: u32,
    /// Height a deregistration settled at, 0 if none.
    pub cancel_height: u32,
    /// Locked registration deposit.
    pub deposit_amount: Amount,
}

/// A sitting council member.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct CrMember {
    /// The registration the member was elected from.
    pub info: CrInfo,
    /// Membership state.
    pub member_state: MemberState,
    /// Accumulated impeachment votes.
    pub impeachment_votes: Amount,
}

/// The snapshot-serializable body of the committee state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct CommitteeData {
    /// Candidates keyed by CID.
    pub candidates: BTreeMap<Hash168, CrCandidate>,
    /// Sitting members keyed by CID.
    pub members: BTreeMap<Hash168, CrMember>,
    /// Refer keys of live vote outputs; spending one cancels its votes.
    pub votes: BTreeSet<ReferKey>,
    /// All known proposals keyed by proposal hash.
    pub proposals: BTreeMap<Hash256, ProposalState>,
    /// Foundation treasury balance.
    pub crc_foundation_balance: Amount,
    /// Operating treasury balance.
    pub crc_committee_balance: Amount,
    /// Proposal budgets already committed against the treasury.
    pub crc_committee_used_amount: Amount,
    /// Coins provably burned.
    pub destroyed_amount: Amount,
    /// Live outputs held by the foundation address.
    pub foundation_outputs: BTreeMap<ReferKey, Amount>,
    /// Live outputs held by the committee address.
    pub committee_outputs: BTreeMap<ReferKey, Amount>,
}

impl CommitteeData {
    /// The member holding `did`, if seated.
    pub fn member_by_did(&self, did: &Hash168) -> Option<&CrMember> {
        self.members.values().find(|m| m.info.did == *did)
    }
}
