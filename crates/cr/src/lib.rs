#![forbid(unsafe_code)]

//! Cyber-Republic committee state.
//!
//! Candidate registry, vote and impeachment bookkeeping, treasury balances
//! and the proposal lifecycle state machine, all driven strictly from block
//! contents through the [`kestrel_api::History`] journal. The committee is
//! the single owner: the proposal map lives inside its state body, and the
//! lifecycle methods in [`proposal`] operate through the committee.

pub mod checkpoint;
pub mod committee;
pub mod proposal;
pub mod state;

pub use checkpoint::CommitteeCheckpoint;
pub use committee::Committee;
pub use proposal::{ProposalState, ProposalStatus};
pub use state::{CandidateStatus, CommitteeData, CrCandidate, CrMember, MemberState};
