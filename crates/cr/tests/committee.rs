//! Committee lifecycle scenarios: proposal state machine, vote symmetry,
//! rollback equality.

use kestrel_cr::{Committee, CommitteeCheckpoint, ProposalStatus};
use kestrel_api::{BlockListener, Checkpoint};
use kestrel_types::amount::Amount;
use kestrel_types::block::{Block, DposBlock, Header};
use kestrel_types::codec;
use kestrel_types::hash::{Hash168, Hash256};
use kestrel_types::params::ChainParams;
use kestrel_types::payload::{
    Budget, CandidateVotes, CrcProposal, CrcProposalReview, CrInfo, Payload, TxType, VoteContent,
    VoteKind, VoteOutput, VoteResult, VOTE_PRODUCER_AND_CR_VERSION,
};
use kestrel_types::tx::{Output, OutputPayload, OutputType, Transaction, TX_VERSION_09};

fn params() -> ChainParams {
    let mut params = ChainParams::default();
    params.cr_agreement_count = 2;
    params.proposal_cr_voting_period = 10;
    params.proposal_public_voting_period = 10;
    params.cr_member_count = 2;
    // Distinct treasury addresses so zeroed program hashes stay inert.
    params.crc_foundation = Hash168([0xf0; 21]);
    params.crc_committee_address = Hash168([0xf1; 21]);
    params.destroy_program_hash = Hash168([0xf2; 21]);
    params
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

fn register_cr_tx(n: u8) -> Transaction {
    let mut tx = Transaction::new(TxType::RegisterCr);
    tx.payload = Payload::CrInfo(CrInfo {
        code: vec![n; 35],
        cid: Hash168([n; 21]),
        did: Hash168([n + 100; 21]),
        nickname: format!("cr-{}", n),
        ..Default::default()
    });
    tx
}

fn vote_tx(kind: VoteKind, candidate: Vec<u8>, votes: Amount) -> Transaction {
    let mut tx = Transaction::new(TxType::TransferAsset);
    tx.version = TX_VERSION_09;
    tx.outputs.push(Output {
        value: votes,
        output_type: OutputType::Vote,
        payload: OutputPayload::Vote(VoteOutput {
            version: VOTE_PRODUCER_AND_CR_VERSION,
            contents: vec![VoteContent {
                vote_type: kind,
                candidate_votes: vec![CandidateVotes { candidate, votes }],
            }],
        }),
        ..Default::default()
    });
    tx
}

fn proposal_tx(member_did: Hash168) -> (Transaction, Hash256) {
    let proposal = CrcProposal {
        owner_key: vec![2; 33],
        draft_hash: Hash256::double_sha256(b"draft"),
        budgets: vec![Budget {
            budget_type: 0,
            stage: 0,
            amount: Amount::from_coins(10),
        }],
        recipient: Hash168([7; 21]),
        cr_council_member_did: member_did,
        ..Default::default()
    };
    let hash = proposal.hash(0);
    let mut tx = Transaction::new(TxType::CrcProposal);
    tx.payload = Payload::CrcProposal(proposal);
    (tx, hash)
}

fn review_tx(proposal_hash: Hash256, did: Hash168, verdict: VoteResult) -> Transaction {
    let mut tx = Transaction::new(TxType::CrcProposalReview);
    tx.payload = Payload::CrcProposalReview(CrcProposalReview {
        proposal_hash,
        vote_result: verdict,
        did,
        ..Default::default()
    });
    tx
}

/// Seats two members through register → appropriation.
fn committee_with_members() -> Committee {
    let mut committee = Committee::new(params());
    committee.process_block(&block_at(10, vec![register_cr_tx(1), register_cr_tx(2)]));
    let appropriation = Transaction::new(TxType::CrcAppropriation);
    committee.process_block(&block_at(11, vec![appropriation]));
    committee
}

#[test]
fn election_seats_top_candidates() {
    let committee = committee_with_members();
    assert_eq!(committee.data().members.len(), 2);
    assert!(committee.data().candidates.is_empty());
}

#[test]
fn proposal_without_enough_approvals_is_cr_canceled() {
    let mut committee = committee_with_members();
    let (tx, hash) = proposal_tx(Hash168([101; 21]));
    committee.process_block(&block_at(100, vec![tx]));
    assert_eq!(
        committee.proposal(&hash).unwrap().status,
        ProposalStatus::Registered
    );

    // One approval is below the agreement count of two.
    committee.process_block(&block_at(
        101,
        vec![review_tx(hash, Hash168([101; 21]), VoteResult::Approve)],
    ));

    // The council voting period runs out at register height + 10.
    committee.process_block(&block_at(110, Vec::new()));
    assert_eq!(
        committee.proposal(&hash).unwrap().status,
        ProposalStatus::CrCanceled
    );
}

#[test]
fn proposal_with_threshold_approvals_reaches_cr_agreed() {
    let mut committee = committee_with_members();
    let (tx, hash) = proposal_tx(Hash168([101; 21]));
    committee.process_block(&block_at(100, vec![tx]));
    committee.process_block(&block_at(
        101,
        vec![
            review_tx(hash, Hash168([101; 21]), VoteResult::Approve),
            review_tx(hash, Hash168([102; 21]), VoteResult::Approve),
        ],
    ));

    committee.process_block(&block_at(110, Vec::new()));
    let state = committee.proposal(&hash).unwrap();
    assert_eq!(state.status, ProposalStatus::CrAgreed);
    assert_eq!(state.vote_start_height, 110);

    // Quiet public period settles the proposal.
    committee.process_block(&block_at(120, Vec::new()));
    assert_eq!(
        committee.proposal(&hash).unwrap().status,
        ProposalStatus::VoterAgreed
    );
}

#[test]
fn massive_reject_votes_cancel_an_agreed_proposal() {
    let mut committee = committee_with_members();
    let (tx, hash) = proposal_tx(Hash168([101; 21]));
    committee.process_block(&block_at(100, vec![tx]));
    committee.process_block(&block_at(
        101,
        vec![
            review_tx(hash, Hash168([101; 21]), VoteResult::Approve),
            review_tx(hash, Hash168([102; 21]), VoteResult::Approve),
        ],
    ));
    committee.process_block(&block_at(110, Vec::new()));

    // Ten percent of circulation lands as reject votes.
    let threshold = kestrel_cr::proposal::CIRCULATION.ceil_mul(10, 100);
    committee.process_block(&block_at(
        111,
        vec![vote_tx(VoteKind::CrcProposal, hash.as_bytes().to_vec(), threshold)],
    ));
    committee.process_block(&block_at(120, Vec::new()));
    assert_eq!(
        committee.proposal(&hash).unwrap().status,
        ProposalStatus::VoterCanceled
    );
}

#[test]
fn impeachment_votes_only_accrue_to_elected_members() {
    let mut committee = committee_with_members();
    let member_cid = Hash168([1; 21]);
    committee.process_block(&block_at(
        20,
        vec![vote_tx(
            VoteKind::CrcImpeachment,
            member_cid.as_bytes().to_vec(),
            Amount::from_coins(5),
        )],
    ));
    assert_eq!(
        committee.data().members[&member_cid].impeachment_votes,
        Amount::from_coins(5)
    );

    // Unknown target accrues nowhere.
    committee.process_block(&block_at(
        21,
        vec![vote_tx(
            VoteKind::CrcImpeachment,
            vec![0x55; 21],
            Amount::from_coins(5),
        )],
    ));
    let total: Amount = committee
        .data()
        .members
        .values()
        .map(|m| m.impeachment_votes)
        .sum();
    assert_eq!(total, Amount::from_coins(5));
}

#[test]
fn candidate_votes_accumulate() {
    let mut committee = Committee::new(params());
    committee.process_block(&block_at(10, vec![register_cr_tx(1)]));
    committee.process_block(&block_at(
        11,
        vec![vote_tx(
            VoteKind::Crc,
            Hash168([1; 21]).as_bytes().to_vec(),
            Amount::from_coins(42),
        )],
    ));
    assert_eq!(
        committee.data().candidates[&Hash168([1; 21])].votes,
        Amount::from_coins(42)
    );
}

#[test]
fn treasury_balances_follow_outputs() {
    let p = params();
    let mut committee = Committee::new(p.clone());
    let mut tx = Transaction::new(TxType::TransferAsset);
    tx.outputs.push(Output {
        value: Amount::from_coins(30),
        program_hash: p.crc_foundation,
        ..Default::default()
    });
    tx.outputs.push(Output {
        value: Amount::from_coins(7),
        program_hash: p.destroy_program_hash,
        ..Default::default()
    });
    committee.process_block(&block_at(10, vec![tx]));

    assert_eq!(
        committee.data().crc_foundation_balance,
        Amount::from_coins(30)
    );
    assert_eq!(committee.data().destroyed_amount, Amount::from_coins(7));

    committee.rollback_to(9);
    assert_eq!(committee.data().crc_foundation_balance, Amount::ZERO);
    assert_eq!(committee.data().destroyed_amount, Amount::ZERO);
}

#[test]
fn rollback_restores_serialized_state() {
    let mut committee = committee_with_members();
    let (tx, hash) = proposal_tx(Hash168([101; 21]));

    committee.process_block(&block_at(100, vec![tx]));
    let snapshot_at_100 = codec::to_bytes_canonical(committee.data());

    committee.process_block(&block_at(
        101,
        vec![review_tx(hash, Hash168([101; 21]), VoteResult::Approve)],
    ));
    committee.process_block(&block_at(102, Vec::new()));
    committee.process_block(&block_at(110, Vec::new()));
    assert_ne!(codec::to_bytes_canonical(committee.data()), snapshot_at_100);

    committee.rollback_to(100);
    assert_eq!(codec::to_bytes_canonical(committee.data()), snapshot_at_100);
}

#[test]
fn checkpoint_snapshot_roundtrip() {
    let mut cp = CommitteeCheckpoint::new(params());
    cp.on_block_saved(&block_at(10, vec![register_cr_tx(1)]));
    let bytes = cp.snapshot();

    let mut restored = CommitteeCheckpoint::new(params());
    restored.restore(&bytes).unwrap();
    assert_eq!(restored.snapshot(), bytes);
    assert!(restored
        .committee()
        .data()
        .candidates
        .contains_key(&Hash168([1; 21])));
}
