//! End-to-end validator scenarios.

mod common;

use common::*;
use kestrel_chain::node::BlockNode;
use kestrel_chain::validator::{ChainContext, Validator};
use kestrel_types::amount::Amount;
use kestrel_types::error::{ErrorCode, RuleError};
use kestrel_types::hash::{Hash168, Hash256};
use kestrel_types::payload::{Payload, ProcessProducer, ProducerInfo, TxType};
use kestrel_types::tx::{Input, OutPoint, Output, Program, Transaction, MAX_SEQUENCE};
use std::sync::Arc;

struct Fixture {
    params: kestrel_types::params::ChainParams,
    time: FakeTime,
    arbiters: FakeArbiters,
    producers: FakeProducers,
    committee: FakeCommittee,
    utxo: FakeUtxo,
}

impl Fixture {
    fn new() -> Fixture {
        Fixture {
            params: test_params(),
            time: FakeTime(2_000_000_000),
            arbiters: FakeArbiters::default(),
            producers: FakeProducers::default(),
            committee: FakeCommittee::default(),
            utxo: FakeUtxo::default(),
        }
    }

    fn validator(&self) -> Validator<'_> {
        Validator::new(
            &self.params,
            &self.time,
            &self.arbiters,
            &self.producers,
            &self.committee,
            &self.utxo,
            &FakeSig,
        )
    }
}

fn transfer_tx(n: u8) -> Transaction {
    let mut tx = Transaction::new(TxType::TransferAsset);
    tx.inputs.push(Input {
        previous: OutPoint {
            tx_hash: Hash256::double_sha256(&[n]),
            index: 0,
        },
        sequence: 0,
    });
    tx.outputs.push(Output {
        value: Amount::from_coins(1),
        program_hash: Hash168([n; 21]),
        ..Default::default()
    });
    tx.programs.push(Program {
        code: vec![0x21, n],
        parameter: vec![0x40],
    });
    tx
}

#[test]
fn empty_block_fails_sanity() {
    let fx = Fixture::new();
    let block = build_block(10, 1_900_000_000, Vec::new(), &fx.params);
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert_eq!(err.code(), "BLOCK_SANITY");
    assert!(err.to_string().contains("does not contain any transactions"));
}

#[test]
fn second_coinbase_fails_sanity() {
    let fx = Fixture::new();
    let block = build_block(
        10,
        1_900_000_000,
        vec![
            coinbase_tx(Amount::from_coins(5)),
            coinbase_tx(Amount::from_coins(1)),
        ],
        &fx.params,
    );
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert!(err.to_string().contains("second coinbase"));
}

#[test]
fn first_tx_must_be_coinbase() {
    let fx = Fixture::new();
    let block = build_block(10, 1_900_000_000, vec![transfer_tx(1)], &fx.params);
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert!(err.to_string().contains("not a coinbase"));
}

#[test]
fn timestamp_too_far_in_future_fails_sanity() {
    let fx = Fixture::new();
    // One second past the two-hour tolerance.
    let timestamp = fx.time.0 as u32 + 2 * 60 * 60 + 1;
    let block = build_block(
        10,
        timestamp,
        vec![coinbase_tx(Amount::from_coins(5))],
        &fx.params,
    );
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert!(err.to_string().contains("too far in the future"));

    // Exactly at the bound passes the timestamp check.
    let block = build_block(
        10,
        timestamp - 1,
        vec![coinbase_tx(Amount::from_coins(5))],
        &fx.params,
    );
    fx.validator().check_block_sanity(&block).unwrap();
}

#[test]
fn merkle_mismatch_after_swap_fails_sanity() {
    let fx = Fixture::new();
    let mut block = build_block(
        10,
        1_900_000_000,
        vec![
            coinbase_tx(Amount::from_coins(5)),
            transfer_tx(1),
            transfer_tx(2),
        ],
        &fx.params,
    );
    // Swap two transactions after the root was computed.
    block.transactions.swap(1, 2);
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert!(err.to_string().contains("merkle root is invalid"));
}

#[test]
fn duplicate_transaction_fails_sanity() {
    let fx = Fixture::new();
    let block = build_block(
        10,
        1_900_000_000,
        vec![
            coinbase_tx(Amount::from_coins(5)),
            transfer_tx(1),
            transfer_tx(1),
        ],
        &fx.params,
    );
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert!(err.to_string().contains("duplicate transaction"));
}

#[test]
fn duplicate_input_across_txs_fails_sanity() {
    let fx = Fixture::new();
    let mut tx_a = transfer_tx(1);
    let mut tx_b = transfer_tx(2);
    let shared = Input {
        previous: OutPoint {
            tx_hash: Hash256::double_sha256(b"shared"),
            index: 7,
        },
        sequence: 0,
    };
    tx_a.inputs.push(shared.clone());
    tx_b.inputs.push(shared);
    let block = build_block(
        10,
        1_900_000_000,
        vec![coinbase_tx(Amount::from_coins(5)), tx_a, tx_b],
        &fx.params,
    );
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert_eq!(err.code(), "TX_DOUBLE_SPEND");
}

#[test]
fn duplicate_producer_owner_in_block_fails_sanity() {
    let fx = Fixture::new();
    let mut register = Transaction::new(TxType::RegisterProducer);
    register.payload = Payload::ProducerInfo(ProducerInfo {
        owner_key: vec![2; 33],
        node_key: vec![3; 33],
        signature: vec![1; 64],
        ..Default::default()
    });
    register.inputs.push(Input {
        previous: OutPoint {
            tx_hash: Hash256::double_sha256(b"reg"),
            index: 0,
        },
        sequence: 0,
    });
    register.programs.push(Program {
        code: vec![0x21, 0x02],
        parameter: vec![0x40],
    });

    let mut cancel = Transaction::new(TxType::CancelProducer);
    cancel.payload = Payload::ProcessProducer(ProcessProducer {
        owner_key: vec![2; 33],
        signature: vec![1; 64],
    });
    cancel.inputs.push(Input {
        previous: OutPoint {
            tx_hash: Hash256::double_sha256(b"cancel"),
            index: 0,
        },
        sequence: 0,
    });
    cancel.programs.push(Program {
        code: vec![0x21, 0x02],
        parameter: vec![0x40],
    });

    let block = build_block(
        10,
        1_900_000_000,
        vec![coinbase_tx(Amount::from_coins(5)), register, cancel],
        &fx.params,
    );
    let err = fx.validator().check_block_sanity(&block).unwrap_err();
    assert!(err.to_string().contains("duplicate producer"));
}

/// Builds an ancestor chain whose tip sits at `height`.
fn prev_chain(height: u32, timestamp: u32, bits: u32) -> Arc<BlockNode> {
    let mut node = BlockNode::genesis(Hash256::double_sha256(b"genesis"), timestamp, bits);
    for i in 1..=height {
        node = node.extend(
            Hash256::double_sha256(&i.to_le_bytes()),
            timestamp + i,
            bits,
        );
    }
    node
}

#[test]
fn unfinalized_tx_fails_context_until_sequences_max_out() {
    let fx = Fixture::new();
    let height = 100;
    let prev = prev_chain(height - 1, 1_800_000_000, EASY_BITS);

    let mut tx = transfer_tx(1);
    tx.lock_time = height + 10;
    for input in &mut tx.inputs {
        input.sequence = 0;
    }
    fx.utxo.insert(
        &tx.inputs[0],
        Output {
            value: Amount::from_coins(2),
            ..Default::default()
        },
    );

    let reward = fx.params.block_reward(height);
    let fee = Amount::from_coins(1);
    let make_block = |tx: Transaction| {
        build_block(
            height,
            1_900_000_000,
            vec![coinbase_tx(reward + fee), tx],
            &fx.params,
        )
    };
    let ctx = ChainContext {
        prev_node: Some(prev),
        prev_block_confirmed: None,
    };

    let err = fx
        .validator()
        .check_block_context(&make_block(tx.clone()), &ctx)
        .unwrap_err();
    assert!(err.to_string().contains("unfinalized"));

    // Maxing out every input sequence finalizes the transaction.
    for input in &mut tx.inputs {
        input.sequence = MAX_SEQUENCE;
    }
    fx.validator()
        .check_block_context(&make_block(tx), &ctx)
        .unwrap();
}

#[test]
fn wrong_difficulty_fails_context() {
    let fx = Fixture::new();
    let prev = prev_chain(99, 1_800_000_000, 0x2100_ffff);
    let block = build_block(
        100,
        1_900_000_000,
        vec![coinbase_tx(fx.params.block_reward(100))],
        &fx.params,
    );
    // Header bits are EASY_BITS but the chain runs at 0x2100ffff.
    let err = fx
        .validator()
        .check_block_context(
            &block,
            &ChainContext {
                prev_node: Some(prev),
                prev_block_confirmed: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "BLOCK_DIFFICULTY");
}

#[test]
fn timestamp_not_after_median_fails_context() {
    let fx = Fixture::new();
    let prev = prev_chain(99, 1_900_000_000, EASY_BITS);
    let median = kestrel_chain::node::median_time_past(&prev);
    let block = build_block(
        100,
        median,
        vec![coinbase_tx(fx.params.block_reward(100))],
        &fx.params,
    );
    let err = fx
        .validator()
        .check_block_context(
            &block,
            &ChainContext {
                prev_node: Some(prev),
                prev_block_confirmed: None,
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("timestamp is not after"));
}

#[test]
fn record_sponsor_must_mirror_predecessor_confirm() {
    let mut fx = Fixture::new();
    fx.params.record_sponsor_start_height = 50;
    let height = 100;
    let prev = prev_chain(height - 1, 1_800_000_000, EASY_BITS);
    let reward = fx.params.block_reward(height);

    // Predecessor confirmed, but no sponsor record in this block.
    let block = build_block(height, 1_900_000_000, vec![coinbase_tx(reward)], &fx.params);
    let err = fx
        .validator()
        .check_block_context(
            &block,
            &ChainContext {
                prev_node: Some(prev.clone()),
                prev_block_confirmed: Some(true),
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("must have record sponsor"));

    // Sponsor record present while the predecessor was unconfirmed.
    let mut sponsor = Transaction::new(TxType::RecordSponsor);
    sponsor.payload = Payload::RecordSponsor(kestrel_types::payload::RecordSponsor {
        sponsor: vec![2; 33],
    });
    let block = build_block(
        height,
        1_900_000_000,
        vec![coinbase_tx(reward), sponsor],
        &fx.params,
    );
    let err = fx
        .validator()
        .check_block_context(
            &block,
            &ChainContext {
                prev_node: Some(prev),
                prev_block_confirmed: Some(false),
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("must be confirmed"));
}

#[test]
fn dpos_v2_coinbase_split_thirty_thirtyfive() {
    let mut fx = Fixture::new();
    fx.params.crc_assets_program_hash = Hash168([1; 21]);
    fx.params.dpos_v2_reward_accumulate_program_hash = Hash168([2; 21]);
    fx.arbiters.active_height = Some(1000);

    let height = 1002;
    let prev = prev_chain(height - 1, 1_800_000_000, EASY_BITS);
    let reward = fx.params.block_reward(height);

    // Expected three-way split of the total reward.
    let cr = reward.ceil_mul(30, 100);
    let dpos = reward.ceil_mul(35, 100);
    let miner = reward - cr - dpos;

    let mut coinbase = Transaction::new(TxType::CoinBase);
    for (value, hash) in [
        (cr, Hash168([1; 21])),
        (miner, Hash168([9; 21])),
        (dpos, Hash168([2; 21])),
    ] {
        coinbase.outputs.push(Output {
            value,
            program_hash: hash,
            ..Default::default()
        });
    }

    let block = build_block(height, 1_900_000_000, vec![coinbase], &fx.params);
    fx.validator()
        .check_block_context(
            &block,
            &ChainContext {
                prev_node: Some(prev),
                prev_block_confirmed: None,
            },
        )
        .unwrap();
}

#[test]
fn cancel_v2_producer_rejected() {
    let mut fx = Fixture::new();
    fx.producers.by_owner.insert(
        vec![2; 33],
        kestrel_api::ProducerDigest {
            owner_key: vec![2; 33],
            node_key: vec![3; 33],
            status: kestrel_api::ProducerStatus::Active,
            stake_until: 100,
        },
    );

    let mut cancel = Transaction::new(TxType::CancelProducer);
    cancel.payload = Payload::ProcessProducer(ProcessProducer {
        owner_key: vec![2; 33],
        signature: vec![1; 64],
    });
    cancel.inputs.push(Input {
        previous: OutPoint {
            tx_hash: Hash256::double_sha256(b"cancel"),
            index: 0,
        },
        sequence: 0,
    });
    cancel.programs.push(Program {
        code: vec![0x21, 0x02],
        parameter: vec![0x40],
    });
    fx.utxo.insert(
        &cancel.inputs[0],
        Output {
            value: Amount::from_coins(1),
            ..Default::default()
        },
    );

    let err = fx
        .validator()
        .check_transaction_context(10, &cancel, Amount::ZERO)
        .unwrap_err();
    assert!(err.to_string().contains("can not cancel DPoS V2 producer"));

    // The same producer without a stake lock cancels fine.
    if let Some(producer) = fx.producers.by_owner.get_mut(&vec![2u8; 33]) {
        producer.stake_until = 0;
    }
    fx.validator()
        .check_transaction_context(10, &cancel, Amount::ZERO)
        .unwrap();
}

#[test]
fn proposal_budgets_cap_accumulates_within_block() {
    let mut fx = Fixture::new();
    let member = Hash168([8; 21]);
    fx.committee.members.insert(member);
    fx.committee.available = Amount::from_coins(100);

    let mut proposal_tx = Transaction::new(TxType::CrcProposal);
    let proposal = kestrel_types::payload::CrcProposal {
        owner_key: vec![2; 33],
        budgets: vec![kestrel_types::payload::Budget {
            budget_type: 0,
            stage: 0,
            amount: Amount::from_coins(60),
        }],
        recipient: Hash168([4; 21]),
        signature: vec![1; 64],
        cr_council_member_did: member,
        cr_council_member_signature: vec![1; 64],
        ..Default::default()
    };
    proposal_tx.payload = Payload::CrcProposal(proposal);
    proposal_tx.inputs.push(Input {
        previous: OutPoint {
            tx_hash: Hash256::double_sha256(b"prop"),
            index: 0,
        },
        sequence: 0,
    });
    proposal_tx.programs.push(Program {
        code: vec![0x21, 0x02],
        parameter: vec![0x40],
    });
    fx.utxo.insert(
        &proposal_tx.inputs[0],
        Output {
            value: Amount::from_coins(1),
            ..Default::default()
        },
    );

    // First proposal fits the 100-coin headroom.
    fx.validator()
        .check_transaction_context(10, &proposal_tx, Amount::ZERO)
        .unwrap();

    // The same budgets no longer fit once 60 coins are already committed
    // by an earlier proposal in the same block.
    let err = fx
        .validator()
        .check_transaction_context(10, &proposal_tx, Amount::from_coins(60))
        .unwrap_err();
    assert!(matches!(err, RuleError::TxBalance(_)));
}
