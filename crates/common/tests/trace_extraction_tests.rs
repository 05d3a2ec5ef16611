//! Extraction from prestate-tracer output into access lists.

use ethbal_common::{
    Address, BalError, BlockAccessListBuilder, H256,
    trace::{
        BlockInfo, BlockInput, ExtractOptions, PrestateTrace, Receipt, TxTrace, build_block,
        build_blocks_parallel, extract_into,
    },
    types::balance_from_u128,
};
use serde_json::json;

const SENDER: &str = "0x00000000000000000000000000000000000000a1";
const TOKEN: &str = "0x00000000000000000000000000000000000000b2";
const MINER: &str = "0x00000000000000000000000000000000000000c3";
const RECEIVER: &str = "0x00000000000000000000000000000000000000d4";

fn addr(text: &str) -> Address {
    ethbal_common::trace::parse_address(text).unwrap()
}

fn word(value: u64) -> H256 {
    H256::from_low_u64_be(value)
}

fn with_reads() -> ExtractOptions {
    ExtractOptions { ignore_reads: false }
}

fn without_reads() -> ExtractOptions {
    ExtractOptions { ignore_reads: true }
}

/// Two transactions: a token transfer and a contract deployment.
fn diff_traces() -> Vec<TxTrace> {
    serde_json::from_value(json!([
        {
            "txHash": "0x01",
            "result": {
                "pre": {
                    SENDER: { "balance": "0xde0b6b3a7640000", "nonce": 5 },
                    TOKEN: {
                        "balance": "0x0",
                        "nonce": 1,
                        "code": "0x6080",
                        "storage": {
                            "0x01": "0x64",
                            "0x02": "0x05",
                            "0x03": "0x07"
                        }
                    },
                    MINER: { "balance": "0x10" }
                },
                "post": {
                    SENDER: { "balance": "0xde0b6b3a763ff00", "nonce": 6 },
                    TOKEN: {
                        "storage": {
                            "0x01": "0x32",
                            "0x02": "0x05",
                            "0x04": "0x01"
                        }
                    },
                    MINER: { "balance": "0x20" }
                }
            }
        },
        {
            "txHash": "0x02",
            "result": {
                "pre": {
                    SENDER: { "balance": "0xde0b6b3a763ff00", "nonce": 6 }
                },
                "post": {
                    SENDER: { "balance": "0xde0b6b3a763fe00", "nonce": 7 },
                    RECEIVER: { "balance": "0x1", "nonce": 1, "code": "0x60006000" }
                }
            }
        }
    ]))
    .unwrap()
}

fn extract(input: &BlockInput, options: ExtractOptions) -> ethbal_common::types::BlockAccessList {
    build_block(input, &options).unwrap()
}

#[test]
fn storage_writes_reads_and_clears() {
    let input = BlockInput {
        diff_traces: diff_traces(),
        ..Default::default()
    };
    let bal = extract(&input, with_reads());
    let token = bal.get(&addr(TOKEN)).unwrap();

    let writes: Vec<(H256, u16, H256)> = token
        .storage_writes
        .iter()
        .flat_map(|slot| slot.changes.iter().map(|c| (slot.slot, c.tx_index, c.new_value)))
        .collect();
    assert_eq!(
        writes,
        vec![
            (word(1), 0, word(0x32)),
            // cleared slot
            (word(3), 0, H256::zero()),
            // new slot, pre value treated as zero
            (word(4), 0, word(1)),
        ]
    );
    // Same value written back counts as a read.
    assert_eq!(token.storage_reads, vec![word(2)]);

    let bal = extract(&input, without_reads());
    assert!(bal.get(&addr(TOKEN)).unwrap().storage_reads.is_empty());
}

#[test]
fn balances_nonces_and_code() {
    let input = BlockInput {
        diff_traces: diff_traces(),
        ..Default::default()
    };
    let bal = extract(&input, without_reads());

    let sender = bal.get(&addr(SENDER)).unwrap();
    let balances: Vec<(u16, u128)> = sender
        .balance_changes
        .iter()
        .map(|c| (c.tx_index, u128::from_be_bytes(c.post_balance.0)))
        .collect();
    assert_eq!(
        balances,
        vec![(0, 0xde0b6b3a763ff00), (1, 0xde0b6b3a763fe00)]
    );
    let nonces: Vec<(u16, u64)> = sender
        .nonce_changes
        .iter()
        .map(|c| (c.tx_index, c.new_nonce))
        .collect();
    assert_eq!(nonces, vec![(0, 6), (1, 7)]);

    let receiver = bal.get(&addr(RECEIVER)).unwrap();
    assert_eq!(receiver.nonce_changes.len(), 1);
    assert_eq!(receiver.code_changes.len(), 1);
    assert_eq!(&receiver.code_changes[0].new_code[..], &[0x60, 0x00, 0x60, 0x00]);
    assert_eq!(
        receiver.balance_changes[0].post_balance,
        balance_from_u128(1)
    );

    // Token code is unchanged (absent from post).
    assert!(bal.get(&addr(TOKEN)).unwrap().code_changes.is_empty());
    assert_eq!(
        bal.get(&addr(MINER)).unwrap().balance_changes[0].post_balance,
        balance_from_u128(0x20)
    );
}

#[test]
fn reverted_transaction_keeps_only_gas_payments() {
    let receipts: Vec<Option<Receipt>> = serde_json::from_value(json!([
        { "status": "0x0" },
        { "status": "0x1" }
    ]))
    .unwrap();
    let block_info: BlockInfo = serde_json::from_value(json!({
        "miner": MINER,
        "transactions": [{ "from": SENDER }, { "from": SENDER }]
    }))
    .unwrap();
    let input = BlockInput {
        diff_traces: diff_traces(),
        receipts: Some(receipts),
        block_info: Some(block_info),
        ..Default::default()
    };
    let bal = extract(&input, without_reads());

    // Storage of the reverted transaction is gone, and TOKEN had nothing else.
    assert!(bal.get(&addr(TOKEN)).is_none());
    let sender = bal.get(&addr(SENDER)).unwrap();
    assert_eq!(sender.balance_changes[0].tx_index, 0);
    assert_eq!(sender.nonce_changes[0].tx_index, 0);
    assert_eq!(bal.get(&addr(MINER)).unwrap().balance_changes.len(), 1);
}

#[test]
fn reverted_transaction_without_block_info_drops_balances() {
    let input = BlockInput {
        diff_traces: diff_traces(),
        receipts: Some(vec![Some(Receipt {
            status: Some(ethbal_common::trace::HexOrInt::Str("0x0".into())),
        })]),
        ..Default::default()
    };
    let bal = extract(&input, without_reads());
    assert!(bal.get(&addr(MINER)).is_none());
    // Sender nonce bump survives the revert.
    assert_eq!(bal.get(&addr(SENDER)).unwrap().nonce_changes[0].tx_index, 0);
}

#[test]
fn plain_traces_add_reads_but_not_over_writes() {
    let read_traces: Vec<PrestateTrace> = serde_json::from_value(json!([
        {
            "result": {
                TOKEN: { "balance": "0x0", "storage": { "0x01": "0x64", "0x09": "0x00" } },
                RECEIVER: { "balance": "0x0" }
            }
        },
        { "result": {} }
    ]))
    .unwrap();
    let input = BlockInput {
        diff_traces: diff_traces(),
        read_traces: Some(read_traces),
        ..Default::default()
    };

    let bal = extract(&input, with_reads());
    let token = bal.get(&addr(TOKEN)).unwrap();
    assert_eq!(token.storage_reads, vec![word(2), word(9)]);
    assert!(token.storage_writes.iter().any(|slot| slot.slot == word(1)));

    let bal = extract(&input, without_reads());
    assert!(bal.get(&addr(TOKEN)).unwrap().storage_reads.is_empty());
}

#[test]
fn touched_accounts_reach_the_builder() {
    let read_traces: Vec<PrestateTrace> = serde_json::from_value(json!([
        { "result": { "0x00000000000000000000000000000000000000e5": { "balance": "0x1" } } }
    ]))
    .unwrap();
    let input = BlockInput {
        diff_traces: diff_traces(),
        read_traces: Some(read_traces),
        ..Default::default()
    };
    let touched = addr("0x00000000000000000000000000000000000000e5");

    let mut builder = BlockAccessListBuilder::new();
    extract_into(&mut builder, &input, &with_reads()).unwrap();
    assert!(builder.contains(&touched));
    // Nothing to report for it in the built list.
    assert!(builder.build(false).get(&touched).is_none());

    let mut builder = BlockAccessListBuilder::new();
    extract_into(&mut builder, &input, &without_reads()).unwrap();
    assert!(!builder.contains(&touched));
}

#[test]
fn missing_results_are_skipped() {
    let traces: Vec<TxTrace> = serde_json::from_value(json!([
        { "txHash": "0x01" },
        {
            "result": {
                "pre": { SENDER: { "nonce": "0x1" } },
                "post": { SENDER: { "nonce": "0x2" } }
            }
        }
    ]))
    .unwrap();
    let input = BlockInput {
        diff_traces: traces,
        ..Default::default()
    };
    let bal = extract(&input, with_reads());
    // The skipped transaction still occupies index 0.
    assert_eq!(bal.get(&addr(SENDER)).unwrap().nonce_changes[0].tx_index, 1);
}

#[test]
fn oversized_balance_is_rejected() {
    let traces: Vec<TxTrace> = serde_json::from_value(json!([{
        "result": {
            "pre": { SENDER: { "balance": "0x0" } },
            "post": { SENDER: { "balance": format!("0x1{}", "0".repeat(32)) } }
        }
    }]))
    .unwrap();
    let input = BlockInput {
        diff_traces: traces,
        ..Default::default()
    };
    assert!(matches!(
        build_block(&input, &with_reads()),
        Err(BalError::InvalidFixedWidth {
            field: "post_balance",
            ..
        })
    ));
}

#[test]
fn oversized_code_is_rejected() {
    let code = format!("0x{}", "5b".repeat(24_577));
    let traces: Vec<TxTrace> = serde_json::from_value(json!([{
        "result": { "pre": {}, "post": { RECEIVER: { "code": code } } }
    }]))
    .unwrap();
    let input = BlockInput {
        diff_traces: traces,
        ..Default::default()
    };
    assert!(matches!(
        build_block(&input, &with_reads()),
        Err(BalError::CodeTooLarge { tx_index: 0, actual: 24_577, .. })
    ));
}

#[test]
fn invalid_hex_is_reported() {
    let traces: Vec<TxTrace> = serde_json::from_value(json!([{
        "result": { "pre": {}, "post": { "0xnothex": { "nonce": 1 } } }
    }]))
    .unwrap();
    let input = BlockInput {
        diff_traces: traces,
        ..Default::default()
    };
    assert!(matches!(
        build_block(&input, &with_reads()),
        Err(BalError::InvalidHex { field: "address", .. })
    ));
}

#[test]
fn parallel_blocks_match_sequential() {
    let inputs = vec![
        BlockInput {
            diff_traces: diff_traces(),
            ..Default::default()
        },
        BlockInput::default(),
        BlockInput {
            diff_traces: diff_traces()[1..].to_vec(),
            ..Default::default()
        },
    ];
    let results = build_blocks_parallel(&inputs, &with_reads());
    assert_eq!(results.len(), 3);
    for (input, result) in inputs.iter().zip(results) {
        assert_eq!(result.unwrap(), extract(input, with_reads()));
    }
}
