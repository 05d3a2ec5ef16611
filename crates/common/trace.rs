//! Extraction of access-list observations from prestate-tracer output.
//!
//! Input is the JSON returned by `debug_traceBlockByNumber` with the
//! `prestateTracer`: one entry per transaction, in diff mode (`pre`/`post`
//! per transaction) and optionally in plain mode, which exposes every
//! account and slot a transaction touched.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use ethereum_types::{Address, U256};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    builder::BlockAccessListBuilder,
    constants::{BALANCE_LEN, MAX_TXS, STORAGE_VALUE_LEN},
    error::BalError,
    types::{
        BlockAccessList, Nonce, StorageKey, StorageValue, TxIndex, address_from_slice,
        balance_from_u128,
    },
};

/// A quantity as found in tracer output: hex string, decimal string or
/// plain JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HexOrInt {
    Int(u64),
    Str(String),
}

impl HexOrInt {
    fn to_u256(&self, field: &'static str) -> Result<U256, BalError> {
        let text = match self {
            HexOrInt::Int(value) => return Ok(U256::from(*value)),
            HexOrInt::Str(text) => text.trim(),
        };
        let invalid = || BalError::InvalidHex {
            field,
            value: text.to_string(),
        };
        match strip_hex_prefix(text) {
            Some("") => Ok(U256::zero()),
            Some(digits) => U256::from_str_radix(digits, 16).map_err(|_| invalid()),
            None => U256::from_dec_str(text).map_err(|_| invalid()),
        }
    }

    fn to_width(&self, field: &'static str, width: usize) -> Result<U256, BalError> {
        let value = self.to_u256(field)?;
        let actual = value.bits().div_ceil(8);
        if actual > width {
            return Err(BalError::InvalidFixedWidth {
                field,
                expected: width,
                actual,
            });
        }
        Ok(value)
    }

    /// Parses a balance, which must fit the 16-byte balance width.
    pub fn to_balance(&self) -> Result<u128, BalError> {
        self.to_width("post_balance", BALANCE_LEN)
            .map(|value| value.low_u128())
    }

    pub fn to_nonce(&self) -> Result<Nonce, BalError> {
        self.to_width("nonce", 8).map(|value| value.low_u64())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<HexOrInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<HexOrInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxStateDiff {
    #[serde(default)]
    pub pre: BTreeMap<String, AccountState>,
    #[serde(default)]
    pub post: BTreeMap<String, AccountState>,
}

/// One transaction of a diff-mode trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxTrace {
    #[serde(default, rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub result: Option<TxStateDiff>,
}

/// One transaction of a plain (non-diff) trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrestateTrace {
    #[serde(default, rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub result: Option<BTreeMap<String, AccountState>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub status: Option<HexOrInt>,
}

impl Receipt {
    pub fn is_reverted(&self) -> Result<bool, BalError> {
        match &self.status {
            Some(status) => Ok(status.to_u256("status")?.is_zero()),
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockTransaction {
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockInfo {
    #[serde(default)]
    pub miner: Option<String>,
    #[serde(default)]
    pub transactions: Vec<BlockTransaction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Skip storage reads and touched-only accounts.
    pub ignore_reads: bool,
}

/// Everything known about one block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockInput {
    pub diff_traces: Vec<TxTrace>,
    #[serde(default)]
    pub read_traces: Option<Vec<PrestateTrace>>,
    #[serde(default)]
    pub receipts: Option<Vec<Option<Receipt>>>,
    #[serde(default)]
    pub block_info: Option<BlockInfo>,
}

fn strip_hex_prefix(text: &str) -> Option<&str> {
    text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
}

fn decode_hex(field: &'static str, text: &str) -> Result<Vec<u8>, BalError> {
    let digits = strip_hex_prefix(text).unwrap_or(text);
    let result = if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}"))
    } else {
        hex::decode(digits)
    };
    result.map_err(|_| BalError::InvalidHex {
        field,
        value: text.to_string(),
    })
}

pub fn parse_address(text: &str) -> Result<Address, BalError> {
    address_from_slice(&decode_hex("address", text)?)
}

/// Parses a storage key or value, left-padding short values to 32 bytes.
pub fn parse_word(field: &'static str, text: &str) -> Result<StorageValue, BalError> {
    let bytes = decode_hex(field, text)?;
    if bytes.len() > STORAGE_VALUE_LEN {
        return Err(BalError::InvalidFixedWidth {
            field,
            expected: STORAGE_VALUE_LEN,
            actual: bytes.len(),
        });
    }
    let mut word = [0u8; STORAGE_VALUE_LEN];
    word[STORAGE_VALUE_LEN - bytes.len()..].copy_from_slice(&bytes);
    Ok(StorageValue::from(word))
}

fn tx_index(position: usize) -> Result<TxIndex, BalError> {
    let out_of_range = || BalError::TxIndexOutOfRange {
        index: position,
        max: MAX_TXS,
    };
    if position >= MAX_TXS {
        return Err(out_of_range());
    }
    TxIndex::try_from(position).map_err(|_| out_of_range())
}

#[derive(Debug, Default)]
struct ParsedAccount {
    balance: Option<u128>,
    nonce: Option<Nonce>,
    /// Only non-empty code is kept.
    code: Option<Bytes>,
    storage: BTreeMap<StorageKey, StorageValue>,
}

impl ParsedAccount {
    fn parse(state: &AccountState) -> Result<Self, BalError> {
        let code = match state.code.as_deref() {
            Some(code) => Some(Bytes::from(decode_hex("code", code)?)).filter(|c| !c.is_empty()),
            None => None,
        };
        let mut storage = BTreeMap::new();
        for (slot, value) in state.storage.iter().flatten() {
            storage.insert(parse_word("slot", slot)?, parse_word("new_value", value)?);
        }
        Ok(Self {
            balance: state.balance.as_ref().map(HexOrInt::to_balance).transpose()?,
            nonce: state.nonce.as_ref().map(HexOrInt::to_nonce).transpose()?,
            code,
            storage,
        })
    }
}

type ParsedState = BTreeMap<Address, ParsedAccount>;

fn parse_state(state: &BTreeMap<String, AccountState>) -> Result<ParsedState, BalError> {
    state
        .iter()
        .map(|(address, account)| Ok((parse_address(address)?, ParsedAccount::parse(account)?)))
        .collect()
}

#[derive(Debug)]
struct ParsedDiff {
    tx_index: TxIndex,
    pre: ParsedState,
    post: ParsedState,
}

impl ParsedDiff {
    fn addresses(&self) -> BTreeSet<Address> {
        self.pre.keys().chain(self.post.keys()).copied().collect()
    }
}

struct Block {
    diffs: Vec<ParsedDiff>,
    reads: Vec<(TxIndex, ParsedState)>,
    reverted: FxHashSet<TxIndex>,
    /// Sender and fee recipient of each reverted transaction.
    gas_parties: FxHashMap<TxIndex, Vec<Address>>,
}

impl Block {
    fn parse(input: &BlockInput) -> Result<Self, BalError> {
        let mut diffs = Vec::with_capacity(input.diff_traces.len());
        for (position, tx) in input.diff_traces.iter().enumerate() {
            let Some(result) = &tx.result else {
                debug!(tx = position, "Skipping transaction without trace result");
                continue;
            };
            diffs.push(ParsedDiff {
                tx_index: tx_index(position)?,
                pre: parse_state(&result.pre)?,
                post: parse_state(&result.post)?,
            });
        }

        let mut reads = Vec::new();
        for (position, tx) in input.read_traces.iter().flatten().enumerate() {
            if let Some(result) = &tx.result {
                reads.push((tx_index(position)?, parse_state(result)?));
            }
        }

        let mut reverted = FxHashSet::default();
        for (position, receipt) in input.receipts.iter().flatten().enumerate() {
            let Some(receipt) = receipt else {
                continue;
            };
            if receipt.is_reverted()? {
                reverted.insert(tx_index(position)?);
            }
        }

        let mut gas_parties = FxHashMap::default();
        if let Some(info) = &input.block_info {
            let miner = info.miner.as_deref().map(parse_address).transpose()?;
            for index in &reverted {
                let sender = info
                    .transactions
                    .get(usize::from(*index))
                    .and_then(|tx| tx.from.as_deref())
                    .map(parse_address)
                    .transpose()?;
                gas_parties.insert(*index, sender.into_iter().chain(miner).collect());
            }
        }

        Ok(Self {
            diffs,
            reads,
            reverted,
            gas_parties,
        })
    }

    fn is_reverted(&self, tx_index: TxIndex) -> bool {
        self.reverted.contains(&tx_index)
    }
}

/// Feeds every observation found in `input` into `builder`.
pub fn extract_into(
    builder: &mut BlockAccessListBuilder,
    input: &BlockInput,
    options: &ExtractOptions,
) -> Result<(), BalError> {
    let block = Block::parse(input)?;
    debug!(
        txs = input.diff_traces.len(),
        reverted = block.reverted.len(),
        read_traces = block.reads.len(),
        ignore_reads = options.ignore_reads,
        "Extracting block access list"
    );

    extract_storage(builder, &block, options);
    extract_balances(builder, &block, options)?;
    extract_code(builder, &block)?;
    extract_nonces(builder, &block);

    if !options.ignore_reads {
        for diff in &block.diffs {
            for address in diff.addresses() {
                builder.add_touched_account(address);
            }
        }
    }
    Ok(())
}

/// Builds the access list of a single block.
pub fn build_block(input: &BlockInput, options: &ExtractOptions) -> Result<BlockAccessList, BalError> {
    let mut builder = BlockAccessListBuilder::new();
    extract_into(&mut builder, input, options)?;
    Ok(builder.build(options.ignore_reads))
}

/// Builds independent blocks in parallel, one builder per block.
pub fn build_blocks_parallel(
    inputs: &[BlockInput],
    options: &ExtractOptions,
) -> Vec<Result<BlockAccessList, BalError>> {
    inputs
        .par_iter()
        .map(|input| build_block(input, options))
        .collect()
}

fn extract_storage(builder: &mut BlockAccessListBuilder, block: &Block, options: &ExtractOptions) {
    let mut writes: BTreeMap<Address, BTreeMap<StorageKey, Vec<(TxIndex, StorageValue)>>> =
        BTreeMap::new();
    let mut reads: BTreeMap<Address, BTreeSet<StorageKey>> = BTreeMap::new();

    for diff in &block.diffs {
        if block.is_reverted(diff.tx_index) {
            trace!(tx = diff.tx_index, "Skipping storage of reverted transaction");
            continue;
        }
        for address in diff.addresses() {
            let pre = diff.pre.get(&address).map(|account| &account.storage);
            let post = diff.post.get(&address).map(|account| &account.storage);
            let slots: BTreeSet<StorageKey> = pre
                .into_iter()
                .chain(post)
                .flat_map(|storage| storage.keys().copied())
                .collect();

            for slot in slots {
                let pre_value = pre.and_then(|storage| storage.get(&slot));
                let post_value = post.and_then(|storage| storage.get(&slot));
                match (pre_value, post_value) {
                    (pre_value, Some(post_value)) => {
                        if pre_value.copied().unwrap_or_default() != *post_value {
                            writes
                                .entry(address)
                                .or_default()
                                .entry(slot)
                                .or_default()
                                .push((diff.tx_index, *post_value));
                        } else if !options.ignore_reads
                            && !writes.get(&address).is_some_and(|w| w.contains_key(&slot))
                        {
                            // Writing back the same value still counts as an access.
                            reads.entry(address).or_default().insert(slot);
                        }
                    }
                    // Slot left out of the post state was cleared.
                    (Some(_), None) => writes
                        .entry(address)
                        .or_default()
                        .entry(slot)
                        .or_default()
                        .push((diff.tx_index, StorageValue::zero())),
                    (None, None) => {}
                }
            }
        }
    }

    if !options.ignore_reads {
        for (_, state) in &block.reads {
            for (address, account) in state {
                let written = writes.get(address);
                for slot in account.storage.keys() {
                    if !written.is_some_and(|w| w.contains_key(slot)) {
                        reads.entry(*address).or_default().insert(*slot);
                    }
                }
            }
        }
    }

    for (address, slots) in writes {
        for (slot, changes) in slots {
            for (tx_index, value) in changes {
                builder.add_storage_write(address, slot, tx_index, value);
            }
        }
    }
    for (address, slots) in reads {
        for slot in slots {
            builder.add_storage_read(address, slot);
        }
    }
}

fn extract_balances(
    builder: &mut BlockAccessListBuilder,
    block: &Block,
    options: &ExtractOptions,
) -> Result<(), BalError> {
    let mut changed: FxHashMap<TxIndex, BTreeSet<Address>> = FxHashMap::default();

    for diff in &block.diffs {
        let gas_parties = block
            .is_reverted(diff.tx_index)
            .then(|| block.gas_parties.get(&diff.tx_index).cloned().unwrap_or_default());

        for address in diff.addresses() {
            let pre = diff.pre.get(&address).and_then(|account| account.balance);
            let post = diff.post.get(&address).and_then(|account| account.balance);
            let pre_balance = pre.unwrap_or_default();
            let post_balance = post.unwrap_or(pre_balance);
            if post_balance == pre_balance {
                continue;
            }
            // Reverted transactions only move gas between sender and fee recipient.
            if gas_parties
                .as_ref()
                .is_some_and(|parties| !parties.contains(&address))
            {
                trace!(tx = diff.tx_index, ?address, "Skipping balance of reverted transaction");
                continue;
            }
            builder.add_balance_change(
                address,
                diff.tx_index,
                balance_from_u128(post_balance).as_bytes(),
            )?;
            changed.entry(diff.tx_index).or_default().insert(address);
        }
    }

    if !options.ignore_reads {
        for (tx_index, state) in &block.reads {
            for (address, account) in state {
                let recorded = changed
                    .get(tx_index)
                    .is_some_and(|addresses| addresses.contains(address));
                if account.balance.is_some() && !recorded {
                    builder.add_touched_account(*address);
                }
            }
        }
    }
    Ok(())
}

fn extract_code(builder: &mut BlockAccessListBuilder, block: &Block) -> Result<(), BalError> {
    for diff in &block.diffs {
        if block.is_reverted(diff.tx_index) {
            continue;
        }
        for address in diff.addresses() {
            let pre = diff.pre.get(&address).and_then(|account| account.code.as_ref());
            let Some(post) = diff.post.get(&address).and_then(|account| account.code.as_ref())
            else {
                continue;
            };
            if pre != Some(post) {
                builder.add_code_change(address, diff.tx_index, post.clone())?;
            }
        }
    }
    Ok(())
}

fn extract_nonces(builder: &mut BlockAccessListBuilder, block: &Block) {
    for diff in &block.diffs {
        for (address, pre) in &diff.pre {
            let Some(pre_nonce) = pre.nonce else {
                continue;
            };
            let post_nonce = diff
                .post
                .get(address)
                .and_then(|account| account.nonce)
                .unwrap_or(pre_nonce);
            if post_nonce > pre_nonce {
                builder.add_nonce_change(*address, diff.tx_index, post_nonce);
            }
        }

        // Accounts created by the transaction.
        if block.is_reverted(diff.tx_index) {
            continue;
        }
        for (address, post) in &diff.post {
            if diff.pre.contains_key(address) {
                continue;
            }
            if let Some(nonce) = post.nonce.filter(|nonce| *nonce > 0) {
                builder.add_nonce_change(*address, diff.tx_index, nonce);
            }
        }
    }
}
