use std::collections::BTreeMap;

use bytes::Bytes;
use ethereum_types::Address;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::{
    error::BalError,
    types::{
        AccountChanges, Balance, BalanceChange, BlockAccessList, CodeChange, Nonce, NonceChange,
        SlotChanges, StorageChange, StorageKey, StorageValue, TxIndex, balance_from_slice,
        check_code_size,
    },
};

#[derive(Debug, Default, Clone)]
struct AccountRecord {
    storage_writes: FxHashMap<StorageKey, Vec<(TxIndex, StorageValue)>>,
    storage_reads: FxHashSet<StorageKey>,
    balance_changes: Vec<(TxIndex, Balance)>,
    nonce_changes: Vec<(TxIndex, Nonce)>,
    code_changes: Vec<(TxIndex, Bytes)>,
}

/// Collapses a change log to one entry per transaction index, keeping the
/// last entry recorded for each index, in ascending index order.
fn last_per_index<T: Clone>(changes: &[(TxIndex, T)]) -> BTreeMap<TxIndex, T> {
    changes.iter().cloned().collect()
}

impl AccountRecord {
    fn emit(&self, address: Address, ignore_reads: bool) -> AccountChanges {
        let mut storage_writes: Vec<SlotChanges> = self
            .storage_writes
            .iter()
            .map(|(slot, changes)| {
                let mut slot_changes = SlotChanges::new(*slot);
                for (tx_index, value) in last_per_index(changes) {
                    slot_changes.add_change(StorageChange::new(tx_index, value));
                }
                slot_changes
            })
            .collect();
        storage_writes.sort_unstable_by_key(|slot| slot.slot);

        let mut storage_reads: Vec<StorageKey> = if ignore_reads {
            Vec::new()
        } else {
            self.storage_reads
                .iter()
                .filter(|slot| !self.storage_writes.contains_key(*slot))
                .copied()
                .collect()
        };
        storage_reads.sort_unstable();

        AccountChanges::new(address)
            .with_storage_writes(storage_writes)
            .with_storage_reads(storage_reads)
            .with_balance_changes(
                last_per_index(&self.balance_changes)
                    .into_iter()
                    .map(|(tx_index, balance)| BalanceChange::new(tx_index, balance))
                    .collect(),
            )
            .with_nonce_changes(
                last_per_index(&self.nonce_changes)
                    .into_iter()
                    .map(|(tx_index, nonce)| NonceChange::new(tx_index, nonce))
                    .collect(),
            )
            .with_code_changes(
                last_per_index(&self.code_changes)
                    .into_iter()
                    .map(|(tx_index, code)| CodeChange::new(tx_index, code))
                    .collect(),
            )
    }
}

/// Accumulates the observations of one block and turns them into a
/// canonical [`BlockAccessList`].
///
/// Observations can arrive in any order: [`BlockAccessListBuilder::build`]
/// sorts everything, keeps the last value recorded per transaction index,
/// drops reads of slots that were also written and leaves out accounts that
/// ended up with nothing to report.
#[derive(Debug, Default, Clone)]
pub struct BlockAccessListBuilder {
    accounts: FxHashMap<Address, AccountRecord>,
}

impl BlockAccessListBuilder {
    /// Creates a builder with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    fn account(&mut self, address: Address) -> &mut AccountRecord {
        self.accounts.entry(address).or_default()
    }

    /// Records the value a transaction left in a slot. Writes are appended,
    /// so a later write for the same transaction wins in [`Self::build`].
    pub fn add_storage_write(
        &mut self,
        address: Address,
        slot: StorageKey,
        tx_index: TxIndex,
        new_value: StorageValue,
    ) {
        self.account(address)
            .storage_writes
            .entry(slot)
            .or_default()
            .push((tx_index, new_value));
    }

    /// Records a slot read. Repeated reads are recorded once.
    pub fn add_storage_read(&mut self, address: Address, slot: StorageKey) {
        self.account(address).storage_reads.insert(slot);
    }

    /// Records a post-transaction balance. `post_balance` must be exactly 16
    /// big-endian bytes.
    pub fn add_balance_change(
        &mut self,
        address: Address,
        tx_index: TxIndex,
        post_balance: &[u8],
    ) -> Result<(), BalError> {
        let balance = balance_from_slice(post_balance)?;
        self.account(address)
            .balance_changes
            .push((tx_index, balance));
        Ok(())
    }

    /// Records the nonce of an account after a transaction.
    pub fn add_nonce_change(&mut self, address: Address, tx_index: TxIndex, new_nonce: Nonce) {
        self.account(address)
            .nonce_changes
            .push((tx_index, new_nonce));
    }

    /// Records code deployed by a transaction. Fails with
    /// [`BalError::CodeTooLarge`] above the code size limit, before anything
    /// is recorded.
    pub fn add_code_change(
        &mut self,
        address: Address,
        tx_index: TxIndex,
        new_code: Bytes,
    ) -> Result<(), BalError> {
        check_code_size(address, tx_index, &new_code)?;
        self.account(address).code_changes.push((tx_index, new_code));
        Ok(())
    }

    /// Registers an account that was accessed without any recorded change.
    pub fn add_touched_account(&mut self, address: Address) {
        self.account(address);
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Number of distinct addresses observed so far, touched ones included.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether `address` has been observed, touched or changed.
    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Emits the canonical access list for everything recorded so far. With
    /// `ignore_reads` set, no storage reads are emitted.
    pub fn build(&self, ignore_reads: bool) -> BlockAccessList {
        let mut records: Vec<_> = self.accounts.iter().collect();
        records.sort_unstable_by_key(|(address, _)| **address);

        let mut bal = BlockAccessList::new();
        for (address, record) in records {
            let account = record.emit(*address, ignore_reads);
            if account.is_empty() {
                trace!(?address, "Skipping account without changes");
                continue;
            }
            bal.add_account(account);
        }

        debug!(
            observed = self.accounts.len(),
            emitted = bal.len(),
            ignore_reads,
            "Built block access list"
        );
        bal
    }
}
