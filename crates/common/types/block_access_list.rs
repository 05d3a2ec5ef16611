use bytes::Bytes;
use ethereum_types::Address;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::{Balance, Nonce, StorageKey, StorageValue, TxIndex, check_code_size};
use crate::error::BalError;

#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub tx_index: TxIndex,
    pub new_value: StorageValue,
}

impl StorageChange {
    /// Creates a storage change holding the slot value after `tx_index`.
    pub fn new(tx_index: TxIndex, new_value: StorageValue) -> Self {
        Self {
            tx_index,
            new_value,
        }
    }
}

/// Every write to one storage slot, in transaction order.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SlotChanges {
    pub slot: StorageKey,
    pub changes: Vec<StorageChange>,
}

impl SlotChanges {
    /// Creates an entry for `slot` with no writes yet.
    pub fn new(slot: StorageKey) -> Self {
        Self {
            slot,
            changes: Vec::new(),
        }
    }

    /// Creates an entry for `slot` from writes already in transaction order.
    pub fn with_changes(slot: StorageKey, changes: Vec<StorageChange>) -> Self {
        Self { slot, changes }
    }

    /// Appends a write. Callers keep the list in transaction order.
    pub fn add_change(&mut self, change: StorageChange) {
        self.changes.push(change);
    }
}

#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub tx_index: TxIndex,
    pub post_balance: Balance,
}

impl BalanceChange {
    /// Creates a balance change holding the balance after `tx_index`.
    pub fn new(tx_index: TxIndex, post_balance: Balance) -> Self {
        Self {
            tx_index,
            post_balance,
        }
    }
}

#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NonceChange {
    pub tx_index: TxIndex,
    pub new_nonce: Nonce,
}

impl NonceChange {
    /// Creates a nonce change holding the nonce after `tx_index`.
    pub fn new(tx_index: TxIndex, new_nonce: Nonce) -> Self {
        Self {
            tx_index,
            new_nonce,
        }
    }
}

#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CodeChange {
    pub tx_index: TxIndex,
    pub new_code: Bytes,
}

impl CodeChange {
    /// Creates a code change holding the code deployed by `tx_index`.
    pub fn new(tx_index: TxIndex, new_code: Bytes) -> Self {
        Self { tx_index, new_code }
    }
}

/// Everything a block did to, or read from, a single account.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccountChanges {
    pub address: Address,
    pub storage_writes: Vec<SlotChanges>,
    pub storage_reads: Vec<StorageKey>,
    pub balance_changes: Vec<BalanceChange>,
    pub nonce_changes: Vec<NonceChange>,
    pub code_changes: Vec<CodeChange>,
}

impl AccountChanges {
    /// Creates an entry for `address` with every list empty.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Replaces the written slots.
    pub fn with_storage_writes(mut self, writes: Vec<SlotChanges>) -> Self {
        self.storage_writes = writes;
        self
    }

    /// Replaces the slots that were only read.
    pub fn with_storage_reads(mut self, reads: Vec<StorageKey>) -> Self {
        self.storage_reads = reads;
        self
    }

    /// Replaces the balance changes.
    pub fn with_balance_changes(mut self, changes: Vec<BalanceChange>) -> Self {
        self.balance_changes = changes;
        self
    }

    /// Replaces the nonce changes.
    pub fn with_nonce_changes(mut self, changes: Vec<NonceChange>) -> Self {
        self.nonce_changes = changes;
        self
    }

    /// Replaces the code changes.
    pub fn with_code_changes(mut self, changes: Vec<CodeChange>) -> Self {
        self.code_changes = changes;
        self
    }

    /// Returns whether this account has no changes and no reads.
    pub fn is_empty(&self) -> bool {
        self.storage_writes.is_empty()
            && self.storage_reads.is_empty()
            && self.balance_changes.is_empty()
            && self.nonce_changes.is_empty()
            && self.code_changes.is_empty()
    }

    /// Returns a copy with every inner list sorted.
    fn sorted(&self) -> Self {
        let mut account = self.clone();
        for slot in &mut account.storage_writes {
            slot.changes.sort_by_key(|change| change.tx_index);
        }
        account.storage_writes.sort_by_key(|slot| slot.slot);
        account.storage_reads.sort();
        account.balance_changes.sort_by_key(|change| change.tx_index);
        account.nonce_changes.sort_by_key(|change| change.tx_index);
        account.code_changes.sort_by_key(|change| change.tx_index);
        account
    }

    fn is_sorted_strictly(&self) -> bool {
        strictly_increasing(self.storage_writes.iter().map(|slot| slot.slot))
            && self
                .storage_writes
                .iter()
                .all(|slot| strictly_increasing(slot.changes.iter().map(|c| c.tx_index)))
            && strictly_increasing(self.storage_reads.iter().copied())
            && strictly_increasing(self.balance_changes.iter().map(|c| c.tx_index))
            && strictly_increasing(self.nonce_changes.iter().map(|c| c.tx_index))
            && strictly_increasing(self.code_changes.iter().map(|c| c.tx_index))
    }
}

fn strictly_increasing<K: Ord>(mut keys: impl Iterator<Item = K>) -> bool {
    let Some(mut previous) = keys.next() else {
        return true;
    };
    for key in keys {
        if key <= previous {
            return false;
        }
        previous = key;
    }
    true
}

/// Per-block record of every account accessed during execution.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BlockAccessList {
    pub(crate) account_changes: Vec<AccountChanges>,
}

impl BlockAccessList {
    /// Creates an empty access list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps accounts as given, without sorting or checking them.
    pub fn from_accounts(accounts: Vec<AccountChanges>) -> Self {
        Self {
            account_changes: accounts,
        }
    }

    /// Accounts in stored order.
    pub fn accounts(&self) -> &[AccountChanges] {
        &self.account_changes
    }

    /// Appends an account entry.
    pub fn add_account(&mut self, account: AccountChanges) {
        self.account_changes.push(account);
    }

    pub fn len(&self) -> usize {
        self.account_changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.account_changes.is_empty()
    }

    /// Looks up the entry for `address`.
    pub fn get(&self, address: &Address) -> Option<&AccountChanges> {
        self.account_changes
            .iter()
            .find(|account| account.address == *address)
    }

    /// Returns a copy with accounts sorted by address and every inner list
    /// sorted by its key. Sorts are stable and nothing is deduplicated, so
    /// applying this twice yields the same value as applying it once.
    pub fn canonicalize(&self) -> Self {
        let mut account_changes: Vec<AccountChanges> =
            self.account_changes.iter().map(AccountChanges::sorted).collect();
        account_changes.sort_by_key(|account| account.address);
        Self { account_changes }
    }

    /// Whether every list is strictly increasing in its sort key, i.e. the
    /// list is sorted and carries no duplicate keys.
    pub fn is_canonical(&self) -> bool {
        strictly_increasing(self.account_changes.iter().map(|a| a.address))
            && self.account_changes.iter().all(AccountChanges::is_sorted_strictly)
    }

    /// Structural checks applied to decoded lists: code size limits and
    /// unique account addresses.
    pub fn validate(&self) -> Result<(), BalError> {
        let mut seen = FxHashSet::default();
        for account in &self.account_changes {
            if !seen.insert(account.address) {
                return Err(BalError::DuplicateKey {
                    address: account.address,
                });
            }
            for change in &account.code_changes {
                check_code_size(account.address, change.tx_index, &change.new_code)?;
            }
        }
        Ok(())
    }
}
