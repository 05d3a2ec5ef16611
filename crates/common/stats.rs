//! Size and shape reporting for block access lists.
//!
//! Sizes are snappy-compressed byte counts, which is how access lists are
//! expected to travel over the wire.

use serde::{Deserialize, Serialize};

use crate::{codec::Profile, error::BalError, types::BlockAccessList};

/// Counts of accounts and entries per component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub total_accounts: usize,
    pub accounts_with_storage_writes: usize,
    pub accounts_with_storage_reads: usize,
    pub accounts_with_balance_changes: usize,
    pub accounts_with_nonce_changes: usize,
    pub accounts_with_code_changes: usize,
    /// Individual storage changes, summed over every written slot.
    pub total_storage_writes: usize,
    pub total_storage_reads: usize,
    pub total_balance_changes: usize,
    pub total_nonce_changes: usize,
    pub total_code_changes: usize,
}

impl AccountStats {
    pub fn from_bal(bal: &BlockAccessList) -> Self {
        let mut stats = Self {
            total_accounts: bal.len(),
            ..Default::default()
        };
        for account in bal.accounts() {
            if !account.storage_writes.is_empty() {
                stats.accounts_with_storage_writes += 1;
                stats.total_storage_writes += account
                    .storage_writes
                    .iter()
                    .map(|slot| slot.changes.len())
                    .sum::<usize>();
            }
            if !account.storage_reads.is_empty() {
                stats.accounts_with_storage_reads += 1;
                stats.total_storage_reads += account.storage_reads.len();
            }
            if !account.balance_changes.is_empty() {
                stats.accounts_with_balance_changes += 1;
                stats.total_balance_changes += account.balance_changes.len();
            }
            if !account.nonce_changes.is_empty() {
                stats.accounts_with_nonce_changes += 1;
                stats.total_nonce_changes += account.nonce_changes.len();
            }
            if !account.code_changes.is_empty() {
                stats.accounts_with_code_changes += 1;
                stats.total_code_changes += account.code_changes.len();
            }
        }
        stats
    }
}

/// Compressed size in bytes of each component, encoded on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSizes {
    pub profile: Option<Profile>,
    pub storage_writes: usize,
    pub storage_reads: usize,
    /// `storage_writes + storage_reads`.
    pub storage_total: usize,
    pub balance_changes: usize,
    pub nonce_changes: usize,
    pub code_changes: usize,
    /// Sum of every component.
    pub total: usize,
    /// Whole encoded block, uncompressed.
    pub block_raw: usize,
    pub block_compressed: usize,
}

impl ComponentSizes {
    pub fn measure(bal: &BlockAccessList, profile: Profile) -> Result<Self, BalError> {
        let mut storage_writes = Vec::new();
        let mut storage_reads = Vec::new();
        let mut balance_changes = Vec::new();
        let mut nonce_changes = Vec::new();
        let mut code_changes = Vec::new();
        for account in bal.accounts() {
            storage_writes.extend_from_slice(&account.storage_writes);
            storage_reads.extend_from_slice(&account.storage_reads);
            balance_changes.extend_from_slice(&account.balance_changes);
            nonce_changes.extend_from_slice(&account.nonce_changes);
            code_changes.extend_from_slice(&account.code_changes);
        }

        // Empty components count as zero rather than the size of an empty list.
        let storage_writes = component_size(profile, &storage_writes)?;
        let storage_reads = component_size(profile, &storage_reads)?;
        let balance_changes = component_size(profile, &balance_changes)?;
        let nonce_changes = component_size(profile, &nonce_changes)?;
        let code_changes = component_size(profile, &code_changes)?;

        let encoded = profile.encode(bal);
        let storage_total = storage_writes + storage_reads;
        Ok(Self {
            profile: Some(profile),
            storage_writes,
            storage_reads,
            storage_total,
            balance_changes,
            nonce_changes,
            code_changes,
            total: storage_total + balance_changes + nonce_changes + code_changes,
            block_raw: encoded.len(),
            block_compressed: compressed_size(&encoded)?,
        })
    }
}

#[allow(clippy::ptr_arg)]
fn component_size<T>(profile: Profile, items: &Vec<T>) -> Result<usize, BalError>
where
    T: ethbal_ssz::encode::SSZEncode + ethbal_rlp::encode::RLPEncode,
{
    if items.is_empty() {
        return Ok(0);
    }
    compressed_size(&profile.encode_list(items))
}

/// Length of `bytes` after snappy (raw format) compression.
pub fn compressed_size(bytes: &[u8]) -> Result<usize, BalError> {
    let compressed = snap::raw::Encoder::new().compress_vec(bytes)?;
    Ok(compressed.len())
}

/// Converts a byte count to KiB, for reporting.
pub fn kib(bytes: usize) -> f64 {
    bytes as f64 / 1024.0
}
