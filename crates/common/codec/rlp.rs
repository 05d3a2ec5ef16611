use bytes::BufMut;
use ethbal_rlp::{
    decode::{RLPDecode, decode_rlp_item},
    encode::{RLPEncode, encode_length},
    error::RLPDecodeError,
    structs,
};

use super::{BalCodec, Profile, malformed};
use crate::{
    constants::{MAX_ACCOUNTS, MAX_SLOTS, MAX_TXS},
    error::BalError,
    types::{
        AccountChanges, Balance, BalanceChange, BlockAccessList, CodeChange, NonceChange,
        SlotChanges, StorageChange, balance_to_u128,
    },
};

pub struct RlpCodec;

impl BalCodec for RlpCodec {
    const PROFILE: Profile = Profile::Rlp;

    fn encode(bal: &BlockAccessList) -> Vec<u8> {
        bal.encode_to_vec()
    }

    /// Walks the outer list by hand so a failure can be reported at the
    /// offset of the account it belongs to.
    fn decode(bytes: &[u8]) -> Result<BlockAccessList, BalError> {
        let (is_list, mut payload, rest) = decode_rlp_item(bytes).map_err(|err| malformed(0, err))?;
        if !is_list {
            return Err(malformed(0, RLPDecodeError::UnexpectedString));
        }
        if !rest.is_empty() {
            return Err(malformed(
                bytes.len() - rest.len(),
                format!("{} trailing bytes", rest.len()),
            ));
        }

        let mut accounts = Vec::new();
        while !payload.is_empty() {
            // `payload` always ends where `bytes` ends.
            let offset = bytes.len() - payload.len();
            if accounts.len() == MAX_ACCOUNTS {
                return Err(malformed(
                    offset,
                    format!("more than {MAX_ACCOUNTS} accounts"),
                ));
            }
            let (account, remaining) =
                AccountChanges::decode_unfinished(payload).map_err(|err| malformed(offset, err))?;
            check_list_limits(&account).map_err(|reason| malformed(offset, reason))?;
            accounts.push(account);
            payload = remaining;
        }

        let bal = BlockAccessList::from_accounts(accounts);
        bal.validate()?;
        Ok(bal)
    }
}

/// The list limits the SSZ profile enforces while decoding.
fn check_list_limits(account: &AccountChanges) -> Result<(), String> {
    let lists = [
        ("storage_writes", account.storage_writes.len(), MAX_SLOTS),
        ("storage_reads", account.storage_reads.len(), MAX_SLOTS),
        ("balance_changes", account.balance_changes.len(), MAX_TXS),
        ("nonce_changes", account.nonce_changes.len(), MAX_TXS),
        ("code_changes", account.code_changes.len(), MAX_TXS),
    ];
    let slot_changes = account
        .storage_writes
        .iter()
        .map(|slot| ("changes", slot.changes.len(), MAX_TXS));
    for (name, len, max) in lists.into_iter().chain(slot_changes) {
        if len > max {
            return Err(format!("{name} holds {len} entries, limit is {max}"));
        }
    }
    Ok(())
}

impl RLPEncode for StorageChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        structs::Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&self.new_value)
            .finish();
    }
}

impl RLPDecode for StorageChange {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = structs::Decoder::new(rlp)?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (new_value, decoder) = decoder.decode_field("new_value")?;
        let remaining = decoder.finish()?;
        Ok((
            Self {
                tx_index,
                new_value,
            },
            remaining,
        ))
    }
}

impl RLPEncode for SlotChanges {
    fn encode(&self, buf: &mut dyn BufMut) {
        structs::Encoder::new(buf)
            .encode_field(&self.slot)
            .encode_field(&self.changes)
            .finish();
    }
}

impl RLPDecode for SlotChanges {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = structs::Decoder::new(rlp)?;
        let (slot, decoder) = decoder.decode_field("slot")?;
        let (changes, decoder) = decoder.decode_field("changes")?;
        let remaining = decoder.finish()?;
        Ok((Self { slot, changes }, remaining))
    }
}

/// The balance goes on the wire as a minimal big-endian integer.
impl RLPEncode for BalanceChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        structs::Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&balance_to_u128(&self.post_balance))
            .finish();
    }
}

impl RLPDecode for BalanceChange {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = structs::Decoder::new(rlp)?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (post_balance, decoder) = decoder.decode_field::<u128>("post_balance")?;
        let remaining = decoder.finish()?;
        Ok((
            Self {
                tx_index,
                post_balance: Balance::from(post_balance.to_be_bytes()),
            },
            remaining,
        ))
    }
}

impl RLPEncode for NonceChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        structs::Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&self.new_nonce)
            .finish();
    }
}

impl RLPDecode for NonceChange {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = structs::Decoder::new(rlp)?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (new_nonce, decoder) = decoder.decode_field("new_nonce")?;
        let remaining = decoder.finish()?;
        Ok((
            Self {
                tx_index,
                new_nonce,
            },
            remaining,
        ))
    }
}

impl RLPEncode for CodeChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        structs::Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&self.new_code)
            .finish();
    }
}

impl RLPDecode for CodeChange {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = structs::Decoder::new(rlp)?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (new_code, decoder) = decoder.decode_field("new_code")?;
        let remaining = decoder.finish()?;
        Ok((Self { tx_index, new_code }, remaining))
    }
}

impl RLPEncode for AccountChanges {
    fn encode(&self, buf: &mut dyn BufMut) {
        structs::Encoder::new(buf)
            .encode_field(&self.address)
            .encode_field(&self.storage_writes)
            .encode_field(&self.storage_reads)
            .encode_field(&self.balance_changes)
            .encode_field(&self.nonce_changes)
            .encode_field(&self.code_changes)
            .finish();
    }
}

impl RLPDecode for AccountChanges {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = structs::Decoder::new(rlp)?;
        let (address, decoder) = decoder.decode_field("address")?;
        let (storage_writes, decoder) = decoder.decode_field("storage_writes")?;
        let (storage_reads, decoder) = decoder.decode_field("storage_reads")?;
        let (balance_changes, decoder) = decoder.decode_field("balance_changes")?;
        let (nonce_changes, decoder) = decoder.decode_field("nonce_changes")?;
        let (code_changes, decoder) = decoder.decode_field("code_changes")?;
        let remaining = decoder.finish()?;
        Ok((
            Self {
                address,
                storage_writes,
                storage_reads,
                balance_changes,
                nonce_changes,
                code_changes,
            },
            remaining,
        ))
    }
}

/// A bare list of accounts.
impl RLPEncode for BlockAccessList {
    fn encode(&self, buf: &mut dyn BufMut) {
        let payload_len: usize = self
            .account_changes
            .iter()
            .map(|account| account.length())
            .sum();
        encode_length(payload_len, buf);
        for account in &self.account_changes {
            account.encode(buf);
        }
    }
}

impl RLPDecode for BlockAccessList {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (accounts, rest) = Vec::<AccountChanges>::decode_unfinished(rlp)?;
        Ok((Self::from_accounts(accounts), rest))
    }
}
