use bytes::{BufMut, Bytes};
use ethbal_ssz::{
    SSZType,
    decode::SSZDecode,
    encode::SSZEncode,
    error::SSZDecodeError,
    layout,
    structs::{Decoder, Encoder, fixed_container_size},
};
use ethereum_types::{Address, H128, H256};

use super::{BalCodec, Profile, malformed};
use crate::{
    constants::{MAX_ACCOUNTS, MAX_SLOTS, MAX_TXS},
    error::BalError,
    types::{
        AccountChanges, BalanceChange, BlockAccessList, CodeChange, NonceChange, SlotChanges,
        StorageChange, TxIndex,
    },
};

pub struct SszCodec;

impl BalCodec for SszCodec {
    const PROFILE: Profile = Profile::Ssz;

    fn encode(bal: &BlockAccessList) -> Vec<u8> {
        bal.encode_to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<BlockAccessList, BalError> {
        let bal = BlockAccessList::decode(bytes).map_err(|err| malformed(err.offset(), err))?;
        bal.validate()?;
        Ok(bal)
    }
}

impl SSZType for StorageChange {
    const FIXED_SIZE: Option<usize> = Some(fixed_container_size(&[2, 32]));
}

impl SSZEncode for StorageChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&self.new_value)
            .finish();
    }
}

impl SSZDecode for StorageChange {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let decoder = Decoder::new(bytes, offset, &layout!(TxIndex, H256))?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (new_value, decoder) = decoder.decode_field("new_value")?;
        decoder.finish()?;
        Ok(Self {
            tx_index,
            new_value,
        })
    }
}

impl SSZType for SlotChanges {
    const FIXED_SIZE: Option<usize> = None;
}

impl SSZEncode for SlotChanges {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.slot)
            .encode_field(&self.changes)
            .finish();
    }
}

impl SSZDecode for SlotChanges {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let decoder = Decoder::new(bytes, offset, &layout!(H256, Vec<StorageChange>))?;
        let (slot, decoder) = decoder.decode_field("slot")?;
        let (changes, decoder) = decoder.decode_list_field("changes", MAX_TXS)?;
        decoder.finish()?;
        Ok(Self { slot, changes })
    }
}

impl SSZType for BalanceChange {
    const FIXED_SIZE: Option<usize> = Some(fixed_container_size(&[2, 16]));
}

impl SSZEncode for BalanceChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&self.post_balance)
            .finish();
    }
}

impl SSZDecode for BalanceChange {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let decoder = Decoder::new(bytes, offset, &layout!(TxIndex, H128))?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (post_balance, decoder) = decoder.decode_field("post_balance")?;
        decoder.finish()?;
        Ok(Self {
            tx_index,
            post_balance,
        })
    }
}

impl SSZType for NonceChange {
    const FIXED_SIZE: Option<usize> = Some(fixed_container_size(&[2, 8]));
}

impl SSZEncode for NonceChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&self.new_nonce)
            .finish();
    }
}

impl SSZDecode for NonceChange {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let decoder = Decoder::new(bytes, offset, &layout!(TxIndex, u64))?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (new_nonce, decoder) = decoder.decode_field("new_nonce")?;
        decoder.finish()?;
        Ok(Self {
            tx_index,
            new_nonce,
        })
    }
}

impl SSZType for CodeChange {
    const FIXED_SIZE: Option<usize> = None;
}

impl SSZEncode for CodeChange {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.tx_index)
            .encode_field(&self.new_code)
            .finish();
    }
}

impl SSZDecode for CodeChange {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let decoder = Decoder::new(bytes, offset, &layout!(TxIndex, Bytes))?;
        let (tx_index, decoder) = decoder.decode_field("tx_index")?;
        let (new_code, decoder) = decoder.decode_field("new_code")?;
        decoder.finish()?;
        Ok(Self { tx_index, new_code })
    }
}

impl SSZType for AccountChanges {
    const FIXED_SIZE: Option<usize> = None;
}

impl SSZEncode for AccountChanges {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.address)
            .encode_field(&self.storage_writes)
            .encode_field(&self.storage_reads)
            .encode_field(&self.balance_changes)
            .encode_field(&self.nonce_changes)
            .encode_field(&self.code_changes)
            .finish();
    }
}

impl SSZDecode for AccountChanges {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let decoder = Decoder::new(
            bytes,
            offset,
            &layout!(
                Address,
                Vec<SlotChanges>,
                Vec<H256>,
                Vec<BalanceChange>,
                Vec<NonceChange>,
                Vec<CodeChange>
            ),
        )?;
        let (address, decoder) = decoder.decode_field("address")?;
        let (storage_writes, decoder) = decoder.decode_list_field("storage_writes", MAX_SLOTS)?;
        let (storage_reads, decoder) = decoder.decode_list_field("storage_reads", MAX_SLOTS)?;
        let (balance_changes, decoder) = decoder.decode_list_field("balance_changes", MAX_TXS)?;
        let (nonce_changes, decoder) = decoder.decode_list_field("nonce_changes", MAX_TXS)?;
        let (code_changes, decoder) = decoder.decode_list_field("code_changes", MAX_TXS)?;
        decoder.finish()?;
        Ok(Self {
            address,
            storage_writes,
            storage_reads,
            balance_changes,
            nonce_changes,
            code_changes,
        })
    }
}

impl SSZType for BlockAccessList {
    const FIXED_SIZE: Option<usize> = None;
}

/// Container with a single `account_changes` list.
impl SSZEncode for BlockAccessList {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.account_changes)
            .finish();
    }
}

impl SSZDecode for BlockAccessList {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let decoder = Decoder::new(bytes, offset, &layout!(Vec<AccountChanges>))?;
        let (accounts, decoder) = decoder.decode_list_field("account_changes", MAX_ACCOUNTS)?;
        decoder.finish()?;
        Ok(Self::from_accounts(accounts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::balance_from_u128;
    use hex_literal::hex;

    #[test]
    fn fixed_element_sizes() {
        assert_eq!(StorageChange::FIXED_SIZE, Some(34));
        assert_eq!(BalanceChange::FIXED_SIZE, Some(18));
        assert_eq!(NonceChange::FIXED_SIZE, Some(10));
    }

    #[test]
    fn balance_change_layout() {
        let change = BalanceChange::new(1, balance_from_u128(0x0100));
        assert_eq!(
            change.encode_to_vec(),
            hex!("0100" "00000000000000000000000000000100").to_vec()
        );
    }

    #[test]
    fn account_layout() {
        let account = AccountChanges::new(Address::repeat_byte(0xaa))
            .with_nonce_changes(vec![NonceChange::new(1, 1)]);
        let encoded = account.encode_to_vec();
        // 20-byte address and five offsets, then each list behind its count.
        assert_eq!(encoded.len(), 20 + 5 * 4 + 4 * 4 + (4 + 10));
        let offsets: Vec<u32> = (0..5)
            .map(|i| {
                let at = 20 + i * 4;
                u32::from_le_bytes(encoded[at..at + 4].try_into().unwrap())
            })
            .collect();
        assert_eq!(offsets, vec![40, 44, 48, 52, 66]);
        assert_eq!(&encoded[52..66], &hex!("01000000" "0100" "0100000000000000"));
        assert_eq!(&encoded[66..], &hex!("00000000"));
        assert_eq!(AccountChanges::decode(&encoded), Ok(account));
    }

    #[test]
    fn code_is_length_prefixed() {
        let change = CodeChange::new(3, Bytes::from_static(&hex!("60806040")));
        assert_eq!(
            change.encode_to_vec(),
            hex!("0300" "06000000" "04000000" "60806040").to_vec()
        );
    }

    #[test]
    fn truncated_code_is_rejected() {
        let bal = BlockAccessList::from_accounts(vec![
            AccountChanges::new(Address::repeat_byte(0x01))
                .with_code_changes(vec![CodeChange::new(0, Bytes::from_static(&hex!("60806040")))]),
        ]);
        let encoded = SszCodec::encode(&bal);
        for cut in 0..encoded.len() {
            assert!(
                matches!(
                    SszCodec::decode(&encoded[..cut]),
                    Err(BalError::MalformedEncoding { .. })
                ),
                "cut at {cut}"
            );
        }
        let mut extended = encoded.clone();
        extended.push(0x00);
        assert!(matches!(
            SszCodec::decode(&extended),
            Err(BalError::MalformedEncoding { .. })
        ));
    }

    #[test]
    fn decode_error_carries_absolute_offset() {
        let bal = BlockAccessList::from_accounts(vec![
            AccountChanges::new(Address::repeat_byte(0x01))
                .with_nonce_changes(vec![NonceChange::new(1, 1)]),
        ]);
        let mut encoded = SszCodec::encode(&bal);
        encoded.pop();
        let err = SszCodec::decode(&encoded).unwrap_err();
        // The account sits at 4 (container offset) + 4 (count) + 4 (offset
        // table); its code list count starts 66 bytes in and is now short.
        assert!(matches!(err, BalError::MalformedEncoding { offset: 78, .. }));
    }
}
