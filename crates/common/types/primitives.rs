use ethereum_types::{Address, H128, H256};

use crate::{
    constants::{ADDRESS_LEN, BALANCE_LEN, MAX_CODE_SIZE, STORAGE_KEY_LEN, STORAGE_VALUE_LEN},
    error::BalError,
};

/// Zero-based position of a transaction in its block. Index 0 is the first
/// transaction.
pub type TxIndex = u16;
pub type StorageKey = H256;
pub type StorageValue = H256;
pub type Nonce = u64;
/// Post-transaction balance as a 16-byte big-endian unsigned integer.
pub type Balance = H128;

fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N], BalError> {
    <[u8; N]>::try_from(bytes).map_err(|_| BalError::InvalidFixedWidth {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

pub fn address_from_slice(bytes: &[u8]) -> Result<Address, BalError> {
    fixed::<ADDRESS_LEN>("address", bytes).map(Address::from)
}

pub fn storage_key_from_slice(bytes: &[u8]) -> Result<StorageKey, BalError> {
    fixed::<STORAGE_KEY_LEN>("slot", bytes).map(StorageKey::from)
}

pub fn storage_value_from_slice(bytes: &[u8]) -> Result<StorageValue, BalError> {
    fixed::<STORAGE_VALUE_LEN>("new_value", bytes).map(StorageValue::from)
}

pub fn balance_from_slice(bytes: &[u8]) -> Result<Balance, BalError> {
    fixed::<BALANCE_LEN>("post_balance", bytes).map(Balance::from)
}

pub fn balance_from_u128(value: u128) -> Balance {
    Balance::from(value.to_be_bytes())
}

pub fn balance_to_u128(balance: &Balance) -> u128 {
    u128::from_be_bytes(balance.0)
}

pub fn check_code_size(address: Address, tx_index: TxIndex, code: &[u8]) -> Result<(), BalError> {
    if code.len() > MAX_CODE_SIZE {
        return Err(BalError::CodeTooLarge {
            address,
            tx_index,
            actual: code.len(),
            max: MAX_CODE_SIZE,
        });
    }
    Ok(())
}
