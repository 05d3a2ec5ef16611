use ethereum_types::Address;

use crate::types::TxIndex;

#[derive(Debug, thiserror::Error)]
pub enum BalError {
    #[error("{field} must be {expected} bytes, got {actual}")]
    InvalidFixedWidth {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Code for {address:#x} in tx {tx_index} is {actual} bytes (max {max})")]
    CodeTooLarge {
        address: Address,
        tx_index: TxIndex,
        actual: usize,
        max: usize,
    },

    #[error("Malformed encoding at offset {offset}: {reason}")]
    MalformedEncoding { offset: usize, reason: String },

    #[error("Account {address:#x} appears more than once")]
    DuplicateKey { address: Address },

    #[error("Transaction index {index} out of range (max {max})")]
    TxIndexOutOfRange { index: usize, max: usize },

    #[error("Invalid hex in {field}: {value}")]
    InvalidHex { field: &'static str, value: String },

    #[error("Compression failed: {0}")]
    Compression(#[from] snap::Error),
}
