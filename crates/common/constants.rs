// Limits sized for a 630M gas block.
pub const MAX_TXS: usize = 30_000;
pub const MAX_SLOTS: usize = 300_000;
pub const MAX_ACCOUNTS: usize = 300_000;

/// Maximum contract bytecode size (EIP-170).
pub const MAX_CODE_SIZE: usize = 24_576;

pub const ADDRESS_LEN: usize = 20;
pub const STORAGE_KEY_LEN: usize = 32;
pub const STORAGE_VALUE_LEN: usize = 32;
/// Post-transaction balances are 16-byte unsigned big-endian integers.
pub const BALANCE_LEN: usize = 16;
