/// Encoding of the empty byte string (and of the integer zero).
pub const RLP_NULL: u8 = 0x80;

/// Encoding of the empty list.
pub const RLP_EMPTY_LIST: u8 = 0xc0;

/// Payloads shorter than this carry their length in the prefix byte itself.
pub const SHORT_PAYLOAD_LIMIT: usize = 56;
