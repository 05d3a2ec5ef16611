/// Width of the little-endian offsets pointing at variable-size data.
pub const BYTES_PER_LENGTH_OFFSET: usize = 4;

/// Width of the little-endian element count in front of lists and byte lists.
pub const BYTES_PER_LENGTH_PREFIX: usize = 4;
