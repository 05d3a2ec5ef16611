//! Simple Serialize encoding.
//!
//! Fixed-size values are written inline, little-endian for integers. Variable-size
//! values (byte lists, lists, containers holding either) are written after the
//! fixed part of their parent and referenced from it through 4-byte offsets, so
//! a reader can jump straight to any field or list element.
//!
//! Lists and byte lists open with a 4-byte element count, so every value
//! checks its own length and a truncated or extended buffer never decodes.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;

/// Shape information shared by encoding and decoding.
pub trait SSZType {
    /// Encoded size for fixed-size types, `None` for variable-size ones.
    const FIXED_SIZE: Option<usize>;

    /// Bytes this type takes in the fixed part of an enclosing container or list.
    fn fixed_part_len() -> usize {
        Self::FIXED_SIZE.unwrap_or(constants::BYTES_PER_LENGTH_OFFSET)
    }
}
