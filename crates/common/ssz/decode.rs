use bytes::Bytes;
use ethereum_types::{H128, H160, H256};

use crate::{
    SSZType,
    constants::{BYTES_PER_LENGTH_OFFSET, BYTES_PER_LENGTH_PREFIX},
    error::SSZDecodeError,
};

pub trait SSZDecode: SSZType + Sized {
    /// Decodes a value spanning exactly `bytes`, which start at absolute
    /// position `offset` of the outer buffer.
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError>;

    fn decode(bytes: &[u8]) -> Result<Self, SSZDecodeError> {
        Self::decode_at(bytes, 0)
    }
}

/// Reads the little-endian offset stored at `at` within `bytes`.
pub(crate) fn read_offset(bytes: &[u8], at: usize, base: usize) -> Result<usize, SSZDecodeError> {
    let raw = bytes
        .get(at..at + BYTES_PER_LENGTH_OFFSET)
        .ok_or(SSZDecodeError::InvalidLength {
            offset: base + at,
            expected: BYTES_PER_LENGTH_OFFSET,
            actual: bytes.len().saturating_sub(at),
        })?;
    let mut word = [0u8; BYTES_PER_LENGTH_OFFSET];
    word.copy_from_slice(raw);
    Ok(u32::from_le_bytes(word) as usize)
}

/// Splits the 4-byte length or count prefix from the bytes that follow it.
fn split_prefix(bytes: &[u8], offset: usize) -> Result<(usize, &[u8]), SSZDecodeError> {
    let len = read_offset(bytes, 0, offset)?;
    Ok((len, &bytes[BYTES_PER_LENGTH_PREFIX..]))
}

fn expect_len(bytes: &[u8], expected: usize, offset: usize) -> Result<(), SSZDecodeError> {
    if bytes.len() != expected {
        return Err(SSZDecodeError::InvalidLength {
            offset,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

macro_rules! impl_uint_decode {
    ($($t:ty),*) => {
        $(
            impl SSZDecode for $t {
                fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
                    const SIZE: usize = std::mem::size_of::<$t>();
                    expect_len(bytes, SIZE, offset)?;
                    let mut word = [0u8; SIZE];
                    word.copy_from_slice(bytes);
                    Ok(<$t>::from_le_bytes(word))
                }
            }
        )*
    };
}

impl_uint_decode!(u8, u16, u32, u64);

macro_rules! impl_fixed_hash_decode {
    ($($t:ty),*) => {
        $(
            impl SSZDecode for $t {
                fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
                    expect_len(bytes, <$t>::len_bytes(), offset)?;
                    Ok(<$t>::from_slice(bytes))
                }
            }
        )*
    };
}

impl_fixed_hash_decode!(H128, H160, H256);

impl SSZDecode for Bytes {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let (len, data) = split_prefix(bytes, offset)?;
        expect_len(data, len, offset + BYTES_PER_LENGTH_PREFIX)?;
        Ok(Bytes::copy_from_slice(data))
    }
}

impl<T: SSZDecode> SSZDecode for Vec<T> {
    fn decode_at(bytes: &[u8], offset: usize) -> Result<Self, SSZDecodeError> {
        let (count, elements) = split_prefix(bytes, offset)?;
        match T::FIXED_SIZE {
            Some(size) => decode_fixed_elements(elements, offset, count, size),
            None => decode_variable_elements(bytes, offset, count),
        }
    }
}

fn decode_fixed_elements<T: SSZDecode>(
    elements: &[u8],
    offset: usize,
    count: usize,
    size: usize,
) -> Result<Vec<T>, SSZDecodeError> {
    let start = offset + BYTES_PER_LENGTH_PREFIX;
    let expected = count.checked_mul(size).ok_or(SSZDecodeError::InvalidLength {
        offset: start,
        expected: usize::MAX,
        actual: elements.len(),
    })?;
    expect_len(elements, expected, start)?;
    elements
        .chunks_exact(size)
        .enumerate()
        .map(|(i, chunk)| T::decode_at(chunk, start + i * size))
        .collect()
}

/// `bytes` is the whole list, count prefix included, since element offsets
/// are measured from its start.
fn decode_variable_elements<T: SSZDecode>(
    bytes: &[u8],
    offset: usize,
    count: usize,
) -> Result<Vec<T>, SSZDecodeError> {
    let table_end = count
        .checked_mul(BYTES_PER_LENGTH_OFFSET)
        .and_then(|table| table.checked_add(BYTES_PER_LENGTH_PREFIX))
        .filter(|end| *end <= bytes.len())
        .ok_or(SSZDecodeError::InvalidLength {
            offset: offset + BYTES_PER_LENGTH_PREFIX,
            expected: count.saturating_mul(BYTES_PER_LENGTH_OFFSET),
            actual: bytes.len() - BYTES_PER_LENGTH_PREFIX,
        })?;
    if count == 0 {
        expect_len(bytes, BYTES_PER_LENGTH_PREFIX, offset)?;
        return Ok(Vec::new());
    }

    let mut starts = Vec::with_capacity(count);
    for i in 0..count {
        let at = BYTES_PER_LENGTH_PREFIX + i * BYTES_PER_LENGTH_OFFSET;
        let start = read_offset(bytes, at, offset)?;
        let out_of_order = match starts.last() {
            None => start != table_end,
            Some(previous) => start < *previous,
        };
        if out_of_order || start > bytes.len() {
            return Err(SSZDecodeError::InvalidOffset {
                offset: offset + at,
                value: start,
            });
        }
        starts.push(start);
    }
    let mut items = Vec::with_capacity(count);
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(bytes.len());
        items.push(T::decode_at(&bytes[*start..end], offset + start)?);
    }
    Ok(items)
}
