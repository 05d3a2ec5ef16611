use bytes::Bytes;
use ethereum_types::{H128, H160, H256};

use crate::{
    constants::{RLP_EMPTY_LIST, RLP_NULL, SHORT_PAYLOAD_LIMIT},
    error::RLPDecodeError,
};

pub trait RLPDecode: Sized {
    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (decoded, remaining) = Self::decode_unfinished(rlp)?;
        if !remaining.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok(decoded)
    }

    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;
}

/// Reads a big-endian length of `len_of_len` bytes, rejecting non-canonical forms.
fn read_long_length(data: &[u8], len_of_len: usize) -> Result<usize, RLPDecodeError> {
    let bytes = data
        .get(1..1 + len_of_len)
        .ok_or(RLPDecodeError::InvalidLength)?;
    if bytes.first() == Some(&0) || len_of_len > usize::BITS as usize / 8 {
        return Err(RLPDecodeError::MalformedData);
    }
    let length = bytes
        .iter()
        .fold(0usize, |acc, byte| (acc << 8) | *byte as usize);
    if length < SHORT_PAYLOAD_LIMIT {
        return Err(RLPDecodeError::MalformedData);
    }
    Ok(length)
}

/// Splits the first RLP item off `data`.
///
/// Returns whether the item is a list, its payload, and the bytes that follow it.
pub fn decode_rlp_item(data: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let first_byte = *data.first().ok_or(RLPDecodeError::InvalidLength)?;

    let (is_list, header_len, payload_len) = match first_byte {
        0..RLP_NULL => return Ok((false, &data[..1], &data[1..])),
        RLP_NULL..0xb8 => {
            let payload_len = (first_byte - RLP_NULL) as usize;
            // A single byte below 0x80 must be encoded as itself.
            if payload_len == 1 && data.get(1).is_some_and(|b| *b < RLP_NULL) {
                return Err(RLPDecodeError::MalformedData);
            }
            (false, 1, payload_len)
        }
        0xb8..RLP_EMPTY_LIST => {
            let len_of_len = (first_byte - 0xb7) as usize;
            (false, 1 + len_of_len, read_long_length(data, len_of_len)?)
        }
        RLP_EMPTY_LIST..0xf8 => (true, 1, (first_byte - RLP_EMPTY_LIST) as usize),
        0xf8..=0xff => {
            let len_of_len = (first_byte - 0xf7) as usize;
            (true, 1 + len_of_len, read_long_length(data, len_of_len)?)
        }
    };

    let end = header_len
        .checked_add(payload_len)
        .ok_or(RLPDecodeError::InvalidLength)?;
    let payload = data
        .get(header_len..end)
        .ok_or(RLPDecodeError::InvalidLength)?;
    Ok((is_list, payload, &data[end..]))
}

/// Decodes a byte string, returning its payload and the remaining bytes.
pub fn decode_bytes(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_rlp_item(data)?;
    if is_list {
        return Err(RLPDecodeError::UnexpectedList);
    }
    Ok((payload, rest))
}

/// Left-pads a big-endian integer payload to `N` bytes.
pub fn static_left_pad<const N: usize>(data: &[u8]) -> Result<[u8; N], RLPDecodeError> {
    let mut result = [0u8; N];
    if data.is_empty() {
        return Ok(result);
    }
    if data[0] == 0 {
        return Err(RLPDecodeError::MalformedData);
    }
    if data.len() > N {
        return Err(RLPDecodeError::InvalidLength);
    }
    let start = N - data.len();
    result[start..].copy_from_slice(data);
    Ok(result)
}

macro_rules! impl_uint_decode {
    ($($t:ty),*) => {
        $(
            impl RLPDecode for $t {
                fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                    let (payload, rest) = decode_bytes(rlp)?;
                    let padded = static_left_pad::<{ std::mem::size_of::<$t>() }>(payload)?;
                    Ok((<$t>::from_be_bytes(padded), rest))
                }
            }
        )*
    };
}

impl_uint_decode!(u8, u16, u32, u64, u128, usize);

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_bytes(rlp)?;
        Ok((Bytes::copy_from_slice(payload), rest))
    }
}

macro_rules! impl_fixed_hash_decode {
    ($($t:ty),*) => {
        $(
            impl RLPDecode for $t {
                fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                    let (payload, rest) = decode_bytes(rlp)?;
                    if payload.len() != <$t>::len_bytes() {
                        return Err(RLPDecodeError::InvalidLength);
                    }
                    Ok((<$t>::from_slice(payload), rest))
                }
            }
        )*
    };
}

impl_fixed_hash_decode!(H128, H160, H256);

impl<T: RLPDecode> RLPDecode for Vec<T> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, mut payload, rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        let mut items = Vec::new();
        while !payload.is_empty() {
            let (item, remaining) = T::decode_unfinished(payload)?;
            items.push(item);
            payload = remaining;
        }
        Ok((items, rest))
    }
}
